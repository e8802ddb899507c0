/*! Codec for encoding/decoding terrapin packets on a link using tokio-io.

Each authenticated point-to-point link carries length-prefixed frames:
a `u16` big-endian byte length followed by exactly one serialized
packet. The link layer itself (transport, encryption, peer
authentication) is outside this crate.
*/

use std::io::Error as IoError;

use terrapin_binary_io::*;
use terrapin_packet::*;

use bytes::{Buf, BufMut, BytesMut};
use nom::error::Error as NomError;
use nom::Needed;
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

/// A serialized `Packet` should be not longer than 65535 bytes so that
/// its length always fits the frame prefix.
pub const MAX_PACKET_SIZE: usize = 65535;

/// Length of the frame prefix in bytes.
const FRAME_HEADER_SIZE: usize = 2;

/// Error that can happen when decoding `Packet` from bytes.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The leading subtype byte is not part of the packet family.
    /// Reserved codes fail closed through this variant, they are never
    /// guessed at.
    #[error("Unknown packet subtype: {:#04x}", code)]
    UnknownSubtype {
        /// The offending subtype code.
        code: u8,
    },
    /// The frame ended before the packet's declared layout did.
    #[error("Packet is truncated, needs {:?} more", needed)]
    Truncated {
        /// How much more input the parser wanted.
        needed: Needed,
    },
    /// A field value is inconsistent with the subtype's layout.
    #[error("Invalid packet field: {:?}", error)]
    InvalidField {
        /// Parsing error.
        error: nom::Err<NomError<Vec<u8>>>,
        /// Received packet.
        packet: Vec<u8>,
    },
    /// General IO error that can happen on the link.
    #[error("IO Error")]
    Io(#[from] IoError),
}

impl DecodeError {
    pub(crate) fn invalid_field(e: nom::Err<NomError<&[u8]>>, packet: Vec<u8>) -> DecodeError {
        DecodeError::InvalidField {
            error: e.map(|e| NomError::new(e.input.to_vec(), e.code)),
            packet,
        }
    }
}

/// Error that can happen when encoding `Packet` to bytes.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Error indicates that `Packet` is invalid and can't be serialized.
    #[error("Serialize Packet error: {:?}", error)]
    Serialize {
        /// Serialization error.
        error: GenError,
    },
    /// General IO error that can happen on the link.
    #[error("IO Error")]
    Io(#[from] IoError),
}

/// Struct to use for {de-,}serializing packets on a link.
#[derive(Clone, Debug, Default)]
pub struct LinkCodec;

impl Decoder for LinkCodec {
    type Item = Packet;
    type Error = DecodeError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if buf.len() < FRAME_HEADER_SIZE {
            return Ok(None);
        }

        let frame_len = u16::from_be_bytes([buf[0], buf[1]]) as usize;
        if buf.len() < FRAME_HEADER_SIZE + frame_len {
            return Ok(None);
        }

        buf.advance(FRAME_HEADER_SIZE);
        let frame = buf.split_to(frame_len);

        match frame.first() {
            None => return Err(DecodeError::Truncated { needed: Needed::new(1) }),
            Some(&code) if !Packet::is_known_subtype(code) => {
                return Err(DecodeError::UnknownSubtype { code })
            },
            Some(_) => {},
        }

        match Packet::from_bytes(&frame) {
            Err(nom::Err::Incomplete(needed)) => Err(DecodeError::Truncated { needed }),
            Err(error) => Err(DecodeError::invalid_field(error, frame.to_vec())),
            Ok((rest, _)) if !rest.is_empty() => {
                // trailing bytes mean the frame and the layout disagree
                Err(DecodeError::invalid_field(
                    nom::Err::Error(NomError::new(rest, nom::error::ErrorKind::Eof)),
                    frame.to_vec(),
                ))
            },
            Ok((_, packet)) => Ok(Some(packet)),
        }
    }
}

impl Encoder<Packet> for LinkCodec {
    type Error = EncodeError;

    fn encode(&mut self, packet: Packet, buf: &mut BytesMut) -> Result<(), Self::Error> {
        let mut packet_buf = vec![0; MAX_PACKET_SIZE];
        let (_, size) = packet.to_bytes((&mut packet_buf, 0))
            .map_err(|error| EncodeError::Serialize { error })?;

        buf.reserve(FRAME_HEADER_SIZE + size);
        buf.put_u16(size as u16);
        buf.put_slice(&packet_buf[..size]);

        Ok(())
    }
}
