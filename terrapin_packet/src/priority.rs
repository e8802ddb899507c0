/*! Packet scheduling priorities.
*/

/** Scheduling hint attached to every packet kind.

The link layer may use it to order sends when bandwidth is scarce, for
example let tunnel handshakes overtake flood traffic. It is strictly
out-of-band: never serialized, never relied upon for correctness.
*/
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum PacketPriority {
    /// Flood traffic, first to be delayed.
    Low,
    /// Regular traffic.
    Default,
    /// Handshake traffic that keeps tunnels responsive.
    High,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_ordering() {
        assert!(PacketPriority::Low < PacketPriority::Default);
        assert!(PacketPriority::Default < PacketPriority::High);
    }
}
