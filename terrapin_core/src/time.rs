//! Functions to work with time.

use std::time::{Duration, Instant};

/// Return an `Instant` corresponding to "now". Under tests it goes
/// through the tokio clock so that `tokio::time::pause` and `advance`
/// affect it.
#[cfg(test)]
pub fn clock_now() -> Instant {
    tokio::time::Instant::now().into_std()
}

/// Return an `Instant` corresponding to "now". Should be used instead
/// of `Instant::now()` to be able to use mocked time in tests.
#[cfg(not(test))]
pub fn clock_now() -> Instant {
    Instant::now()
}

/// Returns the amount of time elapsed since this instant was created.
pub fn clock_elapsed(time: Instant) -> Duration {
    clock_now() - time
}
