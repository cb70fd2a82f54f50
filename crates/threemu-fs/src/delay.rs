//! Artificial IPC latency for archive operations.
//!
//! Real hardware takes a measurable amount of time to service FS requests and
//! some games depend on it. A delay generator only computes the delay; the IPC
//! layer decides how to apply it to the requesting guest thread.

use std::fmt;

/// Latency model for one archive class
pub trait DelayGenerator: fmt::Debug + Send {
    /// Delay in nanoseconds for reading `length` bytes
    fn read_delay_ns(&self, length: usize) -> u64;

    /// Delay in nanoseconds for opening a file
    fn open_delay_ns(&self) -> u64;
}

/// `max(length * slope + offset, minimum)`, saturating for absurd lengths
pub fn linear_read_delay(length: usize, slope: u64, offset: u64, minimum: u64) -> u64 {
    (length as u64)
        .saturating_mul(slope)
        .saturating_add(offset)
        .max(minimum)
}
