//! Receive clock
//!
//! Microsecond timestamps for received frames. The clock is anchored to the wall
//! clock once at construction and then advanced with a monotonic `Instant`, so
//! timestamps are comparable with other ground-station logs but never step
//! backwards when the system time is adjusted.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Monotonic microsecond clock anchored to the Unix epoch
#[derive(Debug, Clone, Copy)]
pub struct ReceiveClock {
    anchor: Instant,
    anchor_us: u64,
}

impl ReceiveClock {
    pub fn new() -> Self {
        let anchor_us = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0);
        Self {
            anchor: Instant::now(),
            anchor_us,
        }
    }

    /// Current receive time in microseconds since the Unix epoch
    pub fn now_us(&self) -> u64 {
        self.anchor_us + self.anchor.elapsed().as_micros() as u64
    }
}

impl Default for ReceiveClock {
    fn default() -> Self {
        Self::new()
    }
}
