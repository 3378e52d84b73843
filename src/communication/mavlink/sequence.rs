//! Sequence Loss Tracker
//!
//! Detects silently dropped frames by reconciling each sender's 8-bit sequence
//! number against the value expected after its previous frame.
//!
//! # Algorithm
//!
//! Sequence numbers are scoped to the sender identity `(system id, component id)`,
//! not to the link, so one table is shared by every link. For each observation:
//!
//! 1. The first frame from a sender sets its baseline; no loss is counted
//! 2. Otherwise an expected cursor starts one past the baseline and advances
//!    (wrapping at 256) until it meets the observed sequence, counting one loss
//!    per step
//! 3. The walk is capped at 255 steps; the observed value always becomes the new
//!    baseline
//!
//! A loss ratio over the window since the last report is produced whenever this
//! observation found a loss, or the lifetime received counter reached a multiple
//! of [`LOSS_REPORT_INTERVAL`]. Reporting resets the window.

use std::collections::HashMap;

/// Received-message interval between loss ratio reports
pub const LOSS_REPORT_INTERVAL: u64 = 64;

/// Upper bound on reconciliation steps per observation (one full wrap)
pub const MAX_RECONCILE_STEPS: u32 = 255;

/// Sender identity: (system id, component id)
pub type SenderId = (u8, u8);

/// Loss counters
///
/// Lifetime counters never reset; window counters reset on each loss report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LossCounters {
    pub total_received: u64,
    pub total_lost: u64,
    pub window_received: u64,
    pub window_lost: u64,
}

/// Loss ratio for one system over the last reporting window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LossReport {
    pub system_id: u8,
    /// Lost / (lost + received) * 100 over the window
    pub loss_percent: f32,
}

/// Result of observing one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    /// First frame ever seen from this sender
    pub first_seen: bool,
    /// Losses counted by this observation
    pub lost: u32,
    /// Loss ratio report, if one is due
    pub report: Option<LossReport>,
}

/// Per-sender sequence table and loss statistics
#[derive(Debug, Default)]
pub struct SequenceTracker {
    /// Last observed sequence per sender
    last_sequence: HashMap<SenderId, u8>,
    counters: LossCounters,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a frame from `(system_id, component_id)` carrying `sequence`
    pub fn observe(&mut self, system_id: u8, component_id: u8, sequence: u8) -> Observation {
        self.counters.total_received += 1;
        self.counters.window_received += 1;

        let mut lost = 0u32;
        let first_seen = match self.last_sequence.insert((system_id, component_id), sequence) {
            None => true,
            Some(last) => {
                let mut expected = last.wrapping_add(1);
                while expected != sequence && lost < MAX_RECONCILE_STEPS {
                    expected = expected.wrapping_add(1);
                    lost += 1;
                }
                false
            }
        };

        self.counters.total_lost += u64::from(lost);
        self.counters.window_lost += u64::from(lost);

        let report = if lost > 0 || self.counters.total_received % LOSS_REPORT_INTERVAL == 0 {
            Some(self.take_report(system_id))
        } else {
            None
        };

        if lost > 0 {
            crate::log_debug!(
                "Lost {} message(s) from {}:{} (seq {})",
                lost,
                system_id,
                component_id,
                sequence
            );
        }

        Observation {
            first_seen,
            lost,
            report,
        }
    }

    /// Compute the windowed loss ratio and reset the window
    fn take_report(&mut self, system_id: u8) -> LossReport {
        let window_total = self.counters.window_lost + self.counters.window_received;
        let loss_percent = if window_total == 0 {
            0.0
        } else {
            (self.counters.window_lost as f64 / window_total as f64 * 100.0) as f32
        };
        self.counters.window_lost = 0;
        self.counters.window_received = 0;
        LossReport {
            system_id,
            loss_percent,
        }
    }

    /// Last recorded sequence for a sender
    pub fn last_sequence(&self, system_id: u8, component_id: u8) -> Option<u8> {
        self.last_sequence.get(&(system_id, component_id)).copied()
    }

    pub fn counters(&self) -> LossCounters {
        self.counters
    }

    /// Number of senders in the table
    pub fn sender_count(&self) -> usize {
        self.last_sequence.len()
    }
}
