//! Protocol Version Gate
//!
//! Checks the protocol version a newly seen system declares in its heartbeat
//! before the system is admitted. A system speaking a different wire protocol
//! version is refused, and the operator is warned once per process lifetime,
//! however many mismatched systems show up afterwards.

use mavlink::common::HEARTBEAT_DATA;

/// Protocol version this engine speaks (heartbeat `mavlink_version` field)
pub const MAVLINK_PROTOCOL_VERSION: u8 = 3;

/// Warning raised on the first refused system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionWarning {
    pub title: String,
    pub detail: String,
}

/// Outcome of checking a heartbeat
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Admit,
    /// Discard the message; `warning` is only set for the first mismatch
    Reject { warning: Option<VersionWarning> },
}

/// Version gate with a one-shot, process-wide mismatch warning latch
#[derive(Debug, Default)]
pub struct VersionGate {
    mismatch_warned: bool,
}

impl VersionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check the heartbeat of an unregistered system
    ///
    /// With `check_enabled == false` every system is admitted.
    pub fn check(
        &mut self,
        system_id: u8,
        heartbeat: &HEARTBEAT_DATA,
        check_enabled: bool,
    ) -> GateDecision {
        if !check_enabled || heartbeat.mavlink_version == MAVLINK_PROTOCOL_VERSION {
            return GateDecision::Admit;
        }

        crate::log_debug!(
            "Refusing system {} with protocol version {}",
            system_id,
            heartbeat.mavlink_version
        );

        if self.mismatch_warned {
            return GateDecision::Reject { warning: None };
        }
        self.mismatch_warned = true;

        GateDecision::Reject {
            warning: Some(VersionWarning {
                title: "The MAVLink protocol version on the MAV and the ground station mismatch!"
                    .to_string(),
                detail: format!(
                    "It is unsafe to use different MAVLink versions. Refusing to connect to \
                     system {}, which sends MAVLink version {} (this ground station uses version {}).",
                    system_id, heartbeat.mavlink_version, MAVLINK_PROTOCOL_VERSION
                ),
            }),
        }
    }

    /// Whether the mismatch warning has already been raised
    pub fn mismatch_warned(&self) -> bool {
        self.mismatch_warned
    }
}
