//! MAVLink Protocol Engine
//!
//! This module turns byte streams from ground-station links into validated
//! MAVLink messages and frames outgoing messages for those links.
//!
//! # Architecture
//!
//! - **Parser**: Per-link frame decoding (v1 and v2, checksum, signature)
//! - **Version gate / Admission**: First-heartbeat discovery of remote systems
//! - **Sequence**: Per-sender loss accounting and loss-ratio reports
//! - **Dispatcher**: Hands admitted messages to subscribers
//! - **Writer**: Per-link header finalization and framing
//! - **Heartbeat**: Periodic ground-station heartbeat task
//! - **Tlog**: Timestamped packet log
//! - **Protocol**: `MavlinkProtocol`, tying the stages together
//!
//! # Usage
//!
//! ```ignore
//! use mavlink_gcs::communication::mavlink::vehicle::InMemoryVehicleRegistry;
//! use mavlink_gcs::MavlinkProtocol;
//!
//! let protocol = MavlinkProtocol::new(Some(settings_path), Arc::new(InMemoryVehicleRegistry::new()));
//! protocol.add_link(link.clone());
//! let mut events = protocol.subscribe();
//!
//! // From the transport's read loop
//! protocol.receive_bytes(&link, &bytes);
//! ```
//!
//! # Transport
//!
//! Links are provided by the host through [`transport::LinkInterface`]; the
//! engine is pushed inbound bytes and never reads from a link itself.

pub mod admission; // Vehicle admission bridge
pub mod dispatcher; // Message dispatcher
pub mod heartbeat; // Heartbeat scheduler
pub mod parser; // Frame decoding
pub mod protocol; // Protocol engine
pub mod sequence; // Sequence loss tracking
pub mod status_notifier; // Event bus
pub mod tlog; // Packet log sink
pub mod transport; // Link abstraction
pub mod transport_router; // Links associated with the protocol
pub mod vehicle; // Vehicle registry interface
pub mod version_gate; // Protocol version check
pub mod writer; // Outbound framing

#[cfg(test)]
pub(crate) mod test_support;

/// Component id this ground station sends with (MAV_COMP_ID_MISSIONPLANNER)
pub const GCS_COMPONENT_ID: u8 = 190;
