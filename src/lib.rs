//! mavlink_gcs - MAVLink protocol engine for ground control stations
//!
//! Turns raw byte streams from one or more communication links into validated,
//! sequence-checked MAVLink messages, and frames outgoing messages for those
//! links. Vehicles are discovered through their first heartbeat and handed to a
//! host-provided registry before any of their messages are dispatched.

// Logging macros and process-level infrastructure
pub mod core;

// Crate error type
pub mod error;

// Protocol settings and their persistence
pub mod parameters;

// Communication protocols (MAVLink)
pub mod communication;

pub use communication::mavlink::protocol::MavlinkProtocol;
pub use communication::mavlink::status_notifier::ProtocolEvent;
pub use communication::mavlink::transport::{LinkId, LinkInterface, SharedLink, TransportError};
pub use communication::mavlink::vehicle::{
    InMemoryVehicleRegistry, VehicleFamily, VehicleHandle, VehicleRegistry,
};
pub use communication::mavlink::writer::OutgoingMessage;
pub use error::{ProtocolError, Result};

#[doc(hidden)]
pub use tracing as __tracing;
