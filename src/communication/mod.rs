//! Communication Protocols
//!
//! # Protocols
//!
//! - **MAVLink (v1 and v2)**: vehicle discovery, telemetry reception and
//!   outbound framing for ground-station links
//!
//! Transports (serial, UDP, TCP) are owned by the host and plugged in through
//! [`mavlink::transport::LinkInterface`].

pub mod mavlink;
