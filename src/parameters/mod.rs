//! Parameter Storage System
//!
//! Persistent configuration for the protocol engine. Parameters live in a JSON
//! settings file, one group per subsystem, and are loaded once at startup.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────┐
//! │     MavlinkProtocol setters             │
//! │  (system id, rates, enable flags)      │
//! └──────────────┬─────────────────────────┘
//!                │ ProtocolParams
//!                ▼
//! ┌────────────────────────────────────────┐
//! │        ParameterStore                   │
//! │  - In-memory parameter map              │
//! │  - Typed values                         │
//! └──────────────┬─────────────────────────┘
//!                │ serde_json
//!                ▼
//! ┌────────────────────────────────────────┐
//! │         Settings file                   │
//! │  { "MAVLINK_PROTOCOL": { ... } }        │
//! └────────────────────────────────────────┘
//! ```

pub mod mavlink;
pub mod storage;

pub use mavlink::ProtocolParams;
pub use storage::{ParamValue, ParameterStore};
