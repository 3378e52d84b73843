//! Core infrastructure
//!
//! Shared plumbing used by the protocol modules: the crate-wide logging macros
//! and the receive clock used to timestamp decoded frames.

pub mod clock;
pub mod logging;
