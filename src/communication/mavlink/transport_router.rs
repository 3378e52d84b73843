//! MAVLink Link Router
//!
//! Keeps the set of links associated with a protocol instance.
//!
//! # Architecture
//!
//! The link router:
//! - Holds the `SharedLink`s the protocol may send on, in registration order
//! - Provides the target list for broadcast sends
//! - Tracks per-link statistics
//!
//! # Design Pattern
//!
//! ```text
//! ┌────────────────────────────────────────────┐
//! │         MavlinkProtocol                     │
//! │   (decoder, writer, heartbeat scheduler)    │
//! └──────────────────┬─────────────────────────┘
//!                    │ links()
//!                    │ record_received() / record_sent()
//!                    ▼
//! ┌────────────────────────────────────────────┐
//! │          LinkRouter                         │
//! │  - Registered links                         │
//! │  - Per-link statistics                      │
//! └─────┬──────────┬──────────┬────────────────┘
//!       │          │          │
//!       ▼          ▼          ▼
//!    Serial       UDP        TCP
//! ```
//!
//! Links are owned by the transport layer; removing a link here only ends its
//! association with the protocol.

use std::collections::HashMap;

use super::transport::{LinkId, SharedLink};

/// Transport statistics for monitoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    /// Total bytes received
    pub bytes_received: u64,
    /// Total bytes sent
    pub bytes_sent: u64,
    /// Number of send errors
    pub send_errors: u32,
}

/// Links associated with a protocol instance
#[derive(Default)]
pub struct LinkRouter {
    links: Vec<SharedLink>,
    stats: HashMap<LinkId, TransportStats>,
}

impl LinkRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate a link with the protocol
    ///
    /// A link with the same id replaces the existing one and keeps its
    /// statistics.
    pub fn add_link(&mut self, link: SharedLink) {
        let id = link.id();
        match self.links.iter_mut().find(|existing| existing.id() == id) {
            Some(existing) => *existing = link,
            None => {
                crate::log_debug!("Link {} added", link.name());
                self.links.push(link);
            }
        }
        self.stats.entry(id).or_default();
    }

    /// Remove a link and its statistics
    pub fn remove_link(&mut self, id: LinkId) -> Option<SharedLink> {
        self.stats.remove(&id);
        let index = self.links.iter().position(|link| link.id() == id)?;
        let link = self.links.remove(index);
        crate::log_debug!("Link {} removed", link.name());
        Some(link)
    }

    /// All associated links, in registration order
    pub fn links(&self) -> Vec<SharedLink> {
        self.links.clone()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Statistics for one link
    pub fn stats(&self, id: LinkId) -> Option<TransportStats> {
        self.stats.get(&id).copied()
    }

    /// Statistics summed over all links
    pub fn total_stats(&self) -> TransportStats {
        self.stats
            .values()
            .fold(TransportStats::default(), |acc, s| TransportStats {
                bytes_received: acc.bytes_received + s.bytes_received,
                bytes_sent: acc.bytes_sent + s.bytes_sent,
                send_errors: acc.send_errors + s.send_errors,
            })
    }

    // Bytes may arrive on a link that was never added; it is counted anyway.
    pub fn record_received(&mut self, id: LinkId, bytes: usize) {
        self.stats.entry(id).or_default().bytes_received += bytes as u64;
    }

    pub fn record_sent(&mut self, id: LinkId, bytes: usize) {
        self.stats.entry(id).or_default().bytes_sent += bytes as u64;
    }

    pub fn record_send_error(&mut self, id: LinkId) {
        self.stats.entry(id).or_default().send_errors += 1;
    }

    pub fn reset_stats(&mut self) {
        for stats in self.stats.values_mut() {
            *stats = TransportStats::default();
        }
    }
}
