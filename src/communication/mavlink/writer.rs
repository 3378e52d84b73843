//! MAVLink Outbound Framer
//!
//! Serializes outgoing messages with rust-mavlink and writes the frames to links.
//!
//! # Architecture
//!
//! - Serializes MAVLink messages to bytes using `mavlink::write_versioned_msg`
//! - Finalizes the header per link: on any link other than the default link the
//!   sender identity is replaced with the local configuration and the sequence
//!   comes from that link's own counter
//! - Only connected links receive bytes; a disconnected link is a no-op
//! - Tracks statistics (messages sent, skipped, write errors)

use std::collections::HashMap;
use std::io::Cursor;

use mavlink::common::MavMessage;
use mavlink::{MavHeader, MavlinkVersion};

use super::parser::MAX_FRAME_LEN;
use super::transport::{LinkId, LinkInterface, SharedLink};
use crate::error::{ProtocolError, Result};

/// A message queued for sending, with the header the application built
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    pub header: MavHeader,
    pub message: MavMessage,
    pub version: MavlinkVersion,
}

impl OutgoingMessage {
    /// MAVLink v2 message with an empty header
    ///
    /// The header is filled in when sent on a non-default link.
    pub fn new(message: MavMessage) -> Self {
        Self {
            header: MavHeader {
                system_id: 0,
                component_id: 0,
                sequence: 0,
            },
            message,
            version: MavlinkVersion::V2,
        }
    }

    pub fn with_header(mut self, header: MavHeader) -> Self {
        self.header = header;
        self
    }

    pub fn with_version(mut self, version: MavlinkVersion) -> Self {
        self.version = version;
        self
    }
}

/// Writer statistics for monitoring and diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    /// Total messages successfully sent
    pub messages_sent: u32,
    /// Sends skipped because the link was disconnected
    pub skipped_disconnected: u32,
    /// Link write errors
    pub write_errors: u32,
}

/// MAVLink outbound framer
///
/// Holds the local sender identity and one sequence counter per link.
pub struct MavlinkWriter {
    /// Local system id
    system_id: u8,
    /// Local component id
    component_id: u8,
    /// Next sequence number per link
    sequences: HashMap<LinkId, u8>,
    stats: WriterStats,
}

impl MavlinkWriter {
    /// Create a new writer
    ///
    /// # Arguments
    ///
    /// * `system_id` - Local MAVLink system id
    /// * `component_id` - Local MAVLink component id
    pub fn new(system_id: u8, component_id: u8) -> Self {
        Self {
            system_id,
            component_id,
            sequences: HashMap::new(),
            stats: WriterStats::default(),
        }
    }

    pub fn system_id(&self) -> u8 {
        self.system_id
    }

    /// Change the local system id used to finalize headers
    pub fn set_system_id(&mut self, system_id: u8) {
        self.system_id = system_id;
    }

    pub fn component_id(&self) -> u8 {
        self.component_id
    }

    pub fn stats(&self) -> WriterStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = WriterStats::default();
    }

    /// Next sequence number that will be used on `link`
    pub fn sequence(&self, link: LinkId) -> u8 {
        self.sequences.get(&link).copied().unwrap_or(0)
    }

    /// Forget the outbound channel state of a removed link
    pub fn remove_link(&mut self, link: LinkId) {
        self.sequences.remove(&link);
    }

    /// Local identity header for a message built by the engine itself
    ///
    /// Takes the next sequence number of the default link, which keeps
    /// application headers as they are.
    pub fn local_header(&mut self) -> MavHeader {
        let sequence = self.sequences.entry(LinkId::DEFAULT).or_insert(0);
        let header = MavHeader {
            system_id: self.system_id,
            component_id: self.component_id,
            sequence: *sequence,
        };
        *sequence = sequence.wrapping_add(1);
        header
    }

    /// Header as it will go out on `link`
    ///
    /// Does not consume a sequence number.
    pub fn finalize_header(&self, link: LinkId, header: MavHeader) -> MavHeader {
        if link.is_default() {
            return header;
        }
        MavHeader {
            system_id: self.system_id,
            component_id: self.component_id,
            sequence: self.sequence(link),
        }
    }

    /// Frame and send a message on one link
    ///
    /// # Returns
    ///
    /// - `Ok(n)` - Bytes accepted by the link; `Ok(0)` if the link is disconnected
    /// - `Err(ProtocolError::Serialization)` - The message could not be framed
    /// - `Err(ProtocolError::Transport)` - The link rejected the write
    pub fn send(&mut self, link: &dyn LinkInterface, outgoing: &OutgoingMessage) -> Result<usize> {
        let link_id = link.id();
        if !link.is_connected() {
            self.stats.skipped_disconnected += 1;
            crate::log_trace!("Skipping send on disconnected {}", link_id);
            return Ok(0);
        }

        let frame = self.frame(link_id, outgoing)?;
        if !link_id.is_default() {
            let sequence = self.sequences.entry(link_id).or_insert(0);
            *sequence = sequence.wrapping_add(1);
        }

        match link.write_bytes(&frame) {
            Ok(written) => {
                self.stats.messages_sent += 1;
                Ok(written)
            }
            Err(source) => {
                self.stats.write_errors += 1;
                crate::log_warn!("Write to {} failed: {}", link.name(), source);
                Err(ProtocolError::Transport {
                    link: link_id,
                    source,
                })
            }
        }
    }

    /// Send a message on every link in `links`
    ///
    /// Disconnected links are skipped and a failing link does not stop the
    /// broadcast. Returns the outcome per link.
    pub fn send_all(
        &mut self,
        links: &[SharedLink],
        outgoing: &OutgoingMessage,
    ) -> Vec<(LinkId, Result<usize>)> {
        links
            .iter()
            .map(|link| (link.id(), self.send(link.as_ref(), outgoing)))
            .collect()
    }

    fn frame(&self, link: LinkId, outgoing: &OutgoingMessage) -> Result<Vec<u8>> {
        let header = self.finalize_header(link, outgoing.header);
        let mut buf = Cursor::new(Vec::with_capacity(MAX_FRAME_LEN));
        mavlink::write_versioned_msg(&mut buf, outgoing.version, header, &outgoing.message)
            .map_err(|e| ProtocolError::Serialization(e.to_string()))?;
        Ok(buf.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::communication::mavlink::parser::MavlinkParser;
    use crate::communication::mavlink::test_support::{heartbeat, ping};
    use crate::communication::mavlink::transport::mock::MockLink;
    use crate::communication::mavlink::transport::TransportError;
    use std::sync::Arc;

    fn decode_header(bytes: &[u8]) -> MavHeader {
        let mut parser = MavlinkParser::new();
        let decoded = parser.feed(LinkId(200), bytes).next();
        decoded.unwrap().header
    }

    #[test]
    fn test_writer_creation() {
        let writer = MavlinkWriter::new(255, 190);
        assert_eq!(writer.system_id(), 255);
        assert_eq!(writer.component_id(), 190);
        assert_eq!(writer.sequence(LinkId(1)), 0);
        assert_eq!(writer.stats(), WriterStats::default());
    }

    #[test]
    fn test_header_finalized_on_non_default_link() {
        let mut writer = MavlinkWriter::new(255, 190);
        let link = MockLink::new(1);
        let outgoing = OutgoingMessage::new(ping(1)).with_header(MavHeader {
            system_id: 42,
            component_id: 7,
            sequence: 99,
        });

        writer.send(&link, &outgoing).unwrap();
        writer.send(&link, &outgoing).unwrap();

        let written = link.written();
        assert_eq!(written.len(), 2);
        let first = decode_header(&written[0]);
        assert_eq!((first.system_id, first.component_id, first.sequence), (255, 190, 0));
        assert_eq!(decode_header(&written[1]).sequence, 1);
        assert_eq!(writer.sequence(LinkId(1)), 2);
    }

    #[test]
    fn test_default_link_keeps_header() {
        let mut writer = MavlinkWriter::new(255, 190);
        let link = MockLink::new(0);
        let header = MavHeader {
            system_id: 42,
            component_id: 7,
            sequence: 99,
        };

        writer
            .send(&link, &OutgoingMessage::new(ping(1)).with_header(header))
            .unwrap();

        assert_eq!(decode_header(&link.written()[0]), header);
        assert_eq!(writer.sequence(LinkId::DEFAULT), 0);
    }

    #[test]
    fn test_sequences_are_per_link() {
        let mut writer = MavlinkWriter::new(255, 190);
        let a = MockLink::new(1);
        let b = MockLink::new(2);
        let outgoing = OutgoingMessage::new(heartbeat(3));

        for _ in 0..3 {
            writer.send(&a, &outgoing).unwrap();
        }
        writer.send(&b, &outgoing).unwrap();

        assert_eq!(writer.sequence(LinkId(1)), 3);
        assert_eq!(decode_header(&b.written()[0]).sequence, 0);
    }

    #[test]
    fn test_sequence_wrap() {
        let mut writer = MavlinkWriter::new(255, 190);
        writer.sequences.insert(LinkId(1), 255);
        let link = MockLink::new(1);

        writer.send(&link, &OutgoingMessage::new(ping(1))).unwrap();
        assert_eq!(decode_header(&link.written()[0]).sequence, 255);
        assert_eq!(writer.sequence(LinkId(1)), 0);
    }

    #[test]
    fn test_disconnected_link_is_noop() {
        let mut writer = MavlinkWriter::new(255, 190);
        let link = MockLink::new(1);
        link.set_connected(false);

        let written = writer.send(&link, &OutgoingMessage::new(ping(1))).unwrap();
        assert_eq!(written, 0);
        assert!(link.written().is_empty());
        assert_eq!(writer.sequence(LinkId(1)), 0);
        assert_eq!(writer.stats().skipped_disconnected, 1);
    }

    #[test]
    fn test_write_error_is_reported() {
        let mut writer = MavlinkWriter::new(255, 190);
        let link = MockLink::new(3);
        link.set_write_error(TransportError::IoError);

        let result = writer.send(&link, &OutgoingMessage::new(ping(1)));
        assert!(matches!(
            result,
            Err(ProtocolError::Transport {
                link: LinkId(3),
                source: TransportError::IoError
            })
        ));
        assert_eq!(writer.stats().write_errors, 1);
    }

    #[test]
    fn test_send_all_skips_disconnected() {
        let mut writer = MavlinkWriter::new(255, 190);
        let up = Arc::new(MockLink::new(1));
        let down = Arc::new(MockLink::new(2));
        down.set_connected(false);
        let links: Vec<SharedLink> = vec![up.clone(), down.clone()];

        let outcomes = writer.send_all(&links, &OutgoingMessage::new(heartbeat(3)));

        assert_eq!(up.written().len(), 1);
        assert!(down.written().is_empty());
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].0, LinkId(1));
        assert_eq!(*outcomes[0].1.as_ref().unwrap(), up.written()[0].len());
        assert_eq!(*outcomes[1].1.as_ref().unwrap(), 0);
    }

    #[test]
    fn test_v1_framing() {
        let mut writer = MavlinkWriter::new(255, 190);
        let link = MockLink::new(1);
        writer
            .send(
                &link,
                &OutgoingMessage::new(heartbeat(3)).with_version(MavlinkVersion::V1),
            )
            .unwrap();
        assert_eq!(link.written()[0][0], 0xFE);
    }

    #[test]
    fn test_local_header_advances_default_sequence() {
        let mut writer = MavlinkWriter::new(255, 190);
        let link = MockLink::new(0);

        for _ in 0..3 {
            let header = writer.local_header();
            writer
                .send(&link, &OutgoingMessage::new(heartbeat(3)).with_header(header))
                .unwrap();
        }

        let sequences: Vec<u8> = link
            .written()
            .iter()
            .map(|frame| decode_header(frame).sequence)
            .collect();
        assert_eq!(sequences, vec![0, 1, 2]);
        assert_eq!(decode_header(&link.written()[0]).system_id, 255);
        assert_eq!(writer.sequence(LinkId::DEFAULT), 3);
    }

    #[test]
    fn test_remove_link_resets_sequence() {
        let mut writer = MavlinkWriter::new(255, 190);
        let link = MockLink::new(1);
        writer.send(&link, &OutgoingMessage::new(ping(1))).unwrap();
        writer.remove_link(LinkId(1));
        assert_eq!(writer.sequence(LinkId(1)), 0);
    }
}
