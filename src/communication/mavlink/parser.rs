//! MAVLink Frame Decoder
//!
//! Incremental byte-to-message parsing for any number of links.
//!
//! # Architecture
//!
//! - One [`LinkParser`] state machine per link id, so bytes arriving
//!   interleaved from different links never corrupt each other's partial frames
//! - Accepts MAVLink v1 (`0xFE`) and v2 (`0xFD`) frames
//! - Validates the X.25 checksum (CRC-16/MCRF4XX) seeded with the message's
//!   CRC_EXTRA byte, then decodes the payload with rust-mavlink's `common` dialect
//! - Garbage, truncated and corrupted frames are absorbed silently: the state
//!   machine drops back to idle and waits for the next start marker
//!
//! # Buffer Management
//!
//! - Frame buffer: 280 bytes (heapless::Vec), the largest possible v2 frame
//!   including a 13-byte signature

use std::collections::HashMap;

use crc::{Crc, CRC_16_MCRF4XX};
use heapless::Vec;
use mavlink::common::{MavMessage, HEARTBEAT_DATA};
use mavlink::{MavHeader, MavlinkVersion, Message};

use super::transport::LinkId;

/// MAVLink v1 start marker
pub const MAVLINK_STX_V1: u8 = 0xFE;
/// MAVLink v2 start marker
pub const MAVLINK_STX_V2: u8 = 0xFD;

/// Header length including the start marker
const V1_HEADER_LEN: usize = 6;
const V2_HEADER_LEN: usize = 10;
const CHECKSUM_LEN: usize = 2;
const SIGNATURE_LEN: usize = 13;

/// Maximum payload length
pub const MAX_PAYLOAD_LEN: usize = 255;

/// Maximum size of a complete frame (v2 header + payload + checksum + signature)
pub const MAX_FRAME_LEN: usize = V2_HEADER_LEN + MAX_PAYLOAD_LEN + CHECKSUM_LEN + SIGNATURE_LEN;

/// v2 incompatibility flag: frame is signed
const IFLAG_SIGNED: u8 = 0x01;

/// MAVLink frame checksum (X.25)
const X25: Crc<u16> = Crc::<u16>::new(&CRC_16_MCRF4XX);

/// Compute the frame checksum over `bytes` (everything after the start marker
/// up to the end of the payload) seeded with `crc_extra`
pub fn frame_checksum(bytes: &[u8], crc_extra: u8) -> u16 {
    let mut digest = X25.digest();
    digest.update(bytes);
    digest.update(&[crc_extra]);
    digest.finalize()
}

/// A checksum-validated, decoded MAVLink message
///
/// Immutable once produced. Carries the raw frame so the log sink can record
/// exactly what arrived on the wire.
#[derive(Debug, Clone)]
pub struct DecodedMessage {
    /// Sender address and sequence number
    pub header: MavHeader,
    /// Wire protocol version of the frame
    pub version: MavlinkVersion,
    /// Message id (24-bit on v2, 8-bit on v1)
    pub message_id: u32,
    /// Decoded message
    pub message: MavMessage,
    /// Payload bytes as received (v2 payloads may be zero-truncated)
    pub payload: Vec<u8, MAX_PAYLOAD_LEN>,
    /// Complete frame, start marker through checksum (and signature, if any)
    pub raw: Vec<u8, MAX_FRAME_LEN>,
}

impl DecodedMessage {
    pub fn system_id(&self) -> u8 {
        self.header.system_id
    }

    pub fn component_id(&self) -> u8 {
        self.header.component_id
    }

    pub fn sequence(&self) -> u8 {
        self.header.sequence
    }

    /// Heartbeat fields, if this is a HEARTBEAT message
    pub fn heartbeat(&self) -> Option<&HEARTBEAT_DATA> {
        match &self.message {
            MavMessage::HEARTBEAT(data) => Some(data),
            _ => None,
        }
    }

    pub fn is_heartbeat(&self) -> bool {
        self.heartbeat().is_some()
    }

    /// The complete frame as received
    pub fn raw_frame(&self) -> &[u8] {
        &self.raw
    }
}

/// Parser statistics for monitoring and diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParserStats {
    /// Frames that passed the checksum and decoded successfully
    pub messages_received: u32,
    /// Frames whose checksum did not match
    pub crc_errors: u32,
    /// Checksum-valid frames with a message id outside the dialect
    pub unknown_messages: u32,
    /// v2 frames carrying unsupported incompatibility flags
    pub incompatible_frames: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    /// Waiting for a start marker
    Idle,
    /// Collecting header bytes
    Header { header_len: usize },
    /// Collecting payload, checksum and optional signature
    Body { frame_len: usize },
}

/// Parsing state machine for a single link
pub struct LinkParser {
    /// Frame buffer for the partial frame
    buffer: Vec<u8, MAX_FRAME_LEN>,
    state: ParseState,
    stats: ParserStats,
}

impl LinkParser {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            state: ParseState::Idle,
            stats: ParserStats::default(),
        }
    }

    /// Get parser statistics
    pub fn stats(&self) -> ParserStats {
        self.stats
    }

    /// Whether a partial frame is buffered
    pub fn in_frame(&self) -> bool {
        self.state != ParseState::Idle
    }

    /// Process a single byte
    ///
    /// Returns `Some(message)` when this byte completes a valid frame, `None`
    /// while more bytes are needed or when the byte was absorbed as noise.
    pub fn push_byte(&mut self, byte: u8) -> Option<DecodedMessage> {
        match self.state {
            ParseState::Idle => {
                self.start_frame(byte);
                None
            }
            ParseState::Header { header_len } => {
                // Cannot overflow: header_len < MAX_FRAME_LEN
                let _ = self.buffer.push(byte);
                if self.buffer.len() == header_len {
                    self.header_complete(header_len);
                }
                None
            }
            ParseState::Body { frame_len } => {
                let _ = self.buffer.push(byte);
                if self.buffer.len() == frame_len {
                    let result = self.finish_frame();
                    self.reset();
                    if result.is_none() && is_start_marker(byte) {
                        self.start_frame(byte);
                    }
                    return result;
                }
                None
            }
        }
    }

    fn start_frame(&mut self, byte: u8) {
        let header_len = match byte {
            MAVLINK_STX_V2 => V2_HEADER_LEN,
            MAVLINK_STX_V1 => V1_HEADER_LEN,
            _ => return,
        };
        self.buffer.clear();
        let _ = self.buffer.push(byte);
        self.state = ParseState::Header { header_len };
    }

    fn header_complete(&mut self, header_len: usize) {
        let payload_len = self.buffer[1] as usize;
        let mut frame_len = header_len + payload_len + CHECKSUM_LEN;

        if header_len == V2_HEADER_LEN {
            let incompat_flags = self.buffer[2];
            if incompat_flags & !IFLAG_SIGNED != 0 {
                self.stats.incompatible_frames += 1;
                crate::log_trace!("Dropping frame with incompat flags 0x{:02X}", incompat_flags);
                self.reset();
                return;
            }
            if incompat_flags & IFLAG_SIGNED != 0 {
                frame_len += SIGNATURE_LEN;
            }
        }

        self.state = ParseState::Body { frame_len };
    }

    /// Validate and decode the buffered frame
    fn finish_frame(&mut self) -> Option<DecodedMessage> {
        let frame = &self.buffer;
        let (version, header_len, header, message_id) = if frame[0] == MAVLINK_STX_V2 {
            let message_id = u32::from(frame[7]) | u32::from(frame[8]) << 8 | u32::from(frame[9]) << 16;
            let header = MavHeader {
                sequence: frame[4],
                system_id: frame[5],
                component_id: frame[6],
            };
            (MavlinkVersion::V2, V2_HEADER_LEN, header, message_id)
        } else {
            let header = MavHeader {
                sequence: frame[2],
                system_id: frame[3],
                component_id: frame[4],
            };
            (MavlinkVersion::V1, V1_HEADER_LEN, header, u32::from(frame[5]))
        };

        let payload_end = header_len + frame[1] as usize;
        let received_crc = u16::from_le_bytes([frame[payload_end], frame[payload_end + 1]]);
        let crc_extra = MavMessage::extra_crc(message_id);
        if frame_checksum(&frame[1..payload_end], crc_extra) != received_crc {
            self.stats.crc_errors += 1;
            crate::log_trace!("Checksum mismatch on message id {}", message_id);
            return None;
        }

        let payload_bytes = &frame[header_len..payload_end];
        let message = match MavMessage::parse(version, message_id, payload_bytes) {
            Ok(message) => message,
            Err(_) => {
                self.stats.unknown_messages += 1;
                crate::log_trace!("Unknown message id {}", message_id);
                return None;
            }
        };

        let mut payload = Vec::new();
        // payload_bytes.len() <= MAX_PAYLOAD_LEN by construction
        let _ = payload.extend_from_slice(payload_bytes);

        self.stats.messages_received += 1;
        Some(DecodedMessage {
            header,
            version,
            message_id,
            message,
            payload,
            raw: frame.clone(),
        })
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.state = ParseState::Idle;
    }
}

impl Default for LinkParser {
    fn default() -> Self {
        Self::new()
    }
}

fn is_start_marker(byte: u8) -> bool {
    byte == MAVLINK_STX_V1 || byte == MAVLINK_STX_V2
}

/// Multi-link MAVLink frame decoder
///
/// Owns one [`LinkParser`] per link id. Parser state is created on the first
/// bytes from a link and destroyed by [`remove_link`](Self::remove_link).
#[derive(Default)]
pub struct MavlinkParser {
    links: HashMap<LinkId, LinkParser>,
}

impl MavlinkParser {
    /// Create a new MAVLink parser
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes received on `link`
    ///
    /// Returns a lazy iterator over the messages completed by these bytes, in
    /// arrival order. Bytes not consumed because the iterator was dropped early
    /// are simply not parsed; a partial frame at the end of `bytes` is kept and
    /// completed by the next call for the same link.
    pub fn feed<'a>(
        &'a mut self,
        link: LinkId,
        bytes: &'a [u8],
    ) -> impl Iterator<Item = DecodedMessage> + 'a {
        let parser = self.links.entry(link).or_default();
        bytes.iter().filter_map(move |&byte| parser.push_byte(byte))
    }

    /// Destroy the parser state of a removed link
    pub fn remove_link(&mut self, link: LinkId) {
        self.links.remove(&link);
    }

    /// Get parser statistics for a link
    pub fn stats(&self, link: LinkId) -> Option<ParserStats> {
        self.links.get(&link).map(LinkParser::stats)
    }

    /// Number of links with parser state
    pub fn link_count(&self) -> usize {
        self.links.len()
    }
}
