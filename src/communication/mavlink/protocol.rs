//! MAVLink Protocol Engine
//!
//! `MavlinkProtocol` ties the pipeline stages together and is the only type most
//! hosts touch.
//!
//! # Receive Path
//!
//! ```text
//! receive_bytes(link, bytes)
//!   └─ receive lock ─────────────────────────────────────────────┐
//!      parser.feed ─► log sink ─► admission ─► dispatcher ─► bus │
//!   ─────────────────────────────────────────────────────────────┘
//! ```
//!
//! One chunk is processed entirely under the receive lock, so the sequence
//! table sees a total order of updates across links. Nothing on this path
//! blocks or returns an error to the transport; failures become status events.
//!
//! # Send Path
//!
//! Outbound framing has its own lock and is shared with the heartbeat task.
//!
//! # Lock Order
//!
//! receive → log sink → settings. The outbound locks are never held while
//! taking any of these.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use mavlink::MavHeader;
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;

use super::admission::{AdmissionBridge, AdmissionContext};
use super::dispatcher::MessageDispatcher;
use super::heartbeat::{gcs_heartbeat, HeartbeatConfig, HeartbeatScheduler, HeartbeatSink};
use super::parser::{DecodedMessage, MavlinkParser, ParserStats};
use super::status_notifier::{ProtocolEvent, StatusNotifier};
use super::tlog::{default_log_path, TelemetryLog};
use super::transport::{LinkId, LinkInterface, SharedLink};
use super::transport_router::{LinkRouter, TransportStats};
use super::vehicle::VehicleRegistry;
use super::writer::{MavlinkWriter, OutgoingMessage, WriterStats};
use super::GCS_COMPONENT_ID;
use crate::core::clock::ReceiveClock;
use crate::error::Result;
use crate::parameters::mavlink::{validate_heartbeat_rate, validate_system_id, GROUP};
use crate::parameters::{ParameterStore, ProtocolParams};

/// Human-readable protocol name
pub const PROTOCOL_NAME: &str = "MAVLink protocol";

/// State mutated by the receive path
#[derive(Default)]
struct ReceivePipeline {
    parser: MavlinkParser,
    admission: AdmissionBridge,
    dispatcher: MessageDispatcher,
}

/// Outbound half of the engine, shared with the heartbeat task
struct Outbound {
    writer: Mutex<MavlinkWriter>,
    links: RwLock<LinkRouter>,
    heartbeats_enabled: AtomicBool,
}

impl Outbound {
    fn send(&self, link: &dyn LinkInterface, outgoing: &OutgoingMessage) -> Result<usize> {
        let result = self.writer.lock().send(link, outgoing);
        self.record(link.id(), &result);
        result
    }

    fn send_all(&self, outgoing: &OutgoingMessage) -> usize {
        let links = self.links.read().links();
        let outcomes = self.writer.lock().send_all(&links, outgoing);
        outcomes
            .iter()
            .map(|(link, result)| {
                self.record(*link, result);
                result.as_ref().copied().unwrap_or(0)
            })
            .sum()
    }

    fn record(&self, link: LinkId, result: &Result<usize>) {
        let mut links = self.links.write();
        match result {
            Ok(written) => links.record_sent(link, *written),
            Err(_) => links.record_send_error(link),
        }
    }

    fn local_header(&self) -> MavHeader {
        self.writer.lock().local_header()
    }
}

impl HeartbeatSink for Outbound {
    fn send_heartbeat(&self) {
        if !self.heartbeats_enabled.load(Ordering::Acquire) {
            return;
        }
        let outgoing = OutgoingMessage::new(gcs_heartbeat()).with_header(self.local_header());
        let written = self.send_all(&outgoing);
        crate::log_trace!("Heartbeat sent ({} bytes)", written);
    }
}

/// MAVLink protocol engine
pub struct MavlinkProtocol {
    registry: Arc<dyn VehicleRegistry>,
    receive: Mutex<ReceivePipeline>,
    log: Mutex<TelemetryLog>,
    params: RwLock<ProtocolParams>,
    settings_path: Option<PathBuf>,
    notifier: StatusNotifier,
    outbound: Arc<Outbound>,
    heartbeat: Option<HeartbeatScheduler>,
    clock: ReceiveClock,
}

impl MavlinkProtocol {
    /// Create the engine, loading settings from `settings_path`
    ///
    /// Without a settings path the defaults are used and nothing is persisted.
    /// The heartbeat task is spawned on the current tokio runtime; outside a
    /// runtime, periodic heartbeats are unavailable.
    pub fn new(settings_path: Option<PathBuf>, registry: Arc<dyn VehicleRegistry>) -> Self {
        Self::with_notifier(settings_path, registry, StatusNotifier::new())
    }

    /// Create the engine with an event bus the caller already subscribed to
    pub fn with_notifier(
        settings_path: Option<PathBuf>,
        registry: Arc<dyn VehicleRegistry>,
        notifier: StatusNotifier,
    ) -> Self {
        let params = settings_path
            .as_deref()
            .map(load_params)
            .unwrap_or_default();

        let outbound = Arc::new(Outbound {
            writer: Mutex::new(MavlinkWriter::new(params.system_id, GCS_COMPONENT_ID)),
            links: RwLock::new(LinkRouter::new()),
            heartbeats_enabled: AtomicBool::new(params.heartbeats_enabled),
        });

        let heartbeat_config = HeartbeatConfig {
            enabled: params.heartbeats_enabled,
            rate_hz: params.heartbeat_rate_hz,
        };
        let heartbeat = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => Some(HeartbeatScheduler::spawn_on(
                &runtime,
                outbound.clone(),
                heartbeat_config,
            )),
            Err(_) => {
                crate::log_warn!("No tokio runtime, periodic heartbeats disabled");
                None
            }
        };

        let logging_enabled = params.logging_enabled;
        let version_check_enabled = params.version_check_enabled;
        let protocol = Self {
            registry,
            receive: Mutex::new(ReceivePipeline::default()),
            log: Mutex::new(TelemetryLog::new()),
            params: RwLock::new(ProtocolParams {
                logging_enabled: false,
                ..params
            }),
            settings_path,
            notifier,
            outbound,
            heartbeat,
            clock: ReceiveClock::new(),
        };

        if logging_enabled {
            protocol.enable_logging(true);
        }
        protocol
            .notifier
            .emit(ProtocolEvent::VersionCheckChanged(version_check_enabled));
        crate::log_info!(
            "{} started (system id {}, component id {})",
            PROTOCOL_NAME,
            protocol.system_id(),
            GCS_COMPONENT_ID
        );
        protocol
    }

    pub fn name(&self) -> &'static str {
        PROTOCOL_NAME
    }

    /// Subscribe to protocol events
    pub fn subscribe(&self) -> broadcast::Receiver<ProtocolEvent> {
        self.notifier.subscribe()
    }

    pub fn notifier(&self) -> &StatusNotifier {
        &self.notifier
    }

    // ---- receive path ----

    /// Process bytes that arrived on `link`
    pub fn receive_bytes(&self, link: &SharedLink, bytes: &[u8]) {
        let link_id = link.id();
        let mut pipeline = self.receive.lock();
        self.outbound.links.write().record_received(link_id, bytes.len());

        let ctx = {
            let params = self.params.read();
            AdmissionContext {
                local_system_id: params.system_id,
                version_check_enabled: params.version_check_enabled,
            }
        };

        let ReceivePipeline {
            parser,
            admission,
            dispatcher,
        } = &mut *pipeline;

        for message in parser.feed(link_id, bytes) {
            self.log_frame(&message);

            let admitted =
                admission.resolve_or_create(self.registry.as_ref(), link, &message, ctx, &self.notifier);
            if let Some(vehicle) = admitted.handle() {
                dispatcher.dispatch(link_id, vehicle, message, &self.notifier);
            }
        }
    }

    fn log_frame(&self, message: &DecodedMessage) {
        let mut log = self.log.lock();
        let Err(e) = log.record(message.raw_frame(), self.clock.now_us()) else {
            return;
        };

        crate::log_error!("Packet log write failed: {}", e);
        self.notifier.send_error(
            "MAVLink Logging failed",
            &format!(
                "Could not write to file {}, disabling logging.",
                self.log_file_path().display()
            ),
        );
        self.apply_logging(&mut log, false);
    }

    // ---- send path ----

    /// Send a message on one link
    ///
    /// Returns the bytes written; `Ok(0)` if the link is disconnected.
    pub fn send_message(&self, link: &dyn LinkInterface, outgoing: &OutgoingMessage) -> Result<usize> {
        self.outbound.send(link, outgoing)
    }

    /// Send a message on every connected link associated with the protocol
    pub fn send_message_all(&self, outgoing: &OutgoingMessage) -> usize {
        self.outbound.send_all(outgoing)
    }

    /// Send one heartbeat now, if heartbeats are enabled
    ///
    /// Out of band; the periodic schedule is not affected.
    pub fn send_heartbeat(&self) {
        self.outbound.send_heartbeat();
    }

    // ---- links ----

    /// Associate a link with the protocol
    pub fn add_link(&self, link: SharedLink) {
        self.outbound.links.write().add_link(link);
    }

    /// Drop a link with its decoder state and outbound sequence
    pub fn remove_link(&self, id: LinkId) -> Option<SharedLink> {
        self.receive.lock().parser.remove_link(id);
        self.outbound.writer.lock().remove_link(id);
        self.outbound.links.write().remove_link(id)
    }

    pub fn links(&self) -> Vec<SharedLink> {
        self.outbound.links.read().links()
    }

    pub fn link_stats(&self, id: LinkId) -> Option<TransportStats> {
        self.outbound.links.read().stats(id)
    }

    /// Transport statistics summed over all links
    pub fn total_link_stats(&self) -> TransportStats {
        self.outbound.links.read().total_stats()
    }

    pub fn writer_stats(&self) -> WriterStats {
        self.outbound.writer.lock().stats()
    }

    /// Zero the transport and outbound statistics
    pub fn reset_link_stats(&self) {
        self.outbound.links.write().reset_stats();
        self.outbound.writer.lock().reset_stats();
    }

    pub fn parser_stats(&self, id: LinkId) -> Option<ParserStats> {
        self.receive.lock().parser.stats(id)
    }

    // ---- counters ----

    /// Messages accounted for since startup
    pub fn total_received(&self) -> u64 {
        self.receive.lock().dispatcher.counters().total_received
    }

    /// Messages detected as lost since startup
    pub fn total_lost(&self) -> u64 {
        self.receive.lock().dispatcher.counters().total_lost
    }

    /// Whether the protocol version mismatch warning has been raised
    pub fn version_mismatch_warned(&self) -> bool {
        self.receive.lock().admission.version_gate().mismatch_warned()
    }

    // ---- settings ----

    pub fn system_id(&self) -> u8 {
        self.params.read().system_id
    }

    /// Change the local system id (1-255)
    pub fn set_system_id(&self, system_id: u8) -> Result<()> {
        let system_id = validate_system_id(system_id)?;
        self.params.write().system_id = system_id;
        self.outbound.writer.lock().set_system_id(system_id);
        Ok(())
    }

    pub fn component_id(&self) -> u8 {
        GCS_COMPONENT_ID
    }

    pub fn heartbeat_rate(&self) -> u32 {
        self.params.read().heartbeat_rate_hz
    }

    /// Change the heartbeat rate in Hz (> 0)
    ///
    /// The next heartbeat is one new period from now.
    pub fn set_heartbeat_rate(&self, rate_hz: u32) -> Result<()> {
        let rate_hz = validate_heartbeat_rate(rate_hz)?;
        self.params.write().heartbeat_rate_hz = rate_hz;
        if let Some(heartbeat) = &self.heartbeat {
            heartbeat.set_rate(rate_hz);
        }
        Ok(())
    }

    pub fn heartbeats_enabled(&self) -> bool {
        self.params.read().heartbeats_enabled
    }

    pub fn enable_heartbeats(&self, enabled: bool) {
        self.params.write().heartbeats_enabled = enabled;
        self.outbound
            .heartbeats_enabled
            .store(enabled, Ordering::Release);
        if let Some(heartbeat) = &self.heartbeat {
            heartbeat.set_enabled(enabled);
        }
        self.notifier.emit(ProtocolEvent::HeartbeatChanged(enabled));
    }

    pub fn version_check_enabled(&self) -> bool {
        self.params.read().version_check_enabled
    }

    pub fn enable_version_check(&self, enabled: bool) {
        self.params.write().version_check_enabled = enabled;
        self.notifier.emit(ProtocolEvent::VersionCheckChanged(enabled));
    }

    pub fn logging_enabled(&self) -> bool {
        self.params.read().logging_enabled
    }

    /// Turn the packet log on or off
    ///
    /// Enabling (re)opens the log file in append mode. If it cannot be opened
    /// logging stays off and an error status is raised.
    pub fn enable_logging(&self, enabled: bool) {
        let mut log = self.log.lock();
        self.apply_logging(&mut log, enabled);
    }

    /// Configured packet log path, or the default location
    pub fn log_file_path(&self) -> PathBuf {
        self.params
            .read()
            .log_file
            .clone()
            .unwrap_or_else(default_log_path)
    }

    /// Change the packet log path
    ///
    /// The current file is closed; if logging is enabled the new file is opened.
    /// The old file is left as it is.
    pub fn set_log_file_path(&self, path: impl Into<PathBuf>) {
        let mut log = self.log.lock();
        log.close();
        let enabled = {
            let mut params = self.params.write();
            params.log_file = Some(path.into());
            params.logging_enabled
        };
        self.apply_logging(&mut log, enabled);
    }

    // Caller holds the log lock
    fn apply_logging(&self, log: &mut TelemetryLog, enabled: bool) {
        let was_enabled = self.params.read().logging_enabled;

        let now_enabled = if enabled {
            let path = self.log_file_path();
            match log.open(&path) {
                Ok(()) => true,
                Err(e) => {
                    crate::log_error!("{}", e);
                    self.notifier.send_error(
                        "Opening MAVLink logfile for writing failed",
                        &format!(
                            "MAVLink cannot log to the file {}, please choose a different file. \
                             Stopping logging.",
                            path.display()
                        ),
                    );
                    false
                }
            }
        } else {
            log.close();
            false
        };

        self.params.write().logging_enabled = now_enabled;
        if now_enabled != was_enabled {
            self.notifier.emit(ProtocolEvent::LoggingChanged(now_enabled));
        }
    }

    /// Snapshot of the current settings
    pub fn params(&self) -> ProtocolParams {
        self.params.read().clone()
    }

    pub fn settings_path(&self) -> Option<&Path> {
        self.settings_path.as_deref()
    }

    /// Persist the current settings
    ///
    /// Does nothing without a settings path.
    pub fn store_settings(&self) -> Result<()> {
        let Some(path) = &self.settings_path else {
            return Ok(());
        };

        let mut store = ParameterStore::load_from_file(path, GROUP).unwrap_or_else(|e| {
            crate::log_warn!("Rewriting settings group {}: {}", GROUP, e);
            ParameterStore::new(GROUP)
        });
        self.params.read().write_to(&mut store)?;
        store.save_to_file(path)
    }
}

impl Drop for MavlinkProtocol {
    fn drop(&mut self) {
        if let Some(heartbeat) = &self.heartbeat {
            heartbeat.shutdown();
        }
        if let Err(e) = self.store_settings() {
            crate::log_error!("Storing settings failed: {}", e);
        }
    }
}

fn load_params(path: &Path) -> ProtocolParams {
    match ParameterStore::load_from_file(path, GROUP) {
        Ok(store) => ProtocolParams::from_store(&store),
        Err(e) => {
            crate::log_warn!("Using default settings: {}", e);
            ProtocolParams::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::communication::mavlink::test_support::{encode, heartbeat, ping};
    use crate::communication::mavlink::transport::mock::MockLink;
    use crate::communication::mavlink::vehicle::InMemoryVehicleRegistry;
    use crate::core::logging::init_test_logging;
    use tempfile::tempdir;
    use tokio::sync::broadcast::error::TryRecvError;

    fn protocol() -> (Arc<InMemoryVehicleRegistry>, MavlinkProtocol) {
        init_test_logging();
        let registry = Arc::new(InMemoryVehicleRegistry::new());
        let protocol = MavlinkProtocol::new(None, registry.clone());
        (registry, protocol)
    }

    fn drain(rx: &mut broadcast::Receiver<ProtocolEvent>) -> Vec<ProtocolEvent> {
        let mut events = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return events,
                Err(TryRecvError::Lagged(_)) => continue,
            }
        }
    }

    #[test]
    fn test_defaults() {
        let (_, protocol) = protocol();
        assert_eq!(protocol.name(), "MAVLink protocol");
        assert_eq!(protocol.system_id(), 255);
        assert_eq!(protocol.component_id(), GCS_COMPONENT_ID);
        assert_eq!(protocol.heartbeat_rate(), 1);
        assert!(!protocol.heartbeats_enabled());
        assert!(!protocol.logging_enabled());
        assert!(protocol.version_check_enabled());
        assert_eq!(protocol.log_file_path(), default_log_path());
    }

    #[test]
    fn test_construction_announces_version_check() {
        let notifier = StatusNotifier::new();
        let mut rx = notifier.subscribe();
        let _protocol = MavlinkProtocol::with_notifier(
            None,
            Arc::new(InMemoryVehicleRegistry::new()),
            notifier,
        );
        assert!(matches!(
            rx.try_recv(),
            Ok(ProtocolEvent::VersionCheckChanged(true))
        ));
    }

    #[test]
    fn test_receive_creates_then_dispatches() {
        let (registry, protocol) = protocol();
        let mut rx = protocol.subscribe();
        let link: SharedLink = Arc::new(MockLink::new(1));

        let mut bytes = encode(7, 1, 0, &heartbeat(3));
        bytes.extend(encode(7, 1, 1, &ping(1)));
        protocol.receive_bytes(&link, &bytes);

        assert_eq!(registry.list(), vec![7]);
        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert!(events
            .iter()
            .all(|e| matches!(e, ProtocolEvent::MessageReceived { link, .. } if *link == LinkId(1))));
        assert_eq!(protocol.total_received(), 2);
        assert_eq!(protocol.total_lost(), 0);
        assert_eq!(
            protocol.link_stats(LinkId(1)).unwrap().bytes_received,
            bytes.len() as u64
        );
    }

    #[test]
    fn test_unknown_sender_is_not_counted() {
        let (registry, protocol) = protocol();
        let link: SharedLink = Arc::new(MockLink::new(1));

        protocol.receive_bytes(&link, &encode(7, 1, 0, &ping(1)));

        assert!(registry.is_empty());
        assert_eq!(protocol.total_received(), 0);
        assert_eq!(protocol.parser_stats(LinkId(1)).unwrap().messages_received, 1);
    }

    #[test]
    fn test_heartbeats_on_default_link_advance_sequence() {
        let (_, protocol) = protocol();
        let link = Arc::new(MockLink::new(0));
        protocol.add_link(link.clone());
        protocol.enable_heartbeats(true);

        for _ in 0..3 {
            protocol.send_heartbeat();
        }

        let mut parser = MavlinkParser::new();
        let mut tracker = crate::communication::mavlink::sequence::SequenceTracker::new();
        let mut sequences = Vec::new();
        for frame in link.written() {
            let header = parser.feed(LinkId(9), &frame).next().unwrap().header;
            tracker.observe(header.system_id, header.component_id, header.sequence);
            sequences.push(header.sequence);
        }
        assert_eq!(sequences, vec![0, 1, 2]);
        assert_eq!(tracker.counters().total_lost, 0);
    }

    #[test]
    fn test_link_stats_totals_and_reset() {
        let (_, protocol) = protocol();
        let a: SharedLink = Arc::new(MockLink::new(1));
        let b: SharedLink = Arc::new(MockLink::new(2));
        protocol.add_link(a.clone());
        protocol.add_link(b.clone());

        let hb = encode(7, 1, 0, &heartbeat(3));
        protocol.receive_bytes(&a, &hb);
        protocol.receive_bytes(&b, &hb);
        let sent = protocol.send_message_all(&OutgoingMessage::new(ping(1)));

        let total = protocol.total_link_stats();
        assert_eq!(total.bytes_received, 2 * hb.len() as u64);
        assert_eq!(total.bytes_sent, sent as u64);
        assert_eq!(protocol.writer_stats().messages_sent, 2);

        protocol.reset_link_stats();
        assert_eq!(protocol.total_link_stats(), TransportStats::default());
        assert_eq!(protocol.writer_stats().messages_sent, 0);
    }

    struct ShortWriter;

    impl std::io::Write for ShortWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            Ok(buf.len() / 2)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_short_log_write_disables_logging_and_keeps_dispatching() {
        let (registry, protocol) = protocol();
        let dir = tempdir().unwrap();
        protocol.set_log_file_path(dir.path().join("short.mavlink"));
        protocol.enable_logging(true);
        assert!(protocol.logging_enabled());
        protocol.log.lock().open_sink(Box::new(ShortWriter));

        let mut rx = protocol.subscribe();
        let link: SharedLink = Arc::new(MockLink::new(1));
        protocol.receive_bytes(&link, &encode(7, 1, 0, &heartbeat(3)));

        assert!(!protocol.logging_enabled());
        assert_eq!(registry.list(), vec![7]);
        let events = drain(&mut rx);
        assert_eq!(events.len(), 3);
        assert!(matches!(
            &events[0],
            ProtocolEvent::Status { severity: mavlink::common::MavSeverity::MAV_SEVERITY_ERROR, title, .. }
                if title == "MAVLink Logging failed"
        ));
        assert!(matches!(events[1], ProtocolEvent::LoggingChanged(false)));
        assert!(matches!(
            events[2],
            ProtocolEvent::MessageReceived { link: LinkId(1), .. }
        ));
        assert_eq!(protocol.total_received(), 1);
    }

    #[test]
    fn test_setters_validate() {
        let (_, protocol) = protocol();
        assert!(protocol.set_system_id(0).is_err());
        assert!(protocol.set_heartbeat_rate(0).is_err());

        protocol.set_system_id(42).unwrap();
        protocol.set_heartbeat_rate(5).unwrap();
        assert_eq!(protocol.system_id(), 42);
        assert_eq!(protocol.heartbeat_rate(), 5);
    }

    #[test]
    fn test_toggle_events() {
        let (_, protocol) = protocol();
        let mut rx = protocol.subscribe();

        protocol.enable_heartbeats(false);
        protocol.enable_version_check(true);
        protocol.enable_logging(false);

        let events = drain(&mut rx);
        assert!(matches!(events[0], ProtocolEvent::HeartbeatChanged(false)));
        assert!(matches!(events[1], ProtocolEvent::VersionCheckChanged(true)));
        // Logging was already off
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_enable_logging_open_failure() {
        let (_, protocol) = protocol();
        let dir = tempdir().unwrap();
        protocol.set_log_file_path(dir.path().join("missing").join("log.mavlink"));
        let mut rx = protocol.subscribe();

        protocol.enable_logging(true);

        assert!(!protocol.logging_enabled());
        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        match &events[0] {
            ProtocolEvent::Status { title, .. } => {
                assert_eq!(title, "Opening MAVLink logfile for writing failed")
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_logging_records_frames() {
        let (_, protocol) = protocol();
        let dir = tempdir().unwrap();
        let path = dir.path().join("packets.mavlink");
        protocol.set_log_file_path(&path);
        protocol.enable_logging(true);
        assert!(protocol.logging_enabled());

        let link: SharedLink = Arc::new(MockLink::new(1));
        let frame = encode(7, 1, 0, &ping(1));
        // Logged even though the sender is unknown
        protocol.receive_bytes(&link, &frame);
        protocol.enable_logging(false);

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 8 + frame.len());
        assert_eq!(&bytes[8..], &frame[..]);
    }

    #[test]
    fn test_send_message_all_uses_local_identity() {
        let (_, protocol) = protocol();
        let a = Arc::new(MockLink::new(1));
        let b = Arc::new(MockLink::new(2));
        b.set_connected(false);
        protocol.add_link(a.clone());
        protocol.add_link(b.clone());

        let written = protocol.send_message_all(&OutgoingMessage::new(ping(1)));

        assert_eq!(a.written().len(), 1);
        assert_eq!(written, a.written()[0].len());
        assert!(b.written().is_empty());

        let mut parser = MavlinkParser::new();
        let decoded = parser.feed(LinkId(9), &a.written()[0]).next().unwrap();
        assert_eq!(decoded.system_id(), 255);
        assert_eq!(decoded.component_id(), GCS_COMPONENT_ID);
        assert_eq!(protocol.link_stats(LinkId(1)).unwrap().bytes_sent, written as u64);
    }

    #[test]
    fn test_manual_heartbeat_requires_enabled() {
        let (_, protocol) = protocol();
        let link = Arc::new(MockLink::new(1));
        protocol.add_link(link.clone());

        protocol.send_heartbeat();
        assert!(link.written().is_empty());

        protocol.enable_heartbeats(true);
        protocol.send_heartbeat();
        assert_eq!(link.written().len(), 1);
    }

    #[test]
    fn test_remove_link_resets_outbound_sequence() {
        let (_, protocol) = protocol();
        let link = Arc::new(MockLink::new(1));
        protocol.add_link(link.clone());
        protocol.send_message_all(&OutgoingMessage::new(ping(1)));

        assert!(protocol.remove_link(LinkId(1)).is_some());
        assert!(protocol.links().is_empty());
        assert!(protocol.link_stats(LinkId(1)).is_none());

        protocol.send_message(link.as_ref(), &OutgoingMessage::new(ping(2))).unwrap();
        let mut parser = MavlinkParser::new();
        let decoded = parser.feed(LinkId(9), &link.written()[1]).next().unwrap();
        assert_eq!(decoded.sequence(), 0);
    }

    #[test]
    fn test_settings_persist_across_instances() {
        init_test_logging();
        let dir = tempdir().unwrap();
        let settings = dir.path().join("settings.json");
        let log_path = dir.path().join("packets.mavlink");

        {
            let protocol = MavlinkProtocol::new(
                Some(settings.clone()),
                Arc::new(InMemoryVehicleRegistry::new()),
            );
            protocol.set_system_id(100).unwrap();
            protocol.set_heartbeat_rate(2).unwrap();
            protocol.enable_version_check(false);
            protocol.set_log_file_path(&log_path);
            protocol.enable_logging(true);
        }

        let protocol =
            MavlinkProtocol::new(Some(settings), Arc::new(InMemoryVehicleRegistry::new()));
        assert_eq!(protocol.system_id(), 100);
        assert_eq!(protocol.heartbeat_rate(), 2);
        assert!(!protocol.version_check_enabled());
        assert!(protocol.logging_enabled());
        assert_eq!(protocol.log_file_path(), log_path);
    }

    #[test]
    fn test_corrupt_settings_use_defaults() {
        init_test_logging();
        let dir = tempdir().unwrap();
        let settings = dir.path().join("settings.json");
        std::fs::write(&settings, "{ broken").unwrap();

        let protocol = MavlinkProtocol::new(
            Some(settings.clone()),
            Arc::new(InMemoryVehicleRegistry::new()),
        );
        assert_eq!(protocol.params(), ProtocolParams::default());

        protocol.store_settings().unwrap();
        let store = ParameterStore::load_from_file(&settings, GROUP).unwrap();
        assert_eq!(ProtocolParams::from_store(&store), ProtocolParams::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_heartbeat_reaches_links() {
        init_test_logging();
        let protocol = MavlinkProtocol::new(None, Arc::new(InMemoryVehicleRegistry::new()));
        let link = Arc::new(MockLink::new(1));
        protocol.add_link(link.clone());

        protocol.set_heartbeat_rate(2).unwrap();
        protocol.enable_heartbeats(true);
        tokio::time::sleep(std::time::Duration::from_millis(1200)).await;

        let written = link.written();
        assert_eq!(written.len(), 2);
        let mut parser = MavlinkParser::new();
        let decoded = parser.feed(LinkId(9), &written[1]).next().unwrap();
        assert!(decoded.is_heartbeat());
        assert_eq!(decoded.sequence(), 1);
    }
}
