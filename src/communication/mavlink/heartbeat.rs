//! Heartbeat Scheduler
//!
//! Periodic ground-station heartbeat, run as a tokio task.
//!
//! # Task Responsibilities
//!
//! 1. **Periodic send**: while enabled, call the sink every `1 / rate` seconds
//! 2. **Rescheduling**: a rate change restarts the period from the moment of the
//!    change; elapsed time is not carried over
//! 3. **Shutdown**: the task ends when its `CancellationToken` fires or the
//!    scheduler is dropped
//!
//! Configuration reaches the task through a `watch` channel, so a toggle or rate
//! change only takes effect at the task's next wake-up. A tick in progress is
//! never interrupted.
//!
//! The scheduler has exactly one trigger, its timer. Out-of-band heartbeats go
//! straight through the sink and leave the timer untouched.

use std::sync::Arc;
use std::time::Duration;

use mavlink::common::{MavAutopilot, MavMessage, MavModeFlag, MavState, MavType, HEARTBEAT_DATA};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::version_gate::MAVLINK_PROTOCOL_VERSION;

/// Receiver of scheduled heartbeats
pub trait HeartbeatSink: Send + Sync + 'static {
    fn send_heartbeat(&self);
}

/// Scheduler configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatConfig {
    pub enabled: bool,
    /// Heartbeats per second, > 0
    pub rate_hz: u32,
}

impl HeartbeatConfig {
    pub fn period(&self) -> Duration {
        Duration::from_micros(1_000_000 / u64::from(self.rate_hz.max(1)))
    }
}

/// Heartbeat this ground station announces itself with
pub fn gcs_heartbeat() -> MavMessage {
    MavMessage::HEARTBEAT(HEARTBEAT_DATA {
        custom_mode: 0,
        mavtype: MavType::MAV_TYPE_GCS,
        autopilot: MavAutopilot::MAV_AUTOPILOT_GENERIC,
        base_mode: MavModeFlag::empty(),
        system_status: MavState::MAV_STATE_ACTIVE,
        mavlink_version: MAVLINK_PROTOCOL_VERSION,
    })
}

/// Handle to a running heartbeat task
pub struct HeartbeatScheduler {
    config: watch::Sender<HeartbeatConfig>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl HeartbeatScheduler {
    /// Spawn the heartbeat task on the current tokio runtime
    pub fn spawn(sink: Arc<dyn HeartbeatSink>, config: HeartbeatConfig) -> Self {
        Self::spawn_on(&tokio::runtime::Handle::current(), sink, config)
    }

    /// Spawn the heartbeat task on `runtime`
    pub fn spawn_on(
        runtime: &tokio::runtime::Handle,
        sink: Arc<dyn HeartbeatSink>,
        config: HeartbeatConfig,
    ) -> Self {
        let (config_tx, config_rx) = watch::channel(config);
        let cancel = CancellationToken::new();
        let task = runtime.spawn(heartbeat_task(sink, config_rx, cancel.clone()));
        Self {
            config: config_tx,
            cancel,
            task,
        }
    }

    pub fn config(&self) -> HeartbeatConfig {
        *self.config.borrow()
    }

    /// Turn ticking on or off
    ///
    /// Returns `false` if the setting was already in place; the schedule is
    /// left untouched then.
    pub fn set_enabled(&self, enabled: bool) -> bool {
        self.config.send_if_modified(|config| {
            let changed = config.enabled != enabled;
            config.enabled = enabled;
            changed
        })
    }

    /// Change the rate; the next tick is one new period from now
    ///
    /// Setting the current rate again does not reschedule.
    pub fn set_rate(&self, rate_hz: u32) -> bool {
        self.config.send_if_modified(|config| {
            let changed = config.rate_hz != rate_hz;
            config.rate_hz = rate_hz;
            changed
        })
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the task
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Drop for HeartbeatScheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn heartbeat_task(
    sink: Arc<dyn HeartbeatSink>,
    mut config_rx: watch::Receiver<HeartbeatConfig>,
    cancel: CancellationToken,
) {
    crate::log_debug!("Heartbeat task started");

    'schedule: loop {
        let config = *config_rx.borrow_and_update();

        if !config.enabled {
            tokio::select! {
                _ = cancel.cancelled() => break 'schedule,
                changed = config_rx.changed() => {
                    if changed.is_err() {
                        break 'schedule;
                    }
                    continue 'schedule;
                }
            }
        }

        let period = config.period();
        crate::log_trace!("Heartbeat every {:?}", period);
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break 'schedule,
                changed = config_rx.changed() => {
                    if changed.is_err() {
                        break 'schedule;
                    }
                    continue 'schedule;
                }
                _ = ticker.tick() => sink.send_heartbeat(),
            }
        }
    }

    crate::log_debug!("Heartbeat task stopped");
}
