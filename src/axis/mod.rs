//! Motorized axis on a remote motion controller.
//!
//! An [`Axis`] owns an injected [`RegisterBus`] and the resolved
//! [`AxisChannel`] for its id. Motion primitives live in `motion`, the limit
//! seeking and reversal maneuvers in `limits`.
//!
//! Binding never fails outright: when the register set cannot be resolved
//! the axis is marked invalid and every command is rejected without touching
//! the bus until [`Axis::rebind`] succeeds.

mod channel;
mod limits;
mod motion;

pub use channel::{AxisChannel, AxisField, LimitSwitch, MotionCommand, StatusSnapshot};
pub use limits::{LimitSeek, ReversalPhase};

use crate::bus::RegisterBus;
use crate::error::{MotionError, MotionResult, Rejection};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Polling and delay parameters for one axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisTiming {
    /// Interval between status polls of a race watcher
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Wait after execute before watching for completion
    #[serde(default = "default_command_latency", with = "humantime_serde")]
    pub command_latency: Duration,

    /// Wait between a timeout and the stop it triggers
    #[serde(default = "default_stop_grace", with = "humantime_serde")]
    pub stop_grace: Duration,
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(10)
}

fn default_command_latency() -> Duration {
    Duration::from_millis(40)
}

fn default_stop_grace() -> Duration {
    Duration::from_millis(20)
}

impl Default for AxisTiming {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            command_latency: default_command_latency(),
            stop_grace: default_stop_grace(),
        }
    }
}

/// One controllable axis.
pub struct Axis {
    id: u32,
    bus: Arc<dyn RegisterBus>,
    channel: Option<AxisChannel>,
    valid: AtomicBool,
    position: Mutex<f64>,
    timing: AxisTiming,
}

impl std::fmt::Debug for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Axis")
            .field("id", &self.id)
            .field("valid", &self.is_valid())
            .field("position", &self.cached_position())
            .finish_non_exhaustive()
    }
}

impl Axis {
    /// Bind axis `id` on `bus`, resolving its register set.
    pub async fn bind(id: u32, bus: Arc<dyn RegisterBus>, timing: AxisTiming) -> Self {
        let mut axis = Self {
            id,
            bus: bus.clone(),
            channel: None,
            valid: AtomicBool::new(false),
            position: Mutex::new(0.0),
            timing,
        };
        if let Err(err) = axis.rebind(bus).await {
            error!(axis = id, error = %err, "axis bound without registers, commands will be rejected");
        }
        axis
    }

    /// Re-resolve the register set, e.g. after the bus connection changed.
    ///
    /// On failure the axis stays invalid and the error is returned.
    pub async fn rebind(&mut self, bus: Arc<dyn RegisterBus>) -> MotionResult<()> {
        self.bus = bus;
        self.channel = None;
        self.valid.store(false, Ordering::SeqCst);

        let channel = AxisChannel::resolve(self.id, self.bus.clone()).await?;
        self.channel = Some(channel);
        self.revalidate().await?;
        Ok(())
    }

    /// Axis id.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Result of the last validity check.
    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst)
    }

    /// Timing parameters.
    pub fn timing(&self) -> &AxisTiming {
        &self.timing
    }

    /// Last position read from the controller.
    pub fn cached_position(&self) -> f64 {
        *self.position.lock()
    }

    /// The resolved channel, or a rejection if resolution failed.
    pub fn channel(&self) -> MotionResult<&AxisChannel> {
        match &self.channel {
            Some(channel) => Ok(channel),
            None => Err(self.reject(Rejection::AxisInvalid)),
        }
    }

    /// Check that registers are bound and the controller is in run state.
    pub async fn revalidate(&self) -> MotionResult<&AxisChannel> {
        let channel = match &self.channel {
            Some(channel) => channel,
            None => {
                self.valid.store(false, Ordering::SeqCst);
                return Err(self.reject(Rejection::AxisInvalid));
            }
        };
        match self.bus.is_running().await {
            Ok(true) => {
                self.valid.store(true, Ordering::SeqCst);
                Ok(channel)
            }
            Ok(false) => {
                self.valid.store(false, Ordering::SeqCst);
                Err(self.reject(Rejection::ControllerNotRunning))
            }
            Err(err) => {
                warn!(axis = self.id, error = %err, "controller state unavailable");
                self.valid.store(false, Ordering::SeqCst);
                Err(self.reject(Rejection::AxisInvalid))
            }
        }
    }

    /// Read the actual position and refresh the cache.
    pub async fn read_position(&self) -> MotionResult<f64> {
        let position = self.channel()?.actual_position().await?;
        *self.position.lock() = position;
        Ok(position)
    }

    /// Read the status flags.
    pub async fn status(&self) -> MotionResult<StatusSnapshot> {
        self.channel()?.status().await
    }

    /// Enable or disable the drive.
    pub async fn set_enable(&self, enable: bool) -> MotionResult<()> {
        let channel = self.revalidate().await?;
        channel.write_enable(enable).await?;
        debug!(axis = self.id, enable, "drive enable written");
        Ok(())
    }

    /// Clear a controller error on this axis.
    pub async fn reset(&self) -> MotionResult<()> {
        let channel = self.revalidate().await?;
        channel.reset().await?;
        debug!(axis = self.id, "error reset issued");
        Ok(())
    }

    pub(crate) fn reject(&self, reason: Rejection) -> MotionError {
        warn!(axis = self.id, %reason, "command rejected");
        MotionError::Rejected {
            axis: self.id,
            reason,
        }
    }

    /// Refresh the cached position every `period` until the monitor is stopped.
    pub fn spawn_position_monitor(self: &Arc<Self>, period: Duration) -> PositionMonitor {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let axis = Arc::clone(self);
        let handle = tokio::spawn(async move {
            loop {
                if let Err(err) = axis.read_position().await {
                    debug!(axis = axis.id, error = %err, "position poll failed");
                }
                tokio::select! {
                    _ = tokio::time::sleep(period) => {}
                    _ = stop_rx.changed() => break,
                }
            }
        });
        PositionMonitor {
            stop: stop_tx,
            handle,
        }
    }
}

/// Handle to a background position poller.
#[derive(Debug)]
pub struct PositionMonitor {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl PositionMonitor {
    /// Stop polling and wait for the task to finish.
    pub async fn stop(self) {
        self.stop.send_replace(true);
        if let Err(err) = self.handle.await {
            warn!(error = %err, "position monitor ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{SimulatedAxisConfig, SimulatedController};

    fn sim() -> Arc<SimulatedController> {
        Arc::new(SimulatedController::new().with_axis(1, SimulatedAxisConfig::default()))
    }

    #[tokio::test]
    async fn bind_resolves_known_axis() {
        let axis = Axis::bind(1, sim(), AxisTiming::default()).await;
        assert!(axis.is_valid());
        assert!(axis.channel().is_ok());
    }

    #[tokio::test]
    async fn bind_unknown_axis_leaves_it_invalid() {
        let axis = Axis::bind(9, sim(), AxisTiming::default()).await;
        assert!(!axis.is_valid());
        let err = axis.revalidate().await.unwrap_err();
        assert!(matches!(
            err,
            MotionError::Rejected {
                axis: 9,
                reason: Rejection::AxisInvalid
            }
        ));
    }

    #[tokio::test]
    async fn rebind_recovers_after_new_bus() {
        let mut axis = Axis::bind(2, sim(), AxisTiming::default()).await;
        assert!(!axis.is_valid());
        let other = Arc::new(SimulatedController::new().with_axis(2, SimulatedAxisConfig::default()));
        axis.rebind(other).await.unwrap();
        assert!(axis.is_valid());
    }

    #[tokio::test]
    async fn stopped_controller_invalidates_axis() {
        let bus = sim();
        let axis = Axis::bind(1, bus.clone(), AxisTiming::default()).await;
        bus.set_running(false);
        let err = axis.revalidate().await.unwrap_err();
        assert!(matches!(
            err,
            MotionError::Rejected {
                reason: Rejection::ControllerNotRunning,
                ..
            }
        ));
        assert!(!axis.is_valid());
    }

    #[tokio::test]
    async fn position_monitor_refreshes_cache() {
        let bus = sim();
        let axis = Arc::new(Axis::bind(1, bus.clone(), AxisTiming::default()).await);
        bus.place_axis(1, 12.5);
        let monitor = axis.spawn_position_monitor(Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(30)).await;
        monitor.stop().await;
        assert_eq!(axis.cached_position(), 12.5);
    }
}
