//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use rust_motion_test::axis::{Axis, AxisTiming};
use rust_motion_test::bus::{SimulatedAxisConfig, SimulatedController};
use rust_motion_test::campaign::{CampaignControl, TestSettings};
use rust_motion_test::instrument::MeasurementSource;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const AXIS: u32 = 1;

/// Poll fast so tests finish in milliseconds.
pub fn fast_timing() -> AxisTiming {
    AxisTiming {
        poll_interval: Duration::from_millis(2),
        command_latency: Duration::from_millis(5),
        stop_grace: Duration::ZERO,
    }
}

/// Controller with one axis travelling between `low` and `high`.
pub fn simulator(low: f64, high: f64, start: f64) -> Arc<SimulatedController> {
    Arc::new(SimulatedController::new().with_axis(
        AXIS,
        SimulatedAxisConfig {
            low_limit: low,
            high_limit: high,
            initial_position: start,
        },
    ))
}

/// Bind the test axis and zero the counters touched by binding.
pub async fn bind(sim: &Arc<SimulatedController>) -> Axis {
    let axis = Axis::bind(AXIS, sim.clone(), fast_timing()).await;
    sim.reset_counters();
    axis
}

/// Short limit-cycle settings for a +-2 travel range.
pub fn limit_settings(cycles: u32) -> TestSettings {
    TestSettings {
        title: "Limit".to_string(),
        cycles,
        velocity: 100.0,
        timeout: Duration::from_secs(5),
        reversal_velocity: 20.0,
        reversal_extra_time: Duration::from_millis(5),
        reversal_settle_time: Duration::from_millis(2),
        ..Default::default()
    }
}

/// Short accuracy settings: targets 0, 0.5, ... with a 0.25 back-off.
pub fn accuracy_settings(cycles: u32, steps: u32) -> TestSettings {
    TestSettings {
        title: "Accuracy".to_string(),
        cycles,
        velocity: 200.0,
        timeout: Duration::from_secs(5),
        initial_setpoint: 0.0,
        steps,
        step_size: 0.5,
        settle_time: Duration::from_millis(1),
        reversal_distance: 0.25,
        overshoot_distance: 0.25,
        ..Default::default()
    }
}

/// What a [`ControlTap`] does when its trigger call arrives.
#[derive(Debug, Clone, Copy)]
pub enum TapAction {
    Pause,
    Cancel,
}

/// Instrument that counts its reads and pokes the campaign control on the
/// `trigger_at`-th read (1-based).
pub struct ControlTap {
    pub calls: AtomicUsize,
    control: CampaignControl,
    trigger_at: usize,
    action: TapAction,
}

impl ControlTap {
    pub fn new(control: CampaignControl, trigger_at: usize, action: TapAction) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            control,
            trigger_at,
            action,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MeasurementSource for ControlTap {
    fn name(&self) -> &str {
        "Tap"
    }

    fn is_connected(&self) -> bool {
        true
    }

    async fn measure(&self) -> anyhow::Result<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.trigger_at {
            match self.action {
                TapAction::Pause => self.control.pause(),
                TapAction::Cancel => self.control.cancel(),
            }
        }
        Ok(call.to_string())
    }
}
