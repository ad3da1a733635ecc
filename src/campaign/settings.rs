//! Test settings shared by the three campaigns.

use super::CampaignKind;
use crate::error::{MotionError, MotionResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// =============================================================================
// Configuration
// =============================================================================

/// Parameters of one campaign. Immutable while the campaign runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSettings {
    /// Free-text title, part of the output file names
    #[serde(default = "default_title")]
    pub title: String,

    /// Number of cycles to run
    #[serde(default = "default_cycles")]
    pub cycles: u32,

    /// Travel velocity for seeks and positioning moves
    #[serde(default = "default_velocity")]
    pub velocity: f64,

    /// Upper bound on any single wait; zero disables the bound
    #[serde(default, with = "humantime_serde")]
    pub timeout: Duration,

    /// Delay before each cycle and between the two halves of a limit cycle
    #[serde(default, with = "humantime_serde")]
    pub cycle_delay: Duration,

    /// Velocity of the reversal maneuver
    #[serde(default = "default_reversal_velocity")]
    pub reversal_velocity: f64,

    /// Extra travel time after the limit clears during back-off
    #[serde(default, with = "humantime_serde")]
    pub reversal_extra_time: Duration,

    /// Dwell at the limit before and after a reversal
    #[serde(default, with = "humantime_serde")]
    pub reversal_settle_time: Duration,

    /// First target of an accuracy test
    #[serde(default)]
    pub initial_setpoint: f64,

    /// Number of steps after the initial setpoint
    #[serde(default = "default_steps")]
    pub steps: u32,

    /// Signed increment between targets
    #[serde(default = "default_step_size")]
    pub step_size: f64,

    /// Dwell after each positioning move before sampling
    #[serde(default, with = "humantime_serde")]
    pub settle_time: Duration,

    /// Distance of the approach start point before the first target
    #[serde(default)]
    pub reversal_distance: f64,

    /// Distance past the last target before the return pass
    #[serde(default)]
    pub overshoot_distance: f64,
}

fn default_title() -> String {
    "Axis Test".to_string()
}

fn default_cycles() -> u32 {
    1
}

fn default_velocity() -> f64 {
    1.0
}

fn default_reversal_velocity() -> f64 {
    0.1
}

fn default_steps() -> u32 {
    10
}

fn default_step_size() -> f64 {
    1.0
}

impl Default for TestSettings {
    fn default() -> Self {
        Self {
            title: default_title(),
            cycles: default_cycles(),
            velocity: default_velocity(),
            timeout: Duration::ZERO,
            cycle_delay: Duration::ZERO,
            reversal_velocity: default_reversal_velocity(),
            reversal_extra_time: Duration::ZERO,
            reversal_settle_time: Duration::ZERO,
            initial_setpoint: 0.0,
            steps: default_steps(),
            step_size: default_step_size(),
            settle_time: Duration::ZERO,
            reversal_distance: 0.0,
            overshoot_distance: 0.0,
        }
    }
}

impl TestSettings {
    /// Timeout as a race member; `None` when disabled.
    pub fn timeout(&self) -> Option<Duration> {
        (!self.timeout.is_zero()).then_some(self.timeout)
    }

    /// Check the fields `kind` depends on.
    pub fn validate(&self, kind: CampaignKind) -> MotionResult<()> {
        let invalid = |msg: &str| Err(MotionError::InvalidSettings(msg.to_string()));

        if self.cycles == 0 {
            return invalid("cycle count must be non-zero");
        }
        if self.velocity == 0.0 || !self.velocity.is_finite() {
            return invalid("velocity must be non-zero");
        }
        match kind {
            CampaignKind::LimitCycle => {
                if self.reversal_velocity == 0.0 || !self.reversal_velocity.is_finite() {
                    return invalid("reversal velocity must be non-zero");
                }
            }
            CampaignKind::Unidirectional | CampaignKind::Bidirectional => {
                if self.steps == 0 {
                    return invalid("step count must be non-zero");
                }
                if self.step_size == 0.0 || !self.step_size.is_finite() {
                    return invalid("step size must be non-zero");
                }
            }
        }
        Ok(())
    }

    /// Target of step `step`, counted from the initial setpoint.
    pub fn step_target(&self, step: u32) -> f64 {
        self.initial_setpoint + f64::from(step) * self.step_size
    }

    /// Start point that puts the first target on the stepping direction.
    pub fn reversal_position(&self) -> f64 {
        if self.step_size > 0.0 {
            self.initial_setpoint - self.reversal_distance.abs()
        } else {
            self.initial_setpoint + self.reversal_distance.abs()
        }
    }

    /// Point past the last target from which the return pass starts.
    pub fn overshoot_position(&self) -> f64 {
        let last = self.step_target(self.steps);
        if self.step_size > 0.0 {
            last + self.overshoot_distance.abs()
        } else {
            last - self.overshoot_distance.abs()
        }
    }

    /// Human-readable snapshot, one `Label: value` line per field.
    pub fn snapshot_lines(&self, kind: CampaignKind, axis: u32) -> Vec<String> {
        let secs = |d: Duration| d.as_secs_f64().to_string();
        [
            ("Test Type", kind.label().to_string()),
            ("Axis Number", axis.to_string()),
            ("Velocity", self.velocity.to_string()),
            ("Timeout", secs(self.timeout)),
            ("Cycles", self.cycles.to_string()),
            ("Cycle Delay (s)", secs(self.cycle_delay)),
            ("Reversal Velocity", self.reversal_velocity.to_string()),
            ("Reversal Extra Time (s)", secs(self.reversal_extra_time)),
            ("Reversal Settle Time (s)", secs(self.reversal_settle_time)),
            ("Initial Setpoint", self.initial_setpoint.to_string()),
            ("Number of Steps", self.steps.to_string()),
            ("Step Size", self.step_size.to_string()),
            ("Settle Time (s)", secs(self.settle_time)),
            ("Reversal Distance", self.reversal_distance.to_string()),
            ("Overshoot Distance", self.overshoot_distance.to_string()),
        ]
        .into_iter()
        .map(|(label, value)| format!("{label}: {value}"))
        .collect()
    }
}
