//! Typed result records and their row rendering.

use crate::storage::ResultRow;
use std::fmt;
use std::time::Duration;

/// Direction of a limit-cycle traverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitPhase {
    /// Approach of the high limit from the low limit
    LowToHigh,
    /// Approach of the low limit from the high limit
    HighToLow,
}

impl fmt::Display for LimitPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimitPhase::LowToHigh => f.write_str("Low limit to high limit"),
            LimitPhase::HighToLow => f.write_str("High limit to low limit"),
        }
    }
}

/// Approach direction of an accuracy sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Approach {
    /// Single-direction test
    Unidirectional,
    /// Upward pass of a bidirectional test
    Positive,
    /// Return pass of a bidirectional test
    Negative,
}

impl fmt::Display for Approach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Approach::Unidirectional => f.write_str("Testing"),
            Approach::Positive => f.write_str("Positive approach"),
            Approach::Negative => f.write_str("Negative approach"),
        }
    }
}

/// One limit approach of a limit-to-limit cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimitCycleRecord {
    /// 1-based cycle index
    pub cycle: u32,
    /// Which limit was approached
    pub phase: LimitPhase,
    /// Duration of the approach
    pub elapsed: Duration,
    /// Trigger position after the reversal maneuver
    pub position: f64,
}

impl LimitCycleRecord {
    /// Fixed result columns.
    pub const COLUMNS: [&'static str; 4] = ["Cycle", "Status", "Time (ms)", "Position"];

    /// Render with instrument readings appended.
    pub fn into_row(self, readings: Vec<String>) -> ResultRow {
        ResultRow::new(
            vec![
                self.cycle.to_string(),
                self.phase.to_string(),
                self.elapsed.as_millis().to_string(),
                self.position.to_string(),
            ],
            readings,
        )
    }
}

/// One positioning sample of an accuracy test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccuracyRecord {
    /// 1-based cycle index
    pub cycle: u32,
    /// Step index, 0 is the initial setpoint
    pub step: u32,
    /// Approach direction
    pub approach: Approach,
    /// Commanded position
    pub target: f64,
    /// Position reported by the controller after settling
    pub position: f64,
}

impl AccuracyRecord {
    /// Fixed result columns.
    pub const COLUMNS: [&'static str; 5] =
        ["Cycle", "Step", "Status", "Target Position", "Axis Position"];

    /// Render with instrument readings appended.
    pub fn into_row(self, readings: Vec<String>) -> ResultRow {
        ResultRow::new(
            vec![
                self.cycle.to_string(),
                self.step.to_string(),
                self.approach.to_string(),
                self.target.to_string(),
                self.position.to_string(),
            ],
            readings,
        )
    }
}
