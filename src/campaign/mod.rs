//! Test campaigns.
//!
//! A campaign sequences motion primitives, limit maneuvers and instrument
//! reads over many cycles and streams result rows into a [`ResultSink`].
//!
//! Three campaigns are available:
//! - [`run_limit_cycle_test`]: endurance cycling between the two travel limits
//! - [`run_unidirectional_accuracy_test`]: stepped positioning from one side
//! - [`run_bidirectional_accuracy_test`]: stepped positioning from both sides
//!
//! Every campaign:
//! 1. revalidates the axis and validates its settings
//! 2. writes the settings snapshot and the result header
//! 3. passes a [`CampaignControl::checkpoint`] and the inter-cycle delay at
//!    the start of every cycle
//! 4. flushes the rows of a cycle only once the cycle is complete
//!
//! Any rejection, fault, limit hit or timeout aborts the campaign. Cycles
//! already flushed stay in the result file.
//!
//! # Example
//!
//! ```rust,ignore
//! let control = CampaignControl::new();
//! let report = run_unidirectional_accuracy_test(&axis, &settings, &devices, &mut sink, &control).await?;
//! println!("{} rows in {:?}", report.records_written, report.elapsed);
//! ```

mod accuracy;
mod control;
mod limit_cycle;
mod record;
mod settings;

pub use accuracy::{run_bidirectional_accuracy_test, run_unidirectional_accuracy_test};
pub use control::{CampaignControl, ControlState};
pub use limit_cycle::run_limit_cycle_test;
pub use record::{AccuracyRecord, Approach, LimitCycleRecord, LimitPhase};
pub use settings::TestSettings;

use crate::axis::Axis;
use crate::error::{MotionError, MotionResult};
use crate::instrument::MeasurementDevices;
use crate::storage::{ResultRow, ResultSink};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

/// The three campaign types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CampaignKind {
    /// Limit-to-limit endurance cycling
    LimitCycle,
    /// Stepped accuracy test approached from one side
    Unidirectional,
    /// Stepped accuracy test approached from both sides
    Bidirectional,
}

impl CampaignKind {
    /// Label written to the settings snapshot.
    pub fn label(self) -> &'static str {
        match self {
            CampaignKind::LimitCycle => "Limit to Limit Test",
            CampaignKind::Unidirectional => "Unidirectional Accuracy Test",
            CampaignKind::Bidirectional => "Bidirectional Accuracy Test",
        }
    }

    /// Fixed result columns, before instrument columns.
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            CampaignKind::LimitCycle => &LimitCycleRecord::COLUMNS,
            CampaignKind::Unidirectional | CampaignKind::Bidirectional => &AccuracyRecord::COLUMNS,
        }
    }

    /// Rows emitted by one completed cycle.
    pub fn rows_per_cycle(self, settings: &TestSettings) -> usize {
        let samples = settings.steps as usize + 1;
        match self {
            CampaignKind::LimitCycle => 2,
            CampaignKind::Unidirectional => samples,
            CampaignKind::Bidirectional => 2 * samples,
        }
    }

    /// Run this campaign.
    pub async fn run(
        self,
        axis: &Axis,
        settings: &TestSettings,
        devices: &MeasurementDevices,
        sink: &mut dyn ResultSink,
        control: &CampaignControl,
    ) -> MotionResult<CampaignReport> {
        match self {
            CampaignKind::LimitCycle => {
                run_limit_cycle_test(axis, settings, devices, sink, control).await
            }
            CampaignKind::Unidirectional => {
                run_unidirectional_accuracy_test(axis, settings, devices, sink, control).await
            }
            CampaignKind::Bidirectional => {
                run_bidirectional_accuracy_test(axis, settings, devices, sink, control).await
            }
        }
    }
}

impl fmt::Display for CampaignKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for CampaignKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "limit-cycle" | "limit" | "end2end" => Ok(CampaignKind::LimitCycle),
            "unidirectional" | "uni" => Ok(CampaignKind::Unidirectional),
            "bidirectional" | "bi" => Ok(CampaignKind::Bidirectional),
            other => Err(format!(
                "unknown campaign '{other}', expected limit-cycle, unidirectional or bidirectional"
            )),
        }
    }
}

/// Summary of a completed campaign.
#[derive(Debug, Clone, PartialEq)]
pub struct CampaignReport {
    /// Campaign that ran
    pub kind: CampaignKind,
    /// Cycles whose rows were flushed
    pub cycles_completed: u32,
    /// Rows written to the sink
    pub records_written: usize,
    /// Wall-clock duration
    pub elapsed: Duration,
}

/// Shared state of a running campaign.
struct Runner<'a> {
    kind: CampaignKind,
    axis: &'a Axis,
    settings: &'a TestSettings,
    instruments: MeasurementDevices,
    sink: &'a mut dyn ResultSink,
    control: &'a CampaignControl,
    started: Instant,
    cycles_completed: u32,
    records_written: usize,
}

impl<'a> Runner<'a> {
    /// Validate, write the settings snapshot and the header.
    async fn prepare(
        kind: CampaignKind,
        axis: &'a Axis,
        settings: &'a TestSettings,
        devices: &'a MeasurementDevices,
        sink: &'a mut dyn ResultSink,
        control: &'a CampaignControl,
    ) -> MotionResult<Runner<'a>> {
        axis.revalidate().await?;
        settings.validate(kind)?;

        sink.write_settings(&settings.snapshot_lines(kind, axis.id()))
            .await?;
        let instruments = devices.connected_set();
        let mut header: Vec<String> = kind.columns().iter().map(|c| c.to_string()).collect();
        header.extend(instruments.names());
        sink.write_header(&header).await?;

        info!(
            axis = axis.id(),
            campaign = %kind,
            cycles = settings.cycles,
            instruments = header.len() - kind.columns().len(),
            "campaign started"
        );
        Ok(Runner {
            kind,
            axis,
            settings,
            instruments,
            sink,
            control,
            started: Instant::now(),
            cycles_completed: 0,
            records_written: 0,
        })
    }

    /// Pause/cancel checkpoint followed by the inter-cycle delay.
    async fn begin_cycle(&self, cycle: u32) -> MotionResult<()> {
        self.control.checkpoint().await?;
        tokio::time::sleep(self.settings.cycle_delay).await;
        info!(cycle, total = self.settings.cycles, "cycle started");
        Ok(())
    }

    /// Sample the instruments captured at start, then read the axis position.
    async fn sample(&self) -> MotionResult<(Vec<String>, f64)> {
        let readings = self.instruments.sample_all().await;
        let position = self.axis.read_position().await?;
        Ok((readings, position))
    }

    /// Append the rows of a completed cycle.
    async fn flush(&mut self, cycle: u32, rows: Vec<ResultRow>) -> MotionResult<()> {
        self.sink.append(&rows).await?;
        self.records_written += rows.len();
        self.cycles_completed = cycle;
        info!(cycle, rows = rows.len(), "cycle complete");
        Ok(())
    }

    fn finish(self) -> CampaignReport {
        let report = CampaignReport {
            kind: self.kind,
            cycles_completed: self.cycles_completed,
            records_written: self.records_written,
            elapsed: self.started.elapsed(),
        };
        info!(
            campaign = %report.kind,
            cycles = report.cycles_completed,
            records = report.records_written,
            elapsed = ?report.elapsed,
            "campaign complete"
        );
        report
    }
}

/// Log the end of a failed campaign with its cause.
fn log_failure(kind: CampaignKind, err: &MotionError) {
    if err.is_cancellation() {
        info!(campaign = %kind, "campaign cancelled");
    } else {
        tracing::error!(campaign = %kind, error = %err, "campaign aborted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parses_cli_names() {
        assert_eq!("limit-cycle".parse::<CampaignKind>(), Ok(CampaignKind::LimitCycle));
        assert_eq!("BI".parse::<CampaignKind>(), Ok(CampaignKind::Bidirectional));
        assert!("sideways".parse::<CampaignKind>().is_err());
    }

    #[test]
    fn rows_per_cycle_follow_step_count() {
        let settings = TestSettings {
            steps: 4,
            ..Default::default()
        };
        assert_eq!(CampaignKind::LimitCycle.rows_per_cycle(&settings), 2);
        assert_eq!(CampaignKind::Unidirectional.rows_per_cycle(&settings), 5);
        assert_eq!(CampaignKind::Bidirectional.rows_per_cycle(&settings), 10);
    }
}
