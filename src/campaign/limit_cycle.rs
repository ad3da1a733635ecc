//! Limit-to-limit endurance cycling.
//!
//! The axis starts on the low limit (reversal-corrected). Each cycle times a
//! full traverse to the high limit, re-triggers the high limit with a
//! reversal, samples the instruments and records the trigger position, then
//! does the same toward the low limit. Both rows of a cycle are flushed
//! together.

use super::{log_failure, CampaignControl, CampaignKind, CampaignReport, Runner, TestSettings};
use super::{LimitCycleRecord, LimitPhase};
use crate::axis::{Axis, LimitSwitch};
use crate::error::MotionResult;
use crate::instrument::MeasurementDevices;
use crate::storage::{ResultRow, ResultSink};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument};

/// Cycle the axis between its travel limits.
#[instrument(skip_all, fields(axis = axis.id(), campaign = "limit-cycle"))]
pub async fn run_limit_cycle_test(
    axis: &Axis,
    settings: &TestSettings,
    devices: &MeasurementDevices,
    sink: &mut dyn ResultSink,
    control: &CampaignControl,
) -> MotionResult<CampaignReport> {
    let kind = CampaignKind::LimitCycle;
    let result = cycle_between_limits(axis, settings, devices, sink, control).await;
    if let Err(err) = &result {
        log_failure(kind, err);
    }
    result
}

async fn cycle_between_limits(
    axis: &Axis,
    settings: &TestSettings,
    devices: &MeasurementDevices,
    sink: &mut dyn ResultSink,
    control: &CampaignControl,
) -> MotionResult<CampaignReport> {
    let mut runner = Runner::prepare(
        CampaignKind::LimitCycle,
        axis,
        settings,
        devices,
        sink,
        control,
    )
    .await?;
    let velocity = settings.velocity.abs();
    let timeout = settings.timeout();

    info!("moving to low limit start position");
    axis.move_to_low_limit(velocity, timeout).await?;
    reverse(axis, settings, LimitSwitch::Backward).await?;

    for cycle in 1..=settings.cycles {
        runner.begin_cycle(cycle).await?;

        let elapsed = timed_approach(axis, settings, LimitSwitch::Forward).await?;
        let (readings, position) = runner.sample().await?;
        let high = LimitCycleRecord {
            cycle,
            phase: LimitPhase::LowToHigh,
            elapsed,
            position,
        };
        debug!(?high, "high limit record");

        tokio::time::sleep(settings.cycle_delay).await;

        let elapsed = timed_approach(axis, settings, LimitSwitch::Backward).await?;
        let (low_readings, position) = runner.sample().await?;
        let low = LimitCycleRecord {
            cycle,
            phase: LimitPhase::HighToLow,
            elapsed,
            position,
        };
        debug!(?low, "low limit record");

        let rows: Vec<ResultRow> = vec![high.into_row(readings), low.into_row(low_readings)];
        runner.flush(cycle, rows).await?;
    }

    Ok(runner.finish())
}

/// Seek the limit and time the traverse, then dwell and reverse.
async fn timed_approach(
    axis: &Axis,
    settings: &TestSettings,
    switch: LimitSwitch,
) -> MotionResult<Duration> {
    let started = Instant::now();
    axis.move_to_limit(switch, settings.velocity.abs(), settings.timeout())
        .await?;
    let elapsed = started.elapsed();
    info!(%switch, elapsed_ms = elapsed.as_millis() as u64, "limit reached");

    tokio::time::sleep(settings.reversal_settle_time).await;
    reverse(axis, settings, switch).await?;
    Ok(elapsed)
}

async fn reverse(axis: &Axis, settings: &TestSettings, switch: LimitSwitch) -> MotionResult<()> {
    axis.limit_reversal(
        switch,
        settings.reversal_velocity,
        settings.timeout(),
        settings.reversal_extra_time,
        settings.reversal_settle_time,
    )
    .await
}
