//! Stepped positioning accuracy tests.
//!
//! Targets are `initial_setpoint + j * step_size` for `j` in `0..=steps`.
//! Each cycle starts from the reversal position so every target of the
//! upward pass is approached from the same side. The bidirectional test adds
//! a return pass from beyond the last target, walking the targets in reverse.

use super::{log_failure, CampaignControl, CampaignKind, CampaignReport, Runner, TestSettings};
use super::{AccuracyRecord, Approach};
use crate::axis::Axis;
use crate::error::MotionResult;
use crate::instrument::MeasurementDevices;
use crate::storage::{ResultRow, ResultSink};
use tracing::{debug, info, instrument};

/// Approach every target from the same side, `cycles` times.
#[instrument(skip_all, fields(axis = axis.id(), campaign = "unidirectional"))]
pub async fn run_unidirectional_accuracy_test(
    axis: &Axis,
    settings: &TestSettings,
    devices: &MeasurementDevices,
    sink: &mut dyn ResultSink,
    control: &CampaignControl,
) -> MotionResult<CampaignReport> {
    let kind = CampaignKind::Unidirectional;
    let result = step_through(kind, axis, settings, devices, sink, control).await;
    if let Err(err) = &result {
        log_failure(kind, err);
    }
    result
}

/// Approach every target from both sides, `cycles` times.
#[instrument(skip_all, fields(axis = axis.id(), campaign = "bidirectional"))]
pub async fn run_bidirectional_accuracy_test(
    axis: &Axis,
    settings: &TestSettings,
    devices: &MeasurementDevices,
    sink: &mut dyn ResultSink,
    control: &CampaignControl,
) -> MotionResult<CampaignReport> {
    let kind = CampaignKind::Bidirectional;
    let result = step_through(kind, axis, settings, devices, sink, control).await;
    if let Err(err) = &result {
        log_failure(kind, err);
    }
    result
}

async fn step_through(
    kind: CampaignKind,
    axis: &Axis,
    settings: &TestSettings,
    devices: &MeasurementDevices,
    sink: &mut dyn ResultSink,
    control: &CampaignControl,
) -> MotionResult<CampaignReport> {
    let mut runner = Runner::prepare(kind, axis, settings, devices, sink, control).await?;
    let reversal = settings.reversal_position();
    let forward_approach = match kind {
        CampaignKind::Bidirectional => Approach::Positive,
        _ => Approach::Unidirectional,
    };

    for cycle in 1..=settings.cycles {
        runner.begin_cycle(cycle).await?;
        let mut rows = Vec::with_capacity(kind.rows_per_cycle(settings));

        info!(cycle, position = reversal, "moving to reversal position");
        position_and_settle(axis, settings, reversal).await?;

        for step in 0..=settings.steps {
            if step > 0 {
                control.checkpoint().await?;
            }
            rows.push(measure_step(&runner, cycle, step, forward_approach).await?);
        }

        if kind == CampaignKind::Bidirectional {
            let overshoot = settings.overshoot_position();
            info!(cycle, position = overshoot, "moving to overshoot position");
            position_and_settle(axis, settings, overshoot).await?;

            for step in (0..=settings.steps).rev() {
                control.checkpoint().await?;
                rows.push(measure_step(&runner, cycle, step, Approach::Negative).await?);
            }
        }

        runner.flush(cycle, rows).await?;
    }

    Ok(runner.finish())
}

async fn position_and_settle(axis: &Axis, settings: &TestSettings, target: f64) -> MotionResult<()> {
    axis.move_absolute_and_wait(target, settings.velocity.abs(), settings.timeout())
        .await?;
    tokio::time::sleep(settings.settle_time).await;
    Ok(())
}

async fn measure_step(
    runner: &Runner<'_>,
    cycle: u32,
    step: u32,
    approach: Approach,
) -> MotionResult<ResultRow> {
    let target = runner.settings.step_target(step);
    position_and_settle(runner.axis, runner.settings, target).await?;
    let (readings, position) = runner.sample().await?;
    let record = AccuracyRecord {
        cycle,
        step,
        approach,
        target,
        position,
    };
    debug!(?record, "step sampled");
    Ok(record.into_row(readings))
}
