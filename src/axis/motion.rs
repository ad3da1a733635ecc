//! Motion primitives.
//!
//! Each primitive checks its preconditions, then writes the three motion
//! parameters concurrently and raises the execute edge once all of them are
//! acknowledged. A rejected call writes nothing.

use super::{Axis, AxisChannel, LimitSwitch, MotionCommand};
use crate::error::{MotionError, MotionResult, Rejection};
use crate::race::{Outcome, Race};
use std::time::Duration;
use tracing::{debug, info, warn};

impl Axis {
    /// Start a move to `position`.
    pub async fn move_absolute(&self, position: f64, velocity: f64) -> MotionResult<()> {
        if velocity == 0.0 {
            return Err(self.reject(Rejection::ZeroVelocity));
        }
        let channel = self.ready_for_motion().await?;
        self.issue(channel, MotionCommand::MoveAbsolute, velocity, position)
            .await
    }

    /// Start a move by `delta`. The velocity must be positive.
    pub async fn move_relative(&self, delta: f64, velocity: f64) -> MotionResult<()> {
        if velocity == 0.0 {
            return Err(self.reject(Rejection::ZeroVelocity));
        }
        if velocity < 0.0 {
            return Err(self.reject(Rejection::NegativeVelocity));
        }
        let channel = self.ready_for_motion().await?;
        self.issue(channel, MotionCommand::MoveRelative, velocity, delta)
            .await
    }

    /// Run at a signed `velocity` until stopped or a limit trips.
    pub async fn move_velocity(&self, velocity: f64) -> MotionResult<()> {
        if velocity == 0.0 {
            return Err(self.reject(Rejection::ZeroVelocity));
        }
        let channel = self.ready_for_motion().await?;
        // The controller ignores the position register in velocity mode.
        self.issue(channel, MotionCommand::MoveVelocity, velocity, 0.0)
            .await
    }

    /// Halt the axis. Not gated on busy, error or run state.
    pub async fn stop(&self) -> MotionResult<()> {
        let channel = self.channel()?;
        channel.halt().await?;
        info!(axis = self.id(), "stop issued");
        Ok(())
    }

    async fn ready_for_motion(&self) -> MotionResult<&AxisChannel> {
        let channel = self.revalidate().await?;
        if channel.busy().await? {
            return Err(self.reject(Rejection::Busy));
        }
        if channel.error().await? {
            return Err(self.reject(Rejection::InError));
        }
        Ok(channel)
    }

    async fn issue(
        &self,
        channel: &AxisChannel,
        command: MotionCommand,
        velocity: f64,
        position: f64,
    ) -> MotionResult<()> {
        tokio::try_join!(
            channel.write_command(command),
            channel.write_velocity(velocity),
            channel.write_position(position),
        )?;
        channel.execute().await?;
        debug!(axis = self.id(), ?command, velocity, position, "motion executed");
        Ok(())
    }

    // =========================================================================
    // Move and wait
    // =========================================================================

    /// Move to `target` and wait until the axis reports done.
    ///
    /// Fails on an axis error, on the limit in the direction of travel, or
    /// when `timeout` elapses (the axis is stopped first).
    pub async fn move_absolute_and_wait(
        &self,
        target: f64,
        velocity: f64,
        timeout: Option<Duration>,
    ) -> MotionResult<()> {
        if velocity == 0.0 {
            return Err(self.reject(Rejection::ZeroVelocity));
        }
        let start = self.read_position().await?;
        self.move_absolute(target, velocity).await?;
        let switch = LimitSwitch::for_direction(target - start);
        self.wait_for_completion(switch, timeout, "absolute move")
            .await
    }

    /// Move by `delta` and wait until the axis reports done.
    pub async fn move_relative_and_wait(
        &self,
        delta: f64,
        velocity: f64,
        timeout: Option<Duration>,
    ) -> MotionResult<()> {
        self.move_relative(delta, velocity).await?;
        let switch = LimitSwitch::for_direction(delta);
        self.wait_for_completion(switch, timeout, "relative move")
            .await
    }

    async fn wait_for_completion(
        &self,
        switch: LimitSwitch,
        timeout: Option<Duration>,
        context: &str,
    ) -> MotionResult<()> {
        tokio::time::sleep(self.timing().command_latency).await;
        let race = Race::new(self.channel()?, self.timing().poll_interval)
            .done()
            .error()
            .limit(switch, false)
            .timeout(timeout);
        match self.await_outcome(race).await? {
            Outcome::Done => Ok(()),
            other => Err(self.outcome_error(other, context, timeout)),
        }
    }

    /// Run `race`; a timeout outcome stops the axis exactly once.
    pub async fn await_outcome(&self, race: Race) -> MotionResult<Outcome> {
        match race.run().await {
            Ok(Outcome::Timeout) => {
                tokio::time::sleep(self.timing().stop_grace).await;
                self.stop().await?;
                Ok(Outcome::Timeout)
            }
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                warn!(axis = self.id(), error = %err, "race failed, stopping axis");
                if let Err(stop_err) = self.stop().await {
                    warn!(axis = self.id(), error = %stop_err, "stop after race failure failed");
                }
                Err(err)
            }
        }
    }

    pub(crate) fn outcome_error(
        &self,
        outcome: Outcome,
        context: &str,
        timeout: Option<Duration>,
    ) -> MotionError {
        let axis = self.id();
        let context = context.to_string();
        let err = match outcome {
            Outcome::Fault => MotionError::Fault { axis, context },
            Outcome::Limit => MotionError::LimitReached { axis, context },
            Outcome::Timeout => MotionError::Timeout {
                axis,
                context,
                after: timeout.unwrap_or_default(),
            },
            Outcome::Done => MotionError::Race(format!("unexpected completion during {context}")),
        };
        warn!(axis, %outcome, error = %err, "motion failed");
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::{AxisField, AxisTiming};
    use crate::bus::{SimulatedAxisConfig, SimulatedController};
    use std::sync::Arc;

    async fn setup() -> (Arc<SimulatedController>, Axis) {
        let sim = Arc::new(SimulatedController::new().with_axis(1, SimulatedAxisConfig::default()));
        let timing = AxisTiming {
            poll_interval: Duration::from_millis(2),
            command_latency: Duration::from_millis(2),
            stop_grace: Duration::ZERO,
        };
        let axis = Axis::bind(1, sim.clone(), timing).await;
        sim.reset_counters();
        (sim, axis)
    }

    #[tokio::test]
    async fn accepted_move_writes_four_registers() {
        let (sim, axis) = setup().await;
        axis.move_absolute(5.0, 50.0).await.unwrap();
        assert_eq!(sim.total_writes(), 4);
        assert_eq!(sim.write_count(1, AxisField::Execute), 1);
    }

    #[tokio::test]
    async fn relative_move_rejects_negative_velocity() {
        let (sim, axis) = setup().await;
        let err = axis.move_relative(1.0, -5.0).await.unwrap_err();
        assert!(matches!(
            err,
            MotionError::Rejected {
                reason: Rejection::NegativeVelocity,
                ..
            }
        ));
        assert_eq!(sim.total_writes(), 0);
    }

    #[tokio::test]
    async fn absolute_move_and_wait_arrives() {
        let (sim, axis) = setup().await;
        axis.move_absolute_and_wait(3.0, 100.0, Some(Duration::from_secs(2)))
            .await
            .unwrap();
        assert_eq!(sim.axis_position(1), Some(3.0));
        assert_eq!(sim.write_count(1, AxisField::Halt), 0);
    }

    #[tokio::test]
    async fn move_past_travel_range_reports_limit() {
        let (_sim, axis) = setup().await;
        let err = axis
            .move_relative_and_wait(500.0, 1000.0, Some(Duration::from_secs(2)))
            .await
            .unwrap_err();
        assert!(matches!(err, MotionError::LimitReached { axis: 1, .. }));
    }
}
