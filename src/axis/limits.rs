//! Limit seeking and reversal maneuvers.
//!
//! A limit switch trips with some overshoot that depends on approach speed.
//! The reversal maneuver backs off a tripped limit and re-approaches it at a
//! controlled velocity so the trigger position is repeatable.
//!
//! ```text
//! seek:      SeekingLimit ──► LimitReached | TimedOut | Faulted
//! reversal:  BackingOff ──(limit clears, extra time, stop)──► Reapproaching ──(limit trips, settle)──► done
//! ```

use super::{Axis, LimitSwitch};
use crate::error::{MotionResult, Rejection};
use crate::race::{Outcome, Race};
use std::fmt;
use std::time::Duration;
use tracing::{info, instrument};

/// State of a limit seek, reported in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitSeek {
    /// Velocity move toward the limit in progress
    SeekingLimit,
    /// Limit flag cleared
    LimitReached,
    /// Timeout elapsed, axis stopped
    TimedOut,
    /// Axis raised its error flag
    Faulted,
}

impl From<Outcome> for LimitSeek {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Limit => LimitSeek::LimitReached,
            Outcome::Timeout => LimitSeek::TimedOut,
            Outcome::Fault => LimitSeek::Faulted,
            Outcome::Done => LimitSeek::SeekingLimit,
        }
    }
}

/// Phase of a reversal maneuver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReversalPhase {
    /// Moving away from the tripped limit
    BackingOff,
    /// Moving back onto the limit
    Reapproaching,
}

impl fmt::Display for ReversalPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReversalPhase::BackingOff => f.write_str("reversal back-off"),
            ReversalPhase::Reapproaching => f.write_str("reversal re-approach"),
        }
    }
}

fn toward(switch: LimitSwitch, velocity: f64) -> f64 {
    match switch {
        LimitSwitch::Forward => velocity.abs(),
        LimitSwitch::Backward => -velocity.abs(),
    }
}

impl Axis {
    /// Drive onto the high limit. Succeeds at once if it is already tripped.
    pub async fn move_to_high_limit(
        &self,
        velocity: f64,
        timeout: Option<Duration>,
    ) -> MotionResult<()> {
        self.move_to_limit(LimitSwitch::Forward, velocity, timeout)
            .await
    }

    /// Drive onto the low limit. Succeeds at once if it is already tripped.
    pub async fn move_to_low_limit(
        &self,
        velocity: f64,
        timeout: Option<Duration>,
    ) -> MotionResult<()> {
        self.move_to_limit(LimitSwitch::Backward, velocity, timeout)
            .await
    }

    /// Back off the high limit and re-trigger it at `velocity`.
    pub async fn high_limit_reversal(
        &self,
        velocity: f64,
        timeout: Option<Duration>,
        extra_reversal_time: Duration,
        settle_time: Duration,
    ) -> MotionResult<()> {
        self.limit_reversal(
            LimitSwitch::Forward,
            velocity,
            timeout,
            extra_reversal_time,
            settle_time,
        )
        .await
    }

    /// Back off the low limit and re-trigger it at `velocity`.
    pub async fn low_limit_reversal(
        &self,
        velocity: f64,
        timeout: Option<Duration>,
        extra_reversal_time: Duration,
        settle_time: Duration,
    ) -> MotionResult<()> {
        self.limit_reversal(
            LimitSwitch::Backward,
            velocity,
            timeout,
            extra_reversal_time,
            settle_time,
        )
        .await
    }

    /// Drive onto the limit guarding `switch`.
    #[instrument(skip(self), fields(axis = self.id()))]
    pub async fn move_to_limit(
        &self,
        switch: LimitSwitch,
        velocity: f64,
        timeout: Option<Duration>,
    ) -> MotionResult<()> {
        let channel = self.revalidate().await?;
        if !channel.limit_enabled(switch).await? {
            info!(%switch, "already at limit");
            return Ok(());
        }
        if velocity == 0.0 {
            return Err(self.reject(Rejection::ZeroVelocity));
        }

        self.move_velocity(toward(switch, velocity)).await?;
        info!(%switch, state = ?LimitSeek::SeekingLimit, "seeking limit");

        let race = Race::new(channel, self.timing().poll_interval)
            .limit(switch, false)
            .error()
            .timeout(timeout);
        let outcome = self.await_outcome(race).await?;
        info!(%switch, state = ?LimitSeek::from(outcome), "limit seek finished");
        match outcome {
            Outcome::Limit => Ok(()),
            other => Err(self.outcome_error(other, &format!("seek to {switch}"), timeout)),
        }
    }

    /// Back off the tripped `switch` and re-trigger it at `velocity`.
    #[instrument(skip(self), fields(axis = self.id()))]
    pub async fn limit_reversal(
        &self,
        switch: LimitSwitch,
        velocity: f64,
        timeout: Option<Duration>,
        extra_reversal_time: Duration,
        settle_time: Duration,
    ) -> MotionResult<()> {
        let channel = self.channel()?;
        if velocity == 0.0 {
            return Err(self.reject(Rejection::ZeroVelocity));
        }
        let approach = toward(switch, velocity);
        let poll = self.timing().poll_interval;

        let phase = ReversalPhase::BackingOff;
        self.move_velocity(-approach).await?;
        let race = Race::new(channel, poll)
            .limit(switch, true)
            .error()
            .timeout(timeout);
        match self.await_outcome(race).await? {
            Outcome::Limit => {}
            other => {
                return Err(self.outcome_error(other, &format!("{switch} {phase}"), timeout))
            }
        }
        tokio::time::sleep(extra_reversal_time).await;
        self.stop().await?;

        let phase = ReversalPhase::Reapproaching;
        self.move_velocity(approach).await?;
        let race = Race::new(channel, poll)
            .limit(switch, false)
            .error()
            .timeout(timeout);
        match self.await_outcome(race).await? {
            Outcome::Limit => {}
            other => {
                return Err(self.outcome_error(other, &format!("{switch} {phase}"), timeout))
            }
        }
        tokio::time::sleep(settle_time).await;
        info!(%switch, "limit reversal complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn velocity_sign_follows_switch() {
        assert_eq!(toward(LimitSwitch::Forward, -3.0), 3.0);
        assert_eq!(toward(LimitSwitch::Backward, 3.0), -3.0);
    }

    #[test]
    fn seek_state_from_outcome() {
        assert_eq!(LimitSeek::from(Outcome::Limit), LimitSeek::LimitReached);
        assert_eq!(LimitSeek::from(Outcome::Timeout), LimitSeek::TimedOut);
        assert_eq!(LimitSeek::from(Outcome::Fault), LimitSeek::Faulted);
    }
}
