//! Outcome race over axis status flags.
//!
//! Every wait on the controller is expressed as a race: a set of watchers,
//! each polling one status flag, plus an optional timeout. The first member
//! to resolve decides the outcome. Every other member is then cancelled and
//! joined before [`Race::run`] returns, so no polling outlives the call.
//!
//! # Example
//!
//! ```rust,ignore
//! let outcome = Race::new(&channel, Duration::from_millis(10))
//!     .done()
//!     .error()
//!     .limit(LimitSwitch::Forward, false)
//!     .timeout(Some(Duration::from_secs(30)))
//!     .run()
//!     .await?;
//! ```

use crate::axis::{AxisChannel, LimitSwitch};
use crate::error::{MotionError, MotionResult};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::debug;

/// Which race member resolved first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// `bDone` went true
    Done,
    /// `bError` went true
    Fault,
    /// The watched limit flag reached its target state
    Limit,
    /// The timeout elapsed first
    Timeout,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Outcome::Done => "done",
            Outcome::Fault => "fault",
            Outcome::Limit => "limit",
            Outcome::Timeout => "timeout",
        };
        f.write_str(name)
    }
}

/// Condition under which a flag watcher fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Fires on a false to true transition. The flag is assumed low before
    /// the first sample, since the controller clears done/error on execute.
    Rising,
    /// Fires as soon as the flag equals the given state.
    Level(bool),
}

/// Poll `read` every `interval` until `trigger` fires or `cancel` turns true.
///
/// Returns `Ok(true)` when the trigger fired and `Ok(false)` when cancelled.
/// A cancellation request takes effect within one poll interval.
pub async fn watch_flag<F, Fut>(
    mut read: F,
    trigger: Trigger,
    interval: Duration,
    mut cancel: watch::Receiver<bool>,
) -> MotionResult<bool>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = MotionResult<bool>>,
{
    let mut previous = false;
    loop {
        if *cancel.borrow() {
            return Ok(false);
        }
        let value = read().await?;
        let fired = match trigger {
            Trigger::Rising => value && !previous,
            Trigger::Level(target) => value == target,
        };
        if fired {
            return Ok(true);
        }
        previous = value;

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            changed = cancel.changed() => {
                if changed.is_err() || *cancel.borrow() {
                    return Ok(false);
                }
            }
        }
    }
}

/// Builder for a first-of race over one axis.
#[derive(Debug, Clone)]
pub struct Race {
    channel: AxisChannel,
    poll_interval: Duration,
    done: bool,
    error: bool,
    limit: Option<(LimitSwitch, bool)>,
    timeout: Option<Duration>,
}

impl Race {
    /// Empty race polling `channel` every `poll_interval`.
    pub fn new(channel: &AxisChannel, poll_interval: Duration) -> Self {
        Self {
            channel: channel.clone(),
            poll_interval,
            done: false,
            error: false,
            limit: None,
            timeout: None,
        }
    }

    /// Add a watcher for `bDone` going true.
    pub fn done(mut self) -> Self {
        self.done = true;
        self
    }

    /// Add a watcher for `bError` going true.
    pub fn error(mut self) -> Self {
        self.error = true;
        self
    }

    /// Add a watcher for a limit-enabled flag reaching `target_state`.
    pub fn limit(mut self, switch: LimitSwitch, target_state: bool) -> Self {
        self.limit = Some((switch, target_state));
        self
    }

    /// Add a timeout member. `None` leaves the race unbounded.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the race to its first outcome.
    pub async fn run(self) -> MotionResult<Outcome> {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let mut members: JoinSet<MotionResult<Option<Outcome>>> = JoinSet::new();
        let interval = self.poll_interval;

        if self.done {
            let channel = self.channel.clone();
            let cancel = cancel_rx.clone();
            members.spawn(async move {
                let fired = watch_flag(|| channel.done(), Trigger::Rising, interval, cancel).await?;
                Ok(fired.then_some(Outcome::Done))
            });
        }

        if self.error {
            let channel = self.channel.clone();
            let cancel = cancel_rx.clone();
            members.spawn(async move {
                let fired =
                    watch_flag(|| channel.error(), Trigger::Rising, interval, cancel).await?;
                Ok(fired.then_some(Outcome::Fault))
            });
        }

        if let Some((switch, target)) = self.limit {
            let channel = self.channel.clone();
            let cancel = cancel_rx.clone();
            members.spawn(async move {
                let fired = watch_flag(
                    || channel.limit_enabled(switch),
                    Trigger::Level(target),
                    interval,
                    cancel,
                )
                .await?;
                Ok(fired.then_some(Outcome::Limit))
            });
        }

        if let Some(after) = self.timeout {
            let mut cancel = cancel_rx.clone();
            members.spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(after) => Ok(Some(Outcome::Timeout)),
                    _ = cancel.changed() => Ok(None),
                }
            });
        }

        if members.is_empty() {
            return Err(MotionError::Race("race has no members".into()));
        }

        let first = members.join_next().await;
        cancel_tx.send_replace(true);
        while members.join_next().await.is_some() {}

        let outcome = match first {
            Some(Ok(Ok(Some(outcome)))) => Ok(outcome),
            Some(Ok(Ok(None))) => Err(MotionError::Race(
                "watcher stopped before any outcome".into(),
            )),
            Some(Ok(Err(err))) => Err(err),
            Some(Err(join_err)) => Err(MotionError::Race(join_err.to_string())),
            None => Err(MotionError::Race("race has no members".into())),
        };
        debug!(axis = self.channel.axis(), outcome = ?outcome.as_ref().ok(), "race resolved");
        outcome
    }
}
