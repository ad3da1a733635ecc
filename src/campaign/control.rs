//! Pause and cancel signals for a running campaign.
//!
//! Both flags travel in one `tokio::sync::watch` channel. The orchestrators
//! only look at them in [`CampaignControl::checkpoint`], which is called at
//! cycle and step boundaries, never in the middle of a move or a settle.

use crate::error::{MotionError, MotionResult};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Snapshot of the control flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlState {
    /// Hold at the next checkpoint until cleared
    pub paused: bool,
    /// Abort at the next checkpoint
    pub cancelled: bool,
}

/// Cloneable handle shared between the operator and a campaign.
#[derive(Debug, Clone)]
pub struct CampaignControl {
    state: Arc<watch::Sender<ControlState>>,
}

impl Default for CampaignControl {
    fn default() -> Self {
        Self::new()
    }
}

impl CampaignControl {
    /// Running, not cancelled.
    pub fn new() -> Self {
        let (state, _) = watch::channel(ControlState::default());
        Self {
            state: Arc::new(state),
        }
    }

    /// Hold the campaign at its next checkpoint.
    pub fn pause(&self) {
        self.state.send_modify(|s| s.paused = true);
    }

    /// Release a paused campaign.
    pub fn resume(&self) {
        self.state.send_modify(|s| s.paused = false);
    }

    /// Abort the campaign at its next checkpoint.
    pub fn cancel(&self) {
        self.state.send_modify(|s| s.cancelled = true);
    }

    /// Clear both flags before reusing the handle for another campaign.
    pub fn reset(&self) {
        self.state.send_replace(ControlState::default());
    }

    /// Current flags.
    pub fn state(&self) -> ControlState {
        *self.state.borrow()
    }

    /// Whether a pause is requested.
    pub fn is_paused(&self) -> bool {
        self.state().paused
    }

    /// Whether a cancel is requested.
    pub fn is_cancelled(&self) -> bool {
        self.state().cancelled
    }

    /// Receiver for observing flag changes.
    pub fn subscribe(&self) -> watch::Receiver<ControlState> {
        self.state.subscribe()
    }

    /// Block while paused; fail with `Cancelled` once cancelled.
    pub async fn checkpoint(&self) -> MotionResult<()> {
        let mut rx = self.state.subscribe();
        if rx.borrow().paused {
            info!("campaign paused");
        }
        let state = {
            let state = rx
                .wait_for(|s| s.cancelled || !s.paused)
                .await
                .map_err(|_| MotionError::Cancelled)?;
            *state
        };
        if state.cancelled {
            return Err(MotionError::Cancelled);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn checkpoint_passes_when_running() {
        CampaignControl::new().checkpoint().await.unwrap();
    }

    #[tokio::test]
    async fn checkpoint_fails_after_cancel() {
        let control = CampaignControl::new();
        control.cancel();
        assert!(matches!(
            control.checkpoint().await,
            Err(MotionError::Cancelled)
        ));
        control.reset();
        control.checkpoint().await.unwrap();
    }

    #[tokio::test]
    async fn checkpoint_blocks_until_resumed() {
        let control = CampaignControl::new();
        control.pause();
        let waiter = {
            let control = control.clone();
            tokio::spawn(async move { control.checkpoint().await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!waiter.is_finished());
        control.resume();
        waiter.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn cancel_releases_a_paused_checkpoint() {
        let control = CampaignControl::new();
        control.pause();
        let waiter = {
            let control = control.clone();
            tokio::spawn(async move { control.checkpoint().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        control.cancel();
        assert!(matches!(
            waiter.await.unwrap(),
            Err(MotionError::Cancelled)
        ));
    }
}
