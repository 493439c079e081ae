//! Progress indicator bracketing a background refresh.

use std::time::Duration;

use tokio::time::Instant;

use crate::types::ProgressState;

/// Shown when a refresh starts and driven to a terminal state when it ends,
/// but never before `min_visible` has elapsed, so fast responses don't flicker.
#[derive(Debug, Clone)]
pub struct ProgressIndicator {
    state: ProgressState,
    started: Option<Instant>,
    min_visible: Duration,
}

impl ProgressIndicator {
    pub fn new(min_visible: Duration) -> Self {
        Self {
            state: ProgressState::Idle,
            started: None,
            min_visible,
        }
    }

    pub fn state(&self) -> ProgressState {
        self.state
    }

    pub fn begin(&mut self) {
        self.state = ProgressState::Running;
        self.started = Some(Instant::now());
    }

    /// Time still to wait before the indicator may leave `Running`.
    pub fn remaining(&self) -> Duration {
        match self.started {
            Some(started) => self.min_visible.saturating_sub(started.elapsed()),
            None => Duration::ZERO,
        }
    }

    /// Wait out the minimum visible duration, then settle.
    pub async fn finish(&mut self, success: bool) {
        let remaining = self.remaining();
        if !remaining.is_zero() {
            tokio::time::sleep(remaining).await;
        }
        self.started = None;
        self.state = if success {
            ProgressState::Done
        } else {
            ProgressState::Failed
        };
    }
}
