//! Single-shot debounce timer
//!
//! Each `arm` hands out a fresh cancellation token and cancels the one
//! before it, so an owner never has two live timers. Whoever awaits the
//! armed timer learns whether it fired or was superseded.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

#[derive(Debug)]
pub struct DebounceTimer {
    delay: Duration,
    current: Option<CancellationToken>,
}

impl Default for DebounceTimer {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_DEBOUNCE_MS))
    }
}

impl DebounceTimer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            current: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Start a new countdown, superseding any pending one
    pub fn arm(&mut self) -> ArmedTimer {
        self.cancel();
        let token = CancellationToken::new();
        self.current = Some(token.clone());
        ArmedTimer {
            token,
            delay: self.delay,
        }
    }

    pub fn cancel(&mut self) {
        if let Some(token) = self.current.take() {
            token.cancel();
        }
    }

    /// Whether the latest countdown is still live
    pub fn has_pending(&self) -> bool {
        self.current.as_ref().is_some_and(|t| !t.is_cancelled())
    }
}

impl Drop for DebounceTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// One countdown handed out by [`DebounceTimer::arm`]
#[derive(Debug, Clone)]
pub struct ArmedTimer {
    token: CancellationToken,
    delay: Duration,
}

impl ArmedTimer {
    /// Token cancelled when this countdown is superseded; carry it into the
    /// work the timer triggers so that work can be abandoned too
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait out the delay. `false` means the countdown was cancelled first.
    pub async fn elapsed(&self) -> bool {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => false,
            _ = tokio::time::sleep(self.delay) => !self.token.is_cancelled(),
        }
    }
}
