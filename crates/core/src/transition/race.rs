//! First-claimant-wins race primitive for competing end-of-playback signals.
//!
//! Waiting for "end" can be satisfied by the page's ended report or by the
//! tab being closed before the page could report. Both paths share one
//! handled guard so only the first to fire performs a transition; a bounded
//! timer participates purely for cleanup.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::AbortHandle;
use tracing::debug;

/// Shared "already handled" guard.
#[derive(Debug, Default)]
pub struct RaceGuard {
    handled: AtomicBool,
}

impl RaceGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true exactly once, for the first claimant.
    pub fn try_claim(&self) -> bool {
        !self.handled.swap(true, Ordering::SeqCst)
    }

    pub fn is_handled(&self) -> bool {
        self.handled.load(Ordering::SeqCst)
    }
}

/// One armed wait-for-end race: two external completion paths plus a cleanup
/// timer, all sharing a [`RaceGuard`].
pub struct EndWatch {
    guard: Arc<RaceGuard>,
    timer: AbortHandle,
}

impl EndWatch {
    /// Arms the race. On timeout the guard is claimed without any transition,
    /// so late signals become no-ops.
    pub fn start(timeout: Duration) -> Self {
        let guard = Arc::new(RaceGuard::new());
        let timer_guard = Arc::clone(&guard);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if timer_guard.try_claim() {
                debug!(target: "tp.transition", "wait-for-end timed out; deregistering without transition");
            }
        })
        .abort_handle();
        Self { guard, timer }
    }

    /// Claims the race for a completion path. The winner also cancels the
    /// cleanup timer.
    pub fn try_claim(&self) -> bool {
        let won = self.guard.try_claim();
        if won {
            self.timer.abort();
        }
        won
    }

    pub fn is_handled(&self) -> bool {
        self.guard.is_handled()
    }
}

impl Drop for EndWatch {
    fn drop(&mut self) {
        self.timer.abort();
    }
}
