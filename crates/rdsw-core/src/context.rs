//! Per-call deadline and cancellation.
//!
//! Every orchestrated call gets a `CallContext`. The context carries an
//! optional absolute deadline (the per-operation timeout of the caller) and a
//! shared cancellation token. Sleeps inside the retry and poll loops are
//! sliced so a cancelled call stops within one slice.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Longest single uninterrupted sleep; bounds cancellation latency.
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Stand-in budget when `start + timeout` does not fit in an `Instant`
/// (e.g. `Duration::MAX` passed as "no timeout").
const UNBOUNDED: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// `start + timeout`, saturating to [`UNBOUNDED`] past `start`.
fn deadline_after(start: Instant, timeout: Duration) -> Instant {
    start
        .checked_add(timeout)
        .or_else(|| start.checked_add(UNBOUNDED))
        .unwrap_or(start)
}

/// Returned by [`CallContext::sleep`] when the call was cancelled mid-sleep.
#[derive(Debug, Error)]
#[error("call cancelled")]
pub struct Cancelled;

#[derive(Debug, Clone, Default)]
pub struct CallContext {
    deadline: Option<Instant>,
    cancel: Arc<AtomicBool>,
}

impl CallContext {
    /// A context with no deadline and a fresh cancellation token.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new().deadline(deadline_after(Instant::now(), timeout))
    }

    /// Set the absolute deadline.
    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Share an existing cancellation token (e.g. one flipped by a signal handler).
    pub fn with_token(mut self, token: Arc<AtomicBool>) -> Self {
        self.cancel = token;
        self
    }

    pub fn token(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    pub fn deadline_at(&self) -> Option<Instant> {
        self.deadline
    }

    /// Earlier of the context deadline and `start + timeout`.
    pub fn effective_deadline(&self, start: Instant, timeout: Duration) -> Instant {
        let own = deadline_after(start, timeout);
        match self.deadline {
            Some(d) if d < own => d,
            _ => own,
        }
    }

    /// Sleep for `duration`, waking early (with `Err`) if the call is cancelled.
    pub fn sleep(&self, duration: Duration) -> Result<(), Cancelled> {
        let until = deadline_after(Instant::now(), duration);
        loop {
            if self.is_cancelled() {
                return Err(Cancelled);
            }
            let now = Instant::now();
            if now >= until {
                return Ok(());
            }
            thread::sleep((until - now).min(SLEEP_SLICE));
        }
    }
}
