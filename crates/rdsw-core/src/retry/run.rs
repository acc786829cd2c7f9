//! Retry loop and the composed retry-then-wait primitive.

use super::error::{AttemptError, RdsError};
use super::policy::{Backoff, RetryPolicy};
use crate::context::CallContext;
use crate::keyed_lock::{KeyedGuard, KeyedLock};
use crate::wait::{poll_until, sleep_within, Refreshed, WaitError, WaitSpec};
use std::time::{Duration, Instant};

/// A guarded operation plus the wait that follows it.
pub struct RetryAndWait<R, W> {
    /// One attempt of the operation, already classified.
    pub retry: R,
    /// Refresh probe of the resource the operation changes.
    pub wait: W,
    /// Target states, timings and the overall budget of the call.
    pub spec: WaitSpec,
    pub policy: RetryPolicy,
    /// After a retryable attempt, wait for a target state before trying again
    /// instead of sleeping for the backoff delay.
    pub settle_before_retry: bool,
    /// Hold this key in [`KeyedLock::global`] for the whole call.
    pub lock_key: Option<String>,
}

impl<R, W> RetryAndWait<R, W> {
    pub fn new(retry: R, wait: W, spec: WaitSpec) -> Self {
        Self {
            retry,
            wait,
            spec,
            policy: RetryPolicy::default(),
            settle_before_retry: false,
            lock_key: None,
        }
    }

    pub fn policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn settle_before_retry(mut self) -> Self {
        self.settle_before_retry = true;
        self
    }

    pub fn lock_key(mut self, key: impl Into<String>) -> Self {
        self.lock_key = Some(key.into());
        self
    }
}

/// Successful result of [`run_with_retry_and_wait`].
#[derive(Debug, Clone, PartialEq)]
pub struct Completed<T, P> {
    /// What the guarded operation returned.
    pub response: T,
    /// Payload of the probe that saw the target state.
    pub refreshed: P,
    /// The target state that ended the wait.
    pub state: String,
}

/// Runs a closure until it succeeds, fails permanently, or the budget runs out.
/// On a retryable failure, sleeps for the backoff delay then tries again.
pub fn run_with_retry<T, R>(
    ctx: &CallContext,
    policy: &RetryPolicy,
    timeout: Duration,
    mut retry: R,
) -> Result<T, WaitError>
where
    R: FnMut() -> Result<T, AttemptError>,
{
    let start = Instant::now();
    let deadline = ctx.effective_deadline(start, timeout);
    retry_loop(ctx, policy, start, deadline, &mut retry, |delay| {
        ctx.sleep(delay)?;
        Ok(())
    })
}

/// Retry the operation through conflicts, then poll until the resource reaches
/// a target state. Both phases share `spec.timeout` (and the context deadline).
pub fn run_with_retry_and_wait<T, P, R, W>(
    ctx: &CallContext,
    params: RetryAndWait<R, W>,
) -> Result<Completed<T, P>, WaitError>
where
    R: FnMut() -> Result<T, AttemptError>,
    W: FnMut() -> Result<Refreshed<P>, RdsError>,
{
    let RetryAndWait {
        mut retry,
        mut wait,
        spec,
        policy,
        settle_before_retry,
        lock_key,
    } = params;

    let start = Instant::now();
    let deadline = ctx.effective_deadline(start, spec.timeout);
    let _guard = match lock_key.as_deref() {
        Some(key) => Some(acquire(ctx, key, start, deadline)?),
        None => None,
    };

    let response = if settle_before_retry {
        // Back off even when the resource already reports a target state.
        retry_loop(ctx, &policy, start, deadline, &mut retry, |delay| {
            sleep_within(ctx, delay, deadline)?;
            poll_until(ctx, &spec, start, deadline, &mut wait).map(|_| ())
        })?
    } else {
        retry_loop(ctx, &policy, start, deadline, &mut retry, |delay| {
            ctx.sleep(delay)?;
            Ok(())
        })?
    };

    let refreshed = poll_until(ctx, &spec, start, deadline, &mut wait)?;
    Ok(Completed {
        response,
        refreshed: refreshed.payload,
        state: refreshed.state,
    })
}

/// `between` runs after each retryable attempt with the backoff delay; a
/// `StateTimeout` from it means the budget ran out while the instance was busy.
fn retry_loop<T, R, B>(
    ctx: &CallContext,
    policy: &RetryPolicy,
    start: Instant,
    deadline: Instant,
    retry: &mut R,
    mut between: B,
) -> Result<T, WaitError>
where
    R: FnMut() -> Result<T, AttemptError>,
    B: FnMut(Duration) -> Result<(), WaitError>,
{
    let mut attempt = 1u32;
    loop {
        if ctx.is_cancelled() {
            return Err(WaitError::Cancelled);
        }
        let last = match retry() {
            Ok(value) => {
                tracing::debug!(attempt, "operation accepted");
                return Ok(value);
            }
            Err(AttemptError::Permanent(e)) => {
                tracing::debug!(attempt, error = %e, "operation failed");
                return Err(WaitError::Operation(e));
            }
            Err(AttemptError::Retryable(e)) => e,
        };

        let remaining = deadline.saturating_duration_since(Instant::now());
        let delay = match policy.next(attempt, remaining) {
            Backoff::Exhausted => return Err(retry_timeout(attempt, start, deadline, last)),
            Backoff::After(d) => d,
        };
        tracing::warn!(
            attempt,
            error = %last,
            backoff_ms = delay.as_millis() as u64,
            "instance busy with another operation; retrying"
        );
        match between(delay) {
            Ok(()) => {}
            Err(WaitError::StateTimeout { .. }) => {
                return Err(retry_timeout(attempt, start, deadline, last))
            }
            Err(other) => return Err(other),
        }
        if Instant::now() >= deadline {
            return Err(retry_timeout(attempt, start, deadline, last));
        }
        attempt += 1;
    }
}

/// Take `key` in the global registry within the call's budget.
fn acquire(
    ctx: &CallContext,
    key: &str,
    start: Instant,
    deadline: Instant,
) -> Result<KeyedGuard, WaitError> {
    match KeyedLock::global().lock_until(key, deadline, || ctx.is_cancelled()) {
        Some(guard) => Ok(guard),
        None if ctx.is_cancelled() => Err(WaitError::Cancelled),
        None => Err(WaitError::LockTimeout {
            key: key.to_string(),
            timeout: deadline.saturating_duration_since(start),
        }),
    }
}

fn retry_timeout(attempts: u32, start: Instant, deadline: Instant, last: RdsError) -> WaitError {
    WaitError::RetryTimeout {
        attempts,
        timeout: deadline.saturating_duration_since(start),
        last,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::{classify_attempt, classify_multi_operation_conflict};
    use crate::transport::ApiFailure;
    use std::cell::Cell;

    fn busy() -> ApiFailure {
        ApiFailure::from_status(409, r#"{"error_code":"DBS.200018"}"#)
    }

    fn quick_policy() -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
        }
    }

    fn fast_spec(timeout_ms: u64) -> WaitSpec {
        WaitSpec::new(["ACTIVE"], Duration::from_millis(timeout_ms))
            .poll_interval(Duration::from_millis(5))
    }

    #[test]
    fn retries_until_conflict_clears() {
        let ctx = CallContext::new();
        let calls = Cell::new(0);
        let out = run_with_retry(&ctx, &quick_policy(), Duration::from_secs(5), || {
            calls.set(calls.get() + 1);
            let res = if calls.get() < 3 { Err(busy()) } else { Ok("job-1") };
            classify_attempt(res, classify_multi_operation_conflict)
        })
        .unwrap();
        assert_eq!(out, "job-1");
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn permanent_error_returns_immediately() {
        let ctx = CallContext::new();
        let calls = Cell::new(0);
        let err = run_with_retry::<(), _>(&ctx, &quick_policy(), Duration::from_secs(5), || {
            calls.set(calls.get() + 1);
            classify_attempt(
                Err(ApiFailure::from_status(403, r#"{"error_code":"IAM.0002"}"#)),
                classify_multi_operation_conflict,
            )
        })
        .unwrap_err();
        assert_eq!(calls.get(), 1);
        assert!(matches!(err, WaitError::Operation(RdsError::Api(ApiFailure::Forbidden { .. }))));
    }

    #[test]
    fn always_retryable_times_out_within_budget() {
        let ctx = CallContext::new();
        let start = Instant::now();
        let err = run_with_retry::<(), _>(&ctx, &quick_policy(), Duration::from_millis(150), || {
            classify_attempt(Err(busy()), classify_multi_operation_conflict)
        })
        .unwrap_err();
        let elapsed = start.elapsed();
        assert!(matches!(err, WaitError::RetryTimeout { .. }));
        assert!(elapsed >= Duration::from_millis(150));
        assert!(elapsed < Duration::from_millis(1_000), "took {elapsed:?}");
    }

    #[test]
    fn success_then_target_state() {
        let ctx = CallContext::new();
        let params = RetryAndWait::new(
            || Ok::<_, AttemptError>("accepted"),
            || Ok(Refreshed::new(42u32, "ACTIVE")),
            fast_spec(5_000),
        );
        let start = Instant::now();
        let done = run_with_retry_and_wait(&ctx, params).unwrap();
        assert_eq!(done.response, "accepted");
        assert_eq!(done.refreshed, 42);
        assert_eq!(done.state, "ACTIVE");
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn succeeded_but_never_settled_is_a_state_timeout() {
        let ctx = CallContext::new();
        let params = RetryAndWait::new(
            || Ok::<_, AttemptError>(()),
            || Ok(Refreshed::new((), "MODIFYING")),
            fast_spec(100),
        );
        let err = run_with_retry_and_wait(&ctx, params).unwrap_err();
        assert!(matches!(err, WaitError::StateTimeout { .. }));
    }

    #[test]
    fn terminal_wait_state_is_an_error_not_a_timeout() {
        let ctx = CallContext::new();
        let params = RetryAndWait::new(
            || Ok::<_, AttemptError>(()),
            || Ok(Refreshed::new((), "Failed")),
            fast_spec(10_000).failure(["Failed"]),
        );
        let start = Instant::now();
        let err = run_with_retry_and_wait(&ctx, params).unwrap_err();
        assert!(matches!(err, WaitError::TerminalState { .. }));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn settle_mode_waits_for_target_between_attempts() {
        let ctx = CallContext::new();
        let attempts = Cell::new(0);
        let probes = Cell::new(0);
        let params = RetryAndWait::new(
            || {
                attempts.set(attempts.get() + 1);
                let res = if attempts.get() == 1 { Err(busy()) } else { Ok(()) };
                classify_attempt(res, classify_multi_operation_conflict)
            },
            || {
                probes.set(probes.get() + 1);
                let state = if probes.get() % 2 == 1 { "BACKING UP" } else { "ACTIVE" };
                Ok(Refreshed::new(probes.get(), state))
            },
            fast_spec(5_000),
        )
        .policy(quick_policy())
        .settle_before_retry();
        let done = run_with_retry_and_wait(&ctx, params).unwrap();
        assert_eq!(attempts.get(), 2);
        // Two probes to settle, two more after the accepted attempt.
        assert_eq!(done.refreshed, 4);
    }

    #[test]
    fn settle_mode_budget_exhaustion_reports_retry_timeout() {
        let ctx = CallContext::new();
        let params = RetryAndWait::new(
            || classify_attempt::<()>(Err(busy()), classify_multi_operation_conflict),
            || Ok(Refreshed::new((), "BACKING UP")),
            fast_spec(100),
        )
        .policy(quick_policy())
        .settle_before_retry();
        let err = run_with_retry_and_wait(&ctx, params).unwrap_err();
        assert!(matches!(err, WaitError::RetryTimeout { .. }));
    }

    #[test]
    fn settle_mode_still_backs_off_when_already_settled() {
        let ctx = CallContext::new();
        let attempts = Cell::new(0u32);
        let params = RetryAndWait::new(
            || {
                attempts.set(attempts.get() + 1);
                classify_attempt::<()>(Err(busy()), classify_multi_operation_conflict)
            },
            || Ok(Refreshed::new((), "ACTIVE")),
            fast_spec(200),
        )
        .policy(RetryPolicy {
            base_delay: Duration::from_millis(20),
            max_delay: Duration::from_millis(40),
        })
        .settle_before_retry();
        let err = run_with_retry_and_wait(&ctx, params).unwrap_err();
        assert!(matches!(err, WaitError::RetryTimeout { .. }));
        // 20ms, then 40ms per retry: at most a handful fit in 200ms.
        assert!(attempts.get() <= 8, "{} attempts", attempts.get());
    }

    #[test]
    fn never_accepted_operation_is_a_retry_timeout() {
        let ctx = CallContext::new();
        let probes = Cell::new(0u32);
        let params = RetryAndWait::new(
            || classify_attempt::<()>(Err(busy()), classify_multi_operation_conflict),
            || {
                probes.set(probes.get() + 1);
                Ok(Refreshed::new((), "ACTIVE"))
            },
            fast_spec(150),
        )
        .policy(quick_policy());
        let start = Instant::now();
        let err = run_with_retry_and_wait(&ctx, params).unwrap_err();
        let elapsed = start.elapsed();
        assert!(
            matches!(err, WaitError::RetryTimeout { attempts, .. } if attempts > 1),
            "{err:?}"
        );
        assert!(elapsed >= Duration::from_millis(150));
        assert!(elapsed < Duration::from_millis(1_000), "took {elapsed:?}");
        assert_eq!(probes.get(), 0);
    }

    #[test]
    fn unbounded_timeout_does_not_overflow() {
        let ctx = CallContext::new();
        let params = RetryAndWait::new(
            || Ok::<_, AttemptError>(()),
            || Ok(Refreshed::new((), "ACTIVE")),
            WaitSpec::new(["ACTIVE"], Duration::MAX),
        );
        let done = run_with_retry_and_wait(&ctx, params).unwrap();
        assert_eq!(done.state, "ACTIVE");
    }

    #[test]
    fn lock_wait_counts_against_the_budget() {
        let key = "run-test-lock-budget";
        let holder = KeyedLock::global().lock(key);
        let release = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(600));
            drop(holder);
        });

        let ctx = CallContext::with_timeout(Duration::from_millis(100));
        let attempts = Cell::new(0u32);
        let params = RetryAndWait::new(
            || {
                attempts.set(attempts.get() + 1);
                Ok::<_, AttemptError>(())
            },
            || Ok(Refreshed::new((), "ACTIVE")),
            fast_spec(100),
        )
        .lock_key(key);
        let start = Instant::now();
        let err = run_with_retry_and_wait(&ctx, params).unwrap_err();
        let elapsed = start.elapsed();
        assert!(matches!(err, WaitError::LockTimeout { .. }), "{err:?}");
        assert!(err.is_timeout());
        assert!(elapsed < Duration::from_millis(400), "took {elapsed:?}");
        assert_eq!(attempts.get(), 0);
        release.join().unwrap();
    }

    #[test]
    fn cancel_while_waiting_for_lock() {
        let key = "run-test-lock-cancel";
        let holder = KeyedLock::global().lock(key);
        let ctx = CallContext::new();
        let token = ctx.token();
        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(60));
            token.store(true, std::sync::atomic::Ordering::Relaxed);
        });
        let params = RetryAndWait::new(
            || Ok::<_, AttemptError>(()),
            || Ok(Refreshed::new((), "ACTIVE")),
            fast_spec(30_000),
        )
        .lock_key(key);
        let start = Instant::now();
        let err = run_with_retry_and_wait(&ctx, params).unwrap_err();
        assert!(matches!(err, WaitError::Cancelled), "{err:?}");
        assert!(start.elapsed() < Duration::from_secs(2));
        canceller.join().unwrap();
        drop(holder);
    }

    #[test]
    fn cancelled_context_aborts_retry_loop() {
        let ctx = CallContext::new();
        let token = ctx.token();
        let calls = Cell::new(0);
        let err = run_with_retry::<(), _>(&ctx, &quick_policy(), Duration::from_secs(30), || {
            calls.set(calls.get() + 1);
            if calls.get() == 2 {
                token.store(true, std::sync::atomic::Ordering::Relaxed);
            }
            classify_attempt(Err(busy()), classify_multi_operation_conflict)
        })
        .unwrap_err();
        assert!(matches!(err, WaitError::Cancelled));
    }

    #[test]
    fn lock_key_is_released_after_the_call() {
        let ctx = CallContext::new();
        let key = "run-test-instance-lock";
        let params = RetryAndWait::new(
            || Ok::<_, AttemptError>(()),
            || Ok(Refreshed::new((), "ACTIVE")),
            fast_spec(1_000),
        )
        .lock_key(key);
        run_with_retry_and_wait(&ctx, params).unwrap();
        assert!(KeyedLock::global().try_lock(key).is_some());
    }
}
