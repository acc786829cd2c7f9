//! Poll a refresh function until the resource reaches a target state.

use super::error::WaitError;
use super::spec::{Refreshed, WaitSpec};
use crate::context::CallContext;
use crate::retry::{is_benign_timeout, RdsError, RetryPolicy};
use std::time::{Duration, Instant};

/// Wait on its own, with the budget starting now.
///
/// Used for job completion and deletion waits, where there is no guarded
/// operation to retry first.
pub fn wait_for_state<P, W>(
    ctx: &CallContext,
    spec: &WaitSpec,
    mut refresh: W,
) -> Result<Refreshed<P>, WaitError>
where
    W: FnMut() -> Result<Refreshed<P>, RdsError>,
{
    let start = Instant::now();
    let deadline = ctx.effective_deadline(start, spec.timeout);
    poll_until(ctx, spec, start, deadline, &mut refresh)
}

/// Poll loop shared by [`wait_for_state`] and the orchestrator.
///
/// `start`/`deadline` belong to the owning call, so an orchestrated wait only
/// gets what the retry phase left over.
pub(crate) fn poll_until<P, W>(
    ctx: &CallContext,
    spec: &WaitSpec,
    start: Instant,
    deadline: Instant,
    refresh: &mut W,
) -> Result<Refreshed<P>, WaitError>
where
    W: FnMut() -> Result<Refreshed<P>, RdsError>,
{
    sleep_within(ctx, spec.delay, deadline)?;

    let polling = RetryPolicy::default_polling();
    let mut last_state = String::new();
    let mut polls = 0u32;
    loop {
        if ctx.is_cancelled() {
            return Err(WaitError::Cancelled);
        }
        polls += 1;
        match refresh() {
            Ok(refreshed) => {
                tracing::debug!(state = %refreshed.state, poll = polls, "refreshed state");
                if spec.is_target(&refreshed.state) {
                    tracing::info!(
                        state = %refreshed.state,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "target state reached"
                    );
                    return Ok(refreshed);
                }
                if spec.is_failure(&refreshed.state) {
                    return Err(WaitError::TerminalState {
                        state: refreshed.state,
                    });
                }
                if !spec.allows(&refreshed.state) {
                    return Err(WaitError::UnexpectedState {
                        state: refreshed.state,
                        target: spec.target.clone(),
                    });
                }
                last_state = refreshed.state;
            }
            // The backend gave up on the query but the work goes on; treat as pending.
            Err(RdsError::Api(ref failure)) if is_benign_timeout(failure) => {
                tracing::debug!(poll = polls, "backend timeout while refreshing; still waiting");
            }
            Err(e) => return Err(WaitError::Refresh(e)),
        }

        if Instant::now() >= deadline {
            return Err(WaitError::StateTimeout {
                target: spec.target.clone(),
                last_state,
                timeout: deadline.saturating_duration_since(start),
            });
        }
        let interval = if spec.poll_interval.is_zero() {
            polling.delay_for(polls)
        } else {
            spec.poll_interval
        };
        sleep_within(ctx, interval, deadline)?;
    }
}

/// Sleep for `duration`, but never past `deadline`.
pub(crate) fn sleep_within(
    ctx: &CallContext,
    duration: Duration,
    deadline: Instant,
) -> Result<(), WaitError> {
    let remaining = deadline.saturating_duration_since(Instant::now());
    ctx.sleep(duration.min(remaining))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ApiFailure;
    use std::collections::VecDeque;

    fn scripted(
        states: &[&str],
    ) -> impl FnMut() -> Result<Refreshed<u32>, RdsError> {
        let mut queue: VecDeque<String> = states.iter().map(|s| s.to_string()).collect();
        let mut calls = 0u32;
        move || {
            calls += 1;
            let state = if queue.len() > 1 {
                queue.pop_front().unwrap()
            } else {
                queue.front().cloned().unwrap()
            };
            Ok(Refreshed::new(calls, state))
        }
    }

    fn fast(target: &[&str], timeout_ms: u64) -> WaitSpec {
        WaitSpec::new(target.iter().copied(), Duration::from_millis(timeout_ms))
            .poll_interval(Duration::from_millis(5))
    }

    #[test]
    fn reaches_target_after_pending_states() {
        let ctx = CallContext::new();
        let spec = fast(&["ACTIVE"], 2_000).pending(["BUILD", "MODIFYING"]);
        let done = wait_for_state(&ctx, &spec, scripted(&["BUILD", "MODIFYING", "ACTIVE"])).unwrap();
        assert_eq!(done.state, "ACTIVE");
        assert_eq!(done.payload, 3);
    }

    #[test]
    fn terminal_state_fails_fast() {
        let ctx = CallContext::new();
        let spec = fast(&["Completed"], 10_000).failure(["Failed"]);
        let start = Instant::now();
        let err = wait_for_state(&ctx, &spec, scripted(&["Running", "Failed"])).unwrap_err();
        assert!(matches!(err, WaitError::TerminalState { ref state } if state == "Failed"));
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn state_outside_pending_is_unexpected() {
        let ctx = CallContext::new();
        let spec = fast(&["Completed"], 10_000).pending(["Running"]);
        let err = wait_for_state(&ctx, &spec, scripted(&["Running", "Failed"])).unwrap_err();
        assert!(matches!(err, WaitError::UnexpectedState { ref state, .. } if state == "Failed"));
    }

    #[test]
    fn times_out_with_last_state() {
        let ctx = CallContext::new();
        let spec = fast(&["ACTIVE"], 100);
        let start = Instant::now();
        let err = wait_for_state(&ctx, &spec, scripted(&["BACKING UP"])).unwrap_err();
        assert!(start.elapsed() < Duration::from_secs(2));
        match err {
            WaitError::StateTimeout { last_state, .. } => assert_eq!(last_state, "BACKING UP"),
            other => panic!("expected StateTimeout, got {other:?}"),
        }
    }

    #[test]
    fn refresh_error_aborts() {
        let ctx = CallContext::new();
        let spec = fast(&["ACTIVE"], 10_000);
        let err = wait_for_state::<(), _>(&ctx, &spec, || {
            Err(RdsError::refresh("the instance status is: FAILED"))
        })
        .unwrap_err();
        assert!(matches!(err, WaitError::Refresh(_)));
    }

    #[test]
    fn benign_timeout_keeps_polling() {
        let ctx = CallContext::new();
        let spec = fast(&["ACTIVE"], 2_000);
        let mut calls = 0;
        let done = wait_for_state(&ctx, &spec, || {
            calls += 1;
            if calls < 3 {
                Err(RdsError::Api(ApiFailure::from_status(
                    500,
                    r#"{"error_code":"DBS.111205"}"#,
                )))
            } else {
                Ok(Refreshed::new((), "ACTIVE"))
            }
        })
        .unwrap();
        assert_eq!(done.state, "ACTIVE");
        assert_eq!(calls, 3);
    }

    #[test]
    fn cancellation_stops_the_wait() {
        let ctx = CallContext::new();
        ctx.cancel();
        let spec = fast(&["ACTIVE"], 10_000);
        let err = wait_for_state(&ctx, &spec, scripted(&["BUILD"])).unwrap_err();
        assert!(matches!(err, WaitError::Cancelled));
    }

    #[test]
    fn context_deadline_shortens_the_budget() {
        let ctx = CallContext::with_timeout(Duration::from_millis(80));
        let spec = fast(&["ACTIVE"], 60_000);
        let start = Instant::now();
        let err = wait_for_state(&ctx, &spec, scripted(&["BUILD"])).unwrap_err();
        assert!(err.is_timeout());
        assert!(start.elapsed() < Duration::from_secs(2));
    }
}
