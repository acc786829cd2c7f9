//! Failures of the retry and poll loops.

use crate::retry::RdsError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WaitError {
    /// Every attempt was rejected as retryable until the budget ran out.
    #[error("operation did not succeed after {attempts} attempt(s) within {timeout:?}: {last}")]
    RetryTimeout {
        attempts: u32,
        timeout: Duration,
        #[source]
        last: RdsError,
    },
    /// The operation succeeded (or nothing was attempted) but the resource
    /// never reached a target state.
    #[error(
        "timeout while waiting for state to become '{}' (last state: '{}', timeout: {:?})",
        .target.join(", "),
        .last_state,
        .timeout
    )]
    StateTimeout {
        target: Vec<String>,
        last_state: String,
        timeout: Duration,
    },
    /// Another call held the resource's lock key for the whole budget.
    #[error("timeout while waiting for lock '{key}' (timeout: {timeout:?})")]
    LockTimeout { key: String, timeout: Duration },
    /// A state outside the pending and target sets showed up.
    #[error("unexpected state '{}', wanted target '{}'", .state, .target.join(", "))]
    UnexpectedState { state: String, target: Vec<String> },
    /// The resource reported a terminal failure state.
    #[error("resource entered terminal state '{state}'")]
    TerminalState { state: String },
    /// Non-retryable failure of the guarded operation, verbatim.
    #[error(transparent)]
    Operation(RdsError),
    /// The refresh function failed.
    #[error("error refreshing state: {0}")]
    Refresh(#[source] RdsError),
    #[error("call cancelled")]
    Cancelled,
}

impl WaitError {
    /// True for every kind of timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            WaitError::RetryTimeout { .. }
                | WaitError::StateTimeout { .. }
                | WaitError::LockTimeout { .. }
        )
    }
}

impl From<crate::context::Cancelled> for WaitError {
    fn from(_: crate::context::Cancelled) -> Self {
        WaitError::Cancelled
    }
}
