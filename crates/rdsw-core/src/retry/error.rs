//! Error types shared by the classifiers and the retry loop.

use crate::transport::ApiFailure;
use std::fmt;
use thiserror::Error;

/// Error produced while classifying or refreshing an RDS resource.
#[derive(Debug, Error)]
pub enum RdsError {
    /// The API call itself failed; carried through verbatim.
    #[error(transparent)]
    Api(#[from] ApiFailure),
    /// The error body was not valid JSON.
    #[error("unmarshal the response body failed: {0}")]
    MalformedBody(#[source] serde_json::Error),
    /// The body parsed, but none of the expected error-code fields were present.
    #[error("unable to find error code from the API response")]
    MissingErrorCode,
    /// A refresh function rejected the payload it received.
    #[error("{0}")]
    Refresh(String),
}

impl RdsError {
    pub fn refresh(message: impl Into<String>) -> Self {
        RdsError::Refresh(message.into())
    }

    /// The underlying API failure, if this error wraps one.
    pub fn api(&self) -> Option<&ApiFailure> {
        match self {
            RdsError::Api(f) => Some(f),
            _ => None,
        }
    }
}

/// Outcome of one failed attempt of a guarded operation.
///
/// Used so the retry loop can decide between backing off and giving up
/// before the error is surfaced to the caller.
#[derive(Debug)]
pub enum AttemptError {
    /// Another operation holds the instance; try again later.
    Retryable(RdsError),
    /// Give up immediately.
    Permanent(RdsError),
}

impl AttemptError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, AttemptError::Retryable(_))
    }

    pub fn into_inner(self) -> RdsError {
        match self {
            AttemptError::Retryable(e) | AttemptError::Permanent(e) => e,
        }
    }
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptError::Retryable(e) => write!(f, "retryable: {}", e),
            AttemptError::Permanent(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for AttemptError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AttemptError::Retryable(e) | AttemptError::Permanent(e) => Some(e),
        }
    }
}
