//! Classify RDS API failures into retry decisions.
//!
//! RDS serializes mutating operations per instance server-side, so a request
//! racing another one fails with one of a handful of documented codes spread
//! over HTTP 400/403/409/500. Every classifier only looks at the code after the
//! status shape matched and the body yielded a code; anything else is a
//! non-retryable error.

use super::codes::{
    self, error_code, RetryCodeSet, API_NOT_AVAILABLE, BACKEND_TIMEOUT_IN_PROGRESS,
    ERROR_CODE_FIELDS, SERVER_ERROR_CODE_FIELDS, SSL_REBOOTING,
};
use super::error::{AttemptError, RdsError};
use crate::transport::ApiFailure;

/// Verdict of a classifier for one attempt.
#[derive(Debug)]
pub enum RetryDecision {
    /// No error; the operation succeeded and must not be repeated.
    Succeeded,
    /// Worth retrying once the instance is free again.
    Retry(RdsError),
    /// Genuine failure, or a body we could not classify.
    Stop(RdsError),
}

impl RetryDecision {
    pub fn is_retryable(&self) -> bool {
        matches!(self, RetryDecision::Retry(_))
    }

    pub fn error(&self) -> Option<&RdsError> {
        match self {
            RetryDecision::Succeeded => None,
            RetryDecision::Retry(e) | RetryDecision::Stop(e) => Some(e),
        }
    }

    /// `(retryable, error)` pair.
    pub fn into_parts(self) -> (bool, Option<RdsError>) {
        match self {
            RetryDecision::Succeeded => (false, None),
            RetryDecision::Retry(e) => (true, Some(e)),
            RetryDecision::Stop(e) => (false, Some(e)),
        }
    }
}

/// Signature shared by the three conflict classifiers.
pub type Classifier = fn(Option<&ApiFailure>) -> RetryDecision;

/// Which conflict classifier to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    MultiOperation,
    Deletion,
    CrossRegionBackup,
}

impl ConflictKind {
    pub fn classifier(self) -> Classifier {
        match self {
            ConflictKind::MultiOperation => classify_multi_operation_conflict,
            ConflictKind::Deletion => classify_deletion_conflict,
            ConflictKind::CrossRegionBackup => classify_cross_region_backup_conflict,
        }
    }

    pub fn classify(self, err: Option<&ApiFailure>) -> RetryDecision {
        (self.classifier())(err)
    }
}

/// Retry when another operation is in progress on the instance.
///
/// - 400 / 403 / 409: `error_code` or `errCode` in the multi-operation set.
/// - 500: `error_code` is `RDS.0005` (SSL change, instance rebooting) or in the set.
pub fn classify_multi_operation_conflict(err: Option<&ApiFailure>) -> RetryDecision {
    let Some(failure) = err else {
        return RetryDecision::Succeeded;
    };
    let matched = match failure {
        ApiFailure::BadRequest { body }
        | ApiFailure::Forbidden { body }
        | ApiFailure::Conflict { body } => {
            code_in_set(body, ERROR_CODE_FIELDS, &codes::MULTI_OPERATION)
        }
        ApiFailure::ServerError { body } => {
            error_code(body, SERVER_ERROR_CODE_FIELDS).map(|code| {
                code == SSL_REBOOTING || codes::MULTI_OPERATION.contains(&code)
            })
        }
        _ => Ok(false),
    };
    decide(failure, matched)
}

/// Retry a delete/unsubscribe blocked by an in-flight operation.
///
/// - 400: code in the deletion set.
/// - 409: code in the multi-operation set.
pub fn classify_deletion_conflict(err: Option<&ApiFailure>) -> RetryDecision {
    let Some(failure) = err else {
        return RetryDecision::Succeeded;
    };
    let matched = match failure {
        ApiFailure::BadRequest { body } => code_in_set(body, ERROR_CODE_FIELDS, &codes::DELETION),
        ApiFailure::Conflict { body } => {
            code_in_set(body, ERROR_CODE_FIELDS, &codes::MULTI_OPERATION)
        }
        _ => Ok(false),
    };
    decide(failure, matched)
}

/// Retry while the cross-region backup policy is busy (500 only).
pub fn classify_cross_region_backup_conflict(err: Option<&ApiFailure>) -> RetryDecision {
    let Some(failure) = err else {
        return RetryDecision::Succeeded;
    };
    let matched = match failure {
        ApiFailure::ServerError { body } => {
            code_in_set(body, SERVER_ERROR_CODE_FIELDS, &codes::CROSS_REGION_BACKUP)
        }
        _ => Ok(false),
    };
    decide(failure, matched)
}

/// 404 with `APIGW.0101`: the sub-API does not exist in this region or plan.
/// Callers fall back to another code path instead of retrying.
pub fn is_not_found_shim(err: &ApiFailure) -> bool {
    match err {
        ApiFailure::NotFound { body } => {
            matches!(error_code(body, ERROR_CODE_FIELDS), Ok(code) if code == API_NOT_AVAILABLE)
        }
        _ => false,
    }
}

/// 500 with `DBS.111205`: the backend timed out but the work is still running.
/// Callers keep waiting instead of failing.
pub fn is_benign_timeout(err: &ApiFailure) -> bool {
    match err {
        ApiFailure::ServerError { body } => matches!(
            error_code(body, SERVER_ERROR_CODE_FIELDS),
            Ok(code) if code == BACKEND_TIMEOUT_IN_PROGRESS
        ),
        _ => false,
    }
}

/// Run a transport result through a classifier, producing the attempt outcome
/// expected by the retry loop.
pub fn classify_attempt<T>(
    result: Result<T, ApiFailure>,
    classifier: Classifier,
) -> Result<T, AttemptError> {
    let failure = match result {
        Ok(value) => return Ok(value),
        Err(failure) => failure,
    };
    match classifier(Some(&failure)) {
        RetryDecision::Retry(e) => Err(AttemptError::Retryable(e)),
        RetryDecision::Stop(e) => Err(AttemptError::Permanent(e)),
        // Classifiers only report success for a missing error.
        RetryDecision::Succeeded => Err(AttemptError::Permanent(RdsError::Api(failure))),
    }
}

fn code_in_set(body: &str, fields: &[&str], set: &RetryCodeSet) -> Result<bool, RdsError> {
    error_code(body, fields).map(|code| set.contains(&code))
}

fn decide(failure: &ApiFailure, matched: Result<bool, RdsError>) -> RetryDecision {
    match matched {
        Ok(true) => RetryDecision::Retry(RdsError::Api(failure.clone())),
        Ok(false) => RetryDecision::Stop(RdsError::Api(failure.clone())),
        Err(e) => RetryDecision::Stop(e),
    }
}
