//! Retry classification and backoff.
//!
//! This module decides whether a failed RDS call is worth repeating (another
//! operation holds the instance), and drives the retry loop and the composed
//! retry-then-wait primitive that resource code calls for every mutating
//! request.

mod classify;
mod codes;
mod error;
mod policy;
mod run;

pub use classify::{
    classify_attempt, classify_cross_region_backup_conflict, classify_deletion_conflict,
    classify_multi_operation_conflict, is_benign_timeout, is_not_found_shim, Classifier,
    ConflictKind, RetryDecision,
};
pub use codes::{
    error_code, RetryCodeSet, ALL as RETRY_CODE_SETS, CROSS_REGION_BACKUP, DELETION,
    ERROR_CODE_FIELDS, MULTI_OPERATION, SERVER_ERROR_CODE_FIELDS,
};
pub use error::{AttemptError, RdsError};
pub use policy::{Backoff, RetryPolicy};
pub use run::{run_with_retry, run_with_retry_and_wait, Completed, RetryAndWait};
