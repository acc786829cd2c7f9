//! Known RDS error codes and error-code extraction from response bodies.

use super::error::RdsError;
use serde_json::Value;

/// Candidate fields for the error code, in priority order. RDS responses use
/// either spelling depending on the endpoint.
pub const ERROR_CODE_FIELDS: &[&str] = &["error_code", "errCode"];

/// Only `error_code` is consulted on HTTP 500 responses.
pub const SERVER_ERROR_CODE_FIELDS: &[&str] = &["error_code"];

/// SSL configuration changed and the instance is rebooting.
pub const SSL_REBOOTING: &str = "RDS.0005";

/// Sub-API is not offered in this region or plan (HTTP 404).
pub const API_NOT_AVAILABLE: &str = "APIGW.0101";

/// Backend timed out but the operation is still progressing (HTTP 500).
pub const BACKEND_TIMEOUT_IN_PROGRESS: &str = "DBS.111205";

/// Read-only set of error codes meaning "another operation is in progress".
///
/// Presence-only lookup over a static table; safe to share across threads
/// without synchronization.
#[derive(Debug, Clone, Copy)]
pub struct RetryCodeSet {
    name: &'static str,
    codes: &'static [&'static str],
}

impl RetryCodeSet {
    pub const fn new(name: &'static str, codes: &'static [&'static str]) -> Self {
        Self { name, codes }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn codes(&self) -> &'static [&'static str] {
        self.codes
    }

    pub fn contains(&self, code: &str) -> bool {
        self.codes.iter().any(|c| *c == code)
    }
}

/// Instance is busy with another mutating operation (backup, resize, restart,
/// parameter change, ...). Matched on HTTP 400, 403 and 409.
pub const MULTI_OPERATION: RetryCodeSet = RetryCodeSet::new(
    "multi-operation",
    &[
        "DBS.200011",
        "DBS.200018",
        "DBS.200019",
        "DBS.200047",
        "DBS.200076",
        "DBS.200080",
        "DBS.200611",
        "DBS.201015",
        "DBS.201202",
        "DBS.212033",
        "DBS.280011",
        "DBS.280816",
    ],
);

/// Unsubscribe/delete rejected because another operation is being performed.
/// Matched on HTTP 400 by the deletion classifier.
pub const DELETION: RetryCodeSet = RetryCodeSet::new("deletion", &["CBC.99003651"]);

/// Cross-region backup policy is being changed by another request (HTTP 500).
pub const CROSS_REGION_BACKUP: RetryCodeSet =
    RetryCodeSet::new("cross-region-backup", &["DBS.280343"]);

/// All tables, for display.
pub const ALL: &[RetryCodeSet] = &[MULTI_OPERATION, DELETION, CROSS_REGION_BACKUP];

/// Extract the error code from a JSON error body.
///
/// Tries each candidate field in order and returns the first non-empty string.
/// A body that does not parse, or has none of the fields, is an error: callers
/// must never guess a classification from it.
pub fn error_code(body: &str, candidates: &[&str]) -> Result<String, RdsError> {
    let value: Value = serde_json::from_str(body).map_err(RdsError::MalformedBody)?;
    candidates
        .iter()
        .filter_map(|field| value.get(*field).and_then(Value::as_str))
        .find(|code| !code.is_empty())
        .map(str::to_string)
        .ok_or(RdsError::MissingErrorCode)
}
