//! Rewrite documented "already gone" errors into `NotFound`.
//!
//! Some RDS endpoints report a vanished sub-resource as 400 or 409 with a
//! specific code. Read and delete paths convert those into `NotFound` so the
//! caller can treat the resource as deleted.

use super::failure::ApiFailure;
use crate::retry::error_code;

/// A 400 whose `field` holds one of `codes` becomes `NotFound`.
/// Everything else, including unparsable bodies, is returned unchanged.
pub fn convert_expected_bad_request(failure: ApiFailure, field: &str, codes: &[&str]) -> ApiFailure {
    match failure {
        ApiFailure::BadRequest { body } if has_code(&body, field, codes) => {
            ApiFailure::NotFound { body }
        }
        other => other,
    }
}

/// A 409 whose `field` holds one of `codes` becomes `NotFound`.
pub fn convert_conflict_to_not_found(failure: ApiFailure, field: &str, codes: &[&str]) -> ApiFailure {
    match failure {
        ApiFailure::Conflict { body } if has_code(&body, field, codes) => {
            ApiFailure::NotFound { body }
        }
        other => other,
    }
}

fn has_code(body: &str, field: &str, codes: &[&str]) -> bool {
    match error_code(body, &[field]) {
        Ok(code) => codes.contains(&code.as_str()),
        Err(e) => {
            tracing::debug!(error = %e, "could not read error code; keeping original error");
            false
        }
    }
}
