//! REST transport seen by the refresh adapters.
//!
//! The core never builds RDS requests itself beyond simple GETs for state
//! probes; mutating calls are made by the callers and reach the classifiers as
//! an [`ApiFailure`].

mod convert;
mod failure;
mod http;

pub use convert::{convert_conflict_to_not_found, convert_expected_bad_request};
pub use failure::ApiFailure;
pub use http::CurlTransport;

use serde_json::Value;

/// Blocking JSON GET against the RDS endpoint.
pub trait RdsTransport: Send + Sync {
    /// GET `path` (relative to the endpoint) and decode the JSON body.
    /// Non-2xx responses come back as the matching [`ApiFailure`].
    fn get_json(&self, path: &str) -> Result<Value, ApiFailure>;
}

impl<T: RdsTransport + ?Sized> RdsTransport for std::sync::Arc<T> {
    fn get_json(&self, path: &str) -> Result<Value, ApiFailure> {
        (**self).get_json(path)
    }
}
