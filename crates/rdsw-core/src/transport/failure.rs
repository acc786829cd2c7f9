//! Failed API call, classified once by HTTP status.

use thiserror::Error;

/// A failed RDS API call.
///
/// The transport builds this once per non-2xx response so the classifiers can
/// match on a closed set of shapes instead of re-deriving them from an opaque
/// error value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiFailure {
    /// HTTP 400.
    #[error("bad request (HTTP 400): {body}")]
    BadRequest { body: String },
    /// HTTP 403.
    #[error("forbidden (HTTP 403): {body}")]
    Forbidden { body: String },
    /// HTTP 404.
    #[error("resource not found (HTTP 404): {body}")]
    NotFound { body: String },
    /// HTTP 409.
    #[error("resource conflict (HTTP 409): {body}")]
    Conflict { body: String },
    /// HTTP 500.
    #[error("internal server error (HTTP 500): {body}")]
    ServerError { body: String },
    /// Any other non-2xx status.
    #[error("unexpected response code {status}: {body}")]
    Unexpected { status: u16, body: String },
    /// The request did not produce a usable response (DNS, connect, TLS,
    /// or a 2xx body that is not JSON).
    #[error("transport failure: {message}")]
    Transport { message: String },
}

impl ApiFailure {
    /// Build the failure for a non-2xx response.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            400 => ApiFailure::BadRequest { body },
            403 => ApiFailure::Forbidden { body },
            404 => ApiFailure::NotFound { body },
            409 => ApiFailure::Conflict { body },
            500 => ApiFailure::ServerError { body },
            _ => ApiFailure::Unexpected { status, body },
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        ApiFailure::Transport {
            message: message.into(),
        }
    }

    /// HTTP status, or `None` for transport failures.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiFailure::BadRequest { .. } => Some(400),
            ApiFailure::Forbidden { .. } => Some(403),
            ApiFailure::NotFound { .. } => Some(404),
            ApiFailure::Conflict { .. } => Some(409),
            ApiFailure::ServerError { .. } => Some(500),
            ApiFailure::Unexpected { status, .. } => Some(*status),
            ApiFailure::Transport { .. } => None,
        }
    }

    /// Raw response body, if the server sent one.
    pub fn body(&self) -> Option<&str> {
        match self {
            ApiFailure::BadRequest { body }
            | ApiFailure::Forbidden { body }
            | ApiFailure::NotFound { body }
            | ApiFailure::Conflict { body }
            | ApiFailure::ServerError { body }
            | ApiFailure::Unexpected { body, .. } => Some(body),
            ApiFailure::Transport { .. } => None,
        }
    }
}
