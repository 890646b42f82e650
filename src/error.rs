//! Framework error type.
//!
//! # Responsibilities
//! - One error enum shared by routing, context and server code
//! - Map every failure to the HTTP status a client should see
//!
//! # Design Decisions
//! - Client mistakes (bad input, unknown path, wrong method) map to 4xx
//! - Anything raised by application code without a status maps to 500
//! - `Status` lets handlers fail with an arbitrary code and message

use axum::http::{Method, StatusCode};

/// Result alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors produced while routing, handling, or serving a request.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no route matches {0}")]
    NotFound(String),

    #[error("method {method} not allowed")]
    MethodNotAllowed { method: Method, allowed: Vec<Method> },

    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("not acceptable: {0}")]
    NotAcceptable(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("missing value: {0}")]
    MissingValue(String),

    #[error("cannot convert '{name}' to {expected}")]
    TypeMismatch { name: String, expected: &'static str },

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: u64 },

    #[error("response already started")]
    ResponseStarted,

    #[error("renderer not found: {0}")]
    RendererNotFound(String),

    #[error("invalid route pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("duplicate route: {method} {pattern}")]
    DuplicateRoute { method: String, pattern: String },

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("{message}")]
    Status { status: StatusCode, message: String },

    #[error("server error: {0}")]
    Server(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Http(#[from] axum::http::Error),

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Fail with an explicit status code.
    pub fn status(status: StatusCode, message: impl Into<String>) -> Self {
        Error::Status {
            status,
            message: message.into(),
        }
    }

    /// Wrap any application error.
    pub fn other<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Other(Box::new(err))
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Error::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Error::NotAcceptable(_) => StatusCode::NOT_ACCEPTABLE,
            Error::BadRequest(_) | Error::MissingValue(_) | Error::TypeMismatch { .. } => {
                StatusCode::BAD_REQUEST
            }
            Error::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Error::Status { status, .. } => *status,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<axum::http::header::InvalidHeaderName> for Error {
    fn from(err: axum::http::header::InvalidHeaderName) -> Self {
        Error::InvalidHeader(err.to_string())
    }
}

impl From<axum::http::header::InvalidHeaderValue> for Error {
    fn from(err: axum::http::header::InvalidHeaderValue) -> Self {
        Error::InvalidHeader(err.to_string())
    }
}
