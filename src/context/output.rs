//! Handler return values.

use axum::body::Bytes;
use axum::http::StatusCode;
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;

/// What a handler produced. Rendered by the router unless the handler already sent a response.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    /// Nothing to render: send the current status with an empty body.
    Empty,
    /// Send this status with an empty body.
    Status(StatusCode),
    Text(String),
    Bytes(Bytes),
    Json(Value),
}

impl Output {
    /// Serialize any value into a JSON output.
    pub fn json<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Output::Json(serde_json::to_value(value)?))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Output::Empty)
    }
}

impl From<()> for Output {
    fn from(_: ()) -> Self {
        Output::Empty
    }
}

impl From<StatusCode> for Output {
    fn from(status: StatusCode) -> Self {
        Output::Status(status)
    }
}

impl From<&str> for Output {
    fn from(text: &str) -> Self {
        Output::Text(text.to_string())
    }
}

impl From<String> for Output {
    fn from(text: String) -> Self {
        Output::Text(text)
    }
}

impl From<Bytes> for Output {
    fn from(bytes: Bytes) -> Self {
        Output::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Output {
    fn from(bytes: Vec<u8>) -> Self {
        Output::Bytes(Bytes::from(bytes))
    }
}

impl From<Value> for Output {
    fn from(value: Value) -> Self {
        Output::Json(value)
    }
}
