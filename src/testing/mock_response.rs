//! Response captured by a `MockContext`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use axum::body::Bytes;
use axum::http::header::{self, HeaderMap};
use axum::http::StatusCode;

use crate::context::Output;
use crate::error::Error;

/// Everything a handler sent, rendered or failed with.
#[derive(Debug)]
pub struct MockResponse {
    pub(crate) status: StatusCode,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Arc<Mutex<Vec<u8>>>,
    pub(crate) aborted: Arc<AtomicBool>,
    pub(crate) value: Option<Output>,
    pub(crate) error: Option<Error>,
    pub(crate) started: bool,
}

impl Default for MockResponse {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Arc::new(Mutex::new(Vec::new())),
            aborted: Arc::new(AtomicBool::new(false)),
            value: None,
            error: None,
            started: false,
        }
    }
}

impl MockResponse {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Every value sent for `name`, e.g. multiple `Set-Cookie` headers.
    pub fn header_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header(header::CONTENT_TYPE.as_str())
    }

    pub fn content_length(&self) -> Option<u64> {
        self.header(header::CONTENT_LENGTH.as_str())
            .and_then(|v| v.parse().ok())
    }

    /// Bytes sent through any sender.
    pub fn body(&self) -> Bytes {
        Bytes::copy_from_slice(&lock(&self.body))
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&lock(&self.body)).into_owned()
    }

    /// Handler output passed to `render`, when not executed in full.
    pub fn value(&self) -> Option<&Output> {
        self.value.as_ref()
    }

    /// Error passed to `send_error`.
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// True when a streaming sender was dropped without being closed.
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }
}

pub(crate) fn lock(body: &Mutex<Vec<u8>>) -> MutexGuard<'_, Vec<u8>> {
    // A panicking handler must not hide what it already wrote.
    body.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
