//! Buffered request body.

use std::io::Cursor;

use axum::body::Bytes;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// Request body, fully buffered before the handler runs.
#[derive(Debug, Clone, Default)]
pub struct Body {
    bytes: Bytes,
}

impl Body {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Body as UTF-8 text. Invalid data is a client error.
    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.bytes.to_vec())
            .map_err(|e| Error::BadRequest(format!("body is not valid UTF-8: {}", e)))
    }

    /// Deserialize the body as JSON. Malformed input is a client error.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.bytes)
            .map_err(|e| Error::BadRequest(format!("malformed JSON body: {}", e)))
    }

    pub fn reader(&self) -> Cursor<Bytes> {
        Cursor::new(self.bytes.clone())
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Self { bytes }
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Bytes::from(bytes),
        }
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Self {
            bytes: Bytes::copy_from_slice(text.as_bytes()),
        }
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Self {
            bytes: Bytes::from(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::io::Read;

    #[derive(Debug, Deserialize)]
    struct Pet {
        name: String,
    }

    #[test]
    fn json_and_text() {
        let body = Body::from(r#"{"name":"rex"}"#);
        assert_eq!(body.json::<Pet>().unwrap().name, "rex");
        assert_eq!(body.text().unwrap(), r#"{"name":"rex"}"#);

        let mut out = String::new();
        body.reader().read_to_string(&mut out).unwrap();
        assert_eq!(out.len(), body.len());
    }

    #[test]
    fn malformed_input_is_bad_request() {
        let body = Body::from("{nope");
        let err = body.json::<Pet>().unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);

        let body = Body::from(vec![0xff, 0xfe]);
        assert!(matches!(body.text(), Err(Error::BadRequest(_))));
    }
}
