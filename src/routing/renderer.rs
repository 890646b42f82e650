//! Output renderers.
//!
//! Renderers turn a handler's `Output::Text` or `Output::Json` into response bytes.
//! The router ships `json` and `text`; applications register more by name and
//! select them per route with `Route::renderer`.

use axum::body::Bytes;
use serde_json::Value;

use crate::context::{MediaType, Output};
use crate::error::Result;

/// Converts a handler output into a response body.
pub trait Renderer: Send + Sync {
    /// Content type set when the handler did not choose one.
    fn media_type(&self) -> MediaType;

    fn render(&self, output: &Output) -> Result<Bytes>;
}

/// Serializes outputs as JSON. Text becomes a JSON string.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn media_type(&self) -> MediaType {
        MediaType::json()
    }

    fn render(&self, output: &Output) -> Result<Bytes> {
        let bytes = match output {
            Output::Json(value) => serde_json::to_vec(value)?,
            Output::Text(text) => serde_json::to_vec(&Value::String(text.clone()))?,
            Output::Bytes(bytes) => return Ok(bytes.clone()),
            Output::Empty | Output::Status(_) => Vec::new(),
        };
        Ok(Bytes::from(bytes))
    }
}

/// Writes outputs as UTF-8 text. JSON strings are written unquoted.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextRenderer;

impl Renderer for TextRenderer {
    fn media_type(&self) -> MediaType {
        MediaType::text()
    }

    fn render(&self, output: &Output) -> Result<Bytes> {
        Ok(match output {
            Output::Text(text) => Bytes::from(text.clone()),
            Output::Json(Value::String(text)) => Bytes::from(text.clone()),
            Output::Json(value) => Bytes::from(value.to_string()),
            Output::Bytes(bytes) => bytes.clone(),
            Output::Empty | Output::Status(_) => Bytes::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_renderer_quotes_text() {
        let body = JsonRenderer.render(&Output::Text("hi".into())).unwrap();
        assert_eq!(&body[..], b"\"hi\"");
        let body = JsonRenderer.render(&Output::Json(json!({"id": 1}))).unwrap();
        assert_eq!(&body[..], br#"{"id":1}"#);
    }

    #[test]
    fn text_renderer_unwraps_json_strings() {
        let body = TextRenderer.render(&Output::Json(json!("plain"))).unwrap();
        assert_eq!(&body[..], b"plain");
        let body = TextRenderer.render(&Output::Json(json!([1, 2]))).unwrap();
        assert_eq!(&body[..], b"[1,2]");
    }
}
