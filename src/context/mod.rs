//! Per-request context shared by every backend.
//!
//! # Data Flow
//! ```text
//! Backend (server::ServerContext, testing::MockContext)
//!     → implements Context
//!     → routing::Router::handle(&mut dyn Context)
//!     → handler reads request, writes response through the same trait
//! ```
//!
//! # Design Decisions
//! - Synchronous and object safe: handlers run on worker threads, so they
//!   take `&mut dyn Context` and never see the transport
//! - Request bodies are buffered before dispatch
//! - A response is committed once; senders differ only in how the body is produced

pub mod body;
pub mod cookie;
pub mod form;
pub mod media;
pub mod output;
pub mod stream;
pub mod value;

use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::sync::Arc;

use axum::body::Bytes;
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::{Method, StatusCode};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::routing::{Route, Router};

pub use body::Body;
pub use cookie::{Cookie, SameSite};
pub use form::{FileUpload, Formdata};
pub use media::MediaType;
pub use output::Output;
pub use stream::ResponseStream;
pub use value::{PathMap, QueryString, ValueMap};

/// Request-scoped attributes.
pub type Attributes = HashMap<String, Value>;

/// Chunk size used when streaming from a reader.
pub const DEFAULT_BUFFER_SIZE: usize = 16 * 1024;

/// Writes a response body in chunks.
///
/// `close` completes the body. Dropping a sender without closing it aborts
/// the response, so a handler failing mid-stream never looks like a
/// complete reply.
pub trait Sender: Send {
    fn write(&mut self, chunk: Bytes) -> Result<()>;

    fn close(self: Box<Self>) {}
}

/// The request/response surface handlers program against.
pub trait Context: Send {
    fn method(&self) -> &Method;

    /// Request path without the query string.
    fn path(&self) -> &str;

    fn query_string(&self) -> Option<&str>;

    fn query(&self) -> QueryString {
        ValueMap::parse(self.query_string().unwrap_or_default())
    }

    fn headers(&self) -> &HeaderMap;

    fn header(&self, name: &str) -> Option<&str> {
        self.headers().get(name).and_then(|v| v.to_str().ok())
    }

    fn content_type(&self) -> Option<MediaType> {
        self.header(header::CONTENT_TYPE.as_str())
            .and_then(|v| v.parse().ok())
    }

    /// True when the Accept header allows `media` (or is absent).
    fn accepts(&self, media: &MediaType) -> bool {
        MediaType::negotiate(self.header(header::ACCEPT.as_str()), std::slice::from_ref(media))
            .is_some()
    }

    fn path_map(&self) -> &PathMap;

    fn set_path_map(&mut self, path_map: PathMap);

    fn path_param(&self, name: &str) -> Result<&str> {
        self.path_map().require(name)
    }

    /// Route matched for this request, once routing has run.
    fn route(&self) -> Option<&Arc<Route>>;

    fn set_route(&mut self, route: Arc<Route>);

    fn cookie_map(&self) -> &BTreeMap<String, String>;

    fn cookie(&self, name: &str) -> Option<&str> {
        self.cookie_map().get(name).map(String::as_str)
    }

    /// Urlencoded or multipart form. Empty for other content types.
    fn form(&self) -> Result<&Formdata>;

    fn body(&self) -> &Body;

    fn remote_address(&self) -> String;

    fn protocol(&self) -> &str;

    fn scheme(&self) -> &str;

    fn attributes(&self) -> &Attributes;

    fn attributes_mut(&mut self) -> &mut Attributes;

    fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes().get(name)
    }

    fn set_attribute(&mut self, name: &str, value: Value) {
        self.attributes_mut().insert(name.to_string(), value);
    }

    /// Handlers never run on I/O threads in this crate.
    fn is_in_io_thread(&self) -> bool {
        false
    }

    fn router(&self) -> Option<&Arc<Router>>;

    fn response_code(&self) -> StatusCode;

    fn set_response_code(&mut self, status: StatusCode);

    fn response_headers(&self) -> &HeaderMap;

    fn set_response_header(&mut self, name: HeaderName, value: HeaderValue);

    fn append_response_header(&mut self, name: HeaderName, value: HeaderValue);

    /// String convenience over `set_response_header`.
    fn set_header(&mut self, name: &str, value: &str) -> Result<()> {
        let name = HeaderName::from_bytes(name.as_bytes())?;
        let value = HeaderValue::from_str(value)?;
        self.set_response_header(name, value);
        Ok(())
    }

    fn set_response_type(&mut self, media: &MediaType) -> Result<()> {
        let value = HeaderValue::from_str(&media.to_string())?;
        self.set_response_header(header::CONTENT_TYPE, value);
        Ok(())
    }

    fn response_type(&self) -> Option<MediaType> {
        self.response_headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
    }

    /// Set the content type unless one was set already.
    fn set_default_response_type(&mut self, media: &MediaType) -> Result<()> {
        if self.response_type().is_none() {
            self.set_response_type(media)?;
        }
        Ok(())
    }

    fn set_response_length(&mut self, length: u64) {
        self.set_response_header(header::CONTENT_LENGTH, HeaderValue::from(length));
    }

    fn set_response_cookie(&mut self, cookie: &Cookie) -> Result<()> {
        let value = HeaderValue::from_str(&cookie.to_cookie_string())?;
        self.append_response_header(header::SET_COOKIE, value);
        Ok(())
    }

    fn is_response_started(&self) -> bool;

    fn send_bytes(&mut self, data: Bytes) -> Result<()>;

    /// Send text, defaulting the content type to `text/plain; charset=utf-8`.
    fn send_text(&mut self, text: &str) -> Result<()> {
        self.set_default_response_type(&MediaType::text())?;
        self.send_bytes(Bytes::copy_from_slice(text.as_bytes()))
    }

    /// Send `status` with an empty body.
    fn send_status(&mut self, status: StatusCode) -> Result<()>;

    /// Stream a reader to the client in `DEFAULT_BUFFER_SIZE` chunks.
    fn send_stream(&mut self, mut reader: Box<dyn Read + Send>) -> Result<()> {
        let mut sender = self.sender()?;
        let mut buf = vec![0u8; DEFAULT_BUFFER_SIZE];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            sender.write(Bytes::copy_from_slice(&buf[..n]))?;
        }
        sender.close();
        Ok(())
    }

    /// Start a chunked response written through `std::io::Write`.
    fn response_stream(&mut self) -> Result<ResponseStream> {
        Ok(ResponseStream::new(self.sender()?, DEFAULT_BUFFER_SIZE))
    }

    /// `response_stream` for text of type `media`, UTF-8 unless `media` names a charset.
    fn response_writer(&mut self, media: &MediaType) -> Result<ResponseStream> {
        let media = match media.charset() {
            Some(_) => media.clone(),
            None => media.clone().with_param("charset", "utf-8"),
        };
        self.set_response_type(&media)?;
        self.response_stream()
    }

    /// Start a chunked response. Headers are committed immediately.
    fn sender(&mut self) -> Result<Box<dyn Sender>>;

    /// Map `cause` to a status code and produce an error response.
    fn send_error(&mut self, cause: Error);

    /// Render a handler output through the router's renderers.
    fn render(&mut self, output: Output) -> Result<()>;
}
