//! In-memory `Context`.
//!
//! # Design Decisions
//! - Request properties are plain fields with fluent setters
//! - By default `render` and `send_error` only record their argument, so tests
//!   can assert on handler outputs; `set_full_execution(true)` routes them
//!   through the router's renderers and error handler instead
//! - Sends after the response started fail like on the real backend

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::{Method, StatusCode};

use crate::context::{
    Attributes, Body, Context, Formdata, Output, PathMap, Sender,
};
use crate::error::{Error, Result};
use crate::routing::router::allow_header;
use crate::routing::{Route, Router};
use crate::testing::mock_response::{lock, MockResponse};

/// Request and response state for a single handler invocation.
pub struct MockContext {
    method: Method,
    path: String,
    query: Option<String>,
    headers: HeaderMap,
    path_map: PathMap,
    route: Option<Arc<Route>>,
    cookies: BTreeMap<String, String>,
    form: Formdata,
    body: Body,
    remote_address: String,
    protocol: String,
    scheme: String,
    attributes: Attributes,
    router: Option<Arc<Router>>,
    full_execution: bool,
    response: MockResponse,
}

impl Default for MockContext {
    fn default() -> Self {
        Self::new()
    }
}

impl MockContext {
    /// `GET /` from `127.0.0.1` over HTTP/1.1.
    pub fn new() -> Self {
        Self {
            method: Method::GET,
            path: "/".to_string(),
            query: None,
            headers: HeaderMap::new(),
            path_map: PathMap::new(),
            route: None,
            cookies: BTreeMap::new(),
            form: Formdata::new(),
            body: Body::empty(),
            remote_address: "127.0.0.1".to_string(),
            protocol: "HTTP/1.1".to_string(),
            scheme: "http".to_string(),
            attributes: Attributes::new(),
            router: None,
            full_execution: false,
            response: MockResponse::default(),
        }
    }

    pub fn with_router(mut self, router: Arc<Router>) -> Self {
        self.router = Some(router);
        self
    }

    pub fn set_method(&mut self, method: Method) -> &mut Self {
        self.method = method;
        self
    }

    /// Set path and query from a request target such as `/search?q=rust`.
    pub fn set_path_string(&mut self, target: &str) -> &mut Self {
        match target.split_once('?') {
            Some((path, query)) => {
                self.path = path.to_string();
                self.query = Some(query.to_string());
            }
            None => {
                self.path = target.to_string();
                self.query = None;
            }
        }
        self
    }

    pub fn set_query_string(&mut self, query: &str) -> &mut Self {
        self.query = Some(query.trim_start_matches('?').to_string());
        self
    }

    /// Replace a request header. Invalid names or values are ignored.
    pub fn set_request_header(&mut self, name: &str, value: &str) -> &mut Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => tracing::warn!(header = %name, "Ignoring invalid mock header"),
        }
        self
    }

    /// Add a value for `name`, keeping earlier ones. Invalid names or values are ignored.
    pub fn add_request_header(&mut self, name: &str, value: &str) -> &mut Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            _ => tracing::warn!(header = %name, "Ignoring invalid mock header"),
        }
        self
    }

    pub fn set_cookie(&mut self, name: &str, value: &str) -> &mut Self {
        self.cookies.insert(name.to_string(), value.to_string());
        self
    }

    pub fn set_form(&mut self, form: Formdata) -> &mut Self {
        self.form = form;
        self
    }

    pub fn set_body(&mut self, body: impl Into<Body>) -> &mut Self {
        self.body = body.into();
        self
    }

    pub fn set_remote_address(&mut self, address: &str) -> &mut Self {
        self.remote_address = address.to_string();
        self
    }

    pub fn set_scheme(&mut self, scheme: &str) -> &mut Self {
        self.scheme = scheme.to_string();
        self
    }

    /// Render outputs and errors through the attached router.
    pub fn set_full_execution(&mut self, full: bool) -> &mut Self {
        self.full_execution = full;
        self
    }

    pub fn response(&self) -> &MockResponse {
        &self.response
    }

    pub fn into_response(self) -> MockResponse {
        self.response
    }

    fn start(&mut self) -> Result<()> {
        if self.response.started {
            return Err(Error::ResponseStarted);
        }
        self.response.started = true;
        Ok(())
    }
}

impl Context for MockContext {
    fn method(&self) -> &Method {
        &self.method
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn query_string(&self) -> Option<&str> {
        self.query.as_deref()
    }

    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn path_map(&self) -> &PathMap {
        &self.path_map
    }

    fn set_path_map(&mut self, path_map: PathMap) {
        self.path_map = path_map;
    }

    fn route(&self) -> Option<&Arc<Route>> {
        self.route.as_ref()
    }

    fn set_route(&mut self, route: Arc<Route>) {
        self.route = Some(route);
    }

    fn cookie_map(&self) -> &BTreeMap<String, String> {
        &self.cookies
    }

    fn form(&self) -> Result<&Formdata> {
        Ok(&self.form)
    }

    fn body(&self) -> &Body {
        &self.body
    }

    fn remote_address(&self) -> String {
        self.remote_address.clone()
    }

    fn protocol(&self) -> &str {
        &self.protocol
    }

    fn scheme(&self) -> &str {
        &self.scheme
    }

    fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }

    fn router(&self) -> Option<&Arc<Router>> {
        self.router.as_ref()
    }

    fn response_code(&self) -> StatusCode {
        self.response.status
    }

    fn set_response_code(&mut self, status: StatusCode) {
        self.response.status = status;
    }

    fn response_headers(&self) -> &HeaderMap {
        &self.response.headers
    }

    fn set_response_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.response.headers.insert(name, value);
    }

    fn append_response_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.response.headers.append(name, value);
    }

    fn is_response_started(&self) -> bool {
        self.response.started
    }

    fn send_bytes(&mut self, data: Bytes) -> Result<()> {
        self.start()?;
        if !self.response.headers.contains_key(header::CONTENT_LENGTH) {
            self.set_response_length(data.len() as u64);
        }
        lock(&self.response.body).extend_from_slice(&data);
        Ok(())
    }

    fn send_status(&mut self, status: StatusCode) -> Result<()> {
        self.start()?;
        self.response.status = status;
        Ok(())
    }

    fn sender(&mut self) -> Result<Box<dyn Sender>> {
        self.start()?;
        Ok(Box::new(MockSender {
            body: Arc::clone(&self.response.body),
            aborted: Arc::clone(&self.response.aborted),
            closed: false,
        }))
    }

    fn send_error(&mut self, cause: Error) {
        if self.full_execution {
            if let Some(router) = self.router.clone() {
                router.report_error(self, cause);
                return;
            }
        }
        if self.response.started {
            tracing::debug!(error = %cause, "Error after response started");
            return;
        }
        if let Some(value) = allow_header(&cause) {
            self.response.headers.insert(header::ALLOW, value);
        }
        self.response.status = match &self.router {
            Some(router) => router.error_code(&cause),
            None => cause.status_code(),
        };
        self.response.error = Some(cause);
        self.response.started = true;
    }

    fn render(&mut self, output: Output) -> Result<()> {
        if self.full_execution {
            if let Some(router) = self.router.clone() {
                return router.render(self, output);
            }
        }
        self.start()?;
        if let Output::Status(status) = &output {
            self.response.status = *status;
        }
        self.response.value = Some(output);
        Ok(())
    }
}

/// Appends chunks to the captured body.
struct MockSender {
    body: Arc<Mutex<Vec<u8>>>,
    aborted: Arc<AtomicBool>,
    closed: bool,
}

impl Sender for MockSender {
    fn write(&mut self, chunk: Bytes) -> Result<()> {
        lock(&self.body).extend_from_slice(&chunk);
        Ok(())
    }

    fn close(mut self: Box<Self>) {
        self.closed = true;
    }
}

impl Drop for MockSender {
    fn drop(&mut self) {
        if !self.closed {
            self.aborted.store(true, Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Cookie, MediaType};

    #[test]
    fn path_string_splits_query() {
        let mut ctx = MockContext::new();
        ctx.set_path_string("/search?q=rust&page=2");
        assert_eq!(ctx.path(), "/search");
        assert_eq!(ctx.query().get("q"), Some("rust"));
        assert_eq!(ctx.query().value::<u32>("page").unwrap(), 2);
        assert!(!ctx.is_in_io_thread());
    }

    #[test]
    fn records_sent_bytes_and_headers() {
        let mut ctx = MockContext::new();
        ctx.set_response_type(&MediaType::json()).unwrap();
        ctx.set_response_cookie(&Cookie::new("a", "1")).unwrap();
        ctx.set_response_cookie(&Cookie::new("b", "2")).unwrap();
        ctx.send_bytes(Bytes::from_static(b"{}")).unwrap();

        let response = ctx.response();
        assert_eq!(response.content_type(), Some("application/json"));
        assert_eq!(response.content_length(), Some(2));
        assert_eq!(response.header_all("set-cookie").len(), 2);
        assert_eq!(response.body_text(), "{}");
        assert!(matches!(ctx.send_text("x"), Err(Error::ResponseStarted)));
    }

    #[test]
    fn stream_goes_through_sender() {
        let mut ctx = MockContext::new();
        let data = vec![7u8; crate::context::DEFAULT_BUFFER_SIZE * 2 + 3];
        ctx.send_stream(Box::new(std::io::Cursor::new(data.clone())))
            .unwrap();
        assert_eq!(ctx.response().body().len(), data.len());
    }

    #[test]
    fn errors_use_router_status_mapping() {
        let mut builder = Router::builder();
        builder.error_code(|err| match err {
            Error::BadRequest(_) => Some(StatusCode::IM_A_TEAPOT),
            _ => None,
        });
        let router = Arc::new(builder.build().unwrap());

        let mut ctx = MockContext::new().with_router(router);
        ctx.send_error(Error::BadRequest("x".into()));
        assert_eq!(ctx.response().status(), StatusCode::IM_A_TEAPOT);
        assert!(matches!(ctx.response().error(), Some(Error::BadRequest(_))));

        let mut ctx = MockContext::new();
        ctx.send_error(Error::NotFound("/".into()));
        assert_eq!(ctx.response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn method_not_allowed_sets_allow_header() {
        let mut ctx = MockContext::new();
        ctx.send_error(Error::MethodNotAllowed {
            method: Method::DELETE,
            allowed: vec![Method::GET, Method::POST],
        });
        assert_eq!(ctx.response().status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(ctx.response().header("allow"), Some("GET, POST"));
    }

    #[test]
    fn error_after_start_keeps_response() {
        let mut ctx = MockContext::new();
        ctx.set_response_code(StatusCode::CREATED);
        ctx.send_text("done").unwrap();
        ctx.send_error(Error::BadRequest("late".into()));
        assert_eq!(ctx.response().status(), StatusCode::CREATED);
        assert!(ctx.response().error().is_none());
        assert_eq!(ctx.response().body_text(), "done");
    }

    #[test]
    fn request_headers_append_values() {
        let mut ctx = MockContext::new();
        ctx.add_request_header("accept", "text/html")
            .add_request_header("accept", "application/json");
        let values: Vec<_> = ctx.headers().get_all("accept").iter().collect();
        assert_eq!(values.len(), 2);

        ctx.set_request_header("accept", "*/*");
        assert_eq!(ctx.headers().get_all("accept").iter().count(), 1);
    }

    #[test]
    fn response_writer_captures_text() {
        use std::io::Write;

        let mut ctx = MockContext::new();
        let mut out = ctx.response_writer(&MediaType::new("text", "csv")).unwrap();
        writeln!(out, "id,name").unwrap();
        writeln!(out, "1,ada").unwrap();
        out.finish().unwrap();

        let response = ctx.response();
        assert_eq!(response.content_type(), Some("text/csv;charset=utf-8"));
        assert_eq!(response.body_text(), "id,name\n1,ada\n");
        assert!(!response.is_aborted());
    }

    #[test]
    fn unclosed_sender_marks_abort() {
        let mut ctx = MockContext::new();
        let mut sender = ctx.sender().unwrap();
        sender.write(Bytes::from_static(b"part")).unwrap();
        drop(sender);
        assert!(ctx.response().is_aborted());
    }

    #[test]
    fn attributes_round_trip() {
        let mut ctx = MockContext::new();
        ctx.set_attribute("user", serde_json::json!({"id": 1}));
        assert_eq!(ctx.attribute("user").unwrap()["id"], 1);
    }
}
