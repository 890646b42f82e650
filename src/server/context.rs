//! `Context` implementation for the HTTP backend.
//!
//! # Responsibilities
//! - Expose the buffered request (`http::request::Parts` + body) to handlers
//! - Collect status and headers until the response is committed
//! - Commit exactly once through a oneshot back to the async dispatcher
//!
//! # Data Flow
//! ```text
//! dispatch (async)                     worker thread
//!   ServerContext::new ───────────────▶ router.handle(&mut ctx)
//!   rx.await ◀── oneshot(Response) ──── send_bytes / send_status / sender()
//!   body stream ◀── mpsc(Bytes) ─────── Sender::write (streaming only)
//! ```
//!
//! # Design Decisions
//! - HEAD keeps status and headers but drops the body
//! - A sender dropped without `close` ends the body with an error, so the
//!   connection is aborted instead of finishing a truncated reply
//! - A dropped context without a committed response reads as a handler crash

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use axum::body::{Body as ResponseBody, Bytes};
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::request::Parts;
use axum::http::{Method, Response, StatusCode};
use futures_util::stream;
use tokio::sync::{mpsc, oneshot};

use crate::context::cookie::parse_cookie_header;
use crate::context::{
    Attributes, Body, Context, Formdata, Output, PathMap, ResponseStream, Sender,
};
use crate::error::{Error, Result};
use crate::routing::{Route, Router};

/// Chunks buffered between a streaming handler and the connection.
const STREAM_CHANNEL_CAPACITY: usize = 16;

/// Pattern of the route that produced a response. Read back for metrics.
#[derive(Debug, Clone)]
pub struct MatchedRoute(pub String);

/// Per-request context handed to a worker.
pub struct ServerContext {
    parts: Parts,
    body: Body,
    remote: Option<SocketAddr>,
    protocol: String,
    cookies: BTreeMap<String, String>,
    form: OnceLock<std::result::Result<Formdata, String>>,
    path_map: PathMap,
    route: Option<Arc<Route>>,
    router: Arc<Router>,
    attributes: Attributes,
    status: StatusCode,
    response_headers: HeaderMap,
    responder: Option<oneshot::Sender<Response<ResponseBody>>>,
    buffer_size: usize,
}

impl ServerContext {
    pub fn new(
        parts: Parts,
        remote: Option<SocketAddr>,
        router: Arc<Router>,
        responder: oneshot::Sender<Response<ResponseBody>>,
        buffer_size: usize,
    ) -> Self {
        let cookies = parts
            .headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| parse_cookie_header(v).into_iter())
            .fold(BTreeMap::new(), |mut map, (name, value)| {
                map.entry(name).or_insert(value);
                map
            });
        let protocol = format!("{:?}", parts.version);

        Self {
            parts,
            body: Body::empty(),
            remote,
            protocol,
            cookies,
            form: OnceLock::new(),
            path_map: PathMap::new(),
            route: None,
            router,
            attributes: Attributes::new(),
            status: StatusCode::OK,
            response_headers: HeaderMap::new(),
            responder: Some(responder),
            buffer_size: buffer_size.max(1),
        }
    }

    pub fn set_body(&mut self, body: impl Into<Body>) {
        self.body = body.into();
    }

    /// Commit an empty response if the handler never sent one.
    pub fn finish(&mut self) {
        if self.responder.is_some() {
            let status = self.status;
            if let Err(err) = self.send_status(status) {
                tracing::debug!(error = %err, "Implicit response not sent");
            }
        }
    }

    fn is_head(&self) -> bool {
        self.parts.method == Method::HEAD
    }

    /// Hand the response to the dispatcher. Fails once a response was committed.
    fn commit(&mut self, body: ResponseBody) -> Result<()> {
        let responder = self.responder.take().ok_or(Error::ResponseStarted)?;

        let mut response = Response::new(body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.response_headers.clone();
        if let Some(route) = &self.route {
            response
                .extensions_mut()
                .insert(MatchedRoute(route.pattern().to_string()));
        }

        if responder.send(response).is_err() {
            // Client gone or request timed out; nothing left to write to.
            tracing::debug!(path = %self.parts.uri.path(), "Response dropped, receiver closed");
        }
        Ok(())
    }
}

impl Context for ServerContext {
    fn method(&self) -> &Method {
        &self.parts.method
    }

    fn path(&self) -> &str {
        self.parts.uri.path()
    }

    fn query_string(&self) -> Option<&str> {
        self.parts.uri.query()
    }

    fn headers(&self) -> &HeaderMap {
        &self.parts.headers
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
        let parsed = self.form.get_or_init(|| {
            let content_type = self.content_type();
            Formdata::parse(content_type.as_ref(), self.body.bytes()).map_err(|err| match err {
                Error::BadRequest(message) => message,
                other => other.to_string(),
            })
        });
        parsed
            .as_ref()
            .map_err(|message| Error::BadRequest(message.clone()))
    }

    fn body(&self) -> &Body {
        &self.body
    }

    fn remote_address(&self) -> String {
        self.remote
            .map(|addr| addr.ip().to_string())
            .unwrap_or_default()
    }

    fn protocol(&self) -> &str {
        &self.protocol
    }

    fn scheme(&self) -> &str {
        self.parts.uri.scheme_str().unwrap_or("http")
    }

    fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }

    fn router(&self) -> Option<&Arc<Router>> {
        Some(&self.router)
    }

    fn response_code(&self) -> StatusCode {
        self.status
    }

    fn set_response_code(&mut self, status: StatusCode) {
        self.status = status;
    }

    fn response_headers(&self) -> &HeaderMap {
        &self.response_headers
    }

    fn set_response_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.response_headers.insert(name, value);
    }

    fn append_response_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.response_headers.append(name, value);
    }

    fn is_response_started(&self) -> bool {
        self.responder.is_none()
    }

    fn send_bytes(&mut self, data: Bytes) -> Result<()> {
        if self.is_response_started() {
            return Err(Error::ResponseStarted);
        }
        let body = if self.is_head() {
            if !self.response_headers.contains_key(header::CONTENT_LENGTH) {
                self.set_response_length(data.len() as u64);
            }
            ResponseBody::empty()
        } else {
            ResponseBody::from(data)
        };
        self.commit(body)
    }

    fn send_status(&mut self, status: StatusCode) -> Result<()> {
        self.status = status;
        self.commit(ResponseBody::empty())
    }

    fn sender(&mut self) -> Result<Box<dyn Sender>> {
        if self.is_head() {
            self.commit(ResponseBody::empty())?;
            return Ok(Box::new(DiscardSender));
        }

        let (tx, rx) = mpsc::channel::<Bytes>(STREAM_CHANNEL_CAPACITY);
        let completed = Arc::new(AtomicBool::new(false));
        let chunks = stream::unfold(
            (rx, Arc::clone(&completed), false),
            |(mut rx, completed, aborted)| async move {
                if aborted {
                    return None;
                }
                match rx.recv().await {
                    Some(chunk) => Some((Ok(chunk), (rx, completed, false))),
                    None if completed.load(Ordering::Acquire) => None,
                    None => Some((
                        Err(std::io::Error::new(
                            std::io::ErrorKind::UnexpectedEof,
                            "response stream aborted",
                        )),
                        (rx, completed, true),
                    )),
                }
            },
        );
        self.commit(ResponseBody::from_stream(chunks))?;
        Ok(Box::new(ChannelSender { tx, completed }))
    }

    fn response_stream(&mut self) -> Result<ResponseStream> {
        let capacity = self.buffer_size;
        Ok(ResponseStream::new(self.sender()?, capacity))
    }

    fn send_stream(&mut self, mut reader: Box<dyn std::io::Read + Send>) -> Result<()> {
        let mut sender = self.sender()?;
        let mut buf = vec![0u8; self.buffer_size];
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

    fn send_error(&mut self, cause: Error) {
        let router = Arc::clone(&self.router);
        router.report_error(self, cause);
    }

    fn render(&mut self, output: Output) -> Result<()> {
        let router = Arc::clone(&self.router);
        router.render(self, output)
    }
}

/// Streams chunks to the connection. Blocks while the channel is full.
struct ChannelSender {
    tx: mpsc::Sender<Bytes>,
    completed: Arc<AtomicBool>,
}

impl Sender for ChannelSender {
    fn write(&mut self, chunk: Bytes) -> Result<()> {
        if chunk.is_empty() {
            return Ok(());
        }
        self.tx.blocking_send(chunk).map_err(|_| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "client disconnected",
            ))
        })
    }

    fn close(self: Box<Self>) {
        self.completed.store(true, Ordering::Release);
    }
}

/// Sender for HEAD requests.
struct DiscardSender;

impl Sender for DiscardSender {
    fn write(&mut self, _chunk: Bytes) -> Result<()> {
        Ok(())
    }
}
