//! Bridge from axum requests to the synchronous router.
//!
//! # Responsibilities
//! - Buffer the request body up to `max_request_size`
//! - Build a `ServerContext` and run the router on a worker
//! - Reply as soon as the handler commits its response
//! - Record request metrics
//!
//! # Design Decisions
//! - The dispatcher never waits for the worker to finish: streaming
//!   handlers keep writing after the response head went out
//! - A worker that drops its context without replying (panic) yields 500
//! - Body limit violations go through the router's error handler like any other error

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::StreamExt;
use tokio::sync::oneshot;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::observability::metrics::{record_request, UNMATCHED_ROUTE};
use crate::routing::Router;
use crate::server::context::{MatchedRoute, ServerContext};
use crate::server::inflight::InFlight;
use crate::server::request_id::request_id;
use crate::server::worker::WorkerPool;

/// Application state injected into the fallback handler.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<Router>,
    pub workers: WorkerPool,
    pub inflight: InFlight,
    pub max_request_size: usize,
    pub buffer_size: usize,
}

/// Axum fallback handling every request.
pub async fn dispatch(State(state): State<AppState>, request: Request) -> Response {
    let start_time = Instant::now();
    let request_id = request_id(&request).to_string();
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let method = request.method().to_string();

    let (parts, body) = request.into_parts();
    let (tx, rx) = oneshot::channel();
    let mut ctx = ServerContext::new(
        parts,
        remote,
        Arc::clone(&state.router),
        tx,
        state.buffer_size,
    );
    let guard = state.inflight.track();
    tracing::debug!(
        request_id = %request_id,
        request_seq = guard.seq(),
        method = %method,
        path = %ctx.path(),
        "Dispatching request"
    );
    let declared = ctx
        .header(header::CONTENT_LENGTH.as_str())
        .and_then(|v| v.parse::<u64>().ok());

    // 1. Buffer body
    match read_body(body, declared, state.max_request_size).await {
        Ok(bytes) => {
            ctx.set_body(bytes);

            // 2. Route and handle on a worker
            let router = Arc::clone(&state.router);
            let span = tracing::Span::current();
            let job = move || {
                let _entered = span.enter();
                let _guard = guard;
                router.handle(&mut ctx);
                ctx.finish();
            };
            if let Err(err) = state.workers.spawn(job).await {
                tracing::error!(request_id = %request_id, error = %err, "Worker unavailable");
            }
        }
        Err(err) => {
            ctx.send_error(err);
            ctx.finish();
        }
    }

    // 3. Wait for the committed response
    let response = match rx.await {
        Ok(response) => response,
        Err(_) => {
            tracing::error!(request_id = %request_id, "Handler exited without a response");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    };

    let route = response
        .extensions()
        .get::<MatchedRoute>()
        .map(|MatchedRoute(pattern)| pattern.as_str())
        .unwrap_or(UNMATCHED_ROUTE);
    record_request(&method, route, response.status().as_u16(), start_time);

    response
}

/// Read the whole body, failing with 413 past `limit` bytes.
async fn read_body(body: Body, declared: Option<u64>, limit: usize) -> Result<Bytes> {
    let too_large = || Error::PayloadTooLarge {
        limit: limit as u64,
    };

    // Reject on the declared length before reading anything.
    if declared.is_some_and(|len| len > limit as u64) {
        return Err(too_large());
    }

    let mut stream = body.into_data_stream();
    let mut buf = Vec::with_capacity(declared.map_or(0, |len| len as usize));
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| Error::BadRequest(format!("failed to read body: {}", e)))?;
        if buf.len() + chunk.len() > limit {
            return Err(too_large());
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(Bytes::from(buf))
}
