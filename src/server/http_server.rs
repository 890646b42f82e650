//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the axum app that feeds every request to the router
//! - Wire up middleware (request ID, tracing, timeout, default headers, gzip)
//! - Bind the listener and serve with graceful shutdown
//! - Own a runtime when started from synchronous code
//!
//! # Design Decisions
//! - `start` works both inside and outside a Tokio runtime: it reuses the
//!   current one when present and builds a dedicated one otherwise
//! - Blocking threads are capped at `worker_threads`, the same bound the
//!   worker pool enforces
//! - Startup failures (bind, `on_start` hooks) are returned, never swallowed
//! - `stop` blocks until drained or the shutdown timeout, except on a
//!   current-thread runtime it does not own, where draining continues in
//!   the background

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderValue};
use axum::response::Response;
use tokio::net::TcpListener;
use tokio::runtime::{Handle, Runtime, RuntimeFlavor};
use tokio::task::JoinHandle;
use tower_http::{
    compression::CompressionLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::lifecycle::shutdown::{self, Shutdown};
use crate::routing::Router;
use crate::server::dispatch::{dispatch, AppState};
use crate::server::inflight::InFlight;
use crate::server::request_id::{request_id, RequestIdMaker, REQUEST_ID_HEADER};
use crate::server::worker::WorkerPool;
use crate::server::Server;

/// Value of the `Server` response header.
pub const SERVER_NAME: &str = concat!("switchyard/", env!("CARGO_PKG_VERSION"));

/// The threaded HTTP backend.
pub struct HttpServer {
    options: ServerConfig,
    shutdown: Shutdown,
    inflight: InFlight,
    running: Option<Running>,
}

/// State of a started server.
struct Running {
    router: Arc<Router>,
    task: JoinHandle<std::io::Result<()>>,
    /// Present when `start` had to build its own runtime.
    runtime: Option<Runtime>,
    handle: Handle,
}

impl Default for HttpServer {
    fn default() -> Self {
        Self::new(ServerConfig::default())
    }
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(options: ServerConfig) -> Self {
        Self {
            options,
            shutdown: Shutdown::new(),
            inflight: InFlight::new(),
            running: None,
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.options.port = port;
        self
    }

    pub fn max_request_size(mut self, bytes: usize) -> Self {
        self.options.max_request_size = bytes;
        self
    }

    pub fn buffer_size(mut self, bytes: usize) -> Self {
        self.options.buffer_size = bytes;
        self
    }

    pub fn worker_threads(mut self, threads: usize) -> Self {
        self.options.worker_threads = threads;
        self
    }

    pub fn default_headers(mut self, enabled: bool) -> Self {
        self.options.default_headers = enabled;
        self
    }

    pub fn gzip(mut self, enabled: bool) -> Self {
        self.options.gzip = enabled;
        self
    }

    /// Requests currently being handled.
    pub fn in_flight(&self) -> u64 {
        self.inflight.active_count()
    }

    /// Build the axum app with all middleware layers.
    #[allow(deprecated)]
    pub fn app(&self, router: Arc<Router>) -> axum::Router {
        let state = AppState {
            router,
            workers: WorkerPool::new(self.options.worker_threads),
            inflight: self.inflight.clone(),
            max_request_size: self.options.max_request_size,
            buffer_size: self.options.buffer_size,
        };

        let mut app = axum::Router::new().fallback(dispatch).with_state(state);

        if self.options.gzip {
            app = app.layer(CompressionLayer::new());
        }
        if self.options.default_headers {
            app = app
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::SERVER,
                    HeaderValue::from_static(SERVER_NAME),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::DATE,
                    |_: &Response| http_date(),
                ));
        }

        app.layer(TimeoutLayer::new(Duration::from_secs(
            self.options.request_timeout_secs,
        )))
        .layer(PropagateRequestIdLayer::new(REQUEST_ID_HEADER.clone()))
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &axum::extract::Request| {
                tracing::info_span!(
                    "request",
                    method = %req.method(),
                    uri = %req.uri(),
                    request_id = %request_id(req),
                )
            }),
        )
        .layer(SetRequestIdLayer::new(
            REQUEST_ID_HEADER.clone(),
            RequestIdMaker,
        ))
    }

    /// Serve `router` on `listener` until `shutdown` resolves.
    ///
    /// Fires `on_start` before serving, `on_ready` once the listener accepts,
    /// and `on_stop` after the server drained.
    pub async fn run<F>(&self, router: Router, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = Arc::new(router);
        router.fire_start()?;
        let addr = listener.local_addr()?;
        let serving = serve(self.app(Arc::clone(&router)), listener, shutdown);
        tracing::info!(address = %addr, "HTTP server started");
        router.fire_ready()?;

        let result = serving.await;
        router.fire_stop();
        tracing::info!("HTTP server stopped");
        result.map_err(Error::from)
    }
}

impl Server for HttpServer {
    fn options(&self) -> &ServerConfig {
        &self.options
    }

    fn start(&mut self, router: Router) -> Result<SocketAddr> {
        if self.running.is_some() {
            return Err(Error::Server("server already started".to_string()));
        }

        // 1. Bind synchronously so errors surface here
        let std_listener = std::net::TcpListener::bind(self.options.bind_address())?;
        std_listener.set_nonblocking(true)?;
        let addr = std_listener.local_addr()?;

        // 2. Reuse the caller's runtime or build one
        let (handle, runtime) = match Handle::try_current() {
            Ok(handle) => (handle, None),
            Err(_) => {
                let runtime = tokio::runtime::Builder::new_multi_thread()
                    .enable_all()
                    .thread_name("switchyard-io")
                    .max_blocking_threads(self.options.worker_threads.max(1))
                    .build()?;
                (runtime.handle().clone(), Some(runtime))
            }
        };
        let listener = {
            let _enter = handle.enter();
            TcpListener::from_std(std_listener)?
        };

        // 3. Hooks and serve
        let router = Arc::new(router);
        router.fire_start()?;
        let app = self.app(Arc::clone(&router));
        let task = handle.spawn(serve(app, listener, shutdown::wait(self.shutdown.subscribe())));
        self.running = Some(Running {
            router: Arc::clone(&router),
            task,
            runtime,
            handle,
        });
        if let Err(e) = router.fire_ready() {
            self.stop()?;
            return Err(e);
        }

        tracing::info!(
            address = %addr,
            worker_threads = self.options.worker_threads,
            max_request_size = self.options.max_request_size,
            gzip = self.options.gzip,
            "HTTP server started"
        );

        Ok(addr)
    }

    fn stop(&mut self) -> Result<()> {
        let Some(Running {
            router,
            task,
            runtime,
            handle,
        }) = self.running.take()
        else {
            return Ok(());
        };
        let timeout = Duration::from_secs(self.options.shutdown_timeout_secs);

        router.fire_stop();
        self.shutdown.trigger();

        let inflight = self.inflight.clone();
        let drain = async move {
            let served = tokio::time::timeout(timeout, task).await;
            if !inflight.wait_idle(timeout).await {
                tracing::warn!(active = inflight.active_count(), "Requests still running at shutdown");
            }
            served
        };

        match runtime {
            Some(runtime) => {
                let result = runtime.block_on(drain);
                runtime.shutdown_timeout(timeout);
                drained(result)?;
            }
            None => match Handle::try_current().map(|current| current.runtime_flavor()) {
                // A current-thread scheduler cannot be blocked: drain in the background.
                Ok(RuntimeFlavor::CurrentThread) => {
                    handle.spawn(async move {
                        if drained(drain.await).is_err() {
                            tracing::warn!("Server did not stop cleanly");
                        }
                    });
                }
                Ok(_) => drained(tokio::task::block_in_place(|| handle.block_on(drain)))?,
                Err(_) => drained(handle.block_on(drain))?,
            },
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

impl Drop for HttpServer {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            tracing::error!(error = %e, "Failed to stop server");
        }
    }
}

/// Outcome of waiting for the serve task.
fn drained(
    result: std::result::Result<
        std::result::Result<std::io::Result<()>, tokio::task::JoinError>,
        tokio::time::error::Elapsed,
    >,
) -> Result<()> {
    match result {
        Ok(Ok(Ok(()))) => Ok(()),
        Ok(Ok(Err(e))) => Err(Error::Io(e)),
        Ok(Err(join)) => Err(Error::Server(join.to_string())),
        Err(_) => {
            tracing::warn!("Server did not stop within the shutdown timeout");
            Ok(())
        }
    }
}

/// Serve with graceful shutdown.
async fn serve<F>(app: axum::Router, listener: TcpListener, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

/// Current time as an RFC 7231 date.
fn http_date() -> Option<HeaderValue> {
    let now = chrono::Utc::now();
    HeaderValue::from_str(&now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()).ok()
}
