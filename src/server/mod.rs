//! Server backends.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → axum / hyper (HTTP/1.1, HTTP/2)
//!     → middleware (request id, trace, timeout, headers, gzip)
//!     → dispatch.rs (buffer body, build ServerContext)
//!     → worker.rs (blocking thread, bounded)
//!     → Router::handle(&mut ServerContext)
//!     → oneshot / mpsc back to the connection
//! ```
//!
//! # Design Decisions
//! - Handlers never run on I/O threads
//! - Backends only see `Router`; routing logic lives in `routing`

pub mod context;
pub mod dispatch;
pub mod http_server;
pub mod inflight;
pub mod request_id;
pub mod worker;

use std::net::SocketAddr;

use crate::config::ServerConfig;
use crate::error::Result;
use crate::routing::Router;

pub use context::ServerContext;
pub use http_server::HttpServer;

/// Contract between the framework and a concrete HTTP stack.
pub trait Server {
    /// Options the backend was configured with.
    fn options(&self) -> &ServerConfig;

    /// Bind, fire `on_start`/`on_ready` and begin serving. Returns the bound address.
    fn start(&mut self, router: Router) -> Result<SocketAddr>;

    /// Fire `on_stop`, stop accepting and drain in-flight requests.
    fn stop(&mut self) -> Result<()>;
}
