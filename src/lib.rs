//! switchyard: an embeddable HTTP server framework.
//!
//! Applications register routes on a [`RouterBuilder`], build an immutable
//! [`Router`] and hand it to a backend such as [`HttpServer`]. Handlers are
//! plain synchronous functions over a [`Context`] and run on worker threads.
//!
//! ```ignore
//! let mut routes = Router::builder();
//! routes.get("/hello/{name}", |ctx| Ok(format!("hello {}", ctx.path_param("name")?)));
//!
//! let mut server = HttpServer::default().port(8080);
//! server.start(routes.build()?)?;
//! ```

// Core
pub mod context;
pub mod error;
pub mod routing;
pub mod server;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

// Test harness
pub mod testing;

pub use context::{Context, Output};
pub use error::{Error, Result};
pub use routing::{Route, Router, RouterBuilder};
pub use server::{HttpServer, Server};
