//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (server::HttpServer::start):
//!     Build router → Bind listener → on_start hooks → Serve → on_ready hooks
//!
//! Shutdown (shutdown.rs):
//!     Signal received → on_stop hooks → Stop accepting → Drain requests → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Routes are compiled before the listener binds (traffic only when ready)
//! - Ordered shutdown: stop accept, drain, close
//! - Shutdown has timeout: forced exit after deadline

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::shutdown_signal;
