//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP backend settings.
    pub server: ServerConfig,

    /// Route matching options.
    pub router: RouterConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// HTTP backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind host (e.g., "0.0.0.0").
    pub host: String,

    /// Bind port. 0 picks a free port.
    pub port: u16,

    /// Largest accepted request body in bytes.
    pub max_request_size: usize,

    /// Chunk size used when streaming responses.
    pub buffer_size: usize,

    /// Handlers running at the same time.
    pub worker_threads: usize,

    /// Add `Date` and `Server` response headers.
    pub default_headers: bool,

    /// Gzip responses when the client accepts it.
    pub gzip: bool,

    /// Request timeout (total time for request/response) in seconds.
    pub request_timeout_secs: u64,

    /// How long `stop` waits for in-flight requests, in seconds.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_request_size: 10 * 1024 * 1024, // 10MB
            buffer_size: 16 * 1024,
            worker_threads: 200,
            default_headers: true,
            gzip: false,
            request_timeout_secs: 30,
            shutdown_timeout_secs: 10,
        }
    }
}

impl ServerConfig {
    /// `host:port` as a bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Route matching options.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Prefix all routes are mounted under.
    pub context_path: String,

    /// Treat `/a/` and `/a` as the same path.
    pub ignore_trailing_slash: bool,

    /// Match static path segments case-sensitively.
    pub case_sensitive: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            context_path: "/".to_string(),
            ignore_trailing_slash: false,
            case_sensitive: true,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
