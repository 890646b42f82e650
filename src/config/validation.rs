//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (sizes > 0, timeouts > 0, addresses parse)
//! - Check the router context path and log level
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::AppConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("server.{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("server.host '{0}' is not a valid bind host")]
    InvalidHost(String),

    #[error("server.buffer_size ({buffer_size}) exceeds server.max_request_size ({max_request_size})")]
    BufferLargerThanRequest {
        buffer_size: usize,
        max_request_size: usize,
    },

    #[error("router.context_path '{0}' must start with '/'")]
    InvalidContextPath(String),

    #[error("observability.log_level '{0}' is not one of trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("observability.metrics_address '{0}' is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Check every semantic rule and report all failures.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let server = &config.server;

    for (field, value) in [
        ("max_request_size", server.max_request_size as u64),
        ("buffer_size", server.buffer_size as u64),
        ("worker_threads", server.worker_threads as u64),
        ("request_timeout_secs", server.request_timeout_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    if server.host.trim().is_empty() || server.host.contains(char::is_whitespace) {
        errors.push(ValidationError::InvalidHost(server.host.clone()));
    }

    if server.max_request_size > 0 && server.buffer_size > server.max_request_size {
        errors.push(ValidationError::BufferLargerThanRequest {
            buffer_size: server.buffer_size,
            max_request_size: server.max_request_size,
        });
    }

    if !config.router.context_path.starts_with('/') {
        errors.push(ValidationError::InvalidContextPath(
            config.router.context_path.clone(),
        ));
    }

    let level = config.observability.log_level.to_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::InvalidLogLevel(
            config.observability.log_level.clone(),
        ));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
