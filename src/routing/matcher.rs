//! Route matching conditions.
//!
//! # Responsibilities
//! - Match host header (exact match, case-insensitive)
//! - Match request Content-Type against what a route consumes
//! - Match request Accept against what a route produces
//!
//! # Design Decisions
//! - Conditions run after the path matched; all must pass (AND)
//! - A failed condition carries its own error, so the status is 415/406/404
//! - Requests without Content-Type or Accept pass the media type checks

use std::fmt::Debug;

use axum::http::header;

use crate::context::{Context, MediaType};
use crate::error::Error;

/// Trait for matching requests against conditions.
pub trait Matcher: Send + Sync + Debug {
    /// Returns true if the request matches this condition.
    fn matches(&self, ctx: &dyn Context) -> bool;

    /// Error reported when `matches` returned false.
    fn rejection(&self, ctx: &dyn Context) -> Error;
}

/// Matches the Host header.
#[derive(Debug, Clone)]
pub struct HostMatcher {
    expected_host: String,
}

impl HostMatcher {
    /// Create a new host matcher.
    /// The host is normalized to lowercase for case-insensitive matching.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            expected_host: host.into().to_lowercase(),
        }
    }
}

impl Matcher for HostMatcher {
    fn matches(&self, ctx: &dyn Context) -> bool {
        let Some(host) = ctx.header(header::HOST.as_str()) else {
            return false;
        };
        let host = host.to_lowercase();
        if host == self.expected_host {
            return true;
        }
        // `example.com` also matches `example.com:8080`
        !self.expected_host.contains(':')
            && host
                .rsplit_once(':')
                .is_some_and(|(name, _port)| name == self.expected_host)
    }

    fn rejection(&self, ctx: &dyn Context) -> Error {
        Error::NotFound(ctx.path().to_string())
    }
}

/// Matches the request Content-Type.
#[derive(Debug, Clone)]
pub struct ConsumesMatcher {
    types: Vec<MediaType>,
}

impl ConsumesMatcher {
    pub fn new(types: Vec<MediaType>) -> Self {
        Self { types }
    }
}

impl Matcher for ConsumesMatcher {
    fn matches(&self, ctx: &dyn Context) -> bool {
        if ctx.header(header::CONTENT_TYPE.as_str()).is_none() {
            return true;
        }
        match ctx.content_type() {
            Some(content_type) => self.types.iter().any(|t| t.matches(&content_type)),
            None => false,
        }
    }

    fn rejection(&self, ctx: &dyn Context) -> Error {
        Error::UnsupportedMediaType(
            ctx.header(header::CONTENT_TYPE.as_str())
                .unwrap_or_default()
                .to_string(),
        )
    }
}

/// Matches the request Accept header.
#[derive(Debug, Clone)]
pub struct ProducesMatcher {
    types: Vec<MediaType>,
}

impl ProducesMatcher {
    pub fn new(types: Vec<MediaType>) -> Self {
        Self { types }
    }
}

impl Matcher for ProducesMatcher {
    fn matches(&self, ctx: &dyn Context) -> bool {
        MediaType::negotiate(ctx.header(header::ACCEPT.as_str()), &self.types).is_some()
    }

    fn rejection(&self, _ctx: &dyn Context) -> Error {
        let offered: Vec<String> = self.types.iter().map(MediaType::essence).collect();
        Error::NotAcceptable(offered.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockContext;

    #[test]
    fn test_host_matcher() {
        let matcher = HostMatcher::new("example.com");

        let mut ctx = MockContext::new();
        ctx.set_request_header("Host", "example.com");
        assert!(matcher.matches(&ctx));

        ctx.set_request_header("Host", "EXAMPLE.COM:8080");
        assert!(matcher.matches(&ctx)); // Case insensitive, port ignored

        ctx.set_request_header("Host", "other.com");
        assert!(!matcher.matches(&ctx));
        assert_eq!(
            matcher.rejection(&ctx).status_code(),
            axum::http::StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_consumes_matcher() {
        let matcher = ConsumesMatcher::new(vec![MediaType::json()]);

        let mut ctx = MockContext::new();
        assert!(matcher.matches(&ctx));

        ctx.set_request_header("Content-Type", "application/json; charset=utf-8");
        assert!(matcher.matches(&ctx));

        ctx.set_request_header("Content-Type", "text/plain");
        assert!(!matcher.matches(&ctx));
        assert_eq!(
            matcher.rejection(&ctx).status_code(),
            axum::http::StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
    }

    #[test]
    fn test_produces_matcher() {
        let matcher = ProducesMatcher::new(vec![MediaType::json()]);

        let mut ctx = MockContext::new();
        assert!(matcher.matches(&ctx));

        ctx.set_request_header("Accept", "text/html, */*;q=0.1");
        assert!(matcher.matches(&ctx));

        ctx.set_request_header("Accept", "text/html");
        assert!(!matcher.matches(&ctx));
        assert_eq!(
            matcher.rejection(&ctx).status_code(),
            axum::http::StatusCode::NOT_ACCEPTABLE
        );
    }
}
