//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Compilation (at startup):
//!     RouterBuilder (routes, decorators, renderers)
//!     → pattern.rs (parse patterns)
//!     → tree.rs (merge into segment tree)
//!     → pipeline.rs (wrap handlers)
//!     → Freeze as immutable Router
//!
//! Incoming Request (method, path, headers)
//!     → router.rs (tree lookup)
//!     → matcher.rs (evaluate match conditions)
//!     → route pipeline → renderer.rs
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Deterministic: static segments beat parameters, parameters beat wildcards
//! - Regex only for constrained parameters, anchored per segment

pub mod matcher;
pub mod pattern;
pub mod pipeline;
pub mod renderer;
pub mod route;
pub mod router;
pub(crate) mod tree;

pub use matcher::{ConsumesMatcher, HostMatcher, Matcher, ProducesMatcher};
pub use pattern::PathPattern;
pub use pipeline::{Decorator, Handler, Next};
pub use renderer::{JsonRenderer, Renderer, TextRenderer};
pub use route::{Route, RouteMethod, RouteSet};
pub use router::{default_error_handler, RouteMatch, Router, RouterBuilder};
