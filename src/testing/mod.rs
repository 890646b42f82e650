//! Test harness for route handlers.
//!
//! `MockContext` implements `Context` without sockets; `MockRouter` drives a
//! built `Router` with it and hands back a `MockResponse`.
//!
//! ```ignore
//! let mut builder = Router::builder();
//! builder.get("/hello/{name}", |ctx| Ok(format!("hi {}", ctx.path_param("name")?)));
//! let router = MockRouter::new(builder.build()?);
//! let response = router.get("/hello/ada");
//! assert_eq!(response.value(), Some(&Output::Text("hi ada".into())));
//! ```

pub mod mock_context;
pub mod mock_response;
pub mod mock_router;

pub use mock_context::MockContext;
pub use mock_response::MockResponse;
pub use mock_router::MockRouter;
