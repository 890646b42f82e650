//! Drive a `Router` with `MockContext`s.

use std::sync::Arc;

use axum::http::Method;

use crate::routing::Router;
use crate::testing::{MockContext, MockResponse};

/// Runs requests against a built router without a server.
pub struct MockRouter {
    router: Arc<Router>,
    full_execution: bool,
}

impl MockRouter {
    pub fn new(router: Router) -> Self {
        Self {
            router: Arc::new(router),
            full_execution: false,
        }
    }

    /// Render outputs and errors into bytes instead of recording them.
    pub fn full_execution(mut self, full: bool) -> Self {
        self.full_execution = full;
        self
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub fn get(&self, path: &str) -> MockResponse {
        self.call(Method::GET, path, |_| {})
    }

    pub fn post(&self, path: &str) -> MockResponse {
        self.call(Method::POST, path, |_| {})
    }

    pub fn put(&self, path: &str) -> MockResponse {
        self.call(Method::PUT, path, |_| {})
    }

    pub fn delete(&self, path: &str) -> MockResponse {
        self.call(Method::DELETE, path, |_| {})
    }

    /// Run `method path` after letting `configure` adjust the request.
    pub fn call<F>(&self, method: Method, path: &str, configure: F) -> MockResponse
    where
        F: FnOnce(&mut MockContext),
    {
        let mut ctx = MockContext::new().with_router(Arc::clone(&self.router));
        ctx.set_method(method)
            .set_path_string(path)
            .set_full_execution(self.full_execution);
        configure(&mut ctx);
        self.router.handle(&mut ctx);
        ctx.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Context, Output};
    use axum::http::StatusCode;

    fn router() -> Router {
        let mut builder = Router::builder();
        builder.get("/greet/{name}", |ctx| {
            Ok(format!("hi {}", ctx.path_param("name")?))
        });
        builder.post("/echo", |ctx| ctx.body().text());
        builder.build().unwrap()
    }

    #[test]
    fn records_handler_output() {
        let response = MockRouter::new(router()).get("/greet/ada");
        assert_eq!(response.value(), Some(&Output::Text("hi ada".into())));
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn configure_sets_body() {
        let response = MockRouter::new(router()).call(Method::POST, "/echo", |ctx| {
            ctx.set_body("ping");
        });
        assert_eq!(response.value(), Some(&Output::Text("ping".into())));
    }

    #[test]
    fn full_execution_renders_bytes() {
        let mock = MockRouter::new(router()).full_execution(true);
        let response = mock.get("/greet/bo");
        assert_eq!(response.body_text(), "hi bo");
        assert_eq!(response.content_type(), Some("text/plain;charset=utf-8"));

        let missing = mock.get("/nope");
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert!(missing.body_text().contains("\"status\":404"));
    }
}
