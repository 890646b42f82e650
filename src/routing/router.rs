//! Route registration, lookup and dispatch.
//!
//! # Responsibilities
//! - Collect routes, decorators, renderers and error handlers (`RouterBuilder`)
//! - Compile them into an immutable `Router`
//! - Look up the route for a request and run its pipeline against a `Context`
//! - Render handler outputs and turn failures into error responses
//!
//! # Data Flow
//! ```text
//! Context (method, path)
//!     → strip context path, split + decode segments
//!     → tree.search()            → 404 / 405 (Allow)
//!     → route matchers           → 415 / 406
//!     → decorators → handler     → Output
//!     → ctx.render(output)       → renderer → bytes
//!     ↳ on error: error_code() → error handler
//! ```
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Lookup cost follows path depth, not route count
//! - Explicit NotFound / MethodNotAllowed rather than a silent default
//! - Duplicate method + pattern pairs fail the build

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::http::header::{self, HeaderValue};
use axum::http::{Method, StatusCode};
use serde_json::json;

use crate::config::RouterConfig;
use crate::context::{Context, MediaType, Output, PathMap};
use crate::error::{Error, Result};
use crate::routing::pattern::{self, PathPattern};
use crate::routing::pipeline::{self, Decorator, Next};
use crate::routing::renderer::{JsonRenderer, Renderer, TextRenderer};
use crate::routing::route::{Route, RouteMethod, RouteSet};
use crate::routing::tree::Node;

/// Produces the error response once the status is known.
pub type ErrorHandler = Arc<dyn Fn(&mut dyn Context, &Error, StatusCode) -> Result<()> + Send + Sync>;

/// Overrides the status code chosen for an error.
pub type ErrorCodeMapper = Arc<dyn Fn(&Error) -> Option<StatusCode> + Send + Sync>;

/// Lifecycle callback fired by server backends.
pub type Hook = Box<dyn Fn() -> Result<()> + Send + Sync>;

/// A successful lookup.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub route: Arc<Route>,
    pub params: PathMap,
}

/// Collects routes and settings. Consumed by `build`.
pub struct RouterBuilder {
    routes: Vec<Route>,
    decorators: Vec<Decorator>,
    prefix: String,
    renderers: HashMap<String, Arc<dyn Renderer>>,
    error_handler: Option<ErrorHandler>,
    error_codes: Vec<ErrorCodeMapper>,
    start_hooks: Vec<Hook>,
    ready_hooks: Vec<Hook>,
    stop_hooks: Vec<Hook>,
    context_path: String,
    ignore_trailing_slash: bool,
    case_sensitive: bool,
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterBuilder {
    pub fn new() -> Self {
        let mut renderers: HashMap<String, Arc<dyn Renderer>> = HashMap::new();
        renderers.insert("json".to_string(), Arc::new(JsonRenderer));
        renderers.insert("text".to_string(), Arc::new(TextRenderer));
        Self {
            routes: Vec::new(),
            decorators: Vec::new(),
            prefix: String::new(),
            renderers,
            error_handler: None,
            error_codes: Vec::new(),
            start_hooks: Vec::new(),
            ready_hooks: Vec::new(),
            stop_hooks: Vec::new(),
            context_path: String::new(),
            ignore_trailing_slash: false,
            case_sensitive: true,
        }
    }

    /// Apply the `[router]` configuration section.
    pub fn with_config(&mut self, config: &RouterConfig) -> &mut Self {
        self.context_path(&config.context_path)
            .ignore_trailing_slash(config.ignore_trailing_slash)
            .case_sensitive(config.case_sensitive)
    }

    /// Prefix every route is mounted under. Requests outside it get 404.
    pub fn context_path(&mut self, path: &str) -> &mut Self {
        let trimmed = path.trim().trim_end_matches('/');
        self.context_path = if trimmed.is_empty() {
            String::new()
        } else if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{}", trimmed)
        };
        self
    }

    pub fn ignore_trailing_slash(&mut self, ignore: bool) -> &mut Self {
        self.ignore_trailing_slash = ignore;
        self
    }

    pub fn case_sensitive(&mut self, sensitive: bool) -> &mut Self {
        self.case_sensitive = sensitive;
        self
    }

    /// Register a route. Returns the definition for further configuration.
    pub fn route<F, O>(&mut self, method: impl Into<RouteMethod>, pattern: &str, handler: F) -> &mut Route
    where
        F: Fn(&mut dyn Context) -> Result<O> + Send + Sync + 'static,
        O: Into<Output>,
    {
        let route = Route::new(
            method.into(),
            pattern::join(&self.prefix, pattern),
            pipeline::handler(handler),
            self.decorators.clone(),
        );
        self.routes.push(route);
        let last = self.routes.len() - 1;
        &mut self.routes[last]
    }

    pub fn get<F, O>(&mut self, pattern: &str, handler: F) -> &mut Route
    where
        F: Fn(&mut dyn Context) -> Result<O> + Send + Sync + 'static,
        O: Into<Output>,
    {
        self.route(Method::GET, pattern, handler)
    }

    pub fn post<F, O>(&mut self, pattern: &str, handler: F) -> &mut Route
    where
        F: Fn(&mut dyn Context) -> Result<O> + Send + Sync + 'static,
        O: Into<Output>,
    {
        self.route(Method::POST, pattern, handler)
    }

    pub fn put<F, O>(&mut self, pattern: &str, handler: F) -> &mut Route
    where
        F: Fn(&mut dyn Context) -> Result<O> + Send + Sync + 'static,
        O: Into<Output>,
    {
        self.route(Method::PUT, pattern, handler)
    }

    pub fn delete<F, O>(&mut self, pattern: &str, handler: F) -> &mut Route
    where
        F: Fn(&mut dyn Context) -> Result<O> + Send + Sync + 'static,
        O: Into<Output>,
    {
        self.route(Method::DELETE, pattern, handler)
    }

    pub fn patch<F, O>(&mut self, pattern: &str, handler: F) -> &mut Route
    where
        F: Fn(&mut dyn Context) -> Result<O> + Send + Sync + 'static,
        O: Into<Output>,
    {
        self.route(Method::PATCH, pattern, handler)
    }

    pub fn head<F, O>(&mut self, pattern: &str, handler: F) -> &mut Route
    where
        F: Fn(&mut dyn Context) -> Result<O> + Send + Sync + 'static,
        O: Into<Output>,
    {
        self.route(Method::HEAD, pattern, handler)
    }

    pub fn options<F, O>(&mut self, pattern: &str, handler: F) -> &mut Route
    where
        F: Fn(&mut dyn Context) -> Result<O> + Send + Sync + 'static,
        O: Into<Output>,
    {
        self.route(Method::OPTIONS, pattern, handler)
    }

    pub fn trace<F, O>(&mut self, pattern: &str, handler: F) -> &mut Route
    where
        F: Fn(&mut dyn Context) -> Result<O> + Send + Sync + 'static,
        O: Into<Output>,
    {
        self.route(Method::TRACE, pattern, handler)
    }

    /// Route matching every method.
    pub fn any<F, O>(&mut self, pattern: &str, handler: F) -> &mut Route
    where
        F: Fn(&mut dyn Context) -> Result<O> + Send + Sync + 'static,
        O: Into<Output>,
    {
        self.route(RouteMethod::Any, pattern, handler)
    }

    /// Wrap every route registered after this call (within the current group).
    pub fn decorator<F>(&mut self, decorator: F) -> &mut Self
    where
        F: Fn(&mut dyn Context, Next<'_>) -> Result<Output> + Send + Sync + 'static,
    {
        self.decorators.push(pipeline::decorator(decorator));
        self
    }

    /// Run `hook` ahead of every later route. Sending a response skips the handler.
    pub fn before<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&mut dyn Context) -> Result<()> + Send + Sync + 'static,
    {
        self.decorators.push(pipeline::before(hook));
        self
    }

    /// Post-process the output of every later route.
    pub fn after<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&mut dyn Context, &mut Output) -> Result<()> + Send + Sync + 'static,
    {
        self.decorators.push(pipeline::after(hook));
        self
    }

    /// Register routes under `prefix`. Decorators added inside stay inside.
    pub fn path<F>(&mut self, prefix: &str, routes: F) -> RouteSet<'_>
    where
        F: FnOnce(&mut RouterBuilder),
    {
        let nested = pattern::join(&self.prefix, prefix);
        let saved_prefix = std::mem::replace(&mut self.prefix, nested);
        let saved_decorators = self.decorators.len();
        let start = self.routes.len();

        routes(self);

        self.prefix = saved_prefix;
        self.decorators.truncate(saved_decorators);
        RouteSet::new(&mut self.routes[start..])
    }

    /// Register a renderer under `name`, replacing any previous one.
    pub fn renderer(&mut self, name: &str, renderer: impl Renderer + 'static) -> &mut Self {
        self.renderers.insert(name.to_string(), Arc::new(renderer));
        self
    }

    /// Replace the default error handler.
    pub fn error<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&mut dyn Context, &Error, StatusCode) -> Result<()> + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    /// Map errors to status codes. Mappers run in registration order; `None` falls through.
    pub fn error_code<F>(&mut self, mapper: F) -> &mut Self
    where
        F: Fn(&Error) -> Option<StatusCode> + Send + Sync + 'static,
    {
        self.error_codes.push(Arc::new(mapper));
        self
    }

    pub fn on_start<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn() -> Result<()> + Send + Sync + 'static,
    {
        self.start_hooks.push(Box::new(hook));
        self
    }

    pub fn on_ready<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn() -> Result<()> + Send + Sync + 'static,
    {
        self.ready_hooks.push(Box::new(hook));
        self
    }

    pub fn on_stop<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn() -> Result<()> + Send + Sync + 'static,
    {
        self.stop_hooks.push(Box::new(hook));
        self
    }

    /// Compile patterns and pipelines into an immutable router.
    pub fn build(self) -> Result<Router> {
        let mut tree = Node::default();
        let mut routes = Vec::with_capacity(self.routes.len());

        for (index, mut route) in self.routes.into_iter().enumerate() {
            // 1. Parse the pattern with the final router options
            let pattern = PathPattern::parse(
                route.pattern(),
                self.ignore_trailing_slash,
                self.case_sensitive,
            )?;

            // 2. Merge into the tree; an identical method + pattern is a conflict
            tree.insert(pattern.segments(), route.method(), index)
                .map_err(|_| Error::DuplicateRoute {
                    method: route.method().to_string(),
                    pattern: route.pattern().to_string(),
                })?;

            // 3. Compose the pipeline
            route.compile(&pattern);
            tracing::debug!(method = %route.method(), pattern = %route.pattern(), "Route registered");
            routes.push(Arc::new(route));
        }

        tracing::info!(
            routes = routes.len(),
            context_path = %self.context_path,
            "Router built"
        );

        Ok(Router {
            routes,
            tree,
            renderers: self.renderers,
            error_handler: self
                .error_handler
                .unwrap_or_else(|| Arc::new(default_error_handler)),
            error_codes: self.error_codes,
            start_hooks: self.start_hooks,
            ready_hooks: self.ready_hooks,
            stop_hooks: self.stop_hooks,
            context_path: self.context_path,
            ignore_trailing_slash: self.ignore_trailing_slash,
            case_sensitive: self.case_sensitive,
        })
    }
}

/// Compiled, immutable router shared by every request.
pub struct Router {
    routes: Vec<Arc<Route>>,
    tree: Node,
    renderers: HashMap<String, Arc<dyn Renderer>>,
    error_handler: ErrorHandler,
    error_codes: Vec<ErrorCodeMapper>,
    start_hooks: Vec<Hook>,
    ready_hooks: Vec<Hook>,
    stop_hooks: Vec<Hook>,
    context_path: String,
    ignore_trailing_slash: bool,
    case_sensitive: bool,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }

    pub fn context_path(&self) -> &str {
        if self.context_path.is_empty() {
            "/"
        } else {
            &self.context_path
        }
    }

    /// Find the route for `method` and `path`.
    pub fn match_route(&self, method: &Method, path: &str) -> Result<RouteMatch> {
        let not_found = || Error::NotFound(path.to_string());

        let relative = self.strip_context_path(path).ok_or_else(not_found)?;
        let segments = self.split(relative)?;
        let folded: Option<Vec<String>> = if self.case_sensitive {
            None
        } else {
            Some(segments.iter().map(|s| s.to_lowercase()).collect())
        };

        let mut params = Vec::new();
        if let Some(index) = self
            .tree
            .search(&segments, folded.as_deref(), method, &mut params)
        {
            return Ok(RouteMatch {
                route: Arc::clone(&self.routes[index]),
                params: params.into_iter().collect(),
            });
        }

        let mut allowed = Vec::new();
        self.tree
            .allowed_methods(&segments, folded.as_deref(), &mut allowed);
        if allowed.is_empty() {
            return Err(not_found());
        }
        allowed.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Err(Error::MethodNotAllowed {
            method: method.clone(),
            allowed,
        })
    }

    fn strip_context_path<'p>(&self, path: &'p str) -> Option<&'p str> {
        if self.context_path.is_empty() {
            return Some(path);
        }
        let rest = path.strip_prefix(self.context_path.as_str())?;
        (rest.is_empty() || rest.starts_with('/')).then_some(rest)
    }

    /// Split a request path into percent-decoded segments.
    fn split(&self, path: &str) -> Result<Vec<String>> {
        let mut body = path.strip_prefix('/').unwrap_or(path);
        if self.ignore_trailing_slash {
            body = body.trim_end_matches('/');
        }
        if body.is_empty() {
            return Ok(Vec::new());
        }
        body.split('/')
            .map(|segment| {
                urlencoding::decode(segment)
                    .map(Cow::into_owned)
                    .map_err(|_| Error::BadRequest(format!("malformed path segment '{}'", segment)))
            })
            .collect()
    }

    /// Route the request in `ctx`, run its pipeline and render the result.
    /// Failures are turned into error responses through `Context::send_error`.
    pub fn handle(&self, ctx: &mut dyn Context) {
        if let Err(err) = self.dispatch(ctx) {
            ctx.send_error(err);
        }
    }

    fn dispatch(&self, ctx: &mut dyn Context) -> Result<()> {
        let method = ctx.method().clone();
        let path = ctx.path().to_string();

        // 1. Lookup
        let RouteMatch { route, params } = self.match_route(&method, &path)?;
        ctx.set_path_map(params);
        ctx.set_route(Arc::clone(&route));

        // 2. Extra conditions
        if let Some(matcher) = route.matchers().iter().find(|m| !m.matches(&*ctx)) {
            return Err(matcher.rejection(&*ctx));
        }

        // 3. Pipeline
        let output = route.call(ctx)?;

        // 4. Render unless the handler already replied
        if !ctx.is_response_started() {
            ctx.render(output)?;
        }
        Ok(())
    }

    /// Write `output` as the response.
    pub fn render(&self, ctx: &mut dyn Context, output: Output) -> Result<()> {
        match output {
            Output::Empty => {
                let status = ctx.response_code();
                ctx.send_status(status)
            }
            Output::Status(status) => ctx.send_status(status),
            Output::Bytes(bytes) => {
                if ctx.response_type().is_none() {
                    ctx.set_response_type(&MediaType::octet_stream())?;
                }
                ctx.send_bytes(bytes)
            }
            output => {
                let fallback = if matches!(output, Output::Json(_)) {
                    "json"
                } else {
                    "text"
                };
                let name = ctx
                    .route()
                    .and_then(|route| route.renderer_name())
                    .unwrap_or(fallback)
                    .to_string();
                let renderer = self
                    .renderers
                    .get(&name)
                    .ok_or(Error::RendererNotFound(name))?;
                let body = renderer.render(&output)?;
                if ctx.response_type().is_none() {
                    ctx.set_response_type(&renderer.media_type())?;
                }
                ctx.send_bytes(body)
            }
        }
    }

    /// Status code for `err`: custom mappers first, then `Error::status_code`.
    pub fn error_code(&self, err: &Error) -> StatusCode {
        self.error_codes
            .iter()
            .find_map(|mapper| mapper(err))
            .unwrap_or_else(|| err.status_code())
    }

    /// Turn `err` into an error response.
    pub fn report_error(&self, ctx: &mut dyn Context, err: Error) {
        let status = self.error_code(&err);

        if ctx.is_response_started() {
            tracing::error!(
                method = %ctx.method(),
                path = %ctx.path(),
                error = %err,
                "Error after response started"
            );
            return;
        }

        if status.is_server_error() {
            tracing::error!(
                method = %ctx.method(),
                path = %ctx.path(),
                status = status.as_u16(),
                error = %err,
                "Request failed"
            );
        } else {
            tracing::debug!(
                method = %ctx.method(),
                path = %ctx.path(),
                status = status.as_u16(),
                error = %err,
                "Request rejected"
            );
        }

        if let Some(value) = allow_header(&err) {
            ctx.set_response_header(header::ALLOW, value);
        }

        ctx.set_response_code(status);
        if let Err(handler_err) = (self.error_handler)(&mut *ctx, &err, status) {
            tracing::error!(error = %handler_err, "Error handler failed");
            if !ctx.is_response_started() {
                if let Err(fallback_err) = ctx.send_status(status) {
                    tracing::debug!(error = %fallback_err, "Fallback error response not sent");
                }
            }
        }
    }

    pub fn fire_start(&self) -> Result<()> {
        self.start_hooks.iter().try_for_each(|hook| hook())
    }

    pub fn fire_ready(&self) -> Result<()> {
        self.ready_hooks.iter().try_for_each(|hook| hook())
    }

    /// Run every stop hook, newest first. Failures are logged, not propagated.
    pub fn fire_stop(&self) {
        for hook in self.stop_hooks.iter().rev() {
            if let Err(err) = hook() {
                tracing::warn!(error = %err, "Stop hook failed");
            }
        }
    }
}

/// `Allow` value for a 405, e.g. `GET, POST`.
pub(crate) fn allow_header(err: &Error) -> Option<HeaderValue> {
    let Error::MethodNotAllowed { allowed, .. } = err else {
        return None;
    };
    let allow: Vec<&str> = allowed.iter().map(Method::as_str).collect();
    HeaderValue::from_str(&allow.join(", ")).ok()
}

/// JSON `{"message","status","reason"}` or plain text, whichever the client accepts.
pub fn default_error_handler(ctx: &mut dyn Context, err: &Error, status: StatusCode) -> Result<()> {
    let reason = status.canonical_reason().unwrap_or("Unknown");
    // Internal failures keep their detail in the logs.
    let message = if status.is_server_error() && !matches!(err, Error::Status { .. }) {
        reason.to_string()
    } else {
        err.to_string()
    };

    let offers = [MediaType::json(), MediaType::text()];
    let wants_json = MediaType::negotiate(ctx.header(header::ACCEPT.as_str()), &offers)
        .map_or(true, |media| media.subtype() == "json");

    if wants_json {
        let body = json!({
            "message": message,
            "status": status.as_u16(),
            "reason": reason,
        });
        ctx.set_response_type(&MediaType::json())?;
        ctx.send_bytes(Bytes::from(serde_json::to_vec(&body)?))
    } else {
        ctx.set_response_type(&MediaType::text())?;
        ctx.send_text(&format!("{} ({}): {}", reason, status.as_u16(), message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockContext;
    use serde_json::Value;

    fn sample() -> Router {
        let mut builder = Router::builder();
        builder.get("/", |_ctx| Ok("home"));
        builder.get("/users/{id}", |ctx| Ok(format!("user {}", ctx.path_param("id")?)));
        builder.post("/users", |_ctx| Ok(StatusCode::CREATED));
        builder.get("/files/*path", |ctx| Ok(ctx.path_param("path")?.to_string()));
        builder.build().unwrap()
    }

    #[test]
    fn matches_and_decodes_params() {
        let router = sample();
        let found = router.match_route(&Method::GET, "/users/j%C3%B6rg").unwrap();
        assert_eq!(found.route.pattern(), "/users/{id}");
        assert_eq!(found.params.get("id"), Some("jörg"));
    }

    #[test]
    fn unknown_path_is_not_found() {
        let router = sample();
        let err = router.match_route(&Method::GET, "/nope").unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn wrong_method_lists_allowed() {
        let router = sample();
        match router.match_route(&Method::DELETE, "/users") {
            Err(Error::MethodNotAllowed { allowed, .. }) => assert_eq!(allowed, vec![Method::POST]),
            other => panic!("unexpected: {:?}", other.map(|m| m.route)),
        }
    }

    #[test]
    fn context_path_is_stripped() {
        let mut builder = Router::builder();
        builder.context_path("/app/").get("/ping", |_ctx| Ok("pong"));
        let router = builder.build().unwrap();
        assert!(router.match_route(&Method::GET, "/app/ping").is_ok());
        assert!(router.match_route(&Method::GET, "/ping").is_err());
        assert!(router.match_route(&Method::GET, "/application/ping").is_err());
        assert_eq!(router.context_path(), "/app");
    }

    #[test]
    fn trailing_slash_and_case_options() {
        let mut builder = Router::builder();
        builder.get("/Users", |_ctx| Ok(()));
        let strict = builder.build().unwrap();
        assert!(strict.match_route(&Method::GET, "/Users/").is_err());
        assert!(strict.match_route(&Method::GET, "/users").is_err());

        let mut builder = Router::builder();
        builder
            .ignore_trailing_slash(true)
            .case_sensitive(false)
            .get("/Users", |_ctx| Ok(()));
        let lenient = builder.build().unwrap();
        assert!(lenient.match_route(&Method::GET, "/users/").is_ok());
        assert!(lenient.match_route(&Method::GET, "/USERS").is_ok());
    }

    #[test]
    fn duplicate_routes_fail_build() {
        let mut builder = Router::builder();
        builder.get("/a/{id}", |_ctx| Ok(()));
        builder.get("/a/{id}", |_ctx| Ok(()));
        assert!(matches!(builder.build(), Err(Error::DuplicateRoute { .. })));
    }

    #[test]
    fn invalid_pattern_fails_build() {
        let mut builder = Router::builder();
        builder.get("/a/*/b", |_ctx| Ok(()));
        assert!(matches!(builder.build(), Err(Error::InvalidPattern { .. })));
    }

    #[test]
    fn decorators_only_wrap_later_routes() {
        let mut builder = Router::builder();
        builder.get("/plain", |_ctx| Ok("plain"));
        builder.after(|_ctx, out| {
            *out = Output::Text("wrapped".into());
            Ok(())
        });
        builder.get("/wrapped", |_ctx| Ok("inner"));
        let router = builder.build().unwrap();

        let mut ctx = MockContext::new().with_router(Arc::new(router));
        ctx.set_path_string("/plain");
        let router = Arc::clone(ctx.router().unwrap());
        router.handle(&mut ctx);
        assert_eq!(ctx.response().value(), Some(&Output::Text("plain".into())));

        let mut ctx = MockContext::new();
        ctx.set_path_string("/wrapped");
        router.handle(&mut ctx);
        assert_eq!(ctx.response().value(), Some(&Output::Text("wrapped".into())));
    }

    #[test]
    fn path_groups_scope_prefix_and_decorators() {
        let mut builder = Router::builder();
        builder
            .path("/api", |api| {
                api.before(|ctx| ctx.set_header("x-api", "1"));
                api.get("/users", |_ctx| Ok("users"));
            })
            .attr("group", "api")
            .renderer("json");
        builder.get("/health", |_ctx| Ok("ok"));
        let router = builder.build().unwrap();

        let api = router.match_route(&Method::GET, "/api/users").unwrap().route;
        assert_eq!(api.attribute("group"), Some(&Value::from("api")));
        assert_eq!(api.renderer_name(), Some("json"));
        let health = router.match_route(&Method::GET, "/health").unwrap().route;
        assert!(health.attribute("group").is_none());

        let mut ctx = MockContext::new();
        ctx.set_path_string("/health");
        router.handle(&mut ctx);
        assert!(ctx.response().header("x-api").is_none());

        let mut ctx = MockContext::new();
        ctx.set_path_string("/api/users");
        router.handle(&mut ctx);
        assert_eq!(ctx.response().header("x-api"), Some("1"));
    }

    #[test]
    fn render_uses_route_renderer() {
        let mut builder = Router::builder();
        builder.get("/json", |_ctx| Ok("hi")).renderer("json");
        builder.get("/missing", |_ctx| Ok("hi")).renderer("xml");
        let router = builder.build().unwrap();

        let mut ctx = MockContext::new();
        ctx.set_path_string("/json");
        let found = router.match_route(&Method::GET, "/json").unwrap();
        ctx.set_route(found.route);
        router.render(&mut ctx, Output::Text("hi".into())).unwrap();
        assert_eq!(ctx.response().body_text(), "\"hi\"");
        assert_eq!(ctx.response().content_type(), Some("application/json"));

        let mut ctx = MockContext::new();
        let found = router.match_route(&Method::GET, "/missing").unwrap();
        ctx.set_route(found.route);
        let err = router
            .render(&mut ctx, Output::Text("hi".into()))
            .unwrap_err();
        assert!(matches!(err, Error::RendererNotFound(_)));
        assert_eq!(router.error_code(&err), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn custom_error_code_mapping() {
        let mut builder = Router::builder();
        builder.error_code(|err| match err {
            Error::MissingValue(_) => Some(StatusCode::UNPROCESSABLE_ENTITY),
            _ => None,
        });
        let router = builder.build().unwrap();
        assert_eq!(
            router.error_code(&Error::MissingValue("id".into())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            router.error_code(&Error::NotFound("/".into())),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn default_error_handler_negotiates() {
        let router = sample();

        let mut ctx = MockContext::new();
        router.report_error(&mut ctx, Error::NotFound("/x".into()));
        assert_eq!(ctx.response().status(), StatusCode::NOT_FOUND);
        let body: Value = serde_json::from_str(&ctx.response().body_text()).unwrap();
        assert_eq!(body["status"], 404);
        assert_eq!(body["reason"], "Not Found");

        let mut ctx = MockContext::new();
        ctx.set_request_header("Accept", "text/plain");
        router.report_error(&mut ctx, Error::BadRequest("nope".into()));
        assert_eq!(ctx.response().status(), StatusCode::BAD_REQUEST);
        assert!(ctx.response().body_text().starts_with("Bad Request (400)"));
    }

    #[test]
    fn handle_reports_method_not_allowed() {
        let router = Arc::new(sample());
        let mut ctx = MockContext::new().with_router(Arc::clone(&router));
        ctx.set_method(Method::PUT).set_path_string("/users");
        router.handle(&mut ctx);
        assert_eq!(ctx.response().status(), StatusCode::METHOD_NOT_ALLOWED);
        assert!(matches!(
            ctx.response().error(),
            Some(Error::MethodNotAllowed { allowed, .. }) if allowed == &vec![Method::POST]
        ));
    }

    #[test]
    fn report_error_sets_allow_header() {
        let router = sample();
        let mut ctx = MockContext::new();
        router.report_error(
            &mut ctx,
            Error::MethodNotAllowed {
                method: Method::PUT,
                allowed: vec![Method::GET, Method::POST],
            },
        );
        assert_eq!(ctx.response().status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(ctx.response().header("allow"), Some("GET, POST"));
    }

    #[test]
    fn hooks_fire_in_order() {
        use std::sync::Mutex;
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut builder = Router::builder();
        for (name, register) in [("start", 0), ("ready", 1), ("stop-a", 2), ("stop-b", 2)] {
            let log = Arc::clone(&log);
            let hook = move || {
                log.lock().unwrap().push(name);
                Ok(())
            };
            match register {
                0 => builder.on_start(hook),
                1 => builder.on_ready(hook),
                _ => builder.on_stop(hook),
            };
        }
        let router = builder.build().unwrap();
        router.fire_start().unwrap();
        router.fire_ready().unwrap();
        router.fire_stop();
        assert_eq!(*log.lock().unwrap(), vec!["start", "ready", "stop-b", "stop-a"]);
    }
}
