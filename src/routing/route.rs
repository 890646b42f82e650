//! Route definitions and route collections.
//!
//! # Responsibilities
//! - Bind a method and pattern to a handler
//! - Carry per-route metadata: attributes, renderer, media types, matchers
//! - Let a group of routes be configured together (`RouteSet`)
//!
//! # Design Decisions
//! - Attributes are a plain JSON-valued bag; last write wins
//! - The renderer name is stored as the `renderer` attribute
//! - Routes are mutable while the builder owns them and frozen behind `Arc` after `build`

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use axum::http::Method;
use serde_json::Value;

use crate::context::{Context, MediaType, Output};
use crate::error::Result;
use crate::routing::matcher::{ConsumesMatcher, Matcher, ProducesMatcher};
use crate::routing::pattern::PathPattern;
use crate::routing::pipeline::{self, Decorator, Handler};

/// Attribute key holding the renderer name.
pub const RENDERER_ATTRIBUTE: &str = "renderer";

/// Method a route answers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RouteMethod {
    /// Every method (`*`).
    Any,
    Exact(Method),
}

impl fmt::Display for RouteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteMethod::Any => f.write_str("*"),
            RouteMethod::Exact(method) => f.write_str(method.as_str()),
        }
    }
}

impl From<Method> for RouteMethod {
    fn from(method: Method) -> Self {
        RouteMethod::Exact(method)
    }
}

/// A route definition.
pub struct Route {
    method: RouteMethod,
    pattern: String,
    path_keys: Vec<String>,
    handler: Handler,
    decorators: Vec<Decorator>,
    attributes: BTreeMap<String, Value>,
    produces: Vec<MediaType>,
    consumes: Vec<MediaType>,
    matchers: Vec<Arc<dyn Matcher>>,
}

impl Route {
    pub(crate) fn new(
        method: RouteMethod,
        pattern: String,
        handler: Handler,
        decorators: Vec<Decorator>,
    ) -> Self {
        Self {
            method,
            pattern,
            path_keys: Vec::new(),
            handler,
            decorators,
            attributes: BTreeMap::new(),
            produces: Vec::new(),
            consumes: Vec::new(),
            matchers: Vec::new(),
        }
    }

    /// Freeze the route: record parameter names, wrap the handler with its
    /// decorators and turn media type constraints into matchers.
    pub(crate) fn compile(&mut self, pattern: &PathPattern) {
        self.path_keys = pattern.keys().to_vec();
        let decorators = std::mem::take(&mut self.decorators);
        self.handler = pipeline::compose(&decorators, Arc::clone(&self.handler));
        if !self.consumes.is_empty() {
            self.matchers
                .push(Arc::new(ConsumesMatcher::new(self.consumes.clone())));
        }
        if !self.produces.is_empty() {
            self.matchers
                .push(Arc::new(ProducesMatcher::new(self.produces.clone())));
        }
    }

    /// Run the handler pipeline.
    pub fn call(&self, ctx: &mut dyn Context) -> Result<Output> {
        (self.handler)(ctx)
    }

    pub fn method(&self) -> &RouteMethod {
        &self.method
    }

    /// Full pattern, including any group prefix.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Parameter names, available once the router is built.
    pub fn path_keys(&self) -> &[String] {
        &self.path_keys
    }

    pub fn attr(&mut self, name: &str, value: impl Into<Value>) -> &mut Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }

    /// Render this route's output with the renderer registered under `name`.
    pub fn renderer(&mut self, name: &str) -> &mut Self {
        self.attr(RENDERER_ATTRIBUTE, name)
    }

    pub fn renderer_name(&self) -> Option<&str> {
        self.attribute(RENDERER_ATTRIBUTE).and_then(Value::as_str)
    }

    /// Only match requests accepting `media`.
    pub fn produces(&mut self, media: MediaType) -> &mut Self {
        self.produces.push(media);
        self
    }

    pub fn produced(&self) -> &[MediaType] {
        &self.produces
    }

    /// Only match requests whose body is of type `media`.
    pub fn consumes(&mut self, media: MediaType) -> &mut Self {
        self.consumes.push(media);
        self
    }

    pub fn consumed(&self) -> &[MediaType] {
        &self.consumes
    }

    /// Extra condition evaluated after the path matched.
    pub fn matcher(&mut self, matcher: impl Matcher + 'static) -> &mut Self {
        self.matchers.push(Arc::new(matcher));
        self
    }

    pub fn matchers(&self) -> &[Arc<dyn Matcher>] {
        &self.matchers
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("pattern", &self.pattern)
            .field("attributes", &self.attributes)
            .field("produces", &self.produces)
            .field("consumes", &self.consumes)
            .field("matchers", &self.matchers)
            .finish_non_exhaustive()
    }
}

/// Routes registered inside one `path` group, configured together.
pub struct RouteSet<'a> {
    routes: &'a mut [Route],
}

impl<'a> RouteSet<'a> {
    pub(crate) fn new(routes: &'a mut [Route]) -> Self {
        Self { routes }
    }

    pub fn attr(&mut self, name: &str, value: impl Into<Value>) -> &mut Self {
        let value = value.into();
        for route in self.routes.iter_mut() {
            route.attr(name, value.clone());
        }
        self
    }

    pub fn renderer(&mut self, name: &str) -> &mut Self {
        for route in self.routes.iter_mut() {
            route.renderer(name);
        }
        self
    }

    pub fn produces(&mut self, media: MediaType) -> &mut Self {
        for route in self.routes.iter_mut() {
            route.produces(media.clone());
        }
        self
    }

    pub fn consumes(&mut self, media: MediaType) -> &mut Self {
        for route in self.routes.iter_mut() {
            route.consumes(media.clone());
        }
        self
    }

    pub fn routes(&self) -> &[Route] {
        self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(pattern: &str) -> Route {
        Route::new(
            RouteMethod::Exact(Method::GET),
            pattern.to_string(),
            pipeline::handler(|_ctx| Ok(())),
            Vec::new(),
        )
    }

    #[test]
    fn attr_and_renderer_round_trip() {
        let mut route = route("/");
        route.attr("foo", "bar").renderer("json");
        assert_eq!(route.attribute("foo"), Some(&Value::from("bar")));
        assert_eq!(route.renderer_name(), Some("json"));
    }

    #[test]
    fn last_attribute_write_wins() {
        let mut route = route("/");
        route.attr("weight", 1).attr("weight", 2);
        assert_eq!(route.attribute("weight"), Some(&Value::from(2)));
        assert_eq!(route.attributes().len(), 1);
    }

    #[test]
    fn route_set_applies_to_every_route() {
        let mut routes = vec![route("/a"), route("/b")];
        let mut set = RouteSet::new(&mut routes);
        set.attr("foo", "bar").renderer("text");
        assert_eq!(set.len(), 2);

        for route in &routes {
            assert_eq!(route.attribute("foo"), Some(&Value::from("bar")));
            assert_eq!(route.renderer_name(), Some("text"));
        }
    }

    #[test]
    fn compile_adds_media_type_matchers() {
        let mut route = route("/items/{id}");
        route
            .consumes(MediaType::json())
            .produces(MediaType::json());
        let pattern = PathPattern::parse("/items/{id}", false, true).unwrap();
        route.compile(&pattern);
        assert_eq!(route.path_keys(), &["id"]);
        assert_eq!(route.matchers().len(), 2);
    }

    #[test]
    fn any_method_displays_as_star() {
        assert_eq!(RouteMethod::Any.to_string(), "*");
        assert_eq!(RouteMethod::from(Method::PUT).to_string(), "PUT");
    }
}
