//! Segment tree used for route lookup.
//!
//! # Responsibilities
//! - Store compiled patterns as a tree of path segments
//! - Resolve a request path to a route index plus captured parameters
//! - Report which methods exist for a path (405 handling)
//!
//! # Design Decisions
//! - Built once by `RouterBuilder::build`, read-only afterwards
//! - Lookup order per level: static, regex param, plain param, wildcard
//! - Backtracking: a dead-end static branch falls back to parameter branches
//! - Cost is proportional to path depth, not route count

use std::collections::HashMap;

use axum::http::Method;

use crate::routing::pattern::Segment;
use crate::routing::route::RouteMethod;

/// Route indices terminating at a node.
#[derive(Debug, Default)]
struct Slots {
    by_method: HashMap<Method, usize>,
    any: Option<usize>,
}

impl Slots {
    fn insert(&mut self, method: &RouteMethod, index: usize) -> Result<(), usize> {
        let slot = match method {
            RouteMethod::Any => &mut self.any,
            RouteMethod::Exact(m) => {
                if let Some(existing) = self.by_method.get(m) {
                    return Err(*existing);
                }
                self.by_method.insert(m.clone(), index);
                return Ok(());
            }
        };
        match slot {
            Some(existing) => Err(*existing),
            None => {
                *slot = Some(index);
                Ok(())
            }
        }
    }

    fn lookup(&self, method: &Method) -> Option<usize> {
        self.by_method
            .get(method)
            .copied()
            .or_else(|| {
                if *method == Method::HEAD {
                    self.by_method.get(&Method::GET).copied()
                } else {
                    None
                }
            })
            .or(self.any)
    }

    fn methods(&self, out: &mut Vec<Method>) {
        for method in self.by_method.keys() {
            if !out.contains(method) {
                out.push(method.clone());
            }
        }
        if self.by_method.contains_key(&Method::GET) && !out.contains(&Method::HEAD) {
            out.push(Method::HEAD);
        }
    }
}

/// Node in the route tree.
#[derive(Debug)]
pub struct Node {
    segment: Option<Segment>,
    routes: Slots,
    statics: Vec<Node>,
    params: Vec<Node>,
    wildcards: Vec<Node>,
}

impl Default for Node {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Node {
    fn new(segment: Option<Segment>) -> Self {
        Self {
            segment,
            routes: Slots::default(),
            statics: Vec::new(),
            params: Vec::new(),
            wildcards: Vec::new(),
        }
    }

    /// Insert a route. On conflict returns the index of the route already registered.
    pub fn insert(&mut self, segments: &[Segment], method: &RouteMethod, index: usize) -> Result<(), usize> {
        let Some((segment, remaining)) = segments.split_first() else {
            return self.routes.insert(method, index);
        };

        let children = match segment {
            Segment::Static(_) => &mut self.statics,
            Segment::Param { .. } => &mut self.params,
            Segment::Wildcard { .. } => &mut self.wildcards,
        };

        if let Some(child) = children
            .iter_mut()
            .find(|c| c.segment.as_ref().is_some_and(|s| s.same_shape(segment)))
        {
            return child.insert(remaining, method, index);
        }

        let mut child = Node::new(Some(segment.clone()));
        child.insert(remaining, method, index)?;
        if matches!(segment, Segment::Param { regex: Some(_), .. }) {
            // Constrained params are tried before unconstrained ones.
            let at = children
                .iter()
                .position(|c| matches!(c.segment, Some(Segment::Param { regex: None, .. })))
                .unwrap_or(children.len());
            children.insert(at, child);
        } else {
            children.push(child);
        }
        Ok(())
    }

    /// Find the route for `method` and fill `params` with captured values.
    ///
    /// `segments` are decoded request segments; `folded` holds their lowercase forms
    /// when static matching is case-insensitive.
    pub fn search(
        &self,
        segments: &[String],
        folded: Option<&[String]>,
        method: &Method,
        params: &mut Vec<(String, String)>,
    ) -> Option<usize> {
        let Some((segment, remaining)) = segments.split_first() else {
            if let Some(found) = self.routes.lookup(method) {
                return Some(found);
            }
            // A tail wildcard also matches an empty remainder.
            return self.search_wildcards(segments, method, params);
        };
        let static_key = folded.and_then(|f| f.first()).unwrap_or(segment);
        let folded_rest = folded.map(|f| &f[1..]);

        for child in &self.statics {
            if let Some(Segment::Static(text)) = &child.segment {
                if text == static_key {
                    if let Some(found) = child.search(remaining, folded_rest, method, params) {
                        return Some(found);
                    }
                }
            }
        }

        for child in &self.params {
            if let Some(Segment::Param { name, regex }) = &child.segment {
                if segment.is_empty() {
                    continue;
                }
                if regex.as_ref().is_some_and(|re| !re.is_match(segment)) {
                    continue;
                }
                params.push((name.clone(), segment.clone()));
                if let Some(found) = child.search(remaining, folded_rest, method, params) {
                    return Some(found);
                }
                // Backtrack
                params.pop();
            }
        }

        self.search_wildcards(segments, method, params)
    }

    fn search_wildcards(
        &self,
        segments: &[String],
        method: &Method,
        params: &mut Vec<(String, String)>,
    ) -> Option<usize> {
        for child in &self.wildcards {
            if let Some(Segment::Wildcard { name, non_empty }) = &child.segment {
                if *non_empty && segments.is_empty() {
                    continue;
                }
                if let Some(found) = child.routes.lookup(method) {
                    params.push((name.clone(), segments.join("/")));
                    return Some(found);
                }
            }
        }
        None
    }

    /// Collect every method registered for routes matching `segments`.
    pub fn allowed_methods(&self, segments: &[String], folded: Option<&[String]>, out: &mut Vec<Method>) {
        for child in &self.wildcards {
            if matches!(child.segment, Some(Segment::Wildcard { non_empty: true, .. }))
                && segments.is_empty()
            {
                continue;
            }
            child.routes.methods(out);
        }
        let Some((segment, remaining)) = segments.split_first() else {
            self.routes.methods(out);
            return;
        };
        let static_key = folded.and_then(|f| f.first()).unwrap_or(segment);
        let folded_rest = folded.map(|f| &f[1..]);

        for child in &self.statics {
            if let Some(Segment::Static(text)) = &child.segment {
                if text == static_key {
                    child.allowed_methods(remaining, folded_rest, out);
                }
            }
        }
        for child in &self.params {
            if let Some(Segment::Param { regex, .. }) = &child.segment {
                if !segment.is_empty() && regex.as_ref().map_or(true, |re| re.is_match(segment)) {
                    child.allowed_methods(remaining, folded_rest, out);
                }
            }
        }
    }
}
