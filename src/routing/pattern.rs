//! Route pattern parsing.
//!
//! # Responsibilities
//! - Split a pattern such as `/users/{id:[0-9]+}/files/*` into typed segments
//! - Reject patterns the tree cannot match unambiguously
//!
//! # Syntax
//! - `users`: static segment
//! - `{id}` or `:id`: parameter, one whole segment
//! - `{id:regex}`: parameter constrained by an anchored regex
//! - `*`, `*rest`, `{rest:.*}`: tail wildcard, last segment only

use std::fmt;

use regex::Regex;

use crate::error::{Error, Result};

/// Name given to an anonymous `*` wildcard.
pub const WILDCARD_KEY: &str = "*";

/// One compiled pattern segment.
#[derive(Debug, Clone)]
pub enum Segment {
    Static(String),
    Param { name: String, regex: Option<Regex> },
    /// Tail capture. `non_empty` rejects an empty remainder (`{name:.+}`).
    Wildcard { name: String, non_empty: bool },
}

impl Segment {
    /// Structural identity used when merging patterns into the tree.
    pub fn same_shape(&self, other: &Segment) -> bool {
        match (self, other) {
            (Segment::Static(a), Segment::Static(b)) => a == b,
            (
                Segment::Param { name: a, regex: ra },
                Segment::Param { name: b, regex: rb },
            ) => a == b && ra.as_ref().map(Regex::as_str) == rb.as_ref().map(Regex::as_str),
            (
                Segment::Wildcard { name: a, non_empty: ea },
                Segment::Wildcard { name: b, non_empty: eb },
            ) => a == b && ea == eb,
            _ => false,
        }
    }
}

/// A parsed route pattern.
#[derive(Debug, Clone)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
    keys: Vec<String>,
}

impl PathPattern {
    /// Parse `raw`. With `ignore_trailing_slash` a trailing `/` is dropped; otherwise it
    /// becomes an empty static segment so `/a/` and `/a` stay distinct.
    pub fn parse(raw: &str, ignore_trailing_slash: bool, case_sensitive: bool) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidPattern {
            pattern: raw.to_string(),
            reason: reason.to_string(),
        };

        let normalized = if raw == "*" { "/*" } else { raw };
        if !normalized.starts_with('/') {
            return Err(invalid("must start with '/'"));
        }

        let mut body = &normalized[1..];
        if ignore_trailing_slash {
            body = body.trim_end_matches('/');
        }

        let mut segments = Vec::new();
        let mut keys: Vec<String> = Vec::new();
        let parts: Vec<&str> = if body.is_empty() {
            Vec::new()
        } else {
            body.split('/').collect()
        };
        let last = parts.len().saturating_sub(1);

        for (i, part) in parts.iter().enumerate() {
            let segment = Self::parse_segment(part, case_sensitive).map_err(|r| invalid(&r))?;
            match &segment {
                Segment::Param { name, .. } | Segment::Wildcard { name, .. } => {
                    if keys.iter().any(|k| k == name) {
                        return Err(invalid(&format!("duplicate parameter '{}'", name)));
                    }
                    keys.push(name.clone());
                }
                Segment::Static(_) => {}
            }
            if matches!(segment, Segment::Wildcard { .. }) && i != last {
                return Err(invalid("wildcard must be the last segment"));
            }
            segments.push(segment);
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
            keys,
        })
    }

    fn parse_segment(part: &str, case_sensitive: bool) -> std::result::Result<Segment, String> {
        if part == "*" {
            return Ok(Segment::Wildcard {
                name: WILDCARD_KEY.to_string(),
                non_empty: false,
            });
        }
        if let Some(name) = part.strip_prefix('*') {
            return Ok(Segment::Wildcard {
                name: name.to_string(),
                non_empty: false,
            });
        }
        if let Some(name) = part.strip_prefix(':') {
            if name.is_empty() {
                return Err("empty parameter name".into());
            }
            return Ok(Segment::Param {
                name: name.to_string(),
                regex: None,
            });
        }
        if let Some(inner) = part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
            let (name, constraint) = match inner.split_once(':') {
                Some((name, re)) => (name.trim(), Some(re.trim())),
                None => (inner.trim(), None),
            };
            if name.is_empty() {
                return Err("empty parameter name".into());
            }
            return match constraint {
                None => Ok(Segment::Param {
                    name: name.to_string(),
                    regex: None,
                }),
                Some(tail @ (".*" | ".+")) => Ok(Segment::Wildcard {
                    name: name.to_string(),
                    non_empty: tail == ".+",
                }),
                Some(re) => Regex::new(&format!("^(?:{})$", re))
                    .map(|regex| Segment::Param {
                        name: name.to_string(),
                        regex: Some(regex),
                    })
                    .map_err(|e| format!("invalid regex for '{}': {}", name, e)),
            };
        }
        if part.contains('{') || part.contains('}') {
            return Err("parameters must span a whole segment".into());
        }
        let text = if case_sensitive {
            part.to_string()
        } else {
            part.to_lowercase()
        };
        Ok(Segment::Static(text))
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Parameter names in declaration order.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Join a group prefix and a route pattern with exactly one slash between them.
pub fn join(prefix: &str, pattern: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    if pattern == "/" || pattern.is_empty() {
        return if prefix.is_empty() {
            "/".to_string()
        } else {
            prefix.to_string()
        };
    }
    let pattern = if pattern.starts_with('/') {
        pattern.to_string()
    } else {
        format!("/{}", pattern)
    };
    format!("{}{}", prefix, pattern)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Result<PathPattern> {
        PathPattern::parse(raw, false, true)
    }

    #[test]
    fn parses_segment_kinds() {
        let pattern = parse("/users/{id:[0-9]+}/:section/files/*rest").unwrap();
        assert_eq!(pattern.keys(), &["id", "section", "rest"]);
        assert!(matches!(&pattern.segments()[0], Segment::Static(s) if s == "users"));
        assert!(matches!(&pattern.segments()[1], Segment::Param { regex: Some(_), .. }));
        assert!(matches!(&pattern.segments()[2], Segment::Param { regex: None, .. }));
        assert!(matches!(&pattern.segments()[4], Segment::Wildcard { name, .. } if name == "rest"));
    }

    #[test]
    fn catch_all_forms() {
        let star = parse("*").unwrap();
        assert_eq!(star.keys(), &[WILDCARD_KEY]);
        let regex_tail = parse("/static/{path:.*}").unwrap();
        assert!(matches!(
            &regex_tail.segments()[1],
            Segment::Wildcard { name, non_empty: false } if name == "path"
        ));
        let required_tail = parse("/static/{path:.+}").unwrap();
        assert!(matches!(
            &required_tail.segments()[1],
            Segment::Wildcard { non_empty: true, .. }
        ));
        assert!(parse("/").unwrap().segments().is_empty());
    }

    #[test]
    fn trailing_slash_handling() {
        let strict = parse("/users/").unwrap();
        assert_eq!(strict.segments().len(), 2);
        let lenient = PathPattern::parse("/users/", true, true).unwrap();
        assert_eq!(lenient.segments().len(), 1);
    }

    #[test]
    fn rejects_bad_patterns() {
        assert!(parse("users").is_err());
        assert!(parse("/a/*/b").is_err());
        assert!(parse("/file.{ext}").is_err());
        assert!(parse("/{id}/{id}").is_err());
        assert!(parse("/{id:[}").is_err());
        assert!(parse("/:").is_err());
    }

    #[test]
    fn case_insensitive_statics_are_lowered() {
        let pattern = PathPattern::parse("/Users/{Id}", false, false).unwrap();
        assert!(matches!(&pattern.segments()[0], Segment::Static(s) if s == "users"));
        assert_eq!(pattern.keys(), &["Id"]);
    }

    #[test]
    fn joins_prefixes() {
        assert_eq!(join("/api", "/users"), "/api/users");
        assert_eq!(join("/api/", "users"), "/api/users");
        assert_eq!(join("/api", "/"), "/api");
        assert_eq!(join("", "/"), "/");
        assert_eq!(join("/", "/x"), "/x");
    }
}
