//! Media types and Accept header negotiation.

use std::cmp::{Ordering, Reverse};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// A parsed `type/subtype; param=value` media type.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaType {
    kind: String,
    subtype: String,
    params: Vec<(String, String)>,
}

impl MediaType {
    pub fn new(kind: &str, subtype: &str) -> Self {
        Self {
            kind: kind.to_ascii_lowercase(),
            subtype: subtype.to_ascii_lowercase(),
            params: Vec::new(),
        }
    }

    pub fn json() -> Self {
        Self::new("application", "json")
    }

    pub fn text() -> Self {
        Self::new("text", "plain").with_param("charset", "utf-8")
    }

    pub fn html() -> Self {
        Self::new("text", "html").with_param("charset", "utf-8")
    }

    pub fn octet_stream() -> Self {
        Self::new("application", "octet-stream")
    }

    pub fn form_urlencoded() -> Self {
        Self::new("application", "x-www-form-urlencoded")
    }

    pub fn multipart_form_data() -> Self {
        Self::new("multipart", "form-data")
    }

    pub fn all() -> Self {
        Self::new("*", "*")
    }

    pub fn with_param(mut self, name: &str, value: &str) -> Self {
        self.params
            .push((name.to_ascii_lowercase(), value.to_string()));
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn subtype(&self) -> &str {
        &self.subtype
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn charset(&self) -> Option<&str> {
        self.param("charset")
    }

    /// `type/subtype` without parameters.
    pub fn essence(&self) -> String {
        format!("{}/{}", self.kind, self.subtype)
    }

    /// Quality from the `q` parameter, 1.0 when absent or malformed.
    pub fn quality(&self) -> f32 {
        self.param("q")
            .and_then(|q| q.parse::<f32>().ok())
            .map(|q| q.clamp(0.0, 1.0))
            .unwrap_or(1.0)
    }

    /// True when either side's wildcards cover the other. Parameters are ignored.
    pub fn matches(&self, other: &MediaType) -> bool {
        let kind = self.kind == "*" || other.kind == "*" || self.kind == other.kind;
        let subtype =
            self.subtype == "*" || other.subtype == "*" || self.subtype == other.subtype;
        kind && subtype
    }

    /// Parse an Accept header, best quality first. Entries with `q=0` are dropped.
    pub fn parse_accept(header: &str) -> Vec<MediaType> {
        Self::parse_ranges(header)
            .into_iter()
            .filter(|t| t.quality() > 0.0)
            .collect()
    }

    /// Every range of an Accept header, refusals included, best quality first.
    fn parse_ranges(header: &str) -> Vec<MediaType> {
        let mut types: Vec<MediaType> = header
            .split(',')
            .filter_map(|part| part.trim().parse().ok())
            .collect();
        // Stable sort keeps header order for equal quality.
        types.sort_by(|a, b| {
            b.quality()
                .partial_cmp(&a.quality())
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.specificity().cmp(&b.specificity()).reverse())
        });
        types
    }

    /// Pick the offer the Accept header prefers. A missing header accepts anything.
    ///
    /// Each offer takes the quality of its most specific matching range, so
    /// `application/json;q=0, */*` refuses JSON. Ties keep header order, then
    /// offer order.
    pub fn negotiate<'a>(accept: Option<&str>, offers: &'a [MediaType]) -> Option<&'a MediaType> {
        let accept = match accept {
            Some(header) if !header.trim().is_empty() => header,
            _ => return offers.first(),
        };
        let ranges = Self::parse_ranges(accept);
        offers
            .iter()
            .filter_map(|offer| {
                let (rank, range) = ranges
                    .iter()
                    .enumerate()
                    .filter(|(_, range)| range.matches(offer))
                    .max_by_key(|(rank, range)| (range.specificity(), Reverse(*rank)))?;
                (range.quality() > 0.0).then_some((range.quality(), rank, offer))
            })
            .min_by(|a, b| {
                b.0.partial_cmp(&a.0)
                    .unwrap_or(Ordering::Equal)
                    .then(a.1.cmp(&b.1))
            })
            .map(|(_, _, offer)| offer)
    }

    fn specificity(&self) -> u8 {
        match (self.kind.as_str(), self.subtype.as_str()) {
            ("*", _) => 0,
            (_, "*") => 1,
            _ => 2,
        }
    }
}

impl FromStr for MediaType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(';');
        let essence = parts.next().unwrap_or_default().trim();
        let (kind, subtype) = essence
            .split_once('/')
            .filter(|(k, s)| !k.is_empty() && !s.is_empty())
            .ok_or_else(|| Error::BadRequest(format!("invalid media type: {}", s)))?;

        let mut media = MediaType::new(kind.trim(), subtype.trim());
        for param in parts {
            if let Some((name, value)) = param.split_once('=') {
                media = media.with_param(name.trim(), value.trim().trim_matches('"'));
            }
        }
        Ok(media)
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.subtype)?;
        for (name, value) in &self.params {
            write!(f, ";{}={}", name, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display() {
        let media: MediaType = "Text/HTML; charset=\"UTF-8\"".parse().unwrap();
        assert_eq!(media.essence(), "text/html");
        assert_eq!(media.charset(), Some("UTF-8"));
        assert_eq!(media.to_string(), "text/html;charset=UTF-8");
        assert!("nonsense".parse::<MediaType>().is_err());
    }

    #[test]
    fn wildcard_matching() {
        assert!(MediaType::all().matches(&MediaType::json()));
        assert!(MediaType::new("text", "*").matches(&MediaType::html()));
        assert!(!MediaType::new("text", "*").matches(&MediaType::json()));
    }

    #[test]
    fn accept_ordering() {
        let accepted = MediaType::parse_accept("text/*;q=0.5, application/json, */*;q=0.1, image/png;q=0");
        let essences: Vec<String> = accepted.iter().map(MediaType::essence).collect();
        assert_eq!(essences, vec!["application/json", "text/*", "*/*"]);
    }

    #[test]
    fn negotiation() {
        let offers = [MediaType::json(), MediaType::text()];
        assert_eq!(
            MediaType::negotiate(Some("text/plain"), &offers).map(MediaType::essence),
            Some("text/plain".to_string())
        );
        assert_eq!(
            MediaType::negotiate(None, &offers).map(MediaType::essence),
            Some("application/json".to_string())
        );
        assert!(MediaType::negotiate(Some("image/png"), &offers).is_none());
    }

    #[test]
    fn zero_quality_refuses_despite_wildcard() {
        let json = [MediaType::json()];
        assert!(MediaType::negotiate(Some("application/json;q=0, */*;q=0.5"), &json).is_none());

        let offers = [MediaType::json(), MediaType::text()];
        assert_eq!(
            MediaType::negotiate(Some("application/json;q=0, */*;q=0.5"), &offers)
                .map(MediaType::essence),
            Some("text/plain".to_string())
        );
        assert_eq!(
            MediaType::negotiate(Some("text/*;q=0, text/plain;q=0.3"), &offers[1..])
                .map(MediaType::essence),
            Some("text/plain".to_string())
        );
    }

    #[test]
    fn higher_quality_offer_wins() {
        let offers = [MediaType::json(), MediaType::text()];
        assert_eq!(
            MediaType::negotiate(Some("application/json;q=0.4, text/plain"), &offers)
                .map(MediaType::essence),
            Some("text/plain".to_string())
        );
        assert_eq!(
            MediaType::negotiate(Some("*/*"), &offers).map(MediaType::essence),
            Some("application/json".to_string())
        );
    }
}
