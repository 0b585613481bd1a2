//! Path predicates.
//!
//! All string comparisons are case-insensitive and run against the full request
//! target, query string included.

use super::RequestMatcher;
use crate::request::RecordedRequest;
use regex::Regex;
use std::sync::Arc;

/// Path matching predicate.
#[derive(Debug, Clone)]
pub enum PathMatcher {
    Contains(String),
    DoesNotContain(String),
    StartsWith(String),
    /// Ignores a single trailing slash on both the pattern and the path
    EndsWith(String),
    Regex(Arc<Regex>),
}

impl PathMatcher {
    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Ok(PathMatcher::Regex(Arc::new(Regex::new(pattern)?)))
    }
}

fn strip_trailing_slash(value: &str) -> &str {
    value.strip_suffix('/').unwrap_or(value)
}

impl RequestMatcher for PathMatcher {
    fn matches(&self, request: &RecordedRequest) -> bool {
        let path = request.path().to_lowercase();
        match self {
            PathMatcher::Contains(part) => path.contains(&part.to_lowercase()),
            PathMatcher::DoesNotContain(part) => !path.contains(&part.to_lowercase()),
            PathMatcher::StartsWith(part) => path.starts_with(&part.to_lowercase()),
            PathMatcher::EndsWith(part) => {
                let part = part.to_lowercase();
                strip_trailing_slash(&path).ends_with(strip_trailing_slash(&part))
            }
            PathMatcher::Regex(re) => re.is_match(request.path()),
        }
    }

    fn describe(&self) -> String {
        match self {
            PathMatcher::Contains(part) => format!("url contains: {part}"),
            PathMatcher::DoesNotContain(part) => format!("url does not contain: {part}"),
            PathMatcher::StartsWith(part) => format!("url starts with: {part}"),
            PathMatcher::EndsWith(part) => format!("url ends with: {part}"),
            PathMatcher::Regex(re) => format!("url matches: {}", re.as_str()),
        }
    }
}
