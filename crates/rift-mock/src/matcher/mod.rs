//! Request matchers.
//!
//! A matcher is a pure predicate over a [`RecordedRequest`] paired with a
//! human-readable description used in dispatch logs and verification failures.
//!
//! # Module Structure
//!
//! - `path` - Path predicates (contains, startsWith, endsWith, regex)
//! - `query` - Query parameter predicates
//! - `header` - Header name predicates
//! - `method` - HTTP method predicates
//! - `logical` - AND / OR / NOT combinators
//!
//! Matchers are compared by identity, never by value. Two declarations built from
//! equal-looking matchers are still two distinct declarations.

mod header;
mod logical;
mod method;
mod path;
mod query;

use crate::request::RecordedRequest;
use std::fmt;
use std::sync::Arc;

pub use header::HeaderNamesMatcher;
pub use logical::LogicalMatcher;
pub use method::MethodMatcher;
pub use path::PathMatcher;
pub use query::QueryMatcher;

/// A predicate over recorded requests.
///
/// Implementations must be pure functions of the request so that repeated
/// dispatch against the same declaration is deterministic.
pub trait RequestMatcher: Send + Sync {
    fn matches(&self, request: &RecordedRequest) -> bool;

    fn describe(&self) -> String;
}

/// Shared handle to a [`RequestMatcher`].
#[derive(Clone)]
pub struct Matcher(Arc<dyn RequestMatcher>);

impl Matcher {
    pub fn new<M: RequestMatcher + 'static>(matcher: M) -> Self {
        Matcher(Arc::new(matcher))
    }

    /// Build a matcher from a closure and a description.
    pub fn from_fn<F>(description: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&RecordedRequest) -> bool + Send + Sync + 'static,
    {
        Matcher::new(FnMatcher {
            description: description.into(),
            predicate: Box::new(predicate),
        })
    }

    pub fn matches(&self, request: &RecordedRequest) -> bool {
        self.0.matches(request)
    }

    pub fn describe(&self) -> String {
        self.0.describe()
    }

    /// Both `self` and `other` must match.
    pub fn and(self, other: impl Into<Matcher>) -> Matcher {
        all_of([self, other.into()])
    }

    /// Either `self` or `other` must match.
    pub fn or(self, other: impl Into<Matcher>) -> Matcher {
        any_of([self, other.into()])
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Matcher").field(&self.describe()).finish()
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

impl<M: RequestMatcher + 'static> From<M> for Matcher {
    fn from(matcher: M) -> Self {
        Matcher::new(matcher)
    }
}

struct FnMatcher {
    description: String,
    predicate: Box<dyn Fn(&RecordedRequest) -> bool + Send + Sync>,
}

impl RequestMatcher for FnMatcher {
    fn matches(&self, request: &RecordedRequest) -> bool {
        (self.predicate)(request)
    }

    fn describe(&self) -> String {
        self.description.clone()
    }
}

// ===== Constructors =====

/// Request target contains `part` (case-insensitive).
pub fn path_contains(part: impl Into<String>) -> Matcher {
    PathMatcher::Contains(part.into()).into()
}

/// Request target does not contain `part` (case-insensitive).
pub fn path_does_not_contain(part: impl Into<String>) -> Matcher {
    PathMatcher::DoesNotContain(part.into()).into()
}

/// Request target starts with `part` (case-insensitive).
pub fn path_starts_with(part: impl Into<String>) -> Matcher {
    PathMatcher::StartsWith(part.into()).into()
}

/// Request target ends with `part` (case-insensitive), ignoring one trailing
/// slash on either side.
pub fn path_ends_with(part: impl Into<String>) -> Matcher {
    PathMatcher::EndsWith(part.into()).into()
}

/// Request target matches the regular expression `pattern`.
pub fn path_matches(pattern: &str) -> Result<Matcher, regex::Error> {
    Ok(PathMatcher::regex(pattern)?.into())
}

/// Request has at least one query parameter.
pub fn has_query_parameters() -> Matcher {
    QueryMatcher::Any.into()
}

/// Request has exactly the given query parameters, no more and no fewer.
pub fn has_exact_query_parameters(
    params: impl IntoIterator<Item = crate::request::QueryParam>,
) -> Matcher {
    QueryMatcher::Exact(params.into_iter().collect()).into()
}

/// Request has query parameters with all of the given names.
pub fn has_query_parameter_names<I, S>(names: I) -> Matcher
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    QueryMatcher::Names(names.into_iter().map(Into::into).collect()).into()
}

/// Request carries headers with all of the given names.
pub fn has_header_names<I, S>(names: I) -> Matcher
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    HeaderNamesMatcher::new(names).into()
}

/// Request method equals `method` (case-insensitive).
pub fn http_method_is(method: impl Into<String>) -> Matcher {
    MethodMatcher::new(method).into()
}

pub fn is_get() -> Matcher {
    http_method_is("GET")
}

pub fn is_post() -> Matcher {
    http_method_is("POST")
}

pub fn is_put() -> Matcher {
    http_method_is("PUT")
}

pub fn is_patch() -> Matcher {
    http_method_is("PATCH")
}

pub fn is_delete() -> Matcher {
    http_method_is("DELETE")
}

pub fn is_head() -> Matcher {
    http_method_is("HEAD")
}

/// All matchers must match. An empty list matches every request.
pub fn all_of(matchers: impl IntoIterator<Item = Matcher>) -> Matcher {
    LogicalMatcher::And(matchers.into_iter().collect()).into()
}

/// At least one matcher must match. An empty list matches nothing.
pub fn any_of(matchers: impl IntoIterator<Item = Matcher>) -> Matcher {
    LogicalMatcher::Or(matchers.into_iter().collect()).into()
}

/// Negates `matcher`.
pub fn not(matcher: impl Into<Matcher>) -> Matcher {
    LogicalMatcher::Not(matcher.into()).into()
}

/// Matches every request.
pub fn any_request() -> Matcher {
    Matcher::from_fn("any request", |_| true)
}
