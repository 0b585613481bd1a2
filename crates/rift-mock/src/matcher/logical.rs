//! Logical operators for combining matchers.
//!
//! Supports NOT, OR, AND over arbitrary request matchers.

use super::{Matcher, RequestMatcher};
use crate::request::RecordedRequest;

#[derive(Debug, Clone)]
pub enum LogicalMatcher {
    /// Negates the inner matcher
    Not(Matcher),

    /// Matches if ANY of the inner matchers match
    Or(Vec<Matcher>),

    /// Matches if ALL of the inner matchers match
    And(Vec<Matcher>),
}

impl LogicalMatcher {
    fn describe_joined(matchers: &[Matcher], separator: &str) -> String {
        let parts: Vec<String> = matchers.iter().map(Matcher::describe).collect();
        format!("({})", parts.join(separator))
    }
}

impl RequestMatcher for LogicalMatcher {
    fn matches(&self, request: &RecordedRequest) -> bool {
        match self {
            LogicalMatcher::Not(inner) => !inner.matches(request),
            LogicalMatcher::Or(matchers) => matchers.iter().any(|m| m.matches(request)),
            LogicalMatcher::And(matchers) => matchers.iter().all(|m| m.matches(request)),
        }
    }

    fn describe(&self) -> String {
        match self {
            LogicalMatcher::Not(inner) => format!("not {}", inner.describe()),
            LogicalMatcher::Or(matchers) => Self::describe_joined(matchers, " or "),
            LogicalMatcher::And(matchers) => Self::describe_joined(matchers, " and "),
        }
    }
}
