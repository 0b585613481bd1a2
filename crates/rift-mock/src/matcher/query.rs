//! Query parameter predicates.

use super::RequestMatcher;
use crate::request::{QueryParam, RecordedRequest};

#[derive(Debug, Clone)]
pub enum QueryMatcher {
    /// At least one query parameter is present
    Any,
    /// The request's parameters equal this set exactly
    Exact(Vec<QueryParam>),
    /// Every listed name is present (others are allowed)
    Names(Vec<String>),
}

impl RequestMatcher for QueryMatcher {
    fn matches(&self, request: &RecordedRequest) -> bool {
        let params = request.query_params();
        match self {
            QueryMatcher::Any => !params.is_empty(),
            QueryMatcher::Exact(expected) => {
                params.len() == expected.len() && expected.iter().all(|p| params.contains(p))
            }
            QueryMatcher::Names(names) => names
                .iter()
                .all(|name| params.iter().any(|p| p.key() == name)),
        }
    }

    fn describe(&self) -> String {
        match self {
            QueryMatcher::Any => "has query parameters".to_string(),
            QueryMatcher::Exact(expected) => {
                let rendered: Vec<String> = expected.iter().map(ToString::to_string).collect();
                format!("has exact query parameters: {}", rendered.join("&"))
            }
            QueryMatcher::Names(names) => {
                format!("has query parameter names: {}", names.join(", "))
            }
        }
    }
}
