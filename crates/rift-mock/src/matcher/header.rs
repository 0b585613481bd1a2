//! Header predicates.

use super::RequestMatcher;
use crate::request::RecordedRequest;

/// Every listed header name is present on the request (case-insensitive).
#[derive(Debug, Clone)]
pub struct HeaderNamesMatcher {
    names: Vec<String>,
}

impl HeaderNamesMatcher {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl RequestMatcher for HeaderNamesMatcher {
    fn matches(&self, request: &RecordedRequest) -> bool {
        let headers = request.headers();
        self.names
            .iter()
            .all(|name| headers.contains_key(name.to_lowercase().as_str()))
    }

    fn describe(&self) -> String {
        format!("has headers: {}", self.names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_names_subset() {
        let matcher = HeaderNamesMatcher::new(["Authorization", "x-trace-id"]);
        let req = RecordedRequest::new("GET", "/")
            .with_header("authorization", "Bearer t")
            .with_header("X-Trace-Id", "1")
            .with_header("Accept", "*/*");
        assert!(matcher.matches(&req));

        let req = RecordedRequest::new("GET", "/").with_header("authorization", "Bearer t");
        assert!(!matcher.matches(&req));
    }

    #[test]
    fn test_invalid_header_name_never_matches() {
        let matcher = HeaderNamesMatcher::new(["bad header"]);
        assert!(!matcher.matches(&RecordedRequest::new("GET", "/")));
    }
}
