use super::RequestMatcher;
use crate::request::RecordedRequest;

/// HTTP method equality, case-insensitive.
#[derive(Debug, Clone)]
pub struct MethodMatcher {
    method: String,
}

impl MethodMatcher {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
        }
    }
}

impl RequestMatcher for MethodMatcher {
    fn matches(&self, request: &RecordedRequest) -> bool {
        request.method().eq_ignore_ascii_case(&self.method)
    }

    fn describe(&self) -> String {
        format!("HTTP method is: {}", self.method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_case_insensitive() {
        let matcher = MethodMatcher::new("GET");
        assert!(matcher.matches(&RecordedRequest::new("get", "/")));
        assert!(matcher.matches(&RecordedRequest::new("GET", "/")));
        assert!(!matcher.matches(&RecordedRequest::new("POST", "/")));
    }
}
