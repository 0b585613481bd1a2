//! Recorded inbound requests.
//!
//! Every request that reaches the mock server is captured as a [`RecordedRequest`]
//! before dispatch. Matchers, answers and verification all operate on this type,
//! never on the raw hyper request.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use hyper::header::{HeaderName, HeaderValue};
use hyper::HeaderMap;
use std::fmt;

/// A request captured by the mock server.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    method: String,
    target: String,
    version: String,
    headers: HeaderMap,
    body: Bytes,
    sequence_number: usize,
    received_at: DateTime<Utc>,
}

impl RecordedRequest {
    /// Create a request for `method` and `target` (path plus optional query string).
    pub fn new(method: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            target: target.into(),
            version: "HTTP/1.1".to_string(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            sequence_number: 0,
            received_at: Utc::now(),
        }
    }

    /// Add a header. Invalid names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub(crate) fn with_sequence_number(mut self, sequence_number: usize) -> Self {
        self.sequence_number = sequence_number;
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// The request target as sent on the request line: path plus query string.
    pub fn path(&self) -> &str {
        &self.target
    }

    /// The path without the query string.
    pub fn path_without_query(&self) -> &str {
        match self.target.split_once('?') {
            Some((path, _)) => path,
            None => &self.target,
        }
    }

    /// The raw (still encoded) query string, if any.
    pub fn query(&self) -> Option<&str> {
        self.target
            .split_once('?')
            .map(|(_, query)| query)
            .filter(|query| !query.is_empty())
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of the header `name`, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Position of this request in the server's history, starting at 0.
    pub fn sequence_number(&self) -> usize {
        self.sequence_number
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    /// `METHOD target VERSION`, e.g. `GET /users?page=2 HTTP/1.1`.
    pub fn request_line(&self) -> String {
        format!("{} {} {}", self.method, self.target, self.version)
    }

    /// Query parameters grouped by name, in order of first appearance.
    pub fn query_params(&self) -> Vec<QueryParam> {
        self.query().map(split_query).unwrap_or_default()
    }
}

impl fmt::Display for RecordedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.request_line())
    }
}

/// A query parameter name with all of its values.
///
/// Equality ignores the order of values, so `a=1&a=2` equals `a=2&a=1`.
#[derive(Debug, Clone, Eq)]
pub struct QueryParam {
    key: String,
    values: Vec<String>,
}

impl QueryParam {
    pub fn new<I, V>(key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        Self {
            key: key.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    fn sorted_values(&self) -> Vec<&str> {
        let mut values: Vec<&str> = self.values.iter().map(String::as_str).collect();
        values.sort_unstable();
        values
    }
}

impl PartialEq for QueryParam {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.sorted_values() == other.sorted_values()
    }
}

impl fmt::Display for QueryParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.values.join(","))
    }
}

/// Split a raw query string into decoded, grouped parameters.
pub fn split_query(query: &str) -> Vec<QueryParam> {
    let mut params: Vec<QueryParam> = Vec::new();
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = match pair.split_once('=') {
            Some((key, value)) => (decode_component(key), decode_component(value)),
            None => (decode_component(pair), String::new()),
        };
        match params.iter_mut().find(|p| p.key == key) {
            Some(existing) => existing.values.push(value),
            None => params.push(QueryParam {
                key,
                values: vec![value],
            }),
        }
    }
    params
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|decoded| decoded.into_owned())
        .unwrap_or(spaced)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_and_query_split() {
        let req = RecordedRequest::new("GET", "/foo/bar?baz=ban");
        assert_eq!(req.path(), "/foo/bar?baz=ban");
        assert_eq!(req.path_without_query(), "/foo/bar");
        assert_eq!(req.query(), Some("baz=ban"));

        let req = RecordedRequest::new("GET", "/foo?");
        assert_eq!(req.query(), None);
    }

    #[test]
    fn test_request_line() {
        let req = RecordedRequest::new("POST", "/sample");
        assert_eq!(req.request_line(), "POST /sample HTTP/1.1");
        assert_eq!(req.to_string(), "POST /sample HTTP/1.1");
    }

    #[test]
    fn test_basic_query_param_split() {
        let params = split_query("flag=true&session_length=2");
        assert_eq!(params.len(), 2);
        assert!(params.contains(&QueryParam::new("flag", ["true"])));
        assert!(params.contains(&QueryParam::new("session_length", ["2"])));
    }

    #[test]
    fn test_multiple_value_query_param_split() {
        let params = split_query("user_id=1&user_id=2");
        assert_eq!(params.len(), 1);
        // Value order does not matter
        assert_eq!(params[0], QueryParam::new("user_id", ["2", "1"]));
    }

    #[test]
    fn test_query_decoding() {
        let params = split_query("q=hello+world&name=a%26b&flag");
        assert_eq!(params[0], QueryParam::new("q", ["hello world"]));
        assert_eq!(params[1], QueryParam::new("name", ["a&b"]));
        assert_eq!(params[2], QueryParam::new("flag", [""]));
    }

    #[test]
    fn test_headers_are_case_insensitive() {
        let req = RecordedRequest::new("GET", "/")
            .with_header("X-Token", "abc")
            .with_header("bad header", "ignored");
        assert_eq!(req.header("x-token"), Some("abc"));
        assert_eq!(req.headers().len(), 1);
    }
}
