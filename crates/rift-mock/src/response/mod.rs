//! Mock responses and answers.
//!
//! - `MockResponse`: the value sent back to the client
//! - `Answer` / `MockAnswer`: fixed or request-dependent producers of responses
//! - `body`: conversion into hyper responses, applying header and body delays

mod answer;
pub(crate) mod body;

pub use answer::{Answer, MockAnswer};

use bytes::Bytes;
use std::time::Duration;

/// Body of the response returned when no declaration matches.
pub const RESPONSE_NOT_MOCKED: &str = "NOT MOCKED";

/// Prefix of the response body returned when several declarations match.
pub const MORE_THAN_ONE_RESPONSE_ERROR: &str =
    "There are more than one response matching this request: ";

/// An HTTP response to be served by the mock server.
#[derive(Debug, Clone, PartialEq)]
pub struct MockResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: Option<Bytes>,
    body_delay: Duration,
    header_delay: Duration,
}

impl MockResponse {
    /// Empty response with the given status code.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: None,
            body_delay: Duration::ZERO,
            header_delay: Duration::ZERO,
        }
    }

    pub fn ok() -> Self {
        Self::new(200)
    }

    /// Response with a text body.
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self::new(status).with_body(body.into())
    }

    /// Response with a JSON body and `Content-Type: application/json`.
    pub fn json<T: serde::Serialize + ?Sized>(
        status: u16,
        value: &T,
    ) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(value)?;
        Ok(Self::new(status)
            .with_header("Content-Type", "application/json")
            .with_body(body))
    }

    /// 500 response describing `error`.
    ///
    /// The body carries the full cause chain, the `Exception` header the
    /// top-level message.
    pub fn from_error(error: &anyhow::Error) -> Self {
        let message = error.to_string();
        let header_value: String = message
            .lines()
            .next()
            .unwrap_or_default()
            .chars()
            .filter(|c| !c.is_control())
            .collect();
        Self::new(500)
            .with_header("Exception", header_value)
            .with_body(format!("{error:?}"))
    }

    pub(crate) fn not_mocked(method: &str) -> Self {
        let response = Self::new(500);
        if method.eq_ignore_ascii_case("HEAD") {
            response
        } else {
            response.with_body(RESPONSE_NOT_MOCKED)
        }
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Delay between sending the headers and sending the body.
    pub fn with_body_delay(mut self, delay: Duration) -> Self {
        self.body_delay = delay;
        self
    }

    /// Delay before the status line and headers are sent.
    pub fn with_header_delay(mut self, delay: Duration) -> Self {
        self.header_delay = delay;
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// First header value named `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Body as UTF-8 text, empty when there is no body.
    pub fn body_string(&self) -> String {
        self.body
            .as_ref()
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .unwrap_or_default()
    }

    pub fn body_delay(&self) -> Duration {
        self.body_delay
    }

    pub fn header_delay(&self) -> Duration {
        self.header_delay
    }
}

impl Default for MockResponse {
    fn default() -> Self {
        Self::ok()
    }
}
