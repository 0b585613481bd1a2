//! Answers: producers of mock responses.

use super::MockResponse;
use crate::request::RecordedRequest;
use std::fmt;
use std::sync::Arc;

/// Computes a response from the request being served.
///
/// Implemented for any `Fn(&RecordedRequest) -> MockResponse` closure.
pub trait MockAnswer: Send + Sync {
    fn answer(&self, request: &RecordedRequest) -> MockResponse;
}

impl<F> MockAnswer for F
where
    F: Fn(&RecordedRequest) -> MockResponse + Send + Sync,
{
    fn answer(&self, request: &RecordedRequest) -> MockResponse {
        self(request)
    }
}

/// One entry in a declaration's answer sequence.
#[derive(Clone)]
pub enum Answer {
    /// Always the same response
    Fixed(MockResponse),
    /// Evaluated against each request at dispatch time
    Dynamic(Arc<dyn MockAnswer>),
}

impl Answer {
    pub fn dynamic(answer: impl MockAnswer + 'static) -> Self {
        Answer::Dynamic(Arc::new(answer))
    }

    pub fn answer(&self, request: &RecordedRequest) -> MockResponse {
        match self {
            Answer::Fixed(response) => response.clone(),
            Answer::Dynamic(answer) => answer.answer(request),
        }
    }
}

impl fmt::Debug for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Answer::Fixed(response) => f.debug_tuple("Fixed").field(response).finish(),
            Answer::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

impl From<MockResponse> for Answer {
    fn from(response: MockResponse) -> Self {
        Answer::Fixed(response)
    }
}
