//! Request history.
//!
//! Every dispatched request is appended in arrival order, matched or not.
//! The history is only cleared by an explicit reset.

use crate::matcher::Matcher;
use crate::request::RecordedRequest;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HistoryError {
    #[error("invalid range: from ({from}) is greater than to ({to})")]
    InvalidRange { from: usize, to: usize },
    #[error("range end {to} is out of bounds for history of size {len}")]
    OutOfRange { to: usize, len: usize },
}

#[derive(Debug, Default, Clone)]
pub struct RequestHistory {
    requests: Vec<RecordedRequest>,
}

impl RequestHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, request: RecordedRequest) {
        self.requests.push(request);
    }

    pub(crate) fn clear(&mut self) {
        self.requests.clear();
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn requests(&self) -> &[RecordedRequest] {
        &self.requests
    }

    /// Number of recorded requests accepted by `matcher`.
    pub fn count(&self, matcher: &Matcher) -> usize {
        self.requests.iter().filter(|r| matcher.matches(r)).count()
    }

    /// The last `n` requests, oldest first. The whole history if `n` exceeds it.
    pub fn take_last(&self, n: usize) -> Vec<RecordedRequest> {
        let start = self.requests.len().saturating_sub(n);
        self.requests[start..].to_vec()
    }

    /// The first `n` requests. The whole history if `n` exceeds it.
    pub fn take_first(&self, n: usize) -> Vec<RecordedRequest> {
        let end = n.min(self.requests.len());
        self.requests[..end].to_vec()
    }

    pub fn last(&self) -> Option<RecordedRequest> {
        self.requests.last().cloned()
    }

    pub fn first(&self) -> Option<RecordedRequest> {
        self.requests.first().cloned()
    }

    /// Requests in the half-open range `[from, to)`.
    pub fn take(&self, from: usize, to: usize) -> Result<Vec<RecordedRequest>, HistoryError> {
        if from > to {
            return Err(HistoryError::InvalidRange { from, to });
        }
        if to > self.requests.len() {
            return Err(HistoryError::OutOfRange {
                to,
                len: self.requests.len(),
            });
        }
        Ok(self.requests[from..to].to_vec())
    }

    pub fn take_all_matching(&self, matcher: &Matcher) -> Vec<RecordedRequest> {
        self.requests
            .iter()
            .filter(|r| matcher.matches(r))
            .cloned()
            .collect()
    }

    /// Bracketed listing of every request, one per line, with matches
    /// prefixed by `#` and suffixed by `| #MATCH`.
    pub fn render_invocations(&self, matcher: &Matcher) -> String {
        let mut out = String::from("[");
        if !self.requests.is_empty() {
            out.push('\n');
        }
        for request in &self.requests {
            if matcher.matches(request) {
                out.push_str(&format!("\t# {} \t| #MATCH\n", request.request_line()));
            } else {
                out.push_str(&format!("\t{}\n", request.request_line()));
            }
        }
        out.push(']');
        out
    }
}
