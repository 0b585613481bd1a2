//! Conversion of [`MockResponse`] into hyper responses.
//!
//! The header delay is applied by the caller before the response is returned to
//! hyper. The body delay is carried inside the body itself so that only the
//! connection serving this response waits for it.

use super::MockResponse;
use bytes::Bytes;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full, StreamBody};
use hyper::body::Frame;
use hyper::header::{HeaderName, HeaderValue, CONTENT_LENGTH};
use hyper::{Response, StatusCode};
use std::convert::Infallible;
use std::time::Duration;
use tracing::warn;

pub type MockBody = UnsyncBoxBody<Bytes, Infallible>;

/// Body that yields its data only after `delay` has elapsed.
pub fn delayed_body(body: Option<Bytes>, delay: Duration) -> MockBody {
    match body {
        None => Empty::<Bytes>::new().boxed_unsync(),
        Some(bytes) if delay.is_zero() => Full::new(bytes).boxed_unsync(),
        Some(bytes) => {
            let stream = futures::stream::once(async move {
                tokio::time::sleep(delay).await;
                Ok::<_, Infallible>(Frame::data(bytes))
            });
            StreamBody::new(stream).boxed_unsync()
        }
    }
}

/// Build the hyper response for `mock`. Invalid statuses and headers are
/// replaced by a 500 or skipped, never propagated.
pub fn into_hyper_response(mock: MockResponse) -> Response<MockBody> {
    let status = StatusCode::from_u16(mock.status()).unwrap_or_else(|_| {
        warn!("Invalid mock status code {}, using 500", mock.status());
        StatusCode::INTERNAL_SERVER_ERROR
    });

    let mut builder = Response::builder().status(status);
    for (k, v) in mock.headers() {
        match (
            HeaderName::from_bytes(k.as_bytes()),
            HeaderValue::from_str(v),
        ) {
            (Ok(name), Ok(value)) => builder = builder.header(name, value),
            _ => warn!("Skipping invalid mock response header {:?}", k),
        }
    }

    // Delayed bodies are streamed, so announce their length up front
    let has_explicit_length = mock.header(CONTENT_LENGTH.as_str()).is_some();
    if let Some(body) = mock.body() {
        if !mock.body_delay().is_zero() && !has_explicit_length {
            builder = builder.header(CONTENT_LENGTH, body.len());
        }
    }

    let body = delayed_body(mock.body().cloned(), mock.body_delay());
    builder.body(body).unwrap_or_else(|_| {
        let body = Full::new(Bytes::from("Internal Server Error")).boxed_unsync();
        let mut response = Response::new(body);
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        response
    })
}
