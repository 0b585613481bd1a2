//! Per-request glue between hyper and the dispatcher.

use crate::dispatcher::Dispatcher;
use crate::request::RecordedRequest;
use crate::response::body::{into_hyper_response, MockBody};
use crate::response::MockResponse;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::{Request, Response};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, warn};

/// Record `req`, dispatch it and apply the header delay before handing the
/// response back to hyper. The body delay travels inside the body.
pub(crate) async fn handle_request(
    req: Request<Incoming>,
    dispatcher: Arc<Dispatcher>,
    remote_addr: SocketAddr,
) -> Result<Response<MockBody>, Infallible> {
    let recorded = match record(req).await {
        Ok(recorded) => recorded,
        Err(e) => {
            warn!("Failed to read request body from {}: {}", remote_addr, e);
            let error = anyhow::Error::new(e).context("failed to read request body");
            return Ok(into_hyper_response(MockResponse::from_error(&error)));
        }
    };
    debug!("{} from {}", recorded.request_line(), remote_addr);

    let response = dispatcher.dispatch(recorded);

    let header_delay = response.header_delay();
    if !header_delay.is_zero() {
        tokio::time::sleep(header_delay).await;
    }
    Ok(into_hyper_response(response))
}

async fn record(req: Request<Incoming>) -> Result<RecordedRequest, hyper::Error> {
    let (parts, body) = req.into_parts();
    let body = body.collect().await?.to_bytes();

    let target = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| parts.uri.path().to_string());

    Ok(RecordedRequest::new(parts.method.as_str(), target)
        .with_version(format!("{:?}", parts.version))
        .with_headers(parts.headers)
        .with_body(body))
}
