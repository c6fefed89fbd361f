//! Request forwarding to resolved MCP services
//!
//! The inbound request keeps its method, path, query and headers. Only the
//! target scheme and authority change. `Host` is replaced by the endpoint's
//! authority and the caller's original host is passed on in
//! `X-Forwarded-Host`. The upstream response is streamed back unbuffered.
//!
//! Forwarding is at-most-once: a failed or timed-out exchange is reported,
//! never retried.

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, Request, Response};
use futures::TryStreamExt;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::resolver::ServiceEndpoint;

/// Maximum request body size forwarded upstream (10 MB)
const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Header carrying the caller's original host
pub const X_FORWARDED_HOST: &str = "x-forwarded-host";

/// Hop-by-hop headers, meaningful only for a single connection
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Forwards mutating requests to a resolved endpoint
#[derive(Clone)]
pub struct ForwardingProxy {
    client: reqwest::Client,
    timeout: Duration,
}

impl ForwardingProxy {
    /// Create a proxy whose exchanges are bounded by `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Internal(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, timeout })
    }

    /// Forward `request` to `endpoint` and stream the response back
    pub async fn forward(
        &self,
        endpoint: &ServiceEndpoint,
        request: Request<Body>,
    ) -> Result<Response<Body>> {
        let (parts, body) = request.into_parts();

        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let target_url = endpoint.join(path_and_query);

        let original_host = parts
            .headers
            .get(header::HOST)
            .cloned()
            .or_else(|| {
                parts
                    .uri
                    .authority()
                    .and_then(|a| a.as_str().parse().ok())
            });

        let mut headers = strip_hop_by_hop(parts.headers);
        headers.remove(header::HOST);
        headers.remove(header::CONTENT_LENGTH);
        if let Some(host) = original_host {
            headers.insert(HeaderName::from_static(X_FORWARDED_HOST), host);
        }

        let body = axum::body::to_bytes(body, MAX_BODY_SIZE)
            .await
            .map_err(|e| Error::BadRequest(format!("failed to read request body: {}", e)))?;

        info!(
            method = %parts.method,
            target = %target_url,
            "proxying request to MCP service"
        );

        let response = self
            .client
            .request(parts.method, &target_url)
            .headers(headers)
            .body(body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("failed to proxy to MCP service: {}", e)))?;

        let status = response.status();
        debug!(status = %status, target = %target_url, "upstream responded");

        let response_headers = strip_hop_by_hop(response.headers().clone());
        let stream = response.bytes_stream().map_err(std::io::Error::other);

        let mut builder = Response::builder().status(status);
        if let Some(headers) = builder.headers_mut() {
            headers.extend(response_headers);
        }
        builder
            .body(Body::from_stream(stream))
            .map_err(|e| Error::Internal(format!("failed to build response: {}", e)))
    }
}

/// Remove hop-by-hop headers, including any named in `Connection`
fn strip_hop_by_hop(mut headers: HeaderMap) -> HeaderMap {
    let listed: Vec<String> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect();

    for name in HOP_BY_HOP_HEADERS {
        headers.remove(*name);
    }
    for name in listed {
        headers.remove(name.as_str());
    }
    headers
}
