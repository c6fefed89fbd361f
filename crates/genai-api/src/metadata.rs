//! MCP metadata discovery
//!
//! GET requests are answered by probing the resolved service for a
//! self-description. Candidates are tried in order, one at a time, and the
//! first 2xx response wins. Transport errors and non-success statuses only
//! move on to the next candidate.

use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::debug;

use crate::error::{Error, Result};
use crate::resolver::ServiceEndpoint;

/// Probe order: well-known plugin manifest, then the service root
pub const METADATA_PATHS: &[&str] = &["/.well-known/ai-plugin.json", "/"];

/// Content type assumed when upstream sends none
const DEFAULT_CONTENT_TYPE: &str = "application/json";

const CORS_ALLOW_ORIGIN: &str = "*";
const CORS_ALLOW_METHODS: &str = "GET, POST, PUT";
const CORS_ALLOW_HEADERS: &str = "Content-Type, Authorization";

/// Metadata payload returned by a service
#[derive(Clone, Debug)]
pub struct MetadataDocument {
    /// Content type reported by upstream, or the default
    pub content_type: String,
    /// Raw body bytes
    pub body: Bytes,
}

impl IntoResponse for MetadataDocument {
    fn into_response(self) -> Response {
        let content_type = HeaderValue::from_str(&self.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));

        let mut response = (StatusCode::OK, Body::from(self.body)).into_response();
        let headers = response.headers_mut();
        headers.insert(header::CONTENT_TYPE, content_type);
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static(CORS_ALLOW_ORIGIN),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(CORS_ALLOW_METHODS),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(CORS_ALLOW_HEADERS),
        );
        response
    }
}

/// Fetches metadata documents from resolved endpoints
#[derive(Clone)]
pub struct MetadataFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl MetadataFetcher {
    /// Create a fetcher with the given per-attempt timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Internal(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, timeout })
    }

    /// Probe each candidate path and return the first successful payload
    pub async fn fetch(
        &self,
        endpoint: &ServiceEndpoint,
        inbound: &HeaderMap,
    ) -> Result<MetadataDocument> {
        let mut headers = inbound.clone();
        headers.remove(header::HOST);

        for path in METADATA_PATHS {
            let url = endpoint.join(path);
            debug!(url = %url, "probing metadata endpoint");

            let response = match self
                .client
                .get(&url)
                .headers(headers.clone())
                .timeout(self.timeout)
                .send()
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    debug!(url = %url, error = %e, "metadata probe failed");
                    continue;
                }
            };

            let status = response.status();
            if !status.is_success() {
                debug!(url = %url, status = %status, "metadata probe returned non-success");
                continue;
            }

            let content_type = response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or(DEFAULT_CONTENT_TYPE)
                .to_string();

            match response.bytes().await {
                Ok(body) => {
                    debug!(url = %url, bytes = body.len(), "metadata probe succeeded");
                    return Ok(MetadataDocument { content_type, body });
                }
                Err(e) => {
                    debug!(url = %url, error = %e, "failed to read metadata body");
                    continue;
                }
            }
        }

        Err(Error::Internal("no reachable metadata endpoint".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header as header_is, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn endpoint_for(server: &MockServer) -> ServiceEndpoint {
        let addr = server.address();
        ServiceEndpoint::new("http", addr.ip().to_string(), addr.port())
    }

    fn fetcher() -> MetadataFetcher {
        MetadataFetcher::new(Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn test_well_known_path_wins() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/ai-plugin.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(r#"{"name":"weather"}"#, "application/json"),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let doc = fetcher()
            .fetch(&endpoint_for(&server), &HeaderMap::new())
            .await
            .unwrap();
        assert_eq!(doc.body.as_ref(), br#"{"name":"weather"}"#);
        assert_eq!(doc.content_type, "application/json");
    }

    #[tokio::test]
    async fn test_falls_back_to_root() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/ai-plugin.json"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("root doc", "text/plain"))
            .mount(&server)
            .await;

        let doc = fetcher()
            .fetch(&endpoint_for(&server), &HeaderMap::new())
            .await
            .unwrap();
        assert_eq!(doc.body.as_ref(), b"root doc");
        assert_eq!(doc.content_type, "text/plain");
    }

    #[tokio::test]
    async fn test_slow_candidate_times_out_and_falls_back() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/ai-plugin.json"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("root"))
            .mount(&server)
            .await;

        let fetcher = MetadataFetcher::new(Duration::from_millis(300)).unwrap();
        let started = std::time::Instant::now();
        let doc = fetcher
            .fetch(&endpoint_for(&server), &HeaderMap::new())
            .await
            .unwrap();

        assert_eq!(doc.body.as_ref(), b"root");
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_all_candidates_fail() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;

        let err = fetcher()
            .fetch(&endpoint_for(&server), &HeaderMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Internal(msg) if msg == "no reachable metadata endpoint"));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        // Port 9 on localhost is not listening in test environments
        let endpoint = ServiceEndpoint::new("http", "127.0.0.1", 9);
        let err = fetcher().fetch(&endpoint, &HeaderMap::new()).await.unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }

    #[tokio::test]
    async fn test_copies_inbound_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header_is("authorization", "Bearer user-token"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        let mut inbound = HeaderMap::new();
        inbound.insert(header::AUTHORIZATION, "Bearer user-token".parse().unwrap());
        inbound.insert(header::HOST, "gateway.example.com".parse().unwrap());

        let doc = fetcher().fetch(&endpoint_for(&server), &inbound).await.unwrap();
        assert_eq!(doc.body.as_ref(), b"{}");
    }

    #[tokio::test]
    async fn test_document_response_headers() {
        let doc = MetadataDocument {
            content_type: "application/json".to_string(),
            body: Bytes::from_static(b"{}"),
        };
        let response = doc.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let headers = response.headers();
        assert_eq!(headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "*");
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_METHODS).unwrap(),
            "GET, POST, PUT"
        );
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_HEADERS).unwrap(),
            "Content-Type, Authorization"
        );
        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "application/json");
    }
}
