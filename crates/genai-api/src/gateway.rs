//! MCP request orchestration
//!
//! Every request runs the same pipeline: validate the locator, require an
//! identity, obtain a cluster client for that identity, check access, then
//! resolve the service and dispatch by method. Authorization happens before
//! resolution, so a denial says nothing about whether the service exists.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, Request, State};
use axum::http::Method;
use axum::response::{IntoResponse, Response};
use genai_common::cluster::ClusterClientFactory;
use serde::Deserialize;
use tracing::{info, warn};

use crate::auth::{AccessDecision, RequestIdentity};
use crate::error::{Error, Result};
use crate::forwarder::ForwardingProxy;
use crate::metadata::MetadataFetcher;
use crate::resolver::ServiceEndpointResolver;
use crate::server::AppState;

/// Path parameters of the MCP route
#[derive(Debug, Deserialize)]
pub struct McpPath {
    /// Namespace holding the service
    pub namespace: String,
    /// Service name
    pub service: String,
}

/// Orchestrates access checks, resolution and dispatch
pub struct RequestGateway {
    clients: Arc<dyn ClusterClientFactory>,
    access: Arc<dyn AccessDecision>,
    resolver: Arc<dyn ServiceEndpointResolver>,
    metadata: MetadataFetcher,
    forwarder: ForwardingProxy,
}

impl RequestGateway {
    /// Assemble a gateway from its collaborators
    pub fn new(
        clients: Arc<dyn ClusterClientFactory>,
        access: Arc<dyn AccessDecision>,
        resolver: Arc<dyn ServiceEndpointResolver>,
        metadata: MetadataFetcher,
        forwarder: ForwardingProxy,
    ) -> Self {
        Self {
            clients,
            access,
            resolver,
            metadata,
            forwarder,
        }
    }

    /// Handle one request for `service` in `namespace`
    pub async fn handle(
        &self,
        namespace: &str,
        service: &str,
        request: Request<Body>,
    ) -> Result<Response> {
        if namespace.is_empty() || service.is_empty() {
            return Err(Error::BadRequest(
                "namespace and service name are required".to_string(),
            ));
        }

        let identity = request
            .extensions()
            .get::<RequestIdentity>()
            .cloned()
            .ok_or_else(|| Error::Unauthorized("missing RequestIdentity".to_string()))?;

        info!(
            namespace = %namespace,
            service = %service,
            method = %request.method(),
            "handling MCP request"
        );

        let client = self
            .clients
            .client_for(&identity.token)
            .await
            .map_err(|e| Error::Internal(format!("failed to get Kubernetes client: {}", e)))?;

        let allowed = self
            .access
            .decide(client.clone(), &identity, namespace, service)
            .await
            .map_err(|e| Error::Internal(format!("failed to perform access check: {}", e)))?;
        if !allowed {
            warn!(namespace = %namespace, service = %service, "access denied");
            return Err(Error::Forbidden(format!(
                "access denied to MCP service {} in namespace {}",
                service, namespace
            )));
        }

        let endpoint = self.resolver.resolve(client, namespace, service).await?;

        let method = request.method().clone();
        match method {
            Method::GET => {
                let doc = self.metadata.fetch(&endpoint, request.headers()).await?;
                Ok(doc.into_response())
            }
            Method::POST | Method::PUT => self.forwarder.forward(&endpoint, request).await,
            other => Err(Error::MethodNotAllowed(other.to_string())),
        }
    }
}

/// Axum handler for `/api/v1/mcp/{namespace}/{service}`
pub async fn mcp_handler(
    State(state): State<AppState>,
    Path(params): Path<McpPath>,
    request: Request,
) -> Response {
    match state
        .gateway
        .handle(&params.namespace, &params.service, request)
        .await
    {
        Ok(response) => response,
        Err(e) => {
            warn!(
                namespace = %params.namespace,
                service = %params.service,
                error = %e,
                "MCP request failed"
            );
            e.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::http::{Request, StatusCode};
    use genai_common::cluster::{MockClusterClient, MockClusterClientFactory};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::auth::{MockAccessDecision, SubjectAccessReviewDecision};
    use crate::resolver::{MockServiceEndpointResolver, ServiceEndpoint};

    fn working_clients() -> MockClusterClientFactory {
        let mut clients = MockClusterClientFactory::new();
        clients
            .expect_client_for()
            .returning(|_| Ok(Arc::new(MockClusterClient::new())));
        clients
    }

    fn deciding(allowed: bool) -> MockAccessDecision {
        let mut access = MockAccessDecision::new();
        access
            .expect_decide()
            .withf(|_, _, ns, svc| ns == "team-a" && svc == "weather-mcp")
            .returning(move |_, _, _, _| Ok(allowed));
        access
    }

    fn resolving_to(endpoint: ServiceEndpoint) -> MockServiceEndpointResolver {
        let mut resolver = MockServiceEndpointResolver::new();
        resolver
            .expect_resolve()
            .times(1)
            .returning(move |_, _, _| Ok(endpoint.clone()));
        resolver
    }

    fn never_resolving() -> MockServiceEndpointResolver {
        let mut resolver = MockServiceEndpointResolver::new();
        resolver.expect_resolve().never();
        resolver
    }

    fn gateway(
        clients: MockClusterClientFactory,
        access: MockAccessDecision,
        resolver: MockServiceEndpointResolver,
    ) -> RequestGateway {
        RequestGateway::new(
            Arc::new(clients),
            Arc::new(access),
            Arc::new(resolver),
            MetadataFetcher::new(Duration::from_secs(2)).unwrap(),
            ForwardingProxy::new(Duration::from_secs(2)).unwrap(),
        )
    }

    fn request(method: &str, identity: bool) -> Request<Body> {
        let mut request = Request::builder()
            .method(method)
            .uri("/api/v1/mcp/team-a/weather-mcp")
            .body(Body::empty())
            .unwrap();
        if identity {
            request
                .extensions_mut()
                .insert(RequestIdentity::new("user-token"));
        }
        request
    }

    fn endpoint_for(server: &MockServer) -> ServiceEndpoint {
        let addr = server.address();
        ServiceEndpoint::new("http", addr.ip().to_string(), addr.port())
    }

    #[tokio::test]
    async fn test_empty_locator_is_bad_request() {
        let mut clients = MockClusterClientFactory::new();
        clients.expect_client_for().never();
        let mut access = MockAccessDecision::new();
        access.expect_decide().never();
        let gw = gateway(clients, access, never_resolving());

        let err = gw
            .handle("", "weather-mcp", request("GET", true))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));

        let err = gw
            .handle("team-a", "", request("GET", true))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_missing_identity_is_unauthorized() {
        let mut access = MockAccessDecision::new();
        access.expect_decide().never();
        let gw = gateway(MockClusterClientFactory::new(), access, never_resolving());

        let err = gw
            .handle("team-a", "weather-mcp", request("GET", false))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_client_failure_is_internal() {
        let mut clients = MockClusterClientFactory::new();
        clients
            .expect_client_for()
            .returning(|_| Err(genai_common::Error::config("no cluster")));
        let mut access = MockAccessDecision::new();
        access.expect_decide().never();
        let gw = gateway(clients, access, never_resolving());

        let err = gw
            .handle("team-a", "weather-mcp", request("GET", true))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }

    #[tokio::test]
    async fn test_denied_is_forbidden_without_resolution() {
        let gw = gateway(working_clients(), deciding(false), never_resolving());

        let err = gw
            .handle("team-a", "weather-mcp", request("POST", true))
            .await
            .unwrap_err();
        match err {
            Error::Forbidden(msg) => {
                assert!(msg.contains("weather-mcp"));
                assert!(msg.contains("team-a"));
            }
            other => panic!("expected Forbidden, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_resolution_failure_propagates() {
        let mut resolver = MockServiceEndpointResolver::new();
        resolver
            .expect_resolve()
            .returning(|_, _, _| {
                Err(Error::NotFound("service weather-mcp not found".into()))
            });
        let gw = gateway(working_clients(), deciding(true), resolver);

        let err = gw
            .handle("team-a", "weather-mcp", request("GET", true))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_unsupported_method() {
        let gw = gateway(
            working_clients(),
            deciding(true),
            resolving_to(ServiceEndpoint::new("http", "127.0.0.1", 9)),
        );

        let err = gw
            .handle("team-a", "weather-mcp", request("DELETE", true))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MethodNotAllowed(_)));
        assert_eq!(err.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_get_serves_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/ai-plugin.json"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("{}", "application/json"))
            .mount(&server)
            .await;

        let gw = gateway(working_clients(), deciding(true), resolving_to(endpoint_for(&server)));
        let response = gw
            .handle("team-a", "weather-mcp", request("GET", true))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "*"
        );
    }

    #[tokio::test]
    async fn test_post_is_forwarded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/mcp/team-a/weather-mcp"))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let gw = gateway(working_clients(), deciding(true), resolving_to(endpoint_for(&server)));
        let response = gw
            .handle("team-a", "weather-mcp", request("POST", true))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn test_access_review_reuses_request_client() {
        let mut clients = MockClusterClientFactory::new();
        clients
            .expect_client_for()
            .withf(|token| token == "user-token")
            .times(1)
            .returning(|_| {
                let mut client = MockClusterClient::new();
                client.expect_review_access().times(1).returning(|_| Ok(false));
                Ok(Arc::new(client))
            });

        let gw = RequestGateway::new(
            Arc::new(clients),
            Arc::new(SubjectAccessReviewDecision),
            Arc::new(never_resolving()),
            MetadataFetcher::new(Duration::from_secs(2)).unwrap(),
            ForwardingProxy::new(Duration::from_secs(2)).unwrap(),
        );

        let err = gw
            .handle("team-a", "weather-mcp", request("GET", true))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
    }
}
