//! Service endpoint resolution
//!
//! Maps a (namespace, service) pair to the in-cluster address of the
//! Service. Nothing is cached; every request resolves again.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use genai_common::cluster::ClusterClient;
use k8s_openapi::api::core::v1::{Service, ServicePort};
use tracing::info;

use crate::error::{Error, Result};

/// Port names preferred over positional order
const PREFERRED_PORT_NAMES: &[&str] = &["http", "https", "mcp"];

/// Cluster-local DNS suffix for Services
const SERVICE_DNS_SUFFIX: &str = "svc.cluster.local";

/// Resolved network location of a service
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceEndpoint {
    /// `http` or `https`
    pub scheme: String,
    /// Host name
    pub host: String,
    /// TCP port
    pub port: u16,
    /// Path prefix prepended to every request path (no trailing slash)
    pub base_path: String,
}

impl ServiceEndpoint {
    /// Endpoint with an empty base path
    pub fn new(scheme: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
            port,
            base_path: String::new(),
        }
    }

    /// Set the base path
    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into().trim_end_matches('/').to_string();
        self
    }

    /// `scheme://host:port/base`
    pub fn base_url(&self) -> String {
        format!(
            "{}://{}:{}{}",
            self.scheme, self.host, self.port, self.base_path
        )
    }

    /// Full URL for a path (and optional query) on this endpoint
    pub fn join(&self, path_and_query: &str) -> String {
        if path_and_query.starts_with('/') {
            format!("{}{}", self.base_url(), path_and_query)
        } else {
            format!("{}/{}", self.base_url(), path_and_query)
        }
    }

    /// `host:port`, as used for the Host header
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for ServiceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base_url())
    }
}

/// Resolves a service name to a live endpoint
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ServiceEndpointResolver: Send + Sync {
    /// Resolve `service` in `namespace` using the caller's cluster client.
    ///
    /// Fails with `NotFound` when the service does not exist and `Internal`
    /// for any other cluster error.
    async fn resolve(
        &self,
        client: Arc<dyn ClusterClient>,
        namespace: &str,
        service: &str,
    ) -> Result<ServiceEndpoint>;
}

/// Resolver reading `Service` objects from the cluster API
#[derive(Clone, Copy, Debug, Default)]
pub struct KubeServiceResolver;

impl KubeServiceResolver {
    /// Build an endpoint from a Service object
    pub fn endpoint_for(
        service: &Service,
        namespace: &str,
        name: &str,
    ) -> Result<ServiceEndpoint> {
        let ports = service
            .spec
            .as_ref()
            .and_then(|spec| spec.ports.as_deref())
            .unwrap_or_default();

        let port = select_port(ports).ok_or_else(|| {
            Error::NotFound(format!(
                "service {}/{} exposes no ports",
                namespace, name
            ))
        })?;

        let number = u16::try_from(port.port).map_err(|_| {
            Error::Internal(format!(
                "service {}/{} has invalid port {}",
                namespace, name, port.port
            ))
        })?;

        let scheme = if port.name.as_deref() == Some("https") || number == 443 {
            "https"
        } else {
            "http"
        };

        Ok(ServiceEndpoint::new(
            scheme,
            format!("{}.{}.{}", name, namespace, SERVICE_DNS_SUFFIX),
            number,
        ))
    }
}

/// Pick a named port if one is preferred, otherwise the first
fn select_port(ports: &[ServicePort]) -> Option<&ServicePort> {
    ports
        .iter()
        .find(|p| {
            p.name
                .as_deref()
                .is_some_and(|n| PREFERRED_PORT_NAMES.contains(&n))
        })
        .or_else(|| ports.first())
}

#[async_trait]
impl ServiceEndpointResolver for KubeServiceResolver {
    async fn resolve(
        &self,
        client: Arc<dyn ClusterClient>,
        namespace: &str,
        service: &str,
    ) -> Result<ServiceEndpoint> {
        let found = client
            .get_service(namespace, service)
            .await
            .map_err(|e| Error::Internal(format!("failed to get service: {}", e)))?
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "service {} not found in namespace {}",
                    service, namespace
                ))
            })?;

        let endpoint = Self::endpoint_for(&found, namespace, service)?;
        info!(
            namespace = %namespace,
            service = %service,
            endpoint = %endpoint,
            "resolved MCP service endpoint"
        );
        Ok(endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genai_common::cluster::MockClusterClient;
    use k8s_openapi::api::core::v1::ServiceSpec;

    fn port(name: Option<&str>, number: i32) -> ServicePort {
        ServicePort {
            name: name.map(str::to_string),
            port: number,
            ..Default::default()
        }
    }

    fn service(ports: Vec<ServicePort>) -> Service {
        Service {
            spec: Some(ServiceSpec {
                ports: Some(ports),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn client_returning(svc: Option<Service>) -> Arc<dyn ClusterClient> {
        let mut client = MockClusterClient::new();
        client
            .expect_get_service()
            .withf(|ns, name| ns == "team-a" && name == "weather-mcp")
            .returning(move |_, _| Ok(svc.clone()));
        Arc::new(client)
    }

    #[test]
    fn test_endpoint_join() {
        let endpoint = ServiceEndpoint::new("http", "svc.ns", 8080).with_base_path("/mcp/");
        assert_eq!(endpoint.base_url(), "http://svc.ns:8080/mcp");
        assert_eq!(endpoint.join("/sse?x=1"), "http://svc.ns:8080/mcp/sse?x=1");
        assert_eq!(endpoint.join("sse"), "http://svc.ns:8080/mcp/sse");
        assert_eq!(endpoint.authority(), "svc.ns:8080");
    }

    #[test]
    fn test_prefers_named_port() {
        let svc = service(vec![port(Some("metrics"), 9090), port(Some("mcp"), 8000)]);
        let endpoint = KubeServiceResolver::endpoint_for(&svc, "team-a", "weather-mcp").unwrap();
        assert_eq!(endpoint.port, 8000);
        assert_eq!(endpoint.scheme, "http");
        assert_eq!(endpoint.host, "weather-mcp.team-a.svc.cluster.local");
    }

    #[test]
    fn test_falls_back_to_first_port() {
        let svc = service(vec![port(None, 7000), port(Some("metrics"), 9090)]);
        let endpoint = KubeServiceResolver::endpoint_for(&svc, "team-a", "weather-mcp").unwrap();
        assert_eq!(endpoint.port, 7000);
    }

    #[test]
    fn test_https_scheme() {
        let named = service(vec![port(Some("https"), 8443)]);
        let endpoint = KubeServiceResolver::endpoint_for(&named, "team-a", "s").unwrap();
        assert_eq!(endpoint.scheme, "https");

        let by_number = service(vec![port(None, 443)]);
        let endpoint = KubeServiceResolver::endpoint_for(&by_number, "team-a", "s").unwrap();
        assert_eq!(endpoint.scheme, "https");
    }

    #[test]
    fn test_no_ports_is_not_found() {
        let err =
            KubeServiceResolver::endpoint_for(&Service::default(), "team-a", "s").unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_resolve_missing_service() {
        let err = KubeServiceResolver
            .resolve(client_returning(None), "team-a", "weather-mcp")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_resolve_api_error_is_internal() {
        let mut client = MockClusterClient::new();
        client
            .expect_get_service()
            .returning(|_, _| Err(genai_common::Error::config("connection refused")));

        let err = KubeServiceResolver
            .resolve(Arc::new(client), "team-a", "weather-mcp")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }

    #[tokio::test]
    async fn test_resolve_is_idempotent() {
        let client = client_returning(Some(service(vec![port(Some("http"), 8080)])));

        let first = KubeServiceResolver
            .resolve(client.clone(), "team-a", "weather-mcp")
            .await
            .unwrap();
        let second = KubeServiceResolver
            .resolve(client, "team-a", "weather-mcp")
            .await
            .unwrap();
        assert_eq!(first, second);
    }
}
