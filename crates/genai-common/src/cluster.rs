//! Cluster API access for dependency injection
//!
//! Everything the gateway reads from the cluster goes through the
//! `ClusterClient` trait, and clients are produced by a
//! `ClusterClientFactory` so each request can talk to the API server as
//! the calling user. Tests inject mockall mocks of both traits.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::authorization::v1::{
    ResourceAttributes, SelfSubjectAccessReview, SelfSubjectAccessReviewSpec,
};
use k8s_openapi::api::core::v1::{Secret, Service};
use kube::api::{Api, DynamicObject, ListParams, PostParams};
use kube::config::AuthInfo;
use kube::{Client, Config};
use secrecy::SecretString;
use tracing::debug;

use crate::error::{Error, Result};
use crate::serving::{ServingKind, ServingWorkload};

/// Connection timeout for API server clients
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Read timeout for API server clients
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Read-only view of the cluster API used by the gateway
#[cfg_attr(any(test, feature = "test-util"), mockall::automock)]
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Get a Service, returning None if it does not exist
    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>>;

    /// List all Secrets in a namespace
    async fn list_secrets(&self, namespace: &str) -> Result<Vec<Secret>>;

    /// Get a Secret, returning None if it does not exist
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>>;

    /// List serving workloads of the given kind in a namespace
    async fn list_serving_workloads(
        &self,
        namespace: &str,
        kind: ServingKind,
    ) -> Result<Vec<ServingWorkload>>;

    /// Ask the API server whether the client's own identity may perform
    /// the described action
    async fn review_access(&self, attributes: ResourceAttributes) -> Result<bool>;
}

/// Produces cluster clients
#[cfg_attr(any(test, feature = "test-util"), mockall::automock)]
#[async_trait]
pub trait ClusterClientFactory: Send + Sync {
    /// Client authenticated as the holder of `token`
    async fn client_for(&self, token: &str) -> Result<Arc<dyn ClusterClient>>;

    /// Client authenticated as the gateway's own ServiceAccount
    async fn service_client(&self) -> Result<Arc<dyn ClusterClient>>;
}

/// `ClusterClient` backed by a kube-rs client
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
}

impl KubeClusterClient {
    /// Wrap an existing kube client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn list_secrets(&self, namespace: &str) -> Result<Vec<Secret>> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn list_serving_workloads(
        &self,
        namespace: &str,
        kind: ServingKind,
    ) -> Result<Vec<ServingWorkload>> {
        let ar = kind.api_resource();
        let api: Api<DynamicObject> = Api::namespaced_with(self.client.clone(), namespace, &ar);
        let list = api.list(&ListParams::default()).await?;

        debug!(
            namespace = %namespace,
            kind = %kind,
            count = list.items.len(),
            "listed serving workloads"
        );

        Ok(list
            .items
            .iter()
            .filter_map(|obj| ServingWorkload::from_object(kind, namespace, obj))
            .collect())
    }

    async fn review_access(&self, attributes: ResourceAttributes) -> Result<bool> {
        let api: Api<SelfSubjectAccessReview> = Api::all(self.client.clone());
        let review = SelfSubjectAccessReview {
            spec: SelfSubjectAccessReviewSpec {
                resource_attributes: Some(attributes),
                ..Default::default()
            },
            ..Default::default()
        };

        let result = api.create(&PostParams::default(), &review).await?;
        let status = result
            .status
            .ok_or_else(|| {
                Error::invalid("SelfSubjectAccessReview", "response", "review returned no status")
            })?;

        debug!(
            allowed = status.allowed,
            reason = ?status.reason,
            "access review completed"
        );

        Ok(status.allowed)
    }
}

/// Factory deriving per-user clients from an inferred base configuration.
///
/// The base config (in-cluster or kubeconfig) is resolved once at startup.
/// Per-user clients keep its cluster URL and TLS roots but replace the
/// credentials with the caller's bearer token.
#[derive(Clone)]
pub struct KubeClientFactory {
    base: Config,
}

impl KubeClientFactory {
    /// Infer the base configuration from the environment
    pub async fn infer() -> Result<Self> {
        let mut config = Config::infer()
            .await
            .map_err(|e| Error::config(format!("failed to infer kube config: {}", e)))?;
        config.connect_timeout = Some(DEFAULT_CONNECT_TIMEOUT);
        config.read_timeout = Some(DEFAULT_READ_TIMEOUT);
        Ok(Self { base: config })
    }

    /// Use an explicit base configuration
    pub fn from_config(config: Config) -> Self {
        Self { base: config }
    }

    /// Base configuration with credentials replaced by a bearer token
    fn config_for_token(&self, token: &str) -> Config {
        let mut config = self.base.clone();
        config.auth_info = AuthInfo {
            token: Some(SecretString::from(token.to_string())),
            ..Default::default()
        };
        config
    }
}

#[async_trait]
impl ClusterClientFactory for KubeClientFactory {
    async fn client_for(&self, token: &str) -> Result<Arc<dyn ClusterClient>> {
        let client = Client::try_from(self.config_for_token(token))?;
        Ok(Arc::new(KubeClusterClient::new(client)))
    }

    async fn service_client(&self) -> Result<Arc<dyn ClusterClient>> {
        let client = Client::try_from(self.base.clone())?;
        Ok(Arc::new(KubeClusterClient::new(client)))
    }
}
