//! Access decisions
//!
//! `AccessDecision` answers one question: may this identity act on a named
//! resource in a namespace. The gateway depends only on the trait, so a
//! policy implementation can be swapped without touching request handling.

use std::sync::Arc;

use async_trait::async_trait;
use genai_common::cluster::ClusterClient;
use k8s_openapi::api::authorization::v1::ResourceAttributes;
use tracing::{debug, info};

use crate::auth::RequestIdentity;
use crate::error::{Error, Result};

/// Pluggable authorization check
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccessDecision: Send + Sync {
    /// Whether `identity` may access `resource` in `namespace`.
    ///
    /// `client` talks to the API server as `identity`; it is the same client
    /// the gateway later uses for resolution.
    async fn decide(
        &self,
        client: Arc<dyn ClusterClient>,
        identity: &RequestIdentity,
        namespace: &str,
        resource: &str,
    ) -> Result<bool>;
}

/// Placeholder policy that grants every request.
///
/// No real authorization is performed. Select `SubjectAccessReviewDecision`
/// for enforcement.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysAllow;

#[async_trait]
impl AccessDecision for AlwaysAllow {
    async fn decide(
        &self,
        _client: Arc<dyn ClusterClient>,
        _identity: &RequestIdentity,
        namespace: &str,
        resource: &str,
    ) -> Result<bool> {
        debug!(
            namespace = %namespace,
            resource = %resource,
            "placeholder access decision granted request"
        );
        Ok(true)
    }
}

/// Access attributes for reading a Service
pub fn service_access_attributes(namespace: &str, name: &str) -> ResourceAttributes {
    ResourceAttributes {
        namespace: Some(namespace.to_string()),
        verb: Some("get".to_string()),
        group: Some(String::new()),
        version: Some("v1".to_string()),
        resource: Some("services".to_string()),
        name: Some(name.to_string()),
        ..Default::default()
    }
}

/// Asks the API server, as the caller, whether it may `get` the Service
#[derive(Clone, Copy, Debug, Default)]
pub struct SubjectAccessReviewDecision;

#[async_trait]
impl AccessDecision for SubjectAccessReviewDecision {
    async fn decide(
        &self,
        client: Arc<dyn ClusterClient>,
        identity: &RequestIdentity,
        namespace: &str,
        resource: &str,
    ) -> Result<bool> {
        let allowed = client
            .review_access(service_access_attributes(namespace, resource))
            .await
            .map_err(|e| Error::Internal(format!("access review failed: {}", e)))?;

        info!(
            allowed = allowed,
            namespace = %namespace,
            service = %resource,
            subject = ?identity.subject,
            "SAR result"
        );
        Ok(allowed)
    }
}
