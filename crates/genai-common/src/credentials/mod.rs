//! Credential discovery for model-serving workloads
//!
//! Locates the access token backing a named model:
//!
//! 1. Find the `LLMInferenceService` whose name equals the model name
//! 2. Derive a display name (annotation, else resource name)
//! 3. Walk the secret matchers in priority order against the namespace's
//!    secrets, first match wins
//! 4. If nothing matches, predict `{display}-vllm-sa` (or fail, depending on
//!    `SecretFallbackPolicy`)
//! 5. Read the secret's `token` data and display-name annotation
//!
//! Cluster API failures inside the pipeline degrade to defaults rather than
//! surfacing as errors, so callers never block on discovery. Nothing is
//! cached; every call reads fresh from the cluster.

mod matchers;

use std::sync::Arc;

use k8s_openapi::api::core::v1::Secret;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::cluster::ClusterClient;
use crate::config::SecretFallbackPolicy;
use crate::error::Error;
use crate::serving::{ServingKind, ServingWorkload};
use crate::{DISPLAY_NAME_ANNOTATION, SERVICE_ACCOUNT_NAME_ANNOTATION, TOKEN_DATA_KEY};

pub use matchers::{
    default_matchers, is_service_account_token, predicted_secret_name, PrefixMatcher,
    SecretMatcher, SuffixMatcher, PREDICTED_SUFFIX, SERVICE_ACCOUNT_SUFFIXES,
};

/// Secret name returned when no workload can be identified
pub const DEFAULT_SECRET_NAME: &str = "default-name-vllm-sa";

/// Errors from credential discovery
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// No serving workload carries the model name
    #[error("{kind} with model name '{model}' not found in namespace {namespace}")]
    WorkloadNotFound {
        /// Kind that was searched
        kind: ServingKind,
        /// Requested model name
        model: String,
        /// Namespace that was searched
        namespace: String,
    },

    /// No secret matched and the fallback policy forbids predicting one
    #[error("no token secret found for '{display_name}' in namespace {namespace}")]
    SecretNotFound {
        /// Display name the matchers were run against
        display_name: String,
        /// Namespace that was searched
        namespace: String,
    },

    /// Cluster API failure
    #[error(transparent)]
    Cluster(#[from] Error),
}

/// Token and display name read from a token secret.
///
/// An empty token is a valid outcome meaning "no credential available".
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credential {
    /// Secret the values were read from
    pub secret_name: String,
    /// Bearer token (zeroized on drop)
    pub token: Zeroizing<String>,
    /// Value of the secret's display-name annotation
    pub display_name: String,
}

impl Credential {
    /// Empty credential for a secret that could not be read
    pub fn empty(secret_name: impl Into<String>) -> Self {
        Self {
            secret_name: secret_name.into(),
            ..Default::default()
        }
    }

    /// Read token and display name from a secret
    pub fn from_secret(secret: &Secret) -> Self {
        let token = secret
            .data
            .as_ref()
            .and_then(|d| d.get(TOKEN_DATA_KEY))
            .map(|bytes| String::from_utf8_lossy(&bytes.0).into_owned())
            .unwrap_or_default();
        let display_name = secret
            .metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(DISPLAY_NAME_ANNOTATION))
            .cloned()
            .unwrap_or_default();

        Self {
            secret_name: secret.metadata.name.clone().unwrap_or_default(),
            token: Zeroizing::new(token),
            display_name,
        }
    }

    /// Whether a token was found
    pub fn has_token(&self) -> bool {
        !self.token.is_empty()
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("secret_name", &self.secret_name)
            .field("token", &if self.has_token() { "<redacted>" } else { "" })
            .field("display_name", &self.display_name)
            .finish()
    }
}

/// Locates the token secret behind a model-serving workload
pub struct CredentialDiscovery {
    client: Arc<dyn ClusterClient>,
    matchers: Vec<Box<dyn SecretMatcher>>,
    fallback: SecretFallbackPolicy,
}

impl CredentialDiscovery {
    /// Discovery with the built-in naming conventions
    pub fn new(client: Arc<dyn ClusterClient>, fallback: SecretFallbackPolicy) -> Self {
        Self {
            client,
            matchers: default_matchers(),
            fallback,
        }
    }

    /// Append a naming convention, evaluated after the existing ones
    pub fn with_matcher(mut self, matcher: Box<dyn SecretMatcher>) -> Self {
        self.matchers.push(matcher);
        self
    }

    /// Find the `LLMInferenceService` named `model`
    pub async fn find_workload(
        &self,
        namespace: &str,
        model: &str,
    ) -> Result<ServingWorkload, DiscoveryError> {
        self.find_workload_of_kind(namespace, model, ServingKind::LlmInferenceService)
            .await
    }

    async fn find_workload_of_kind(
        &self,
        namespace: &str,
        model: &str,
        kind: ServingKind,
    ) -> Result<ServingWorkload, DiscoveryError> {
        let workloads = self
            .client
            .list_serving_workloads(namespace, kind)
            .await
            .inspect_err(|e| {
                warn!(
                    error = %e,
                    namespace = %namespace,
                    kind = %kind,
                    "failed to list serving workloads"
                )
            })?;

        let workload = workloads
            .into_iter()
            .find(|w| w.name == model)
            .ok_or_else(|| DiscoveryError::WorkloadNotFound {
                kind,
                model: model.to_string(),
                namespace: namespace.to_string(),
            })?;

        info!(
            model = %model,
            kind = %kind,
            namespace = %namespace,
            "found serving workload by model name"
        );
        Ok(workload)
    }

    /// Run the matchers in order against `secrets`, returning the first hit
    pub fn match_secret(&self, display_name: &str, secrets: &[Secret]) -> Option<String> {
        self.matchers.iter().find_map(|matcher| {
            let secret = matcher.find(display_name, secrets)?;
            debug!(
                display_name = %display_name,
                matcher = %matcher.describe(),
                secret = ?secret.metadata.name,
                "matched workload secret"
            );
            secret.metadata.name.clone()
        })
    }

    /// Resolve the token secret name for a workload
    pub async fn find_secret_for_workload(
        &self,
        workload: &ServingWorkload,
    ) -> Result<String, DiscoveryError> {
        let display_name = workload.effective_display_name();
        let namespace = workload.namespace.as_str();

        let secrets = match self.client.list_secrets(namespace).await {
            Ok(secrets) => secrets,
            Err(e) => {
                warn!(error = %e, namespace = %namespace, "failed to list secrets");
                return self.fallback_secret_name(display_name, namespace);
            }
        };

        if let Some(name) = self.match_secret(display_name, &secrets) {
            return Ok(name);
        }

        debug!(
            workload = %workload.name,
            display_name = %display_name,
            "no workload secret found, using default pattern"
        );
        self.fallback_secret_name(display_name, namespace)
    }

    fn fallback_secret_name(
        &self,
        display_name: &str,
        namespace: &str,
    ) -> Result<String, DiscoveryError> {
        match self.fallback {
            SecretFallbackPolicy::Predict => Ok(predicted_secret_name(display_name)),
            SecretFallbackPolicy::Require => Err(DiscoveryError::SecretNotFound {
                display_name: display_name.to_string(),
                namespace: namespace.to_string(),
            }),
        }
    }

    /// Read token and display name from a named secret.
    ///
    /// A missing or unreadable secret yields an empty credential.
    pub async fn extract_credential(&self, namespace: &str, secret_name: &str) -> Credential {
        if secret_name.is_empty() {
            return Credential::default();
        }

        match self.client.get_secret(namespace, secret_name).await {
            Ok(Some(secret)) => Credential::from_secret(&secret),
            Ok(None) => {
                debug!(secret = %secret_name, namespace = %namespace, "secret does not exist");
                Credential::empty(secret_name)
            }
            Err(e) => {
                warn!(
                    error = %e,
                    secret = %secret_name,
                    namespace = %namespace,
                    "failed to get secret"
                );
                Credential::empty(secret_name)
            }
        }
    }

    /// Find the token secret annotated with a ServiceAccount name.
    ///
    /// Falls back to `{service_account}-token` when none is found.
    pub async fn find_secret_for_service_account(
        &self,
        namespace: &str,
        service_account: &str,
    ) -> String {
        let fallback = format!("{}-token", service_account);

        let secrets = match self.client.list_secrets(namespace).await {
            Ok(secrets) => secrets,
            Err(e) => {
                warn!(error = %e, namespace = %namespace, "failed to list secrets");
                return fallback;
            }
        };

        let found = secrets.iter().find(|s| {
            is_service_account_token(s)
                && s.metadata
                    .annotations
                    .as_ref()
                    .and_then(|a| a.get(SERVICE_ACCOUNT_NAME_ANNOTATION))
                    .is_some_and(|sa| sa == service_account)
        });

        match found.and_then(|s| s.metadata.name.clone()) {
            Some(name) => {
                debug!(
                    service_account = %service_account,
                    secret = %name,
                    "found service account token secret"
                );
                name
            }
            None => {
                debug!(
                    service_account = %service_account,
                    "no service account token secret found, using pattern"
                );
                fallback
            }
        }
    }

    /// Resolve the token secret name for a model.
    ///
    /// An empty or unknown model yields `DEFAULT_SECRET_NAME` under the
    /// predict policy.
    pub async fn find_secret_name_for_model(
        &self,
        namespace: &str,
        model: &str,
    ) -> Result<String, DiscoveryError> {
        if model.is_empty() {
            debug!("no model provided, using default secret name");
            return self.default_for_unknown_model(None);
        }

        let workload = match self.find_workload(namespace, model).await {
            Ok(workload) => workload,
            Err(e) => {
                warn!(
                    model = %model,
                    error = %e,
                    "failed to find serving workload for model, using default secret name"
                );
                return self.default_for_unknown_model(Some(e));
            }
        };

        let secret_name = self.find_secret_for_workload(&workload).await?;
        debug!(model = %model, secret = %secret_name, "found secret name for model");
        Ok(secret_name)
    }

    fn default_for_unknown_model(
        &self,
        cause: Option<DiscoveryError>,
    ) -> Result<String, DiscoveryError> {
        match (self.fallback, cause) {
            (SecretFallbackPolicy::Require, Some(e)) => Err(e),
            _ => Ok(DEFAULT_SECRET_NAME.to_string()),
        }
    }

    /// Pick the first model backed by an LLM serving workload.
    ///
    /// `LLMInferenceService`s take precedence over `InferenceService`s; if
    /// neither matches, the first model is returned. An empty list yields an
    /// empty string.
    pub async fn find_first_llm_model(&self, namespace: &str, models: &[String]) -> String {
        let Some(first) = models.first() else {
            return String::new();
        };

        for kind in [ServingKind::LlmInferenceService, ServingKind::InferenceService] {
            let workloads = match self.client.list_serving_workloads(namespace, kind).await {
                Ok(workloads) => workloads,
                Err(e) => {
                    warn!(
                        error = %e,
                        namespace = %namespace,
                        kind = %kind,
                        "failed to list serving workloads"
                    );
                    continue;
                }
            };

            if let Some(model) = models
                .iter()
                .find(|m| workloads.iter().any(|w| &w.name == *m))
            {
                debug!(model = %model, kind = %kind, "found LLM model");
                return model.clone();
            }
        }

        debug!(first_model = %first, "no LLM models found, using first model as fallback");
        first.clone()
    }

    /// Discover and read the credential for a model in one call
    pub async fn credential_for_model(
        &self,
        namespace: &str,
        model: &str,
    ) -> Result<Credential, DiscoveryError> {
        let secret_name = self.find_secret_name_for_model(namespace, model).await?;
        Ok(self.extract_credential(namespace, &secret_name).await)
    }
}
