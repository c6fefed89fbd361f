//! Model-serving workload types
//!
//! KServe serving resources are third-party CRDs, so they are read as
//! `DynamicObject`s through a fixed `ApiResource` and reduced to the few
//! fields credential discovery needs.

use kube::api::DynamicObject;
use kube::discovery::ApiResource;

use crate::DISPLAY_NAME_ANNOTATION;

/// KServe API group shared by both serving kinds
const KSERVE_GROUP: &str = "serving.kserve.io";

/// Kind of KServe serving resource
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServingKind {
    /// `LLMInferenceService` (serving.kserve.io/v1alpha1)
    LlmInferenceService,
    /// `InferenceService` (serving.kserve.io/v1beta1)
    InferenceService,
}

impl ServingKind {
    /// Build the `ApiResource` used to list this kind
    pub fn api_resource(self) -> ApiResource {
        let (version, kind, plural) = match self {
            Self::LlmInferenceService => (
                "v1alpha1",
                "LLMInferenceService",
                "llminferenceservices",
            ),
            Self::InferenceService => ("v1beta1", "InferenceService", "inferenceservices"),
        };
        ApiResource {
            group: KSERVE_GROUP.to_string(),
            version: version.to_string(),
            api_version: format!("{}/{}", KSERVE_GROUP, version),
            kind: kind.to_string(),
            plural: plural.to_string(),
        }
    }
}

impl std::fmt::Display for ServingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LlmInferenceService => write!(f, "LLMInferenceService"),
            Self::InferenceService => write!(f, "InferenceService"),
        }
    }
}

/// A model-serving resource, read-only from the gateway's point of view
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServingWorkload {
    /// Resource kind
    pub kind: ServingKind,
    /// Resource name (the model name)
    pub name: String,
    /// Namespace the resource lives in
    pub namespace: String,
    /// Value of the display-name annotation, if set
    pub display_name: Option<String>,
}

impl ServingWorkload {
    /// Reduce a listed object to a workload.
    ///
    /// Returns None for objects without a name. `namespace` is used when the
    /// object omits its own.
    pub fn from_object(kind: ServingKind, namespace: &str, object: &DynamicObject) -> Option<Self> {
        let name = object.metadata.name.clone()?;
        let display_name = object
            .metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(DISPLAY_NAME_ANNOTATION))
            .cloned();
        Some(Self {
            kind,
            name,
            namespace: object
                .metadata
                .namespace
                .clone()
                .unwrap_or_else(|| namespace.to_string()),
            display_name,
        })
    }

    /// Display name used for secret naming: the annotation when non-empty,
    /// the resource name otherwise.
    pub fn effective_display_name(&self) -> &str {
        match self.display_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.name,
        }
    }
}
