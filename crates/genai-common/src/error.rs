//! Error types shared across the gateway crates
//!
//! Variants carry the resource coordinates involved so failures can be
//! logged and rendered without re-deriving context at the call site.

use thiserror::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for cluster access and configuration
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// A namespaced resource does not exist
    #[error("{kind} {name} not found in namespace {namespace}")]
    NotFound {
        /// Resource kind (e.g. "Service")
        kind: String,
        /// Resource name
        name: String,
        /// Namespace that was searched
        namespace: String,
    },

    /// A resource exists but cannot be used as-is
    #[error("invalid {kind} {name}: {message}")]
    InvalidResource {
        /// Resource kind
        kind: String,
        /// Resource name
        name: String,
        /// Description of what is wrong
        message: String,
    },

    /// Startup configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a not-found error for a namespaced resource
    pub fn not_found(
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    /// Create an invalid-resource error
    pub fn invalid(
        kind: impl Into<String>,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidResource {
            kind: kind.into(),
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this error means the requested object does not exist.
    ///
    /// Covers both our own `NotFound` and a 404 returned by the API server.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Kube {
                source: kube::Error::Api(response),
            } => response.code == 404,
            _ => false,
        }
    }
}
