//! Common types for the GenAI gateway: errors, startup configuration,
//! cluster API access, and credential discovery for model-serving workloads.

#![deny(missing_docs)]

pub mod cluster;
pub mod config;
pub mod credentials;
pub mod error;
pub mod serving;

pub use error::{Error, Result};

/// Secret type carrying a ServiceAccount bearer token
pub const SERVICE_ACCOUNT_TOKEN_SECRET_TYPE: &str = "kubernetes.io/service-account-token";

/// Annotation holding a human-readable display name
pub const DISPLAY_NAME_ANNOTATION: &str = "openshift.io/display-name";

/// Annotation linking a token secret to its ServiceAccount
pub const SERVICE_ACCOUNT_NAME_ANNOTATION: &str = "kubernetes.io/service-account.name";

/// Data key holding the bearer token inside a token secret
pub const TOKEN_DATA_KEY: &str = "token";
