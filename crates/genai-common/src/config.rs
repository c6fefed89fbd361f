//! Startup configuration
//!
//! Configuration is assembled once in `main` and passed to constructors.
//! Environment access goes through the `EnvSource` trait so assembly can be
//! tested without touching process state.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::Error;

/// Environment variable selecting the LlamaStack distribution
pub const DISTRIBUTION_ENV: &str = "LLAMASTACK_DISTRIBUTION_NAME";
/// Environment variable naming the namespace the gateway is deployed to
pub const NAMESPACE_ENV: &str = "NAMESPACE";
/// Environment variable naming the cluster's application domain
pub const CLUSTER_DOMAIN_ENV: &str = "CLUSTER_DOMAIN";

/// Distribution name used when none is configured
pub const DEFAULT_DISTRIBUTION_NAME: &str = "rh";
/// Namespace used when none is configured
pub const DEFAULT_NAMESPACE: &str = "default";

/// Per-attempt timeout for metadata probes
pub const DEFAULT_METADATA_TIMEOUT: Duration = Duration::from_secs(10);
/// Deadline for a forwarded request
pub const DEFAULT_FORWARD_TIMEOUT: Duration = Duration::from_secs(30);

/// Trait for reading environment variables
#[cfg_attr(any(test, feature = "test-util"), mockall::automock)]
pub trait EnvSource: Send + Sync {
    /// Value of the variable, or None if unset
    fn var(&self, key: &str) -> Option<String>;
}

/// `EnvSource` reading the process environment
#[derive(Clone, Copy, Debug, Default)]
pub struct OsEnv;

impl EnvSource for OsEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// LlamaStack distribution selection
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DistributionType {
    /// A named distribution shipped with the operator
    Name(String),
    /// A container image reference
    Image(String),
}

impl DistributionType {
    /// Interpret a configured value.
    ///
    /// Unset or empty selects the default name; anything containing a `/`
    /// is treated as an image reference.
    pub fn from_value(value: Option<&str>) -> Self {
        match value {
            None | Some("") => Self::Name(DEFAULT_DISTRIBUTION_NAME.to_string()),
            Some(v) if v.contains('/') => Self::Image(v.to_string()),
            Some(v) => Self::Name(v.to_string()),
        }
    }
}

impl Default for DistributionType {
    fn default() -> Self {
        Self::Name(DEFAULT_DISTRIBUTION_NAME.to_string())
    }
}

/// Where the gateway runs, read from the environment
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeploymentInfo {
    /// Distribution selection
    pub distribution: DistributionType,
    /// Namespace the gateway is deployed to
    pub namespace: String,
    /// Cluster application domain, if known
    pub cluster_domain: Option<String>,
}

impl DeploymentInfo {
    /// Read deployment information from an environment source
    pub fn from_env(env: &dyn EnvSource) -> Self {
        let non_empty = |key: &str| env.var(key).filter(|v| !v.is_empty());
        Self {
            distribution: DistributionType::from_value(env.var(DISTRIBUTION_ENV).as_deref()),
            namespace: non_empty(NAMESPACE_ENV).unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
            cluster_domain: non_empty(CLUSTER_DOMAIN_ENV),
        }
    }
}

/// How the gateway decides whether a caller may reach a service
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AccessPolicy {
    /// Placeholder that grants every request
    #[default]
    AlwaysAllow,
    /// Ask the API server via SelfSubjectAccessReview
    SubjectAccessReview,
}

impl FromStr for AccessPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "always-allow" => Ok(Self::AlwaysAllow),
            "subject-access-review" => Ok(Self::SubjectAccessReview),
            other => Err(Error::config(format!(
                "unknown access policy '{}' (expected always-allow or subject-access-review)",
                other
            ))),
        }
    }
}

impl std::fmt::Display for AccessPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlwaysAllow => write!(f, "always-allow"),
            Self::SubjectAccessReview => write!(f, "subject-access-review"),
        }
    }
}

/// What credential discovery does when no secret matches a workload
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SecretFallbackPolicy {
    /// Return the conventional `{display}-vllm-sa` name without checking it exists
    #[default]
    Predict,
    /// Fail discovery instead of guessing
    Require,
}

impl FromStr for SecretFallbackPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "predict" => Ok(Self::Predict),
            "require" => Ok(Self::Require),
            other => Err(Error::config(format!(
                "unknown secret fallback policy '{}' (expected predict or require)",
                other
            ))),
        }
    }
}

impl std::fmt::Display for SecretFallbackPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Predict => write!(f, "predict"),
            Self::Require => write!(f, "require"),
        }
    }
}

/// TLS material for the listener
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TlsConfig {
    /// PEM certificate chain
    pub cert_path: PathBuf,
    /// PEM private key
    pub key_path: PathBuf,
}

/// Complete gateway configuration
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    /// Address to bind the server
    pub listen_addr: SocketAddr,
    /// TLS material; plain HTTP when None
    pub tls: Option<TlsConfig>,
    /// Authorization policy
    pub access_policy: AccessPolicy,
    /// Per-attempt metadata probe timeout
    pub metadata_timeout: Duration,
    /// Forwarding deadline
    pub forward_timeout: Duration,
    /// Deployment information
    pub deployment: DeploymentInfo,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            tls: None,
            access_policy: AccessPolicy::default(),
            metadata_timeout: DEFAULT_METADATA_TIMEOUT,
            forward_timeout: DEFAULT_FORWARD_TIMEOUT,
            deployment: DeploymentInfo::default(),
        }
    }
}

impl GatewayConfig {
    /// Pair certificate and key paths into a TLS config.
    ///
    /// Both or neither must be given.
    pub fn tls_from_paths(
        cert_path: Option<PathBuf>,
        key_path: Option<PathBuf>,
    ) -> Result<Option<TlsConfig>, Error> {
        match (cert_path, key_path) {
            (Some(cert_path), Some(key_path)) => Ok(Some(TlsConfig {
                cert_path,
                key_path,
            })),
            (None, None) => Ok(None),
            _ => Err(Error::config(
                "TLS requires both a certificate and a private key",
            )),
        }
    }
}
