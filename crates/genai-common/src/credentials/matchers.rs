//! Secret naming heuristics
//!
//! Each matcher encodes one naming convention for a workload's token secret.
//! Discovery evaluates them in order and stops at the first hit, so a new
//! convention is added by appending a matcher.

use k8s_openapi::api::core::v1::Secret;

use crate::SERVICE_ACCOUNT_TOKEN_SECRET_TYPE;

/// ServiceAccount suffixes tried in priority order
pub const SERVICE_ACCOUNT_SUFFIXES: &[&str] = &["vllm-sa", "edit-test-sa", "default-sa"];

/// Suffix used when the secret name has to be predicted
pub const PREDICTED_SUFFIX: &str = "vllm-sa";

/// One naming convention for a workload's token secret
pub trait SecretMatcher: Send + Sync {
    /// Short description for logs
    fn describe(&self) -> String;

    /// Find the secret this convention names, if present
    fn find<'a>(&self, display_name: &str, secrets: &'a [Secret]) -> Option<&'a Secret>;
}

/// Whether a secret holds a ServiceAccount token
pub fn is_service_account_token(secret: &Secret) -> bool {
    secret.type_.as_deref() == Some(SERVICE_ACCOUNT_TOKEN_SECRET_TYPE)
}

fn secret_name(secret: &Secret) -> &str {
    secret.metadata.name.as_deref().unwrap_or_default()
}

/// Matches the token secret named exactly `{display_name}-{suffix}`
#[derive(Clone, Debug)]
pub struct SuffixMatcher {
    suffix: String,
}

impl SuffixMatcher {
    /// Matcher for one ServiceAccount suffix
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }
}

impl SecretMatcher for SuffixMatcher {
    fn describe(&self) -> String {
        format!("suffix '{}'", self.suffix)
    }

    fn find<'a>(&self, display_name: &str, secrets: &'a [Secret]) -> Option<&'a Secret> {
        let expected = format!("{}-{}", display_name, self.suffix);
        secrets
            .iter()
            .find(|s| is_service_account_token(s) && secret_name(s) == expected)
    }
}

/// Matches any token secret whose name starts with `{display_name}-`
#[derive(Clone, Copy, Debug, Default)]
pub struct PrefixMatcher;

impl SecretMatcher for PrefixMatcher {
    fn describe(&self) -> String {
        "display-name prefix".to_string()
    }

    fn find<'a>(&self, display_name: &str, secrets: &'a [Secret]) -> Option<&'a Secret> {
        let prefix = format!("{}-", display_name);
        secrets
            .iter()
            .find(|s| is_service_account_token(s) && secret_name(s).starts_with(&prefix))
    }
}

/// Built-in conventions: each known suffix in priority order, then any
/// prefix match.
pub fn default_matchers() -> Vec<Box<dyn SecretMatcher>> {
    let mut matchers: Vec<Box<dyn SecretMatcher>> = SERVICE_ACCOUNT_SUFFIXES
        .iter()
        .map(|suffix| Box::new(SuffixMatcher::new(*suffix)) as Box<dyn SecretMatcher>)
        .collect();
    matchers.push(Box::new(PrefixMatcher));
    matchers
}

/// Name discovery falls back to when nothing matches
pub fn predicted_secret_name(display_name: &str) -> String {
    format!("{}-{}", display_name, PREDICTED_SUFFIX)
}
