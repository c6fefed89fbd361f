//! Request identity propagation
//!
//! The middleware reads the caller's bearer token (plus optional
//! user/group headers set by an authenticating front proxy) and stores a
//! `RequestIdentity` in the request extensions. Requests without a token
//! carry no identity; the gateway rejects them.

use axum::body::Body;
use axum::extract::Request;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;
use zeroize::Zeroizing;

/// Header carrying the authenticated user name
pub const USER_ID_HEADER: &str = "kubeflow-userid";
/// Header carrying the authenticated user's groups, comma-separated
pub const GROUPS_HEADER: &str = "kubeflow-groups";

/// Authenticated caller, read-only for the life of the request
#[derive(Clone)]
pub struct RequestIdentity {
    /// Bearer token (zeroized on drop)
    pub token: Zeroizing<String>,
    /// User name, if known
    pub subject: Option<String>,
    /// Group memberships, if known
    pub groups: Vec<String>,
}

impl RequestIdentity {
    /// Identity carrying only a token
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Zeroizing::new(token.into()),
            subject: None,
            groups: Vec::new(),
        }
    }

    /// Build an identity from request headers, if a bearer token is present
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let token = extract_bearer_token(headers)?;
        if token.is_empty() {
            return None;
        }

        let subject = headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        let groups = headers
            .get(GROUPS_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|g| !g.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            token: Zeroizing::new(token.to_string()),
            subject,
            groups,
        })
    }
}

impl std::fmt::Debug for RequestIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestIdentity")
            .field("token", &"<redacted>")
            .field("subject", &self.subject)
            .field("groups", &self.groups)
            .finish()
    }
}

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Middleware attaching a `RequestIdentity` extension when one can be built
pub async fn attach_identity(mut request: Request<Body>, next: Next) -> Response {
    match RequestIdentity::from_headers(request.headers()) {
        Some(identity) => {
            debug!(subject = ?identity.subject, "request identity attached");
            request.extensions_mut().insert(identity);
        }
        None => debug!("request carries no bearer token"),
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", "Bearer abc123".parse().unwrap());
        assert_eq!(extract_bearer_token(&headers), Some("abc123"));
    }

    #[test]
    fn test_extract_bearer_token_missing() {
        let headers = HeaderMap::new();
        assert_eq!(extract_bearer_token(&headers), None);
    }

    #[test]
    fn test_extract_bearer_token_wrong_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", "Basic abc123".parse().unwrap());
        assert_eq!(extract_bearer_token(&headers), None);
    }

    #[test]
    fn test_identity_from_headers_with_attributes() {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", "Bearer abc123".parse().unwrap());
        headers.insert(USER_ID_HEADER, "alice@example.com".parse().unwrap());
        headers.insert(GROUPS_HEADER, "admins, ml-team,".parse().unwrap());

        let identity = RequestIdentity::from_headers(&headers).unwrap();
        assert_eq!(identity.token.as_str(), "abc123");
        assert_eq!(identity.subject.as_deref(), Some("alice@example.com"));
        assert_eq!(identity.groups, vec!["admins", "ml-team"]);
    }

    #[test]
    fn test_identity_requires_token() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, "alice@example.com".parse().unwrap());
        assert!(RequestIdentity::from_headers(&headers).is_none());

        headers.insert("Authorization", "Bearer ".parse().unwrap());
        assert!(RequestIdentity::from_headers(&headers).is_none());
    }

    #[test]
    fn test_identity_debug_redacts_token() {
        let identity = RequestIdentity::new("very-secret");
        assert!(!format!("{:?}", identity).contains("very-secret"));
    }
}
