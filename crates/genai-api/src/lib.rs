//! GenAI MCP Gateway
//!
//! Lets an authenticated caller reach an MCP service inside the cluster by
//! namespace and service name, without knowing the service's address.
//!
//! # Architecture
//!
//! ```text
//! caller ──► identity ──► AccessDecision ──► ServiceEndpointResolver ──┬─► MetadataFetcher (GET)
//!            (bearer)     (pluggable)        (cluster Service)         └─► ForwardingProxy (POST/PUT)
//! ```
//!
//! # Endpoints
//!
//! - `* /api/v1/mcp/{namespace}/{service}` - MCP metadata and forwarding
//! - `GET /healthz` - Health check

#![deny(missing_docs)]

pub mod auth;
pub mod error;
pub mod forwarder;
pub mod gateway;
pub mod metadata;
pub mod resolver;
pub mod server;

pub use auth::{AccessDecision, AlwaysAllow, RequestIdentity, SubjectAccessReviewDecision};
pub use error::{Error, Result};
pub use forwarder::ForwardingProxy;
pub use gateway::RequestGateway;
pub use metadata::{MetadataDocument, MetadataFetcher};
pub use resolver::{KubeServiceResolver, ServiceEndpoint, ServiceEndpointResolver};
pub use server::{router, start_server, AppState, ServerConfig};
