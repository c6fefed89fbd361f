//! Authentication and authorization
//!
//! Identity is established by middleware and carried as a request
//! extension; authorization is a pluggable `AccessDecision`.

mod decision;
mod identity;

#[cfg(test)]
pub use decision::MockAccessDecision;
pub use decision::{
    service_access_attributes, AccessDecision, AlwaysAllow, SubjectAccessReviewDecision,
};
pub use identity::{
    attach_identity, extract_bearer_token, RequestIdentity, GROUPS_HEADER, USER_ID_HEADER,
};
