//! Caller authentication and per-handler authorization.

mod claims;
mod jwt;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

pub use claims::UserClaims;
pub use jwt::JwtSecurityGate;

use crate::config::SecurityConfig;
use crate::domain::{Handler, Request, SecurityContext};

/// User id recorded when a request carries no usable identity.
pub const ANONYMOUS_USER: &str = "anonymous";

/// Role/permission check against a handler's declared requirements.
///
/// Passes when the handler requires no roles or the caller holds at least one
/// of them, and the caller holds every required permission.
pub fn is_authorized(security: &SecurityContext, handler: &dyn Handler) -> bool {
    let required_roles = handler.required_roles();
    let roles_ok = required_roles.is_empty() || !required_roles.is_disjoint(&security.roles);
    let permissions_ok = handler.required_permissions().is_subset(&security.permissions);
    roles_ok && permissions_ok
}

/// Security collaborator consulted before any handler is contacted.
#[async_trait]
pub trait SecurityGate: Send + Sync + fmt::Debug {
    fn extract_user_id(&self, request: &Request) -> String {
        request
            .security()
            .map(|s| s.user_id.trim())
            .filter(|id| !id.is_empty())
            .unwrap_or(ANONYMOUS_USER)
            .to_string()
    }

    async fn authenticate(&self, security: &SecurityContext) -> bool;

    async fn authorize(&self, request: &Request, handler: &dyn Handler) -> bool {
        request
            .security()
            .is_some_and(|security| is_authorized(security, handler))
    }
}

/// Accepts any caller that names itself. For local and trusted deployments.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenSecurityGate;

#[async_trait]
impl SecurityGate for OpenSecurityGate {
    async fn authenticate(&self, security: &SecurityContext) -> bool {
        !security.user_id.trim().is_empty()
    }
}

/// Gate selected by `security.jwt_required`.
pub fn gate_from_config(config: &SecurityConfig) -> Arc<dyn SecurityGate> {
    if config.jwt_required {
        Arc::new(JwtSecurityGate::new(&config.jwt_secret))
    } else {
        Arc::new(OpenSecurityGate)
    }
}
