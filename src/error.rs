//! Failure kinds of one orchestration lifecycle.
//!
//! None of these escape [`OrchestrationManager::process_request`](crate::runtime::OrchestrationManager::process_request):
//! each is converted into a failed [`Response`](crate::domain::Response) whose
//! error text is the `Display` of the variant.

use std::time::Duration;

use crate::domain::AuditAction;

#[derive(Debug, thiserror::Error)]
pub enum OrchestrationError {
    /// The request cannot be processed as submitted, e.g. it carries no
    /// security context.
    #[error("{0}")]
    Validation(String),

    #[error("Authentication failed: Invalid security credentials")]
    Authentication,

    #[error("Authorization failed: Insufficient permissions for {handler}")]
    Authorization { handler: String },

    /// Discovery did not finish in time; the fallback handler takes over.
    #[error("Handler discovery timed out after {0:?}")]
    DiscoveryTimeout(Duration),

    /// No healthy handler could be selected.
    #[error("No suitable handler found for request")]
    NoHandler,

    /// The discovery task itself failed.
    #[error("Handler registry unavailable: {0}")]
    RegistryUnavailable(String),

    /// The selected handler returned an error or panicked.
    #[error("Handler {handler} failed: {message}")]
    HandlerProcessing { handler: String, message: String },
}

impl OrchestrationError {
    /// Audit action recorded for a response failed with this error.
    pub fn audit_action(&self) -> AuditAction {
        match self {
            Self::Validation(_) => AuditAction::ValidationFailed,
            Self::Authentication => AuditAction::AuthenticationFailed,
            Self::Authorization { .. } => AuditAction::AuthorizationFailed,
            Self::DiscoveryTimeout(_) | Self::NoHandler | Self::RegistryUnavailable(_) => {
                AuditAction::DiscoveryFailed
            }
            Self::HandlerProcessing { .. } => AuditAction::RequestFailed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            OrchestrationError::Authentication.to_string(),
            "Authentication failed: Invalid security credentials"
        );
        assert_eq!(
            OrchestrationError::Authorization {
                handler: "configuration-management-specialist".into()
            }
            .to_string(),
            "Authorization failed: Insufficient permissions for configuration-management-specialist"
        );
    }

    #[test]
    fn test_audit_actions() {
        assert_eq!(OrchestrationError::NoHandler.audit_action(), AuditAction::DiscoveryFailed);
        assert_eq!(
            OrchestrationError::HandlerProcessing {
                handler: "h".into(),
                message: "boom".into()
            }
            .audit_action(),
            AuditAction::RequestFailed
        );
    }
}
