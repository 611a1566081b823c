use crate::domain::handler::TechnicalDomain;
use crate::domain::routing::RoutingStage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    ValidationFailed,
    AuthenticationFailed,
    AuthorizationFailed,
    DiscoveryFailed,
    RequestProcessed,
    RequestFailed,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ValidationFailed => "VALIDATION_FAILED",
            Self::AuthenticationFailed => "AUTHENTICATION_FAILED",
            Self::AuthorizationFailed => "AUTHORIZATION_FAILED",
            Self::DiscoveryFailed => "DISCOVERY_FAILED",
            Self::RequestProcessed => "REQUEST_PROCESSED",
            Self::RequestFailed => "REQUEST_FAILED",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One append-only audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub handler_id: Option<String>,
    pub handler_domain: Option<TechnicalDomain>,
    /// Cascade stage that chose the handler; absent for the timeout fallback.
    #[serde(default)]
    pub routing_stage: Option<RoutingStage>,
    pub action: AuditAction,
    pub success: bool,
    pub error: Option<String>,
}

impl AuditEntry {
    pub fn new(user_id: impl Into<String>, action: AuditAction, success: bool) -> Self {
        Self {
            timestamp: Utc::now(),
            user_id: user_id.into(),
            handler_id: None,
            handler_domain: None,
            routing_stage: None,
            action,
            success,
            error: None,
        }
    }

    #[must_use]
    pub fn with_handler(mut self, id: impl Into<String>, domain: TechnicalDomain) -> Self {
        self.handler_id = Some(id.into());
        self.handler_domain = Some(domain);
        self
    }

    #[must_use]
    pub fn with_routing_stage(mut self, stage: Option<RoutingStage>) -> Self {
        self.routing_stage = stage;
        self
    }

    #[must_use]
    pub fn with_error(mut self, error: Option<&str>) -> Self {
        self.error = error.map(str::to_string);
        self
    }
}
