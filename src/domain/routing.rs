use serde::{Deserialize, Serialize};
use std::fmt;

/// Stage of the routing cascade that produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingStage {
    PrimaryMapping,
    ContextBasedSelection,
    FallbackSelection,
    LastResort,
    ServiceSpecific,
    SupportingHandler,
    DomainSpecific,
    DomainSuggestion,
    Failed,
}

impl RoutingStage {
    /// Human-readable reason reported in [`RoutingResult::reason`].
    pub fn reason(self) -> &'static str {
        match self {
            Self::PrimaryMapping => "primary mapping",
            Self::ContextBasedSelection => "context-based selection",
            Self::FallbackSelection => "fallback selection",
            Self::LastResort => "last resort selection",
            Self::ServiceSpecific => "service-specific routing",
            Self::SupportingHandler => "supporting handler selection",
            Self::DomainSpecific => "domain-specific selection",
            Self::DomainSuggestion => "domain suggestion",
            Self::Failed => "no handler available",
        }
    }
}

impl fmt::Display for RoutingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

/// One routing decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingResult {
    pub selected_handler: Option<String>,
    pub target_service: Option<String>,
    pub success: bool,
    pub reason: String,
    pub error: Option<String>,
    pub stage: RoutingStage,
}

impl RoutingResult {
    pub const NO_HANDLERS: &'static str = "No agents available for request";

    pub fn selected(
        handler_id: impl Into<String>,
        target_service: Option<String>,
        stage: RoutingStage,
    ) -> Self {
        Self {
            selected_handler: Some(handler_id.into()),
            target_service,
            success: true,
            reason: stage.reason().to_string(),
            error: None,
            stage,
        }
    }

    /// Failed decision; the target falls back to `"unknown"` when nothing was detected.
    pub fn failed(target_service: Option<String>) -> Self {
        Self {
            selected_handler: None,
            target_service: Some(target_service.unwrap_or_else(|| "unknown".to_string())),
            success: false,
            reason: RoutingStage::Failed.reason().to_string(),
            error: Some(Self::NO_HANDLERS.to_string()),
            stage: RoutingStage::Failed,
        }
    }
}
