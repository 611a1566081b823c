use crate::domain::request::Request;
use crate::domain::response::Response;
use crate::session::SpecializedContext;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Area of expertise a handler declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TechnicalDomain {
    Architecture,
    Implementation,
    Deployment,
    Testing,
    Security,
    Observability,
    Documentation,
    BusinessDomain,
    IntegrationGateway,
    PairProgrammingNavigator,
    EventDrivenArchitecture,
    CicdPipeline,
    ConfigurationManagement,
    ResilienceEngineering,
}

impl TechnicalDomain {
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Architecture => "Architecture",
            Self::Implementation => "Implementation",
            Self::Deployment => "Deployment",
            Self::Testing => "Testing",
            Self::Security => "Security",
            Self::Observability => "Observability",
            Self::Documentation => "Documentation",
            Self::BusinessDomain => "Business Domain",
            Self::IntegrationGateway => "Integration Gateway",
            Self::PairProgrammingNavigator => "Pair Programming Navigator",
            Self::EventDrivenArchitecture => "Event-Driven Architecture",
            Self::CicdPipeline => "CI/CD Pipeline",
            Self::ConfigurationManagement => "Configuration Management",
            Self::ResilienceEngineering => "Resilience Engineering",
        }
    }
}

impl fmt::Display for TechnicalDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Operational state reported by a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HandlerStatus {
    Operational,
    Degraded,
    Unavailable,
}

/// Point-in-time view of a handler's declared metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerDescriptor {
    pub id: String,
    pub capabilities: BTreeSet<String>,
    pub domain: TechnicalDomain,
    pub healthy: bool,
    pub required_roles: BTreeSet<String>,
    pub required_permissions: BTreeSet<String>,
}

/// A specialized unit that answers consultation requests for one domain.
///
/// Implementations are shared behind `Arc<dyn Handler>` and may be invoked
/// concurrently from many in-flight requests.
#[async_trait]
pub trait Handler: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;

    /// Capability tags this handler answers for.
    fn capabilities(&self) -> &BTreeSet<String>;

    fn domain(&self) -> TechnicalDomain;

    fn status(&self) -> HandlerStatus {
        HandlerStatus::Operational
    }

    fn is_healthy(&self) -> bool {
        self.status() == HandlerStatus::Operational
    }

    fn required_roles(&self) -> &BTreeSet<String>;

    fn required_permissions(&self) -> &BTreeSet<String>;

    /// Process a request. Errors are turned into FAILURE responses by the
    /// caller, never propagated to the client.
    async fn process_request(&self, request: &Request) -> anyhow::Result<Response>;

    /// Per-session specialized state this handler maintains, if any.
    fn get_or_create_context(&self, _session_id: &str) -> Option<SpecializedContext> {
        None
    }

    /// Fold the guidance this handler just produced back into its session state.
    fn update_context(&self, _session_id: &str, _guidance: &str) {}

    /// Release any per-session state held by this handler.
    fn remove_context(&self, _session_id: &str) {}

    /// True when this handler answers for `tag`, either by id or capability.
    fn serves(&self, tag: &str) -> bool {
        self.id() == tag || self.capabilities().contains(tag)
    }

    fn descriptor(&self) -> HandlerDescriptor {
        HandlerDescriptor {
            id: self.id().to_string(),
            capabilities: self.capabilities().clone(),
            domain: self.domain(),
            healthy: self.is_healthy(),
            required_roles: self.required_roles().clone(),
            required_permissions: self.required_permissions().clone(),
        }
    }
}
