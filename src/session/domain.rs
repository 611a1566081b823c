//! Specialized per-session domain contexts.
//!
//! Each context kind groups facts into a fixed set of categories. A fact is a
//! key with an optional detail value (for example a schema name and its
//! version). Adding a key that is already present is a no-op.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::TechnicalDomain;

/// The four specialized context kinds a session can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContextKind {
    EventDriven,
    Pipeline,
    Configuration,
    Resilience,
}

impl ContextKind {
    pub const ALL: [Self; 4] = [
        Self::EventDriven,
        Self::Pipeline,
        Self::Configuration,
        Self::Resilience,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::EventDriven => "event-driven",
            Self::Pipeline => "cicd",
            Self::Configuration => "configuration",
            Self::Resilience => "resilience",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::EventDriven => "Event-Driven Architecture Context",
            Self::Pipeline => "CI/CD Pipeline Context",
            Self::Configuration => "Configuration Management Context",
            Self::Resilience => "Resilience Engineering Context",
        }
    }

    /// Context kinds relevant to a handler domain. Architecture sees all of them.
    pub fn for_domain(domain: TechnicalDomain) -> &'static [Self] {
        match domain {
            TechnicalDomain::EventDrivenArchitecture => &[Self::EventDriven],
            TechnicalDomain::CicdPipeline => &[Self::Pipeline],
            TechnicalDomain::ConfigurationManagement => &[Self::Configuration],
            TechnicalDomain::ResilienceEngineering => &[Self::Resilience],
            TechnicalDomain::Architecture => &Self::ALL,
            _ => &[],
        }
    }
}

impl fmt::Display for ContextKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fact category of one specialized context kind.
pub trait FactCategory:
    Copy + Ord + fmt::Debug + Serialize + Send + Sync + 'static
{
    const KIND: ContextKind;

    fn label(self) -> &'static str;

    #[doc(hidden)]
    fn slot(contexts: &mut DomainContexts) -> &mut Option<DomainContext<Self>>;

    #[doc(hidden)]
    fn slot_ref(contexts: &DomainContexts) -> Option<&DomainContext<Self>>;

    fn wrap(context: DomainContext<Self>) -> SpecializedContext;
}

macro_rules! fact_category {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:ident, $field:ident, $variant:ident {
            $($fact:ident => $label:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($fact),+
        }

        impl FactCategory for $name {
            const KIND: ContextKind = ContextKind::$kind;

            fn label(self) -> &'static str {
                match self {
                    $(Self::$fact => $label),+
                }
            }

            fn slot(contexts: &mut DomainContexts) -> &mut Option<DomainContext<Self>> {
                &mut contexts.$field
            }

            fn slot_ref(contexts: &DomainContexts) -> Option<&DomainContext<Self>> {
                contexts.$field.as_ref()
            }

            fn wrap(context: DomainContext<Self>) -> SpecializedContext {
                SpecializedContext::$variant(context)
            }
        }
    };
}

fact_category!(
    /// Facts gathered while designing event-driven flows.
    EventFact, EventDriven, event_driven, EventDriven {
        MessageBroker => "Message Brokers",
        EventHandler => "Event Handlers",
        EventSchema => "Event Schemas",
        DeadLetterQueue => "Dead Letter Queues",
        EventStore => "Event Stores",
        Saga => "Sagas",
    }
);

fact_category!(
    PipelineFact, Pipeline, pipeline, Pipeline {
        BuildTool => "Build Tools",
        DeploymentStrategy => "Deployment Strategies",
        SecurityScanner => "Security Scanners",
        OrchestrationTool => "Orchestration Tools",
        Environment => "Environments",
    }
);

fact_category!(
    ConfigurationFact, Configuration, configuration, Configuration {
        ConfigSource => "Config Sources",
        FeatureFlag => "Feature Flags",
        RolloutStrategy => "Rollout Strategies",
        SecretsManager => "Secrets Managers",
        Environment => "Environments",
    }
);

fact_category!(
    ResilienceFact, Resilience, resilience, Resilience {
        CircuitBreaker => "Circuit Breakers",
        RetryPattern => "Retry Patterns",
        BackoffStrategy => "Backoff Strategies",
        Bulkhead => "Bulkheads",
        ThreadPool => "Thread Pools",
        ChaosExperiment => "Chaos Experiments",
        HealthCheck => "Health Checks",
        SliSlo => "SLI/SLO Definitions",
    }
);

pub type EventDrivenContext = DomainContext<EventFact>;
pub type PipelineContext = DomainContext<PipelineFact>;
pub type ConfigurationContext = DomainContext<ConfigurationFact>;
pub type ResilienceContext = DomainContext<ResilienceFact>;

/// Facts of one kind accumulated for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainContext<C: FactCategory> {
    id: String,
    session_id: String,
    created_at: DateTime<Utc>,
    last_updated: DateTime<Utc>,
    facts: BTreeMap<C, BTreeMap<String, String>>,
}

impl<C: FactCategory> DomainContext<C> {
    pub(crate) fn new_at(session_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: format!("{}-{}", C::KIND, Uuid::new_v4()),
            session_id: session_id.into(),
            created_at: now,
            last_updated: now,
            facts: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    /// Insert a fact. Returns false, leaving the context untouched, when the
    /// key is already present in that category.
    pub(crate) fn add_fact_at(
        &mut self,
        category: C,
        key: &str,
        value: &str,
        now: DateTime<Utc>,
    ) -> bool {
        let entries = self.facts.entry(category).or_default();
        if entries.contains_key(key) {
            return false;
        }
        entries.insert(key.to_string(), value.to_string());
        self.last_updated = now;
        true
    }

    /// Keys recorded under `category`, sorted.
    pub fn keys(&self, category: C) -> Vec<&str> {
        self.facts
            .get(&category)
            .map(|entries| entries.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, category: C, key: &str) -> bool {
        self.facts
            .get(&category)
            .is_some_and(|entries| entries.contains_key(key))
    }

    pub fn has_any(&self, category: C) -> bool {
        self.facts
            .get(&category)
            .is_some_and(|entries| !entries.is_empty())
    }

    pub fn fact_count(&self) -> usize {
        self.facts.values().map(BTreeMap::len).sum()
    }

    /// `- Label: a, b` lines for every non-empty category.
    pub fn summary_lines(&self) -> Vec<String> {
        self.facts
            .iter()
            .filter(|(_, entries)| !entries.is_empty())
            .map(|(category, entries)| {
                let keys: Vec<&str> = entries.keys().map(String::as_str).collect();
                format!("- {}: {}", category.label(), keys.join(", "))
            })
            .collect()
    }
}

impl DomainContext<EventFact> {
    /// Usable once at least one broker or schema is known.
    pub fn is_valid(&self) -> bool {
        self.has_any(EventFact::MessageBroker) || self.has_any(EventFact::EventSchema)
    }

    pub fn has_event_sourcing(&self) -> bool {
        self.has_any(EventFact::EventStore)
    }
}

impl DomainContext<ResilienceFact> {
    pub fn has_resilience_patterns(&self) -> bool {
        self.has_any(ResilienceFact::CircuitBreaker) || self.has_any(ResilienceFact::RetryPattern)
    }
}

/// Any one of the specialized contexts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SpecializedContext {
    EventDriven(EventDrivenContext),
    Pipeline(PipelineContext),
    Configuration(ConfigurationContext),
    Resilience(ResilienceContext),
}

impl SpecializedContext {
    pub fn kind(&self) -> ContextKind {
        match self {
            Self::EventDriven(_) => ContextKind::EventDriven,
            Self::Pipeline(_) => ContextKind::Pipeline,
            Self::Configuration(_) => ContextKind::Configuration,
            Self::Resilience(_) => ContextKind::Resilience,
        }
    }

    pub fn fact_count(&self) -> usize {
        match self {
            Self::EventDriven(ctx) => ctx.fact_count(),
            Self::Pipeline(ctx) => ctx.fact_count(),
            Self::Configuration(ctx) => ctx.fact_count(),
            Self::Resilience(ctx) => ctx.fact_count(),
        }
    }

    pub fn summary_lines(&self) -> Vec<String> {
        match self {
            Self::EventDriven(ctx) => ctx.summary_lines(),
            Self::Pipeline(ctx) => ctx.summary_lines(),
            Self::Configuration(ctx) => ctx.summary_lines(),
            Self::Resilience(ctx) => ctx.summary_lines(),
        }
    }

    /// Follow-up recommendations implied by the facts collected so far.
    pub fn recommendations(&self) -> Vec<String> {
        match self {
            Self::EventDriven(ctx) if ctx.has_any(EventFact::MessageBroker) => vec![
                format!(
                    "Consider event schema versioning for {}",
                    ctx.keys(EventFact::MessageBroker).join(", ")
                ),
                "Ensure idempotent event handlers for reliability".to_string(),
            ],
            Self::Pipeline(ctx) if ctx.has_any(PipelineFact::BuildTool) => {
                let strategies = ctx.keys(PipelineFact::DeploymentStrategy);
                let strategies = if strategies.is_empty() {
                    "blue-green, canary, rolling".to_string()
                } else {
                    strategies.join(", ")
                };
                vec![
                    "Integrate security scanning in CI/CD pipeline".to_string(),
                    format!("Consider deployment strategies: {strategies}"),
                ]
            }
            _ => Vec::new(),
        }
    }
}

/// All specialized contexts held for one session.
#[derive(Debug, Clone, Default)]
pub struct DomainContexts {
    pub(crate) event_driven: Option<EventDrivenContext>,
    pub(crate) pipeline: Option<PipelineContext>,
    pub(crate) configuration: Option<ConfigurationContext>,
    pub(crate) resilience: Option<ResilienceContext>,
}

impl DomainContexts {
    pub fn get(&self, kind: ContextKind) -> Option<SpecializedContext> {
        match kind {
            ContextKind::EventDriven => self.event_driven.clone().map(SpecializedContext::EventDriven),
            ContextKind::Pipeline => self.pipeline.clone().map(SpecializedContext::Pipeline),
            ContextKind::Configuration => self
                .configuration
                .clone()
                .map(SpecializedContext::Configuration),
            ContextKind::Resilience => self.resilience.clone().map(SpecializedContext::Resilience),
        }
    }

    pub(crate) fn remove(&mut self, kind: ContextKind) -> bool {
        match kind {
            ContextKind::EventDriven => self.event_driven.take().is_some(),
            ContextKind::Pipeline => self.pipeline.take().is_some(),
            ContextKind::Configuration => self.configuration.take().is_some(),
            ContextKind::Resilience => self.resilience.take().is_some(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.event_driven.is_none()
            && self.pipeline.is_none()
            && self.configuration.is_none()
            && self.resilience.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_fact_is_idempotent_per_key() {
        let start = Utc::now();
        let mut ctx = EventDrivenContext::new_at("s", start);

        let later = start + chrono::Duration::seconds(10);
        assert!(ctx.add_fact_at(EventFact::EventSchema, "OrderCreated", "v1", later));
        assert_eq!(ctx.fact_count(), 1);
        assert_eq!(ctx.last_updated(), later);

        let even_later = later + chrono::Duration::seconds(10);
        assert!(!ctx.add_fact_at(EventFact::EventSchema, "OrderCreated", "v2", even_later));
        assert_eq!(ctx.fact_count(), 1);
        assert_eq!(ctx.facts[&EventFact::EventSchema]["OrderCreated"], "v1");
        assert_eq!(ctx.last_updated(), later);
    }

    #[test]
    fn test_same_key_in_different_categories() {
        let now = Utc::now();
        let mut ctx = ConfigurationContext::new_at("s", now);
        assert!(ctx.add_fact_at(ConfigurationFact::Environment, "staging", "", now));
        assert!(ctx.add_fact_at(ConfigurationFact::ConfigSource, "staging", "", now));
        assert_eq!(ctx.fact_count(), 2);
    }

    #[test]
    fn test_event_context_validity() {
        let now = Utc::now();
        let mut ctx = EventDrivenContext::new_at("s", now);
        assert!(!ctx.is_valid());
        assert!(!ctx.has_event_sourcing());

        ctx.add_fact_at(EventFact::MessageBroker, "kafka", "streaming", now);
        assert!(ctx.is_valid());

        ctx.add_fact_at(EventFact::EventStore, "event-store", "", now);
        assert!(ctx.has_event_sourcing());
    }

    #[test]
    fn test_resilience_patterns() {
        let now = Utc::now();
        let mut ctx = ResilienceContext::new_at("s", now);
        assert!(!ctx.has_resilience_patterns());
        ctx.add_fact_at(ResilienceFact::RetryPattern, "exponential-backoff", "", now);
        assert!(ctx.has_resilience_patterns());
    }

    #[test]
    fn test_context_id_carries_kind_prefix() {
        let ctx = PipelineContext::new_at("s", Utc::now());
        assert!(ctx.id().starts_with("cicd-"));
        assert_eq!(ctx.session_id(), "s");
    }

    #[test]
    fn test_recommendations_follow_collected_facts() {
        let now = Utc::now();
        let mut pipeline = PipelineContext::new_at("s", now);
        assert!(SpecializedContext::Pipeline(pipeline.clone()).recommendations().is_empty());

        pipeline.add_fact_at(PipelineFact::BuildTool, "maven", "java-build", now);
        let recs = SpecializedContext::Pipeline(pipeline).recommendations();
        assert_eq!(recs[0], "Integrate security scanning in CI/CD pipeline");
        assert_eq!(recs[1], "Consider deployment strategies: blue-green, canary, rolling");
    }

    #[test]
    fn test_architecture_sees_all_kinds() {
        assert_eq!(ContextKind::for_domain(TechnicalDomain::Architecture).len(), 4);
        assert!(ContextKind::for_domain(TechnicalDomain::Testing).is_empty());
        assert_eq!(
            ContextKind::for_domain(TechnicalDomain::CicdPipeline),
            &[ContextKind::Pipeline]
        );
    }
}
