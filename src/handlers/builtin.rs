//! Templated domain handlers.
//!
//! Each handler answers with fixed domain guidance and, after a successful
//! dispatch, scans that guidance for known terms and records them as facts in
//! its session's specialized context.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::domain::{Handler, Request, Response, ResponseStatus, TechnicalDomain};
use crate::session::{
    ConfigurationFact, ContextKind, EventFact, FactCategory, PipelineFact, ResilienceFact,
    SessionStore, SpecializedContext,
};

/// Permission required by the configuration handler.
pub const CONFIG_MANAGE: &str = "CONFIG_MANAGE";

/// Any of `needles` found in the lowercased guidance records `key = value`.
type TermRule<C> = (&'static [&'static str], C, &'static str, &'static str);

const EVENT_TERMS: &[TermRule<EventFact>] = &[
    (&["kafka"], EventFact::MessageBroker, "kafka", "streaming"),
    (&["idempotent"], EventFact::EventHandler, "idempotent-handler", "idempotency"),
    (&["dead letter"], EventFact::DeadLetterQueue, "failed-events", "dlq-config"),
    (&["event sourcing", "event store"], EventFact::EventStore, "event-store", "append-only"),
    (&["saga"], EventFact::Saga, "saga-pattern", "orchestration"),
];

const PIPELINE_TERMS: &[TermRule<PipelineFact>] = &[
    (&["maven"], PipelineFact::BuildTool, "maven", "java-build"),
    (&["docker"], PipelineFact::BuildTool, "docker", "containerization"),
    (&["blue-green"], PipelineFact::DeploymentStrategy, "blue-green", "zero-downtime"),
    (&["sast"], PipelineFact::SecurityScanner, "sast", "static-analysis"),
    (&["dast"], PipelineFact::SecurityScanner, "dast", "dynamic-analysis"),
    (&["jenkins"], PipelineFact::OrchestrationTool, "jenkins", "ci-server"),
];

const CONFIGURATION_TERMS: &[TermRule<ConfigurationFact>] = &[
    (&["spring cloud config"], ConfigurationFact::ConfigSource, "spring-cloud-config", "centralized"),
    (&["consul"], ConfigurationFact::ConfigSource, "consul", "key-value"),
    (&["feature flag"], ConfigurationFact::FeatureFlag, "feature-toggles", "runtime"),
    (&["gradual rollout"], ConfigurationFact::RolloutStrategy, "gradual-rollout", "percentage"),
    (&["aws secrets manager"], ConfigurationFact::SecretsManager, "aws-secrets-manager", "managed"),
    (&["development"], ConfigurationFact::Environment, "development", "dev"),
    (&["staging"], ConfigurationFact::Environment, "staging", "pre-production"),
    (&["production"], ConfigurationFact::Environment, "production", "live"),
];

const RESILIENCE_TERMS: &[TermRule<ResilienceFact>] = &[
    (&["resilience4j", "circuit breaker"], ResilienceFact::CircuitBreaker, "resilience4j", "circuit-breaker"),
    (&["exponential backoff", "retry"], ResilienceFact::RetryPattern, "exponential-backoff", "retry"),
    (&["exponential"], ResilienceFact::BackoffStrategy, "exponential", "backoff"),
    (&["jitter"], ResilienceFact::BackoffStrategy, "jitter", "randomized"),
    (&["bulkhead"], ResilienceFact::Bulkhead, "thread-pool-isolation", "isolation"),
    (&["thread pool"], ResilienceFact::ThreadPool, "isolated-thread-pool", "dedicated"),
    (&["chaos"], ResilienceFact::ChaosExperiment, "chaos-monkey", "failure-injection"),
    (&["health check"], ResilienceFact::HealthCheck, "endpoint-health", "liveness"),
    (&["sli", "slo"], ResilienceFact::SliSlo, "service", "availability"),
];

fn apply_terms<C: FactCategory>(
    store: &SessionStore,
    session_id: &str,
    text: &str,
    rules: &[TermRule<C>],
) -> usize {
    let mut added = 0;
    for (needles, category, key, value) in rules {
        if needles.iter().any(|n| text.contains(n)) && store.add_fact(session_id, *category, key, value) {
            added += 1;
        }
    }
    added
}

/// Handler answering with domain guidance and feeding one context kind.
pub struct DomainHandler {
    id: String,
    domain: TechnicalDomain,
    capabilities: BTreeSet<String>,
    required_roles: BTreeSet<String>,
    required_permissions: BTreeSet<String>,
    kind: Option<ContextKind>,
    guidance: &'static str,
    recommendations: &'static [&'static str],
    confidence: f64,
    store: SessionStore,
}

impl std::fmt::Debug for DomainHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainHandler")
            .field("id", &self.id)
            .field("domain", &self.domain)
            .field("kind", &self.kind)
            .field("capabilities_count", &self.capabilities.len())
            .finish_non_exhaustive()
    }
}

impl DomainHandler {
    fn new(
        id: &str,
        domain: TechnicalDomain,
        capabilities: &[&str],
        guidance: &'static str,
        store: SessionStore,
    ) -> Self {
        Self {
            id: id.to_string(),
            domain,
            capabilities: capabilities.iter().map(|c| (*c).to_string()).collect(),
            required_roles: BTreeSet::new(),
            required_permissions: BTreeSet::new(),
            kind: ContextKind::for_domain(domain).first().copied(),
            guidance,
            recommendations: &[],
            confidence: 0.85,
            store,
        }
    }

    fn recommending(mut self, recommendations: &'static [&'static str]) -> Self {
        self.recommendations = recommendations;
        self
    }

    fn requiring_permissions(mut self, permissions: &[&str]) -> Self {
        self.required_permissions = permissions.iter().map(|p| (*p).to_string()).collect();
        self
    }

    fn without_context(mut self) -> Self {
        self.kind = None;
        self
    }

    /// Guidance for `request` before any session enhancement.
    pub fn guidance_for(&self, request: &Request) -> String {
        self.guidance.replace("{description}", request.description())
    }
}

#[async_trait]
impl Handler for DomainHandler {
    fn id(&self) -> &str {
        &self.id
    }

    fn capabilities(&self) -> &BTreeSet<String> {
        &self.capabilities
    }

    fn domain(&self) -> TechnicalDomain {
        self.domain
    }

    fn required_roles(&self) -> &BTreeSet<String> {
        &self.required_roles
    }

    fn required_permissions(&self) -> &BTreeSet<String> {
        &self.required_permissions
    }

    async fn process_request(&self, request: &Request) -> anyhow::Result<Response> {
        let mut builder = Response::builder(ResponseStatus::Success)
            .output(self.guidance_for(request))
            .confidence(self.confidence)
            .recommendations(self.recommendations.iter().copied())
            .result("handler", self.id.clone())
            .result("domain", self.domain.display_name());

        // The architect sees every kind gathered by the other handlers.
        if self.kind.is_none()
            && let Some(session_id) = request.session_id()
        {
            let shared = self.store.shared_context_for(session_id, self.domain);
            let facts: usize = shared.specialized.iter().map(SpecializedContext::fact_count).sum();
            builder = builder.result("known_facts", facts);
            for ctx in &shared.specialized {
                builder = builder.recommendations(ctx.recommendations());
            }
        }

        Ok(builder.build())
    }

    fn get_or_create_context(&self, session_id: &str) -> Option<SpecializedContext> {
        self.kind
            .map(|kind| self.store.get_or_create_specialized(session_id, kind))
    }

    fn update_context(&self, session_id: &str, guidance: &str) {
        let Some(kind) = self.kind else {
            return;
        };
        let text = guidance.to_lowercase();
        let added = match kind {
            ContextKind::EventDriven => apply_terms(&self.store, session_id, &text, EVENT_TERMS),
            ContextKind::Pipeline => apply_terms(&self.store, session_id, &text, PIPELINE_TERMS),
            ContextKind::Configuration => {
                apply_terms(&self.store, session_id, &text, CONFIGURATION_TERMS)
            }
            ContextKind::Resilience => apply_terms(&self.store, session_id, &text, RESILIENCE_TERMS),
        };
        debug!(handler = %self.id, session_id, %kind, added, "Context updated from guidance");
    }

    fn remove_context(&self, session_id: &str) {
        if let Some(kind) = self.kind {
            self.store.remove_domain(session_id, kind);
        }
    }
}

pub fn event_driven_handler(store: SessionStore) -> DomainHandler {
    DomainHandler::new(
        "event-driven-specialist",
        TechnicalDomain::EventDrivenArchitecture,
        &["event-driven-specialist", "event-driven", "kafka", "messaging", "event-sourcing"],
        "Event-driven guidance for: {description}\n\
         Publish domain events to Kafka topics with versioned schemas. \
         Keep every consumer idempotent, route poison messages to a dead letter topic, \
         and coordinate multi-service workflows with a saga.",
        store,
    )
    .recommending(&["Document event contracts alongside the producing service"])
}

pub fn pipeline_handler(store: SessionStore) -> DomainHandler {
    DomainHandler::new(
        "cicd-pipeline-specialist",
        TechnicalDomain::CicdPipeline,
        &["cicd-pipeline-specialist", "cicd-pipeline", "deployment-strategy", "jenkins"],
        "CI/CD guidance for: {description}\n\
         Build with Maven and package the service as a Docker image. \
         Run SAST on every commit and DAST against the staging deployment, \
         then promote through Jenkins using a blue-green release.",
        store,
    )
    .recommending(&["Fail the build on critical scanner findings"])
}

pub fn configuration_handler(store: SessionStore) -> DomainHandler {
    DomainHandler::new(
        "configuration-management-specialist",
        TechnicalDomain::ConfigurationManagement,
        &[
            "configuration-management-specialist",
            "configuration-management",
            "feature-flags",
            "secrets-management",
        ],
        "Configuration guidance for: {description}\n\
         Serve properties from Spring Cloud Config backed by Consul. \
         Guard new behavior behind a feature flag with a gradual rollout, \
         keep credentials in AWS Secrets Manager, \
         and keep separate profiles for development, staging and production.",
        store,
    )
    .requiring_permissions(&[CONFIG_MANAGE])
    .recommending(&["Audit every configuration change"])
}

pub fn resilience_handler(store: SessionStore) -> DomainHandler {
    DomainHandler::new(
        "resilience-engineering-specialist",
        TechnicalDomain::ResilienceEngineering,
        &[
            "resilience-engineering-specialist",
            "resilience-engineering",
            "circuit-breaker",
            "chaos-engineering",
        ],
        "Resilience guidance for: {description}\n\
         Wrap remote calls in a Resilience4j circuit breaker and retry with exponential backoff plus jitter. \
         Isolate slow dependencies with a bulkhead on a dedicated thread pool, \
         expose a health check, define SLI and SLO targets, and validate them with chaos experiments.",
        store,
    )
    .recommending(&["Alert on error budget burn rate"])
}

pub fn architecture_handler(store: SessionStore) -> DomainHandler {
    DomainHandler::new(
        "microservices-architect",
        TechnicalDomain::Architecture,
        &["microservices-architect", "architecture", "service-boundaries"],
        "Architecture guidance for: {description}\n\
         Draw service boundaries around business capabilities, \
         own data per service, and prefer asynchronous integration between contexts.",
        store,
    )
    .without_context()
    .recommending(&["Record the decision in an architecture decision record"])
}

/// Every built-in handler, sharing `store`.
pub fn builtin_handlers(store: &SessionStore) -> Vec<Arc<dyn Handler>> {
    vec![
        Arc::new(event_driven_handler(store.clone())),
        Arc::new(pipeline_handler(store.clone())),
        Arc::new(configuration_handler(store.clone())),
        Arc::new(resilience_handler(store.clone())),
        Arc::new(architecture_handler(store.clone())),
    ]
}
