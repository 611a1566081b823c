//! Handler implementations shipped with the crate.
//!
//! - [`StaticHandler`]: fixed-output handler, used as the fallback handler and
//!   for wiring tests
//! - [`builtin`]: templated domain handlers that feed their session context

pub mod builtin;

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use crate::domain::{Handler, HandlerStatus, Request, Response, TechnicalDomain};

pub use builtin::{
    DomainHandler, architecture_handler, builtin_handlers, configuration_handler,
    event_driven_handler, pipeline_handler, resilience_handler,
};

/// What a [`StaticHandler`] does when asked to process a request.
#[derive(Debug, Clone)]
pub enum StaticBehavior {
    Respond { output: String, confidence: f64 },
    Fail(String),
}

/// Handler with declared metadata and a fixed behavior.
#[derive(Debug)]
pub struct StaticHandler {
    id: String,
    domain: TechnicalDomain,
    capabilities: BTreeSet<String>,
    required_roles: BTreeSet<String>,
    required_permissions: BTreeSet<String>,
    status: RwLock<HandlerStatus>,
    behavior: StaticBehavior,
    calls: AtomicUsize,
}

fn to_set<I, S>(items: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}

impl StaticHandler {
    pub fn new(id: impl Into<String>, domain: TechnicalDomain) -> Self {
        let id = id.into();
        Self {
            behavior: StaticBehavior::Respond {
                output: format!("{id} acknowledged the request"),
                confidence: 0.5,
            },
            id,
            domain,
            capabilities: BTreeSet::new(),
            required_roles: BTreeSet::new(),
            required_permissions: BTreeSet::new(),
            status: RwLock::new(HandlerStatus::Operational),
            calls: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = to_set(capabilities);
        self
    }

    #[must_use]
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_roles = to_set(roles);
        self
    }

    #[must_use]
    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_permissions = to_set(permissions);
        self
    }

    #[must_use]
    pub fn with_output(mut self, output: impl Into<String>, confidence: f64) -> Self {
        self.behavior = StaticBehavior::Respond {
            output: output.into(),
            confidence,
        };
        self
    }

    #[must_use]
    pub fn with_behavior(mut self, behavior: StaticBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn set_status(&self, status: HandlerStatus) {
        *self.status.write().unwrap_or_else(PoisonError::into_inner) = status;
    }

    /// Number of times `process_request` has been entered.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Handler for StaticHandler {
    fn id(&self) -> &str {
        &self.id
    }

    fn capabilities(&self) -> &BTreeSet<String> {
        &self.capabilities
    }

    fn domain(&self) -> TechnicalDomain {
        self.domain
    }

    fn status(&self) -> HandlerStatus {
        *self.status.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn required_roles(&self) -> &BTreeSet<String> {
        &self.required_roles
    }

    fn required_permissions(&self) -> &BTreeSet<String> {
        &self.required_permissions
    }

    async fn process_request(&self, _request: &Request) -> anyhow::Result<Response> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            StaticBehavior::Respond { output, confidence } => {
                Ok(Response::success(output.clone(), *confidence))
            }
            StaticBehavior::Fail(message) => Err(anyhow::anyhow!("{message}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_handler_counts_calls() {
        let handler = StaticHandler::new("h", TechnicalDomain::Testing).with_output("done", 0.7);
        let request = Request::builder("t", "d").build();

        let response = handler.process_request(&request).await.unwrap();
        assert_eq!(response.output(), "done");
        assert_eq!(handler.calls(), 1);
    }

    #[tokio::test]
    async fn test_static_handler_failure() {
        let handler = StaticHandler::new("h", TechnicalDomain::Testing)
            .with_behavior(StaticBehavior::Fail("boom".into()));
        let err = handler
            .process_request(&Request::builder("t", "d").build())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_serves_by_id_or_capability() {
        let handler = StaticHandler::new("event-driven-specialist", TechnicalDomain::EventDrivenArchitecture)
            .with_capabilities(["kafka"]);
        assert!(handler.serves("event-driven-specialist"));
        assert!(handler.serves("kafka"));
        assert!(!handler.serves("docker"));
    }

    #[test]
    fn test_status_drives_health() {
        let handler = StaticHandler::new("h", TechnicalDomain::Testing);
        assert!(handler.is_healthy());
        handler.set_status(HandlerStatus::Degraded);
        assert!(!handler.is_healthy());
        assert!(!handler.descriptor().healthy);
    }
}
