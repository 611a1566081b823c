use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{Span, debug, error, info, instrument, warn};

use crate::audit::AuditTrail;
use crate::domain::{
    AuditAction, AuditEntry, Handler, Request, Response, RoutingResult, RoutingStage,
};
use crate::error::OrchestrationError;
use crate::registry::{HandlerRegistry, HealthSummary};
use crate::routing::{Discovered, HandlerDiscovery, IntelligentRouter, RouterDiscovery};
use crate::security::SecurityGate;
use crate::session::SessionStore;

pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Produces the handler used when discovery does not finish in time.
pub type FallbackSupplier = Arc<dyn Fn() -> Arc<dyn Handler> + Send + Sync>;

/// Stage of one request lifecycle, recorded on the request span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleStage {
    Received,
    Authenticating,
    Discovering,
    Authorizing,
    Dispatching,
    Completed,
    Failed,
}

impl LifecycleStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Authenticating => "authenticating",
            Self::Discovering => "discovering",
            Self::Authorizing => "authorizing",
            Self::Dispatching => "dispatching",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

fn enter(stage: LifecycleStage) {
    Span::current().record("stage", stage.as_str());
    debug!(stage = stage.as_str(), "Lifecycle stage");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "handler panicked".to_string())
}

/// Recorded on the request span when the fallback handler replaced discovery.
const TIMEOUT_FALLBACK: &str = "timeout fallback";

/// Handler picked for a request and the routing stage behind it.
///
/// `stage` is `None` when the fallback handler stood in for a timed-out
/// discovery.
struct Selection {
    handler: Arc<dyn Handler>,
    stage: Option<RoutingStage>,
}

impl Selection {
    fn audit(&self, entry: AuditEntry) -> AuditEntry {
        entry
            .with_handler(self.handler.id(), self.handler.domain())
            .with_routing_stage(self.stage)
    }
}

/// A terminal failure plus the selection involved, if one was made.
struct Failure {
    error: OrchestrationError,
    selection: Option<Selection>,
}

impl From<OrchestrationError> for Failure {
    fn from(error: OrchestrationError) -> Self {
        Self {
            error,
            selection: None,
        }
    }
}

/// Drives requests through authentication, discovery, authorization and
/// dispatch, and audits every outcome.
///
/// Cheap to clone; all state lives behind shared handles.
#[derive(Clone)]
pub struct OrchestrationManager {
    registry: HandlerRegistry,
    router: IntelligentRouter,
    discovery: Arc<dyn HandlerDiscovery>,
    gate: Arc<dyn SecurityGate>,
    sessions: SessionStore,
    audit: AuditTrail,
    fallback: FallbackSupplier,
    discovery_timeout: Duration,
}

impl fmt::Debug for OrchestrationManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrchestrationManager")
            .field("handlers_count", &self.registry.len())
            .field("sessions_count", &self.sessions.len())
            .field("audit_entries", &self.audit.len())
            .field("gate", &self.gate)
            .field("discovery_timeout", &self.discovery_timeout)
            .finish_non_exhaustive()
    }
}

impl OrchestrationManager {
    pub fn new(
        registry: HandlerRegistry,
        gate: Arc<dyn SecurityGate>,
        fallback: FallbackSupplier,
    ) -> Self {
        let router = IntelligentRouter::default();
        Self {
            registry,
            discovery: Arc::new(RouterDiscovery::new(router.clone())),
            router,
            gate,
            sessions: SessionStore::new(),
            audit: AuditTrail::new(),
            fallback,
            discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
        }
    }

    /// Use `router` both for discovery and for [`route`](Self::route).
    #[must_use]
    pub fn with_router(mut self, router: IntelligentRouter) -> Self {
        self.discovery = Arc::new(RouterDiscovery::new(router.clone()));
        self.router = router;
        self
    }

    /// Replace the discovery collaborator only.
    #[must_use]
    pub fn with_discovery(mut self, discovery: Arc<dyn HandlerDiscovery>) -> Self {
        self.discovery = discovery;
        self
    }

    #[must_use]
    pub fn with_sessions(mut self, sessions: SessionStore) -> Self {
        self.sessions = sessions;
        self
    }

    #[must_use]
    pub fn with_audit(mut self, audit: AuditTrail) -> Self {
        self.audit = audit;
        self
    }

    #[must_use]
    pub fn with_discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn audit(&self) -> &AuditTrail {
        &self.audit
    }

    pub fn discovery_timeout(&self) -> Duration {
        self.discovery_timeout
    }

    /// Run one request to a terminal response.
    ///
    /// Never fails: every error becomes a FAILURE response, and exactly one
    /// audit entry is recorded per call.
    #[instrument(
        skip_all,
        fields(
            request_id = %request.id(),
            request_type = %request.request_type(),
            session_id = request.session_id().unwrap_or("-"),
            user_id = tracing::field::Empty,
            handler = tracing::field::Empty,
            routing_stage = tracing::field::Empty,
            stage = LifecycleStage::Received.as_str(),
        )
    )]
    pub async fn process_request(&self, request: &Request) -> Response {
        let started = Instant::now();
        let user_id = self.gate.extract_user_id(request);
        Span::current().record("user_id", user_id.as_str());

        let validation = self.sessions.validate_context(request);
        if !validation.is_sufficient() {
            debug!(missing = ?validation.missing_inputs, "Request context incomplete");
        }

        match self.run_lifecycle(request).await {
            Ok((selection, response)) => self.complete(request, &user_id, &selection, response),
            Err(failure) => self.fail(&user_id, failure, started),
        }
    }

    async fn run_lifecycle(
        &self,
        request: &Request,
    ) -> Result<(Selection, Response), Failure> {
        enter(LifecycleStage::Authenticating);
        let security = request.security().ok_or_else(|| {
            OrchestrationError::Validation("Invalid request: missing security context".to_string())
        })?;
        if !self.gate.authenticate(security).await {
            return Err(OrchestrationError::Authentication.into());
        }

        enter(LifecycleStage::Discovering);
        let selection = self.discover(request).await?;
        let span = Span::current();
        span.record("handler", selection.handler.id());
        span.record(
            "routing_stage",
            selection.stage.map_or(TIMEOUT_FALLBACK, RoutingStage::reason),
        );

        enter(LifecycleStage::Authorizing);
        if !self.gate.authorize(request, selection.handler.as_ref()).await {
            return Err(Failure {
                error: OrchestrationError::Authorization {
                    handler: selection.handler.id().to_string(),
                },
                selection: Some(selection),
            });
        }

        enter(LifecycleStage::Dispatching);
        match self.dispatch(request, selection.handler.as_ref()).await {
            Ok(response) => Ok((selection, response)),
            Err(error) => Err(Failure {
                error,
                selection: Some(selection),
            }),
        }
    }

    /// Spawn discovery against a registry snapshot and join it with the
    /// configured timeout. On timeout the task is cancelled and aborted and the
    /// fallback handler is returned.
    async fn discover(&self, request: &Request) -> Result<Selection, OrchestrationError> {
        let snapshot = self.registry.list();
        let cancel = CancellationToken::new();

        let discovery = Arc::clone(&self.discovery);
        let task_request = request.clone();
        let task_cancel = cancel.clone();
        let mut task = tokio::spawn(async move {
            discovery
                .discover_best_handler(&task_request, &snapshot, task_cancel)
                .await
        });

        match tokio::time::timeout(self.discovery_timeout, &mut task).await {
            Ok(Ok(Some(Discovered { handler, stage }))) => {
                debug!(handler = handler.id(), routing_stage = %stage, "Discovery selected handler");
                Ok(Selection {
                    handler,
                    stage: Some(stage),
                })
            }
            Ok(Ok(None)) => Err(OrchestrationError::NoHandler),
            Ok(Err(e)) => Err(OrchestrationError::RegistryUnavailable(e.to_string())),
            Err(_) => {
                cancel.cancel();
                task.abort();
                let fallback = (self.fallback)();
                warn!(
                    error = %OrchestrationError::DiscoveryTimeout(self.discovery_timeout),
                    fallback = fallback.id(),
                    "Using fallback handler"
                );
                Ok(Selection {
                    handler: fallback,
                    stage: None,
                })
            }
        }
    }

    async fn dispatch(
        &self,
        request: &Request,
        handler: &dyn Handler,
    ) -> Result<Response, OrchestrationError> {
        let started = Instant::now();
        let outcome = AssertUnwindSafe(handler.process_request(request))
            .catch_unwind()
            .await;
        let elapsed = started.elapsed();

        let message = match outcome {
            Ok(Ok(response)) => return Ok(response.with_processing_time(elapsed)),
            Ok(Err(e)) => format!("{e:#}"),
            Err(payload) => panic_message(payload.as_ref()),
        };
        Err(OrchestrationError::HandlerProcessing {
            handler: handler.id().to_string(),
            message,
        })
    }

    fn complete(
        &self,
        request: &Request,
        user_id: &str,
        selection: &Selection,
        response: Response,
    ) -> Response {
        let handler = selection.handler.as_ref();
        if !response.is_success() {
            enter(LifecycleStage::Failed);
            warn!(
                handler = handler.id(),
                status = ?response.status(),
                error = response.error().unwrap_or(""),
                "Handler reported failure"
            );
            self.audit.record(
                selection
                    .audit(AuditEntry::new(user_id, AuditAction::RequestFailed, false))
                    .with_error(response.error().or(Some(response.output()))),
            );
            return response;
        }

        let response = match request.session_id() {
            Some(session_id) => {
                self.sessions.get_or_create(session_id);
                handler.update_context(session_id, response.output());
                self.sessions.enhance(&response, session_id, handler.domain())
            }
            None => response,
        };

        enter(LifecycleStage::Completed);
        info!(
            handler = handler.id(),
            confidence = response.confidence(),
            elapsed = ?response.processing_time(),
            "Request completed"
        );
        self.audit.record(selection.audit(AuditEntry::new(
            user_id,
            AuditAction::RequestProcessed,
            true,
        )));
        response
    }

    fn fail(&self, user_id: &str, failure: Failure, started: Instant) -> Response {
        enter(LifecycleStage::Failed);
        let message = failure.error.to_string();

        match &failure.error {
            OrchestrationError::Validation(_)
            | OrchestrationError::Authentication
            | OrchestrationError::Authorization { .. } => {
                warn!(error = %message, "Request rejected");
            }
            _ => error!(error = %message, "Request failed"),
        }

        let mut entry = AuditEntry::new(user_id, failure.error.audit_action(), false)
            .with_error(Some(&message));
        if let Some(selection) = &failure.selection {
            entry = selection.audit(entry);
        }
        self.audit.record(entry);

        Response::failure(message).with_processing_time(started.elapsed())
    }

    /// Remove a session and tell every registered handler to release its state.
    pub fn archive(&self, session_id: &str) -> bool {
        let existed = self.sessions.archive(session_id);
        for handler in self.registry.list() {
            handler.remove_context(session_id);
        }
        info!(session_id, existed, "Session archived");
        existed
    }

    /// Routing decision for `request` against the current registry, without
    /// dispatching.
    pub fn route(&self, request: &Request) -> RoutingResult {
        self.router.route(request, &self.registry.list()).result
    }

    pub fn health_summary(&self) -> HealthSummary {
        self.registry.health_summary()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use async_trait::async_trait;

    use super::*;
    use crate::domain::{ResponseStatus, SecurityContext, TechnicalDomain};
    use crate::handlers::{StaticBehavior, StaticHandler};
    use crate::security::OpenSecurityGate;

    #[derive(Debug)]
    struct PanickingHandler {
        capabilities: BTreeSet<String>,
    }

    #[async_trait]
    impl Handler for PanickingHandler {
        fn id(&self) -> &str {
            "security-specialist"
        }

        fn capabilities(&self) -> &BTreeSet<String> {
            &self.capabilities
        }

        fn domain(&self) -> TechnicalDomain {
            TechnicalDomain::Security
        }

        fn required_roles(&self) -> &BTreeSet<String> {
            &self.capabilities
        }

        fn required_permissions(&self) -> &BTreeSet<String> {
            &self.capabilities
        }

        async fn process_request(&self, _request: &Request) -> anyhow::Result<Response> {
            panic!("handler exploded")
        }
    }

    #[derive(Debug)]
    struct PanickingDiscovery;

    #[async_trait]
    impl HandlerDiscovery for PanickingDiscovery {
        async fn discover_best_handler(
            &self,
            _request: &Request,
            _handlers: &[Arc<dyn Handler>],
            _cancel: CancellationToken,
        ) -> Option<Discovered> {
            panic!("registry lookup failed")
        }
    }

    fn fallback() -> FallbackSupplier {
        Arc::new(|| Arc::new(StaticHandler::new("general-consultation", TechnicalDomain::Implementation)) as Arc<dyn Handler>)
    }

    fn manager_with(handler: StaticHandler) -> (OrchestrationManager, Arc<StaticHandler>) {
        let handler = Arc::new(handler);
        let registry = HandlerRegistry::new();
        registry.register(Arc::clone(&handler) as Arc<dyn Handler>);
        (
            OrchestrationManager::new(registry, Arc::new(OpenSecurityGate), fallback()),
            handler,
        )
    }

    fn request() -> Request {
        Request::builder("auth", "jwt token refresh")
            .security(SecurityContext::new("token", "alice"))
            .build()
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(payload.as_ref()), "handler panicked");
    }

    #[tokio::test]
    async fn test_missing_security_context_is_validation_failure() {
        let (manager, handler) = manager_with(StaticHandler::new("security-specialist", TechnicalDomain::Security));
        let response = manager
            .process_request(&Request::builder("auth", "jwt").build())
            .await;

        assert_eq!(response.status(), ResponseStatus::Failure);
        assert_eq!(handler.calls(), 0);
        let entries = manager.audit().entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, AuditAction::ValidationFailed);
        assert_eq!(entries[0].user_id, crate::security::ANONYMOUS_USER);
    }

    #[tokio::test]
    async fn test_handler_error_becomes_failure() {
        let (manager, handler) = manager_with(
            StaticHandler::new("security-specialist", TechnicalDomain::Security)
                .with_behavior(StaticBehavior::Fail("backend down".into())),
        );
        let response = manager.process_request(&request()).await;

        assert!(!response.is_success());
        assert!(response.error().unwrap().contains("backend down"));
        assert_eq!(handler.calls(), 1);
        let entries = manager.audit().entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, AuditAction::RequestFailed);
        assert_eq!(entries[0].handler_id.as_deref(), Some("security-specialist"));
    }

    #[tokio::test]
    async fn test_handler_panic_becomes_failure() {
        let registry = HandlerRegistry::new();
        registry.register(Arc::new(PanickingHandler {
            capabilities: BTreeSet::new(),
        }));
        let manager = OrchestrationManager::new(registry, Arc::new(OpenSecurityGate), fallback());
        let response = manager.process_request(&request()).await;

        assert!(!response.is_success());
        assert!(response.error().unwrap().contains("handler exploded"));
        assert_eq!(manager.audit().len(), 1);
        assert_eq!(manager.audit().entries()[0].action, AuditAction::RequestFailed);
    }

    #[tokio::test]
    async fn test_failed_discovery_task_is_registry_unavailable() {
        let fallback_handler = Arc::new(StaticHandler::new(
            "general-consultation",
            TechnicalDomain::Implementation,
        ));
        let supplier_handler = Arc::clone(&fallback_handler);
        let handler = Arc::new(StaticHandler::new("security-specialist", TechnicalDomain::Security));
        let registry = HandlerRegistry::new();
        registry.register(Arc::clone(&handler) as Arc<dyn Handler>);
        let manager = OrchestrationManager::new(
            registry,
            Arc::new(OpenSecurityGate),
            Arc::new(move || Arc::clone(&supplier_handler) as Arc<dyn Handler>),
        )
        .with_discovery(Arc::new(PanickingDiscovery));

        let response = manager.process_request(&request()).await;

        assert_eq!(response.status(), ResponseStatus::Failure);
        assert!(
            response
                .error()
                .unwrap()
                .starts_with("Handler registry unavailable")
        );
        assert_eq!(handler.calls(), 0);
        assert_eq!(fallback_handler.calls(), 0);

        let entries = manager.audit().entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, AuditAction::DiscoveryFailed);
        assert!(entries[0].handler_id.is_none());
    }

    #[tokio::test]
    async fn test_audit_records_routing_stage() {
        let (manager, _) = manager_with(
            StaticHandler::new("security-specialist", TechnicalDomain::Security)
                .with_permissions(["KEY_ROTATE"]),
        );
        let response = manager.process_request(&request()).await;
        assert!(!response.is_success());

        let entries = manager.audit().entries();
        assert_eq!(entries[0].action, AuditAction::AuthorizationFailed);
        assert_eq!(
            entries[0].routing_stage,
            Some(RoutingStage::ContextBasedSelection)
        );
    }

    #[tokio::test]
    async fn test_success_is_audited_once() {
        let (manager, handler) = manager_with(
            StaticHandler::new("security-specialist", TechnicalDomain::Security).with_output("rotate keys", 0.9),
        );
        let response = manager.process_request(&request()).await;

        assert!(response.is_success());
        assert_eq!(response.output(), "rotate keys");
        assert_eq!(handler.calls(), 1);
        let entries = manager.audit().entries();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].success);
        assert_eq!(entries[0].action, AuditAction::RequestProcessed);
        assert_eq!(
            entries[0].routing_stage,
            Some(RoutingStage::ContextBasedSelection)
        );
    }

    #[tokio::test]
    async fn test_empty_registry_fails_discovery() {
        let manager = OrchestrationManager::new(
            HandlerRegistry::new(),
            Arc::new(OpenSecurityGate),
            fallback(),
        );
        let response = manager.process_request(&request()).await;

        assert!(!response.is_success());
        assert_eq!(manager.audit().entries()[0].action, AuditAction::DiscoveryFailed);
        assert!(!manager.route(&request()).success);
    }
}
