//! Concurrent store for session and specialized domain contexts.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::context::{DEFAULT_SESSION_TIMEOUT, SessionContext};
use super::domain::{ContextKind, DomainContext, DomainContexts, FactCategory, SpecializedContext};
use crate::domain::{Request, Response, TechnicalDomain};

/// Context keys a fully anchored request is expected to carry.
pub const REQUIRED_CONTEXT_KEYS: [&str; 9] = [
    "session-id",
    "project-context",
    "architectural-decisions",
    "current-task",
    "domain-constraints",
    "event-driven-context",
    "cicd-context",
    "configuration-context",
    "resilience-context",
];

/// Marker reported by [`SessionStore::validate_context`] for a stale session.
pub const STALE_SESSION_MARKER: &str = "stale-session-context";

/// Outcome of [`SessionStore::validate_context`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextValidation {
    pub missing_inputs: Vec<String>,
}

impl ContextValidation {
    pub fn is_sufficient(&self) -> bool {
        self.missing_inputs.is_empty()
    }

    /// Operator-facing message; empty when the context is sufficient.
    pub fn message(&self) -> String {
        if self.is_sufficient() {
            return String::new();
        }
        format!(
            "Context insufficient, re-anchor needed. Missing inputs: {}",
            self.missing_inputs.join(", ")
        )
    }
}

/// Session context plus whichever specialized contexts a handler is entitled to see.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SharedContext {
    pub session: Option<SessionContext>,
    pub specialized: Vec<SpecializedContext>,
}

/// Thread-safe store for session state.
///
/// Session ids partition the key space, so a single lock per map is enough.
/// Staleness sweeps are driven from outside (see
/// [`spawn_session_sweeper`](crate::runtime::spawn_session_sweeper)).
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<SessionStoreInner>,
}

struct SessionStoreInner {
    timeout: Duration,
    sessions: RwLock<HashMap<String, SessionContext>>,
    domains: RwLock<HashMap<String, DomainContexts>>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("timeout", &self.inner.timeout)
            .field("sessions", &self.len())
            .finish_non_exhaustive()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_SESSION_TIMEOUT)
    }

    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            inner: Arc::new(SessionStoreInner {
                timeout,
                sessions: RwLock::new(HashMap::new()),
                domains: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    /// Get the session context, creating it on first reference.
    pub fn get_or_create(&self, session_id: &str) -> SessionContext {
        {
            let guard = self.inner.sessions.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(session) = guard.get(session_id) {
                return session.clone();
            }
        }

        let mut guard = self.inner.sessions.write().unwrap_or_else(PoisonError::into_inner);
        guard
            .entry(session_id.to_string())
            .or_insert_with(|| SessionContext::new_at(session_id, Utc::now()))
            .clone()
    }

    /// Read-only lookup; never creates.
    pub fn session_context(&self, session_id: &str) -> Option<SessionContext> {
        self.inner
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session_id)
            .cloned()
    }

    pub fn update_progress(
        &self,
        session_id: &str,
        objective: Option<String>,
        decisions: BTreeMap<String, String>,
        next_steps: Vec<String>,
    ) {
        self.update_progress_at(session_id, objective, decisions, next_steps, Utc::now());
    }

    /// Replace the session's progress as of `now`, creating the session if needed.
    pub fn update_progress_at(
        &self,
        session_id: &str,
        objective: Option<String>,
        decisions: BTreeMap<String, String>,
        next_steps: Vec<String>,
        now: DateTime<Utc>,
    ) {
        let mut guard = self.inner.sessions.write().unwrap_or_else(PoisonError::into_inner);
        guard
            .entry(session_id.to_string())
            .or_insert_with(|| SessionContext::new_at(session_id, now))
            .update_progress_at(objective, decisions, next_steps, now);
    }

    /// Get a specialized context, creating it on first reference.
    pub fn get_or_create_domain<C: FactCategory>(&self, session_id: &str) -> DomainContext<C> {
        let mut guard = self.inner.domains.write().unwrap_or_else(PoisonError::into_inner);
        let contexts = guard.entry(session_id.to_string()).or_default();
        C::slot(contexts)
            .get_or_insert_with(|| DomainContext::new_at(session_id, Utc::now()))
            .clone()
    }

    pub fn domain_context<C: FactCategory>(&self, session_id: &str) -> Option<DomainContext<C>> {
        let guard = self.inner.domains.read().unwrap_or_else(PoisonError::into_inner);
        guard.get(session_id).and_then(C::slot_ref).cloned()
    }

    pub fn specialized_context(&self, session_id: &str, kind: ContextKind) -> Option<SpecializedContext> {
        let guard = self.inner.domains.read().unwrap_or_else(PoisonError::into_inner);
        guard.get(session_id).and_then(|contexts| contexts.get(kind))
    }

    pub fn add_fact<C: FactCategory>(&self, session_id: &str, category: C, key: &str, value: &str) -> bool {
        self.add_fact_at(session_id, category, key, value, Utc::now())
    }

    /// Record a fact, creating the specialized context if needed.
    ///
    /// Returns false when the key already exists in that category.
    pub fn add_fact_at<C: FactCategory>(
        &self,
        session_id: &str,
        category: C,
        key: &str,
        value: &str,
        now: DateTime<Utc>,
    ) -> bool {
        let mut guard = self.inner.domains.write().unwrap_or_else(PoisonError::into_inner);
        let contexts = guard.entry(session_id.to_string()).or_default();
        C::slot(contexts)
            .get_or_insert_with(|| DomainContext::new_at(session_id, now))
            .add_fact_at(category, key, value, now)
    }

    /// Drop one specialized context for a session. Returns whether it existed.
    pub fn remove_domain(&self, session_id: &str, kind: ContextKind) -> bool {
        let mut guard = self.inner.domains.write().unwrap_or_else(PoisonError::into_inner);
        let Some(contexts) = guard.get_mut(session_id) else {
            return false;
        };
        let removed = contexts.remove(kind);
        if contexts.is_empty() {
            guard.remove(session_id);
        }
        removed
    }

    /// Unknown sessions are never stale.
    pub fn is_stale(&self, session_id: &str) -> bool {
        self.is_stale_at(session_id, Utc::now())
    }

    pub fn is_stale_at(&self, session_id: &str, now: DateTime<Utc>) -> bool {
        self.session_context(session_id)
            .is_some_and(|session| session.is_stale_at(now, self.inner.timeout))
    }

    pub fn cleanup_stale(&self) -> usize {
        self.cleanup_stale_at(Utc::now())
    }

    /// Remove stale session contexts together with their specialized contexts.
    ///
    /// Staleness is judged on the session alone. Returns the number of session
    /// contexts removed.
    pub fn cleanup_stale_at(&self, now: DateTime<Utc>) -> usize {
        let timeout = self.inner.timeout;

        let stale: Vec<String> = {
            let mut guard = self.inner.sessions.write().unwrap_or_else(PoisonError::into_inner);
            let stale: Vec<String> = guard
                .iter()
                .filter(|(_, session)| session.is_stale_at(now, timeout))
                .map(|(id, _)| id.clone())
                .collect();
            for id in &stale {
                guard.remove(id);
            }
            stale
        };
        if stale.is_empty() {
            return 0;
        }

        let mut guard = self.inner.domains.write().unwrap_or_else(PoisonError::into_inner);
        let mut specialized = 0;
        for id in &stale {
            if guard.remove(id).is_some() {
                specialized += 1;
            }
        }

        tracing::debug!(sessions = stale.len(), specialized, "Removed stale sessions");
        stale.len()
    }

    /// Remove the session context and all specialized contexts for a session.
    ///
    /// Returns true if anything was removed.
    pub fn archive(&self, session_id: &str) -> bool {
        let session = self
            .inner
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session_id);
        let domains = self
            .inner
            .domains
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session_id);
        session.is_some() || domains.is_some()
    }

    pub fn len(&self) -> usize {
        self.inner.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Report missing anchoring keys and a stale session, if any.
    pub fn validate_context(&self, request: &Request) -> ContextValidation {
        let has_session = request.session_id().is_some();
        let mut missing_inputs: Vec<String> = REQUIRED_CONTEXT_KEYS
            .iter()
            .filter(|key| !(**key == "session-id" && has_session))
            .filter(|key| !request.context().contains_key(**key))
            .map(|key| (*key).to_string())
            .collect();

        if let Some(session_id) = request.session_id()
            && self.is_stale(session_id)
        {
            missing_inputs.push(STALE_SESSION_MARKER.to_string());
        }

        ContextValidation { missing_inputs }
    }

    /// Session context plus the specialized contexts relevant to `domain`.
    ///
    /// Relevant specialized contexts are created if missing.
    pub fn shared_context_for(&self, session_id: &str, domain: TechnicalDomain) -> SharedContext {
        let specialized = ContextKind::for_domain(domain)
            .iter()
            .map(|kind| self.get_or_create_specialized(session_id, *kind))
            .collect();

        SharedContext {
            session: self.session_context(session_id),
            specialized,
        }
    }

    /// Specialized context of `kind` for the session, created if missing.
    pub fn get_or_create_specialized(&self, session_id: &str, kind: ContextKind) -> SpecializedContext {
        use super::domain::{ConfigurationFact, EventFact, PipelineFact, ResilienceFact};

        match kind {
            ContextKind::EventDriven => EventFact::wrap(self.get_or_create_domain(session_id)),
            ContextKind::Pipeline => PipelineFact::wrap(self.get_or_create_domain(session_id)),
            ContextKind::Configuration => ConfigurationFact::wrap(self.get_or_create_domain(session_id)),
            ContextKind::Resilience => ResilienceFact::wrap(self.get_or_create_domain(session_id)),
        }
    }

    /// Build an enhanced copy of `response` carrying session and domain context.
    ///
    /// Reads only: nothing is created. When the session has no context at all
    /// the response is returned unchanged.
    pub fn enhance(&self, response: &Response, session_id: &str, domain: TechnicalDomain) -> Response {
        let session = self.session_context(session_id);
        let specialized: Vec<SpecializedContext> = ContextKind::for_domain(domain)
            .iter()
            .filter_map(|kind| self.specialized_context(session_id, *kind))
            .filter(|ctx| ctx.fact_count() > 0)
            .collect();

        if session.is_none() && specialized.is_empty() {
            return response.clone();
        }

        let mut output = String::from("=== Context-Aware Guidance ===\n\n");
        output.push_str("Original Guidance:\n");
        output.push_str(response.output());
        output.push_str("\n\n");

        if let Some(session) = &session {
            let decisions: Vec<String> = session
                .decisions
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            output.push_str("Session Context:\n");
            output.push_str(&format!(
                "- Task: {}\n",
                session.task_objective.as_deref().unwrap_or_default()
            ));
            output.push_str(&format!("- Decisions: {}\n", decisions.join(", ")));
            output.push_str(&format!("- Next Steps: {}\n\n", session.next_steps.join(", ")));
        }

        let mut builder = response.to_builder();
        for ctx in &specialized {
            output.push_str(ctx.kind().title());
            output.push_str(":\n");
            for line in ctx.summary_lines() {
                output.push_str(&line);
                output.push('\n');
            }
            output.push('\n');
            builder = builder.recommendations(ctx.recommendations());
        }

        builder.output(output.trim_end()).build()
    }
}
