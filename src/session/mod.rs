//! Session and specialized domain context management.
//!
//! Conversation state outlives a single request: a session accumulates a task
//! objective, decisions and next steps, plus domain facts gathered by the
//! handlers it consulted.
//!
//! # Architecture
//!
//! - [`SessionContext`]: progress for one session
//! - [`DomainContext`]: facts of one specialized kind (event-driven, CI/CD,
//!   configuration, resilience)
//! - [`SessionStore`]: thread-safe store for all of the above
//!
//! # Example
//!
//! ```rust
//! use consult_orchestrator::session::{EventFact, SessionStore};
//!
//! let store = SessionStore::new();
//! store.get_or_create("session-1");
//! assert!(store.add_fact("session-1", EventFact::MessageBroker, "kafka", "streaming"));
//! assert!(!store.add_fact("session-1", EventFact::MessageBroker, "kafka", "streaming"));
//!
//! store.archive("session-1");
//! assert!(store.session_context("session-1").is_none());
//! ```

mod context;
mod domain;
mod store;

pub use context::{DEFAULT_SESSION_TIMEOUT, SessionContext};
pub use domain::{
    ConfigurationContext, ConfigurationFact, ContextKind, DomainContext, DomainContexts,
    EventDrivenContext, EventFact, FactCategory, PipelineContext, PipelineFact, ResilienceContext,
    ResilienceFact, SpecializedContext,
};
pub use store::{
    ContextValidation, REQUIRED_CONTEXT_KEYS, STALE_SESSION_MARKER, SessionStore, SharedContext,
};
