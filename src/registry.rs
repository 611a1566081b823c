//! In-memory index of registered handlers.

use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use tracing::info;

use crate::domain::{Handler, TechnicalDomain};

/// Point-in-time handler counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthSummary {
    pub total: usize,
    pub available: usize,
}

/// Registered handlers in registration order.
///
/// Cloning shares the underlying registry. Readers always receive snapshots;
/// the stored list is only changed by [`register`](Self::register) and
/// [`unregister`](Self::unregister).
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: Arc<RwLock<Vec<Arc<dyn Handler>>>>,
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers_count", &self.len())
            .finish()
    }
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler. A handler with the same id is replaced in place,
    /// keeping its original position.
    pub fn register(&self, handler: Arc<dyn Handler>) {
        let mut guard = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = guard.iter_mut().find(|h| h.id() == handler.id()) {
            info!(handler_id = handler.id(), "Replaced handler");
            *slot = handler;
        } else {
            info!(handler_id = handler.id(), domain = %handler.domain(), "Registered handler");
            guard.push(handler);
        }
    }

    /// Remove a handler by id. Returns whether it was registered.
    pub fn unregister(&self, id: &str) -> bool {
        let mut guard = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        let before = guard.len();
        guard.retain(|h| h.id() != id);
        let removed = guard.len() != before;
        if removed {
            info!(handler_id = id, "Unregistered handler");
        }
        removed
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Handler>> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|h| h.id() == id)
            .cloned()
    }

    /// Snapshot of every handler in registration order.
    pub fn list(&self) -> Vec<Arc<dyn Handler>> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Handlers declaring at least one of `tags`.
    pub fn filter_by_capabilities(&self, tags: &BTreeSet<String>) -> Vec<Arc<dyn Handler>> {
        self.list()
            .into_iter()
            .filter(|h| !h.capabilities().is_disjoint(tags))
            .collect()
    }

    pub fn filter_by_domain(&self, domain: TechnicalDomain) -> Vec<Arc<dyn Handler>> {
        self.list()
            .into_iter()
            .filter(|h| h.domain() == domain)
            .collect()
    }

    /// Counts handlers and asks each for its health right now.
    pub fn health_summary(&self) -> HealthSummary {
        let handlers = self.list();
        HealthSummary {
            total: handlers.len(),
            available: handlers.iter().filter(|h| h.is_healthy()).count(),
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
