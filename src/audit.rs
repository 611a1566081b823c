//! Append-only audit trail.
//!
//! [`AuditTrail::record`] is synchronous, infallible and never waits on I/O.
//! Entries are kept in memory and, when a sink is attached, forwarded over an
//! unbounded channel to a background task that owns the sink.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::domain::{AuditAction, AuditEntry};

/// Durable destination for audit entries.
#[async_trait]
pub trait AuditSink: Send + Sync + fmt::Debug {
    async fn write(&self, entry: &AuditEntry) -> anyhow::Result<()>;
}

/// Emits each entry as a structured `audit` log event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn write(&self, entry: &AuditEntry) -> anyhow::Result<()> {
        info!(
            target: "audit",
            user_id = %entry.user_id,
            handler_id = entry.handler_id.as_deref().unwrap_or("-"),
            action = %entry.action,
            success = entry.success,
            error = entry.error.as_deref().unwrap_or(""),
            "Audit entry"
        );
        Ok(())
    }
}

/// Totals over the recorded entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComplianceSummary {
    pub total: usize,
    pub successes: usize,
    pub failures: usize,
    pub by_action: BTreeMap<AuditAction, usize>,
    pub distinct_users: usize,
}

#[derive(Clone, Default)]
pub struct AuditTrail {
    entries: Arc<RwLock<Vec<AuditEntry>>>,
    forward: Option<mpsc::UnboundedSender<AuditEntry>>,
}

impl fmt::Debug for AuditTrail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditTrail")
            .field("entries", &self.len())
            .field("forwarding", &self.forward.is_some())
            .finish()
    }
}

impl AuditTrail {
    /// In-memory trail with no sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Trail that also forwards every entry to `sink` from a spawned task.
    ///
    /// Must be called within a tokio runtime. The task ends once every clone
    /// of the returned trail has been dropped.
    pub fn with_sink(sink: Arc<dyn AuditSink>) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<AuditEntry>();
        let handle = tokio::spawn(async move {
            while let Some(entry) = rx.recv().await {
                if let Err(e) = sink.write(&entry).await {
                    warn!(error = %e, action = %entry.action, "Failed to write audit entry");
                }
            }
        });
        (
            Self {
                entries: Arc::default(),
                forward: Some(tx),
            },
            handle,
        )
    }

    /// Append an entry. Never fails and never blocks on the sink.
    pub fn record(&self, entry: AuditEntry) {
        if let Some(tx) = &self.forward
            && tx.send(entry.clone()).is_err()
        {
            warn!(action = %entry.action, "Audit sink closed; entry kept in memory only");
        }
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }

    /// Entries for `user_id` with `from <= timestamp <= to`, in insertion order.
    pub fn query(&self, user_id: &str, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<AuditEntry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| e.user_id == user_id && e.timestamp >= from && e.timestamp <= to)
            .cloned()
            .collect()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn compliance_summary(&self) -> ComplianceSummary {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut by_action = BTreeMap::new();
        let mut users = std::collections::BTreeSet::new();
        let mut successes = 0;
        for entry in entries.iter() {
            *by_action.entry(entry.action).or_insert(0) += 1;
            users.insert(entry.user_id.as_str());
            if entry.success {
                successes += 1;
            }
        }
        ComplianceSummary {
            total: entries.len(),
            successes,
            failures: entries.len() - successes,
            by_action,
            distinct_users: users.len(),
        }
    }
}
