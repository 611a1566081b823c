//! Per-session conversation state.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default session timeout (30 minutes).
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Progress and decisions accumulated across consultations in one session.
///
/// Values are snapshots: the [`SessionStore`](super::SessionStore) owns the
/// live copy and hands out clones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub task_objective: Option<String>,
    pub decisions: BTreeMap<String, String>,
    pub next_steps: Vec<String>,
}

impl SessionContext {
    pub(crate) fn new_at(session_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            session_id: session_id.into(),
            created_at: now,
            last_updated: now,
            task_objective: None,
            decisions: BTreeMap::new(),
            next_steps: Vec::new(),
        }
    }

    /// Replace objective, decisions and next steps in one step.
    pub(crate) fn update_progress_at(
        &mut self,
        objective: Option<String>,
        decisions: BTreeMap<String, String>,
        next_steps: Vec<String>,
        now: DateTime<Utc>,
    ) {
        self.task_objective = objective;
        self.decisions = decisions;
        self.next_steps = next_steps;
        self.last_updated = now;
    }

    /// True once more than `timeout` has passed since the last update.
    ///
    /// A `last_updated` in the future (clock skew) never counts as stale.
    #[must_use]
    pub fn is_stale_at(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        (now - self.last_updated)
            .to_std()
            .is_ok_and(|elapsed| elapsed > timeout)
    }

    #[must_use]
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        (now - self.created_at).to_std().unwrap_or(Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staleness_boundary() {
        let start = Utc::now();
        let session = SessionContext::new_at("s", start);

        let exactly = start + chrono::Duration::minutes(30);
        assert!(!session.is_stale_at(exactly, DEFAULT_SESSION_TIMEOUT));

        let later = start + chrono::Duration::minutes(31);
        assert!(session.is_stale_at(later, DEFAULT_SESSION_TIMEOUT));
    }

    #[test]
    fn test_future_timestamp_is_not_stale() {
        let now = Utc::now();
        let session = SessionContext::new_at("s", now + chrono::Duration::hours(1));
        assert!(!session.is_stale_at(now, DEFAULT_SESSION_TIMEOUT));
        assert_eq!(session.age_at(now), Duration::ZERO);
    }

    #[test]
    fn test_update_progress_replaces_values() {
        let start = Utc::now();
        let mut session = SessionContext::new_at("s", start);
        session.next_steps.push("old".into());

        let later = start + chrono::Duration::seconds(5);
        session.update_progress_at(
            Some("Design order events".into()),
            BTreeMap::from([("broker".to_string(), "kafka".to_string())]),
            vec!["Define schema".into()],
            later,
        );

        assert_eq!(session.task_objective.as_deref(), Some("Design order events"));
        assert_eq!(session.next_steps, vec!["Define schema".to_string()]);
        assert_eq!(session.last_updated, later);
        assert_eq!(session.created_at, start);
    }
}
