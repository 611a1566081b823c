use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

/// Caller identity and grants attached to a request.
///
/// Validity is judged by the [`SecurityGate`](crate::security::SecurityGate);
/// this type only carries what the caller supplied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityContext {
    pub token: String,
    pub user_id: String,
    #[serde(default)]
    pub roles: BTreeSet<String>,
    #[serde(default)]
    pub permissions: BTreeSet<String>,
    #[serde(default)]
    pub service_id: Option<String>,
    #[serde(default)]
    pub service_type: Option<String>,
}

impl SecurityContext {
    pub fn new(token: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            user_id: user_id.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions = permissions.into_iter().map(Into::into).collect();
        self
    }
}

/// An inbound consultation request. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    id: String,
    request_type: String,
    description: String,
    #[serde(default)]
    context: HashMap<String, serde_json::Value>,
    #[serde(default)]
    target_service: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    security: Option<SecurityContext>,
}

impl Request {
    pub fn builder(request_type: impl Into<String>, description: impl Into<String>) -> RequestBuilder {
        RequestBuilder {
            request_type: request_type.into(),
            description: description.into(),
            context: HashMap::new(),
            target_service: None,
            session_id: None,
            security: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn request_type(&self) -> &str {
        &self.request_type
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn context(&self) -> &HashMap<String, serde_json::Value> {
        &self.context
    }

    pub fn target_service(&self) -> Option<&str> {
        self.target_service.as_deref()
    }

    /// Session id, taken from the explicit field or the `session-id` context key.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id
            .as_deref()
            .or_else(|| self.context.get("session-id").and_then(|v| v.as_str()))
    }

    pub fn security(&self) -> Option<&SecurityContext> {
        self.security.as_ref()
    }

    /// Context values rendered as one line, keys sorted so the text is stable.
    pub fn context_text(&self) -> String {
        let mut keys: Vec<_> = self.context.keys().collect();
        keys.sort();
        keys.into_iter()
            .map(|k| match &self.context[k] {
                serde_json::Value::String(s) => format!("{k}={s}"),
                other => format!("{k}={other}"),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Builder for [`Request`].
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    request_type: String,
    description: String,
    context: HashMap<String, serde_json::Value>,
    target_service: Option<String>,
    session_id: Option<String>,
    security: Option<SecurityContext>,
}

impl RequestBuilder {
    #[must_use]
    pub fn context(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn target_service(mut self, service: impl Into<String>) -> Self {
        self.target_service = Some(service.into());
        self
    }

    #[must_use]
    pub fn session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    #[must_use]
    pub fn security(mut self, security: SecurityContext) -> Self {
        self.security = Some(security);
        self
    }

    pub fn build(self) -> Request {
        Request {
            id: Uuid::new_v4().to_string(),
            request_type: self.request_type,
            description: self.description,
            context: self.context,
            target_service: self.target_service,
            session_id: self.session_id,
            security: self.security,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_falls_back_to_context_key() {
        let request = Request::builder("event-schema-design", "Design schema")
            .context("session-id", "sess-42")
            .build();
        assert_eq!(request.session_id(), Some("sess-42"));

        let explicit = Request::builder("t", "d")
            .context("session-id", "ignored")
            .session("sess-1")
            .build();
        assert_eq!(explicit.session_id(), Some("sess-1"));
    }

    #[test]
    fn test_context_text_is_sorted() {
        let request = Request::builder("t", "d")
            .context("zeta", "kafka")
            .context("alpha", 3)
            .build();
        assert_eq!(request.context_text(), "alpha=3 zeta=kafka");
    }

    #[test]
    fn test_each_request_gets_unique_id() {
        let a = Request::builder("t", "d").build();
        let b = Request::builder("t", "d").build();
        assert_ne!(a.id(), b.id());
    }
}
