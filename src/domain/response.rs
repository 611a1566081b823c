use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseStatus {
    Success,
    Failure,
    Pending,
    Stopped,
}

/// Outcome of one consultation.
///
/// Immutable after construction. Context enhancement and timing produce a
/// new value through [`Response::to_builder`] or the consuming helpers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    status: ResponseStatus,
    output: String,
    confidence: f64,
    recommendations: Vec<String>,
    processing_time_ms: u64,
    error: Option<String>,
    escalation_reason: Option<String>,
    result_context: HashMap<String, serde_json::Value>,
}

impl Response {
    pub fn builder(status: ResponseStatus) -> ResponseBuilder {
        ResponseBuilder {
            status,
            output: String::new(),
            confidence: 0.0,
            recommendations: Vec::new(),
            processing_time: Duration::ZERO,
            error: None,
            escalation_reason: None,
            result_context: HashMap::new(),
        }
    }

    pub fn success(output: impl Into<String>, confidence: f64) -> Self {
        Self::builder(ResponseStatus::Success)
            .output(output)
            .confidence(confidence)
            .build()
    }

    /// FAILURE response carrying `error` both as output and as the error message.
    pub fn failure(error: impl Into<String>) -> Self {
        let error = error.into();
        Self::builder(ResponseStatus::Failure)
            .output(error.clone())
            .error(error)
            .build()
    }

    pub fn status(&self) -> ResponseStatus {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn recommendations(&self) -> &[String] {
        &self.recommendations
    }

    pub fn processing_time(&self) -> Duration {
        Duration::from_millis(self.processing_time_ms)
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn escalation_reason(&self) -> Option<&str> {
        self.escalation_reason.as_deref()
    }

    pub fn result_context(&self) -> &HashMap<String, serde_json::Value> {
        &self.result_context
    }

    #[must_use]
    pub fn with_processing_time(self, elapsed: Duration) -> Self {
        Self {
            processing_time_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            ..self
        }
    }

    /// Builder seeded with every field of this response.
    pub fn to_builder(&self) -> ResponseBuilder {
        ResponseBuilder {
            status: self.status,
            output: self.output.clone(),
            confidence: self.confidence,
            recommendations: self.recommendations.clone(),
            processing_time: self.processing_time(),
            error: self.error.clone(),
            escalation_reason: self.escalation_reason.clone(),
            result_context: self.result_context.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResponseBuilder {
    status: ResponseStatus,
    output: String,
    confidence: f64,
    recommendations: Vec<String>,
    processing_time: Duration,
    error: Option<String>,
    escalation_reason: Option<String>,
    result_context: HashMap<String, serde_json::Value>,
}

impl ResponseBuilder {
    #[must_use]
    pub fn output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    /// Clamped to `[0, 1]`; NaN becomes 0.
    #[must_use]
    pub fn confidence(mut self, confidence: f64) -> Self {
        self.confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        self
    }

    #[must_use]
    pub fn recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendations.push(recommendation.into());
        self
    }

    #[must_use]
    pub fn recommendations<I, S>(mut self, recommendations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.recommendations
            .extend(recommendations.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn processing_time(mut self, elapsed: Duration) -> Self {
        self.processing_time = elapsed;
        self
    }

    #[must_use]
    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    #[must_use]
    pub fn escalation_reason(mut self, reason: impl Into<String>) -> Self {
        self.escalation_reason = Some(reason.into());
        self
    }

    #[must_use]
    pub fn result(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.result_context.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Response {
        Response {
            status: self.status,
            output: self.output,
            confidence: self.confidence,
            recommendations: self.recommendations,
            processing_time_ms: u64::try_from(self.processing_time.as_millis())
                .unwrap_or(u64::MAX),
            error: self.error,
            escalation_reason: self.escalation_reason,
            result_context: self.result_context,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_is_clamped() {
        assert!((Response::success("ok", 1.7).confidence() - 1.0).abs() < f64::EPSILON);
        assert!(Response::success("ok", -0.3).confidence().abs() < f64::EPSILON);
        assert!(Response::success("ok", f64::NAN).confidence().abs() < f64::EPSILON);
    }

    #[test]
    fn test_failure_carries_error() {
        let response = Response::failure("Authentication failed: Invalid security credentials");
        assert_eq!(response.status(), ResponseStatus::Failure);
        assert!(!response.is_success());
        assert_eq!(
            response.error(),
            Some("Authentication failed: Invalid security credentials")
        );
    }

    #[test]
    fn test_to_builder_leaves_original_untouched() {
        let original = Response::builder(ResponseStatus::Success)
            .output("guidance")
            .recommendation("first")
            .build();
        let enhanced = original.to_builder().recommendation("second").build();

        assert_eq!(original.recommendations(), ["first"]);
        assert_eq!(enhanced.recommendations(), ["first", "second"]);
        assert_eq!(enhanced.output(), "guidance");
    }

    #[test]
    fn test_with_processing_time() {
        let response = Response::success("ok", 0.9).with_processing_time(Duration::from_millis(42));
        assert_eq!(response.processing_time(), Duration::from_millis(42));
    }
}
