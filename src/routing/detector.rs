//! Service and capability detection from request text.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::domain::Request;

/// Capability tag suggested when no keyword matches.
pub const DEFAULT_TAG: &str = "spring-boot-developer";

/// Ordered (needle, service) pairs. Each needle is matched against the whole
/// request text as `.*needle.*`, case-insensitively. First match wins.
const SERVICE_PATTERNS: &[(&str, &str)] = &[
    ("pos-api-gateway", "pos-api-gateway"),
    ("pos-security", "pos-security-service"),
    ("pos-catalog", "pos-catalog"),
    ("pos-customer", "pos-customer"),
    ("pos-inventory", "pos-inventory"),
    ("pos-vehicle-inventory", "pos-vehicle-inventory"),
    ("pos-order", "pos-order"),
    ("pos-invoice", "pos-invoice"),
    ("pos-price", "pos-price"),
    ("pos-accounting", "pos-accounting"),
    ("pos-work-order", "pos-work-order"),
    ("pos-people", "pos-people"),
    ("pos-location", "pos-location"),
    ("pos-events", "pos-events"),
    ("pos-event-receiver", "pos-event-receiver"),
    ("pos-image", "pos-image"),
    ("pos-vehicle-fitment", "pos-vehicle-fitment"),
    ("pos-vehicle-reference", "pos-vehicle-reference-data"),
    ("pos-inquiry", "pos-inquiry"),
    ("pos-shop-manager", "pos-shop-manager"),
    ("pos-service-discovery", "pos-service-discovery"),
    ("pos-config-server", "pos-config-server"),
];

/// Ordered keyword to capability-tag dictionary, matched by substring.
const DOMAIN_KEYWORDS: &[(&str, &str)] = &[
    ("microservice", "microservices-architect"),
    ("architecture", "microservices-architect"),
    ("service-boundary", "microservices-architect"),
    ("spring-boot", "spring-boot-developer"),
    ("rest-api", "spring-boot-developer"),
    ("controller", "spring-boot-developer"),
    ("service-layer", "spring-boot-developer"),
    ("jwt", "security-specialist"),
    ("authentication", "security-specialist"),
    ("authorization", "security-specialist"),
    ("oauth", "security-specialist"),
    ("database", "database-per-service-specialist"),
    ("jpa", "database-per-service-specialist"),
    ("repository", "database-per-service-specialist"),
    ("migration", "database-per-service-specialist"),
    ("event", "event-driven-specialist"),
    ("kafka", "event-driven-specialist"),
    ("messaging", "event-driven-specialist"),
    ("async", "event-driven-specialist"),
    ("gateway", "api-gateway-specialist"),
    ("routing", "api-gateway-specialist"),
    ("load-balancing", "api-gateway-specialist"),
    ("test", "microservices-testing-specialist"),
    ("junit", "microservices-testing-specialist"),
    ("integration-test", "microservices-testing-specialist"),
    ("docker", "containerization-specialist"),
    ("kubernetes", "containerization-specialist"),
    ("deployment", "containerization-specialist"),
    ("vehicle", "business-domain"),
    ("automotive", "business-domain"),
    ("fitment", "business-domain"),
    ("pricing", "business-domain"),
    ("monitoring", "observability-engineer"),
    ("metrics", "observability-engineer"),
    ("tracing", "observability-engineer"),
    ("pipeline", "cicd-pipeline"),
    ("build", "cicd-pipeline"),
    ("deployment-strategy", "cicd-pipeline"),
    ("config", "configuration-management"),
    ("secrets", "configuration-management"),
    ("feature-flag", "configuration-management"),
    ("circuit-breaker", "resilience-engineering"),
    ("retry", "resilience-engineering"),
    ("failover", "resilience-engineering"),
];

static COMPILED_SERVICE_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    SERVICE_PATTERNS
        .iter()
        .map(|(needle, service)| {
            let pattern = format!("(?is)^.*{}.*$", regex::escape(needle));
            (
                Regex::new(&pattern).expect("service pattern is valid"),
                *service,
            )
        })
        .collect()
});

/// What the detector inferred from one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Detection {
    pub detected_service: Option<String>,
    /// First keyword tag, or [`DEFAULT_TAG`] when none matched.
    pub primary_suggestion: String,
    /// Primary suggestion followed by the remaining keyword tags, de-duplicated.
    pub suggestions: Vec<String>,
}

/// Stateless detector over the static pattern and keyword tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceDetector;

impl ServiceDetector {
    pub fn new() -> Self {
        Self
    }

    /// Text the detector and selector scan: type, target hint, description
    /// and the rendered context, space separated.
    pub fn request_text(request: &Request) -> String {
        let mut parts = vec![request.request_type()];
        if let Some(target) = request.target_service() {
            parts.push(target);
        }
        parts.push(request.description());
        let context = request.context_text();
        let mut text = parts.join(" ");
        if !context.is_empty() {
            text.push(' ');
            text.push_str(&context);
        }
        text
    }

    pub fn detect(&self, request: &Request) -> Detection {
        self.detect_text(&Self::request_text(request))
    }

    pub fn detect_text(&self, text: &str) -> Detection {
        let detected_service = self.detect_service(text).map(str::to_string);
        let tags = self.keyword_tags(text);

        let primary_suggestion = tags.first().copied().unwrap_or(DEFAULT_TAG).to_string();
        let mut suggestions = vec![primary_suggestion.clone()];
        for tag in tags {
            if !suggestions.iter().any(|s| s == tag) {
                suggestions.push(tag.to_string());
            }
        }

        Detection {
            detected_service,
            primary_suggestion,
            suggestions,
        }
    }

    pub fn detect_service(&self, text: &str) -> Option<&'static str> {
        COMPILED_SERVICE_PATTERNS
            .iter()
            .find(|(pattern, _)| pattern.is_match(text))
            .map(|(_, service)| *service)
    }

    /// Matched tags in dictionary order, de-duplicated.
    pub fn keyword_tags(&self, text: &str) -> Vec<&'static str> {
        let lower = text.to_lowercase();
        let mut tags: Vec<&'static str> = Vec::new();
        for (keyword, tag) in DOMAIN_KEYWORDS {
            if lower.contains(keyword) && !tags.contains(tag) {
                tags.push(tag);
            }
        }
        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_schema_request_suggests_event_handler() {
        let request = Request::builder(
            "event-schema-design",
            "Design event schema for order processing",
        )
        .build();

        let detection = ServiceDetector::new().detect(&request);
        assert_eq!(detection.detected_service, None);
        assert_eq!(detection.primary_suggestion, "event-driven-specialist");
        assert_eq!(detection.suggestions, vec!["event-driven-specialist"]);
    }

    #[test]
    fn test_service_detection_is_case_insensitive_and_ordered() {
        let detector = ServiceDetector::new();
        assert_eq!(
            detector.detect_service("Add a route to POS-API-GATEWAY"),
            Some("pos-api-gateway")
        );
        assert_eq!(
            detector.detect_service("pos-security hardening"),
            Some("pos-security-service")
        );
        // "pos-work-order" does not contain the literal "pos-order".
        assert_eq!(detector.detect_service("pos-work-order sla"), Some("pos-work-order"));
        assert_eq!(detector.detect_service("nothing here"), None);
    }

    #[test]
    fn test_service_detection_spans_newlines() {
        let detector = ServiceDetector::new();
        assert_eq!(
            detector.detect_service("first line\nthen pos-events\nlast"),
            Some("pos-events")
        );
    }

    #[test]
    fn test_default_suggestion_without_keywords() {
        let detection = ServiceDetector::new().detect_text("hello world");
        assert_eq!(detection.primary_suggestion, DEFAULT_TAG);
        assert_eq!(detection.suggestions, vec![DEFAULT_TAG]);
    }

    #[test]
    fn test_keyword_tags_follow_dictionary_order() {
        let tags = ServiceDetector::new().keyword_tags("Retry KAFKA consumer with JWT auth");
        assert_eq!(
            tags,
            vec!["security-specialist", "event-driven-specialist", "resilience-engineering"]
        );
    }

    #[test]
    fn test_request_text_includes_target_and_context() {
        let request = Request::builder("t", "d")
            .target_service("pos-order")
            .context("broker", "kafka")
            .build();
        assert_eq!(ServiceDetector::request_text(&request), "t pos-order d broker=kafka");
    }
}
