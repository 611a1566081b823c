use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use super::detector::ServiceDetector;
use super::rules::RoutingRules;
use super::selector::ContextSelector;
use crate::domain::{Handler, Request, RoutingResult, RoutingStage};

/// Default number of selector suggestions appended to the detector's.
pub const DEFAULT_MAX_SUGGESTIONS: usize = 5;

/// A routing decision together with the handler it selected.
#[derive(Debug, Clone)]
pub struct RouteDecision {
    pub result: RoutingResult,
    pub handler: Option<Arc<dyn Handler>>,
}

impl RouteDecision {
    fn selected(handler: &Arc<dyn Handler>, target: Option<String>, stage: RoutingStage) -> Self {
        Self {
            result: RoutingResult::selected(handler.id(), target, stage),
            handler: Some(Arc::clone(handler)),
        }
    }
}

/// First healthy handler, in registration order, that serves `tag`.
fn find_available<'a>(handlers: &'a [Arc<dyn Handler>], tag: &str) -> Option<&'a Arc<dyn Handler>> {
    handlers.iter().find(|h| h.is_healthy() && h.serves(tag))
}

/// Multi-stage routing cascade.
///
/// Every method is a pure function of the request, the handler snapshot and
/// the rules table, so a decision can be recomputed at will.
#[derive(Debug, Clone)]
pub struct IntelligentRouter {
    detector: ServiceDetector,
    selector: ContextSelector,
    rules: Arc<RoutingRules>,
    max_suggestions: usize,
}

impl Default for IntelligentRouter {
    fn default() -> Self {
        Self::new(RoutingRules::builtin())
    }
}

impl IntelligentRouter {
    pub fn new(rules: RoutingRules) -> Self {
        Self {
            detector: ServiceDetector::new(),
            selector: ContextSelector::new(),
            rules: Arc::new(rules),
            max_suggestions: DEFAULT_MAX_SUGGESTIONS,
        }
    }

    #[must_use]
    pub fn with_max_suggestions(mut self, max_suggestions: usize) -> Self {
        self.max_suggestions = max_suggestions;
        self
    }

    pub fn rules(&self) -> &RoutingRules {
        &self.rules
    }

    pub fn detector(&self) -> &ServiceDetector {
        &self.detector
    }

    pub fn selector(&self) -> &ContextSelector {
        &self.selector
    }

    /// Run the full cascade: primary mapping, context-based selection,
    /// rule fallback, then any healthy handler.
    #[instrument(skip_all, fields(request_id = %request.id(), request_type = %request.request_type()))]
    pub fn route(&self, request: &Request, handlers: &[Arc<dyn Handler>]) -> RouteDecision {
        let text = ServiceDetector::request_text(request);
        let detection = self.detector.detect_text(&text);
        let service = detection.detected_service.clone();

        if let Some(service) = service.as_deref()
            && let Some(primary) = self.rules.primary_handler(service)
            && let Some(handler) = find_available(handlers, primary)
        {
            info!(handler_id = handler.id(), service, "Routing to primary mapping");
            return RouteDecision::selected(handler, Some(service.to_string()), RoutingStage::PrimaryMapping);
        }

        let mut suggestions = detection.suggestions;
        let ranked = self.selector.top_n(&text, self.max_suggestions, |tag| {
            find_available(handlers, tag).is_some()
        });
        for tag in ranked {
            if !suggestions.contains(&tag) {
                suggestions.push(tag);
            }
        }
        for tag in &suggestions {
            if let Some(handler) = find_available(handlers, tag) {
                info!(handler_id = handler.id(), tag = %tag, "Routing to suggested handler");
                return RouteDecision::selected(handler, service, RoutingStage::ContextBasedSelection);
            }
        }

        if let Some(rule) = service.as_deref().and_then(|s| self.rules.rule(s)) {
            let chain = self.rules.fallback_chain(&rule.primary);
            for tag in rule.preferred.iter().chain(chain.iter()) {
                if let Some(handler) = find_available(handlers, tag) {
                    info!(handler_id = handler.id(), tag = %tag, "Routing to fallback handler");
                    return RouteDecision::selected(handler, service, RoutingStage::FallbackSelection);
                }
            }
        }

        if let Some(handler) = handlers.iter().find(|h| h.is_healthy()) {
            warn!(handler_id = handler.id(), "Using any available handler as last resort");
            return RouteDecision::selected(handler, service, RoutingStage::LastResort);
        }

        error!(request_type = %request.request_type(), "No handlers available for request");
        RouteDecision {
            result: RoutingResult::failed(service),
            handler: None,
        }
    }

    /// Route to a named service: its primary handler, then its supporting
    /// handlers, then the regular cascade.
    pub fn route_to_service(
        &self,
        service: &str,
        request: &Request,
        handlers: &[Arc<dyn Handler>],
    ) -> RouteDecision {
        info!(service, "Routing request to specific service");

        if let Some(handler) = self
            .rules
            .primary_handler(service)
            .and_then(|primary| find_available(handlers, primary))
        {
            return RouteDecision::selected(handler, Some(service.to_string()), RoutingStage::ServiceSpecific);
        }

        for tag in self.rules.supporting_handlers(service) {
            if let Some(handler) = find_available(handlers, tag) {
                return RouteDecision::selected(
                    handler,
                    Some(service.to_string()),
                    RoutingStage::SupportingHandler,
                );
            }
        }

        self.route(request, handlers)
    }

    /// Best handler for a bare domain or technology name.
    pub fn best_for_domain(&self, domain: &str, handlers: &[Arc<dyn Handler>]) -> RouteDecision {
        let request = Request::builder(domain, format!("Request for domain: {domain}"))
            .context("type", "domain-specific")
            .build();
        let detection = self.detector.detect(&request);

        let primary = detection
            .detected_service
            .as_deref()
            .and_then(|s| self.rules.primary_handler(s))
            .unwrap_or(detection.primary_suggestion.as_str());

        if let Some(handler) = find_available(handlers, primary) {
            return RouteDecision::selected(handler, Some(domain.to_string()), RoutingStage::DomainSpecific);
        }

        for tag in &detection.suggestions {
            if let Some(handler) = find_available(handlers, tag) {
                return RouteDecision::selected(handler, Some(domain.to_string()), RoutingStage::DomainSuggestion);
            }
        }

        let mut result = RoutingResult::failed(Some(domain.to_string()));
        result.error = Some(format!("No suitable agent found for domain: {domain}"));
        RouteDecision { result, handler: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{HandlerStatus, TechnicalDomain};
    use crate::handlers::StaticHandler;
    use crate::routing::rules::RoutingPriority;

    fn handler(id: &str, domain: TechnicalDomain) -> Arc<dyn Handler> {
        Arc::new(StaticHandler::new(id, domain))
    }

    fn unhealthy(id: &str) -> Arc<dyn Handler> {
        let h = StaticHandler::new(id, TechnicalDomain::Implementation);
        h.set_status(HandlerStatus::Unavailable);
        Arc::new(h)
    }

    #[test]
    fn test_primary_mapping_wins_when_service_detected() {
        let router = IntelligentRouter::default();
        let handlers = vec![
            handler("spring-boot-developer", TechnicalDomain::Implementation),
            handler("event-driven-specialist", TechnicalDomain::EventDrivenArchitecture),
        ];
        let request = Request::builder("consult", "Add kafka consumer to pos-events").build();

        let decision = router.route(&request, &handlers);
        assert_eq!(decision.result.reason, "primary mapping");
        assert_eq!(decision.result.selected_handler.as_deref(), Some("event-driven-specialist"));
        assert_eq!(decision.result.target_service.as_deref(), Some("pos-events"));
    }

    #[test]
    fn test_context_based_selection_without_service() {
        let router = IntelligentRouter::default();
        let handlers = vec![
            handler("spring-boot-developer", TechnicalDomain::Implementation),
            handler("event-driven-specialist", TechnicalDomain::EventDrivenArchitecture),
        ];
        let request = Request::builder(
            "event-schema-design",
            "Design event schema for order processing",
        )
        .build();

        let decision = router.route(&request, &handlers);
        assert!(decision.result.success);
        assert_eq!(decision.result.stage, RoutingStage::ContextBasedSelection);
        assert_eq!(decision.result.selected_handler.as_deref(), Some("event-driven-specialist"));
    }

    #[test]
    fn test_selector_suggestions_follow_detector_suggestions() {
        let router = IntelligentRouter::default();
        // "grafana" only appears in the selector keyword table.
        let handlers = vec![handler("observability-engineer", TechnicalDomain::Observability)];
        let request = Request::builder("dashboards", "grafana panels").build();

        let decision = router.route(&request, &handlers);
        assert_eq!(decision.result.stage, RoutingStage::ContextBasedSelection);
        assert_eq!(decision.result.selected_handler.as_deref(), Some("observability-engineer"));
    }

    #[test]
    fn test_rule_fallback_when_primary_and_suggestions_unavailable() {
        let rules = RoutingRules::empty()
            .with_mapping("pos-events", "event-driven-specialist", &[])
            .with_rule(
                "pos-events",
                "event-driven-specialist",
                &["event-driven-specialist", "observability-engineer"],
                RoutingPriority::High,
                true,
            );
        let router = IntelligentRouter::new(rules);
        let handlers = vec![
            unhealthy("event-driven-specialist"),
            handler("observability-engineer", TechnicalDomain::Observability),
        ];
        let request = Request::builder("consult", "pos-events").build();

        let decision = router.route(&request, &handlers);
        assert_eq!(decision.result.reason, "fallback selection");
        assert_eq!(decision.result.selected_handler.as_deref(), Some("observability-engineer"));
    }

    #[test]
    fn test_last_resort_takes_first_healthy_in_registration_order() {
        let router = IntelligentRouter::default();
        let handlers = vec![
            unhealthy("a"),
            handler("b", TechnicalDomain::Documentation),
            handler("c", TechnicalDomain::Testing),
        ];
        let request = Request::builder("misc", "nothing recognisable").build();

        let decision = router.route(&request, &handlers);
        assert_eq!(decision.result.reason, "last resort selection");
        assert_eq!(decision.result.selected_handler.as_deref(), Some("b"));
    }

    #[test]
    fn test_failed_when_nothing_is_healthy() {
        let router = IntelligentRouter::default();
        let handlers = vec![unhealthy("a")];
        let request = Request::builder("misc", "touch pos-order").build();

        let decision = router.route(&request, &handlers);
        assert!(!decision.result.success);
        assert!(decision.handler.is_none());
        assert_eq!(decision.result.error.as_deref(), Some(RoutingResult::NO_HANDLERS));
        assert_eq!(decision.result.target_service.as_deref(), Some("pos-order"));

        let empty = router.route(&Request::builder("misc", "x").build(), &[]);
        assert_eq!(empty.result.target_service.as_deref(), Some("unknown"));
    }

    #[test]
    fn test_route_is_repeatable() {
        let router = IntelligentRouter::default();
        let handlers = vec![handler("security-specialist", TechnicalDomain::Security)];
        let request = Request::builder("auth", "jwt validation").build();
        assert_eq!(router.route(&request, &handlers).result, router.route(&request, &handlers).result);
    }

    #[test]
    fn test_route_to_service_stages() {
        let router = IntelligentRouter::default();
        let request = Request::builder("consult", "anything").build();

        let primary = vec![handler("configuration-management", TechnicalDomain::ConfigurationManagement)];
        let decision = router.route_to_service("pos-config-server", &request, &primary);
        assert_eq!(decision.result.reason, "service-specific routing");

        let supporting = vec![handler("security-specialist", TechnicalDomain::Security)];
        let decision = router.route_to_service("pos-config-server", &request, &supporting);
        assert_eq!(decision.result.reason, "supporting handler selection");

        let other = vec![handler("documentation-specialist", TechnicalDomain::Documentation)];
        let decision = router.route_to_service("pos-config-server", &request, &other);
        assert_eq!(decision.result.reason, "last resort selection");
    }

    #[test]
    fn test_best_for_domain() {
        let router = IntelligentRouter::default();
        let handlers = vec![
            handler("spring-boot-developer", TechnicalDomain::Implementation),
            handler("event-driven-specialist", TechnicalDomain::EventDrivenArchitecture),
        ];

        let decision = router.best_for_domain("kafka", &handlers);
        assert_eq!(decision.result.reason, "domain-specific selection");
        assert_eq!(decision.result.selected_handler.as_deref(), Some("event-driven-specialist"));

        let missing = router.best_for_domain("kafka", &handlers[..1]);
        assert!(!missing.result.success);
        assert_eq!(
            missing.result.error.as_deref(),
            Some("No suitable agent found for domain: kafka")
        );
    }
}
