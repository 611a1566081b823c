//! Static service mappings, routing rules and fallback chains.

use std::collections::HashMap;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoutingPriority {
    Critical,
    High,
    Medium,
    Low,
}

/// Handlers mapped to one service: a primary plus supporting handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceMapping {
    pub primary: String,
    pub supporting: Vec<String>,
}

/// Routing preferences for one service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutingRule {
    pub primary: String,
    pub preferred: Vec<String>,
    pub priority: RoutingPriority,
    pub requires_specialization: bool,
}

/// Chain used when a handler has no explicit fallback chain.
pub const DEFAULT_FALLBACK_CHAIN: [&str; 2] = ["spring-boot-developer", "microservices-architect"];

const CORE_SERVICES: [&str; 9] = [
    "pos-catalog",
    "pos-customer",
    "pos-inventory",
    "pos-order",
    "pos-invoice",
    "pos-people",
    "pos-location",
    "pos-image",
    "pos-inquiry",
];

/// Lookup tables consulted by the router.
#[derive(Debug, Clone, Default)]
pub struct RoutingRules {
    mappings: HashMap<String, ServiceMapping>,
    rules: HashMap<String, RoutingRule>,
    fallback_chains: HashMap<String, Vec<String>>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

impl RoutingRules {
    /// Empty tables. Every lookup misses and fallback chains use the default.
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_mapping(mut self, service: &str, primary: &str, supporting: &[&str]) -> Self {
        self.mappings.insert(
            service.to_string(),
            ServiceMapping {
                primary: primary.to_string(),
                supporting: strings(supporting),
            },
        );
        self
    }

    #[must_use]
    pub fn with_rule(
        mut self,
        service: &str,
        primary: &str,
        preferred: &[&str],
        priority: RoutingPriority,
        requires_specialization: bool,
    ) -> Self {
        self.rules.insert(
            service.to_string(),
            RoutingRule {
                primary: primary.to_string(),
                preferred: strings(preferred),
                priority,
                requires_specialization,
            },
        );
        self
    }

    #[must_use]
    pub fn with_fallback_chain(mut self, handler: &str, chain: &[&str]) -> Self {
        self.fallback_chains.insert(handler.to_string(), strings(chain));
        self
    }

    pub fn mapping(&self, service: &str) -> Option<&ServiceMapping> {
        self.mappings.get(service)
    }

    pub fn primary_handler(&self, service: &str) -> Option<&str> {
        self.mappings.get(service).map(|m| m.primary.as_str())
    }

    pub fn supporting_handlers(&self, service: &str) -> &[String] {
        self.mappings
            .get(service)
            .map_or(&[], |m| m.supporting.as_slice())
    }

    pub fn rule(&self, service: &str) -> Option<&RoutingRule> {
        self.rules.get(service)
    }

    /// Priority of a service; unknown services are MEDIUM.
    pub fn priority(&self, service: &str) -> RoutingPriority {
        self.rules
            .get(service)
            .map_or(RoutingPriority::Medium, |r| r.priority)
    }

    pub fn requires_specialization(&self, service: &str) -> bool {
        self.rules
            .get(service)
            .is_some_and(|r| r.requires_specialization)
    }

    pub fn fallback_chain(&self, handler: &str) -> Vec<String> {
        self.fallback_chains
            .get(handler)
            .cloned()
            .unwrap_or_else(|| strings(&DEFAULT_FALLBACK_CHAIN))
    }

    /// The tables for the bundled service catalogue.
    pub fn builtin() -> Self {
        use RoutingPriority::{Critical, High, Medium};

        let mut rules = Self::empty()
            .with_mapping(
                "pos-api-gateway",
                "api-gateway-specialist",
                &["api-gateway-specialist", "security-specialist", "observability-engineer"],
            )
            .with_mapping(
                "pos-security-service",
                "security-specialist",
                &["security-specialist", "configuration-management", "observability-engineer"],
            )
            .with_mapping(
                "pos-catalog",
                "spring-boot-developer",
                &["spring-boot-developer", "database-per-service-specialist", "business-domain"],
            )
            .with_mapping(
                "pos-customer",
                "spring-boot-developer",
                &["spring-boot-developer", "database-per-service-specialist", "business-domain"],
            )
            .with_mapping(
                "pos-inventory",
                "spring-boot-developer",
                &["spring-boot-developer", "database-per-service-specialist", "business-domain"],
            )
            .with_mapping(
                "pos-vehicle-inventory",
                "business-domain",
                &["business-domain", "spring-boot-developer", "database-per-service-specialist"],
            )
            .with_mapping(
                "pos-order",
                "spring-boot-developer",
                &["spring-boot-developer", "event-driven-specialist", "business-domain"],
            )
            .with_mapping(
                "pos-invoice",
                "spring-boot-developer",
                &["spring-boot-developer", "business-domain", "database-per-service-specialist"],
            )
            .with_mapping(
                "pos-price",
                "business-domain",
                &["business-domain", "spring-boot-developer", "database-per-service-specialist"],
            )
            .with_mapping(
                "pos-accounting",
                "business-domain",
                &["business-domain", "spring-boot-developer", "database-per-service-specialist"],
            )
            .with_mapping(
                "pos-work-order",
                "business-domain",
                &["business-domain", "spring-boot-developer", "event-driven-specialist"],
            )
            .with_mapping(
                "pos-people",
                "spring-boot-developer",
                &["spring-boot-developer", "security-specialist", "database-per-service-specialist"],
            )
            .with_mapping(
                "pos-location",
                "spring-boot-developer",
                &["spring-boot-developer", "database-per-service-specialist", "business-domain"],
            )
            .with_mapping(
                "pos-events",
                "event-driven-specialist",
                &["event-driven-specialist", "spring-boot-developer", "observability-engineer"],
            )
            .with_mapping(
                "pos-event-receiver",
                "event-driven-specialist",
                &["event-driven-specialist", "spring-boot-developer", "resilience-engineering"],
            )
            .with_mapping(
                "pos-image",
                "spring-boot-developer",
                &["spring-boot-developer", "database-per-service-specialist", "containerization-specialist"],
            )
            .with_mapping(
                "pos-vehicle-fitment",
                "business-domain",
                &["business-domain", "spring-boot-developer", "database-per-service-specialist"],
            )
            .with_mapping(
                "pos-vehicle-reference-data",
                "business-domain",
                &["business-domain", "spring-boot-developer", "database-per-service-specialist"],
            )
            .with_mapping(
                "pos-inquiry",
                "spring-boot-developer",
                &["spring-boot-developer", "business-domain", "database-per-service-specialist"],
            )
            .with_mapping(
                "pos-shop-manager",
                "business-domain",
                &["business-domain", "spring-boot-developer", "event-driven-specialist"],
            )
            .with_mapping(
                "pos-service-discovery",
                "microservices-architect",
                &["microservices-architect", "containerization-specialist", "observability-engineer"],
            )
            .with_mapping(
                "pos-config-server",
                "configuration-management",
                &["configuration-management", "security-specialist", "microservices-architect"],
            );

        rules = rules
            .with_rule(
                "pos-api-gateway",
                "api-gateway-specialist",
                &["api-gateway-specialist", "security-specialist", "observability-engineer"],
                High,
                true,
            )
            .with_rule(
                "pos-security-service",
                "security-specialist",
                &["security-specialist", "configuration-management", "observability-engineer"],
                Critical,
                true,
            )
            .with_rule(
                "pos-events",
                "event-driven-specialist",
                &["event-driven-specialist", "spring-boot-developer", "observability-engineer"],
                High,
                true,
            )
            .with_rule(
                "pos-event-receiver",
                "event-driven-specialist",
                &["event-driven-specialist", "resilience-engineering", "spring-boot-developer"],
                High,
                true,
            )
            .with_rule(
                "pos-vehicle-inventory",
                "business-domain",
                &["business-domain", "spring-boot-developer", "database-per-service-specialist"],
                High,
                false,
            )
            .with_rule(
                "pos-vehicle-fitment",
                "business-domain",
                &["business-domain", "spring-boot-developer", "database-per-service-specialist"],
                High,
                false,
            )
            .with_rule(
                "pos-vehicle-reference-data",
                "business-domain",
                &["business-domain", "spring-boot-developer", "api-gateway-specialist"],
                Medium,
                false,
            );

        for service in CORE_SERVICES {
            rules = rules.with_rule(
                service,
                "spring-boot-developer",
                &["spring-boot-developer", "database-per-service-specialist", "business-domain"],
                Medium,
                false,
            );
        }

        for service in ["pos-price", "pos-accounting"] {
            rules = rules.with_rule(
                service,
                "business-domain",
                &["business-domain", "spring-boot-developer", "database-per-service-specialist"],
                High,
                false,
            );
        }

        for service in ["pos-work-order", "pos-shop-manager"] {
            rules = rules.with_rule(
                service,
                "business-domain",
                &["business-domain", "spring-boot-developer", "event-driven-specialist"],
                High,
                false,
            );
        }

        rules
            .with_rule(
                "pos-service-discovery",
                "microservices-architect",
                &["microservices-architect", "containerization-specialist", "observability-engineer"],
                High,
                true,
            )
            .with_rule(
                "pos-config-server",
                "configuration-management",
                &["configuration-management", "security-specialist", "microservices-architect"],
                High,
                true,
            )
            .with_fallback_chain("api-gateway-specialist", &["microservices-architect", "spring-boot-developer"])
            .with_fallback_chain("security-specialist", &["microservices-architect", "spring-boot-developer"])
            .with_fallback_chain("event-driven-specialist", &["spring-boot-developer", "microservices-architect"])
            .with_fallback_chain("business-domain", &["spring-boot-developer", "microservices-architect"])
            .with_fallback_chain(
                "database-per-service-specialist",
                &["spring-boot-developer", "microservices-architect"],
            )
            .with_fallback_chain(
                "microservices-testing-specialist",
                &["spring-boot-developer", "microservices-architect"],
            )
            .with_fallback_chain(
                "containerization-specialist",
                &["microservices-architect", "spring-boot-developer"],
            )
            .with_fallback_chain("observability-engineer", &["microservices-architect", "spring-boot-developer"])
            .with_fallback_chain("microservices-architect", &["spring-boot-developer"])
            .with_fallback_chain("spring-boot-developer", &["microservices-architect"])
            .with_fallback_chain("cicd-pipeline", &["containerization-specialist", "microservices-architect"])
            .with_fallback_chain("configuration-management", &["security-specialist", "microservices-architect"])
            .with_fallback_chain("resilience-engineering", &["microservices-architect", "spring-boot-developer"])
    }
}
