//! Keyword scoring of capability tags against request text.

use std::cmp::Ordering;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

const CONTEXT_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "spring-boot-developer",
        &["spring-boot", "rest-api", "jpa", "hibernate", "controller", "service", "repository"],
    ),
    (
        "microservices-architect",
        &["microservice", "architecture", "service-boundary", "integration", "scalability"],
    ),
    (
        "security-specialist",
        &["jwt", "authentication", "authorization", "security", "oauth", "ssl", "tls"],
    ),
    (
        "api-gateway-specialist",
        &["gateway", "routing", "load-balancing", "api-management", "zuul", "spring-cloud-gateway"],
    ),
    (
        "database-per-service-specialist",
        &["database", "postgresql", "mysql", "migration", "schema", "flyway", "liquibase"],
    ),
    (
        "containerization-specialist",
        &["docker", "kubernetes", "container", "deployment", "orchestration", "helm"],
    ),
    (
        "observability-engineer",
        &["monitoring", "tracing", "metrics", "prometheus", "grafana", "opentelemetry"],
    ),
    (
        "microservices-testing-specialist",
        &["testing", "junit", "testcontainers", "integration-test", "contract-test"],
    ),
    (
        "event-driven-specialist",
        &["kafka", "rabbitmq", "event", "messaging", "async", "event-sourcing", "cqrs"],
    ),
    (
        "cicd-pipeline-specialist",
        &["ci-cd", "pipeline", "jenkins", "github-actions", "deployment", "automation"],
    ),
    (
        "configuration-management-specialist",
        &["config", "configuration", "spring-cloud-config", "consul", "vault", "secrets"],
    ),
    (
        "resilience-engineering-specialist",
        &["circuit-breaker", "retry", "resilience", "chaos", "failover", "disaster-recovery"],
    ),
    (
        "business-domain-specialist",
        &["pos", "inventory", "customer", "order", "invoice", "automotive", "vehicle"],
    ),
    (
        "documentation-specialist",
        &["documentation", "openapi", "swagger", "api-docs", "readme"],
    ),
    (
        "spring-boot-pair-navigator",
        &["refactoring", "code-review", "best-practices", "pair-programming"],
    ),
];

struct Keyword {
    text: &'static str,
    whole_word: Regex,
}

static COMPILED_KEYWORDS: LazyLock<Vec<(&'static str, Vec<Keyword>)>> = LazyLock::new(|| {
    CONTEXT_KEYWORDS
        .iter()
        .map(|(tag, keywords)| {
            let compiled = keywords
                .iter()
                .map(|kw| Keyword {
                    text: kw,
                    whole_word: Regex::new(&format!(r"\b{}\b", regex::escape(kw)))
                        .expect("keyword pattern is valid"),
                })
                .collect();
            (*tag, compiled)
        })
        .collect()
});

/// One tag and its score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagScore {
    pub tag: String,
    pub score: f64,
}

/// Diagnostic view of a scoring run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextAnalysis {
    /// Every tag scoring above zero, best first.
    pub scores: Vec<TagScore>,
    pub suggested: Vec<String>,
    pub needs_multiple_handlers: bool,
}

/// Scores capability tags by keyword overlap with request text.
///
/// Ranking is deterministic: score descending, then tag ascending.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextSelector;

impl ContextSelector {
    pub fn new() -> Self {
        Self
    }

    fn score_keywords(text: &str, keywords: &[Keyword]) -> f64 {
        if keywords.is_empty() {
            return 0.0;
        }
        let mut score = 0.0;
        for keyword in keywords {
            let occurrences = text.matches(keyword.text).count();
            if occurrences == 0 {
                continue;
            }
            score += 1.0;
            if keyword.whole_word.is_match(text) {
                score += 0.5;
            }
            if occurrences > 1 {
                score += 0.2 * (occurrences - 1) as f64;
            }
        }
        score / keywords.len() as f64
    }

    /// Score of a single tag, or 0 for unknown tags.
    pub fn score(&self, text: &str, tag: &str) -> f64 {
        let lower = text.to_lowercase();
        COMPILED_KEYWORDS
            .iter()
            .find(|(t, _)| *t == tag)
            .map_or(0.0, |(_, keywords)| Self::score_keywords(&lower, keywords))
    }

    /// All tags with a positive score, ranked.
    pub fn scores(&self, text: &str) -> Vec<TagScore> {
        let lower = text.to_lowercase();
        let mut scores: Vec<TagScore> = COMPILED_KEYWORDS
            .iter()
            .map(|(tag, keywords)| TagScore {
                tag: (*tag).to_string(),
                score: Self::score_keywords(&lower, keywords),
            })
            .filter(|s| s.score > 0.0)
            .collect();
        scores.sort_by(rank);
        scores
    }

    /// Best-scoring tag accepted by `available`.
    pub fn select(&self, text: &str, available: impl Fn(&str) -> bool) -> Option<TagScore> {
        self.scores(text).into_iter().find(|s| available(&s.tag))
    }

    pub fn top_n(&self, text: &str, n: usize, available: impl Fn(&str) -> bool) -> Vec<String> {
        self.scores(text)
            .into_iter()
            .filter(|s| available(&s.tag))
            .take(n)
            .map(|s| s.tag)
            .collect()
    }

    /// True when more than one tag scores above 0.5.
    pub fn needs_multiple_handlers(&self, text: &str) -> bool {
        self.scores(text).iter().filter(|s| s.score > 0.5).count() > 1
    }

    pub fn analyze(&self, text: &str, n: usize, available: impl Fn(&str) -> bool) -> ContextAnalysis {
        let scores = self.scores(text);
        let suggested = scores
            .iter()
            .filter(|s| available(&s.tag))
            .take(n)
            .map(|s| s.tag.clone())
            .collect();
        let needs_multiple_handlers = scores.iter().filter(|s| s.score > 0.5).count() > 1;
        ContextAnalysis {
            scores,
            suggested,
            needs_multiple_handlers,
        }
    }
}

fn rank(a: &TagScore, b: &TagScore) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.tag.cmp(&b.tag))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_score_formula() {
        let selector = ContextSelector::new();
        // "kafka" twice as whole words: 1.0 + 0.5 + 0.2, over 7 keywords.
        let score = selector.score("kafka to kafka", "event-driven-specialist");
        assert!(approx(score, 1.7 / 7.0));

        // "eventing" contains "event" but not as a whole word.
        let score = selector.score("eventing", "event-driven-specialist");
        assert!(approx(score, 1.0 / 7.0));
    }

    #[test]
    fn test_unknown_tag_scores_zero() {
        assert!(approx(ContextSelector::new().score("kafka", "nope"), 0.0));
    }

    #[test]
    fn test_tie_breaks_on_smallest_tag() {
        // "deployment" is a keyword of two six-keyword tags and nothing else matches.
        let selector = ContextSelector::new();
        let scores = selector.scores("deployment");
        assert_eq!(scores.len(), 2);
        assert!(approx(scores[0].score, scores[1].score));
        assert_eq!(scores[0].tag, "cicd-pipeline-specialist");
        assert_eq!(scores[1].tag, "containerization-specialist");

        let best = selector.select("deployment", |_| true).expect("a tag matches");
        assert_eq!(best.tag, "cicd-pipeline-specialist");
    }

    #[test]
    fn test_select_skips_unavailable() {
        let selector = ContextSelector::new();
        let best = selector
            .select("deployment", |tag| tag != "cicd-pipeline-specialist")
            .expect("a tag matches");
        assert_eq!(best.tag, "containerization-specialist");
        assert!(selector.select("deployment", |_| false).is_none());
    }

    #[test]
    fn test_top_n_is_ranked_and_limited() {
        let selector = ContextSelector::new();
        let text = "kafka kafka event consumer with jwt security";
        let top = selector.top_n(text, 2, |_| true);
        assert_eq!(top, vec!["event-driven-specialist", "security-specialist"]);
    }

    #[test]
    fn test_needs_multiple_handlers() {
        let selector = ContextSelector::new();
        assert!(!selector.needs_multiple_handlers("kafka"));
        let busy = "jwt oauth security tls ssl kafka rabbitmq event messaging async cqrs";
        assert!(selector.needs_multiple_handlers(busy));
        assert!(selector.analyze(busy, 5, |_| true).needs_multiple_handlers);
    }
}
