//! Keyword-based domain routing.
//!
//! A heuristic, not a classifier: each domain scores one point per keyword
//! found in the question, and the first domain with the highest score wins.

use serde::{Deserialize, Serialize};

/// One routable domain and the keywords that select it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainRule {
    pub name: String,
    pub keywords: Vec<String>,
}

impl DomainRule {
    pub fn new(name: impl Into<String>, keywords: &[&str]) -> Self {
        Self {
            name: name.into(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// Routes free text to the best-matching domain.
#[derive(Debug, Clone)]
pub struct DomainRouter {
    rules: Vec<DomainRule>,
    default_domain: String,
}

impl DomainRouter {
    /// Build a router. Rule order is significant: it breaks ties.
    pub fn new(rules: Vec<DomainRule>, default_domain: impl Into<String>) -> Self {
        let rules = rules
            .into_iter()
            .map(|rule| DomainRule {
                keywords: rule.keywords.iter().map(|k| k.to_lowercase()).collect(),
                name: rule.name,
            })
            .collect();
        Self {
            rules,
            default_domain: default_domain.into(),
        }
    }

    /// Keyword match count per domain, in declaration order.
    pub fn scores(&self, text: &str) -> Vec<(&str, usize)> {
        let text = text.to_lowercase();
        self.rules
            .iter()
            .map(|rule| {
                let score = rule
                    .keywords
                    .iter()
                    .filter(|kw| text.contains(kw.as_str()))
                    .count();
                (rule.name.as_str(), score)
            })
            .collect()
    }

    /// Pick the domain for `text`.
    ///
    /// Only a strictly higher score displaces the current winner, so on a tie
    /// the earlier-declared domain is kept. Falls back to the default domain
    /// when nothing matches.
    pub fn route(&self, text: &str) -> &str {
        let mut best = self.default_domain.as_str();
        let mut best_score = 0;

        for (domain, score) in self.scores(text) {
            if score > best_score {
                best_score = score;
                best = domain;
            }
        }

        tracing::debug!("Routed to domain '{}' (score {})", best, best_score);
        best
    }

    pub fn default_domain(&self) -> &str {
        &self.default_domain
    }

    pub fn rules(&self) -> &[DomainRule] {
        &self.rules
    }
}
