//! Business-data domains answered by Cortex Analyst.

use prism_core::{DomainRouter, DomainRule};
use serde::{Deserialize, Serialize};

/// Domain used when no keyword matches.
pub const DEFAULT_DOMAIN: &str = "billing";

/// A data domain, its schema suffix and its routing keywords.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CortexDomain {
    pub name: String,

    /// Schema suffix; the semantic view lives in `<DATABASE>.<PREFIX>_<schema>`.
    pub schema: String,

    #[serde(default)]
    pub keywords: Vec<String>,
}

impl CortexDomain {
    pub fn new(name: &str, schema: &str, keywords: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            schema: schema.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    /// Fully qualified semantic view for this domain.
    pub fn semantic_model(&self, database: &str, schema_prefix: &str) -> String {
        format!(
            "{}.{}_{}.{}_SEMANTIC_VIEW",
            database, schema_prefix, self.schema, self.schema
        )
    }
}

/// The built-in domain table, in tie-breaking order.
pub fn default_domains() -> Vec<CortexDomain> {
    vec![
        CortexDomain::new(
            "billing",
            "BILLING",
            &[
                "arr",
                "mrr",
                "revenue",
                "subscription fee",
                "transaction fee",
                "billing",
                "invoice",
                "payment",
            ],
        ),
        CortexDomain::new(
            "gtm",
            "GTM",
            &[
                "funnel",
                "pipeline",
                "aql",
                "conversion rate",
                "sales stage",
                "prospect",
                "closed won",
                "opportunity",
                "egmv",
                "emrr",
                "super aql",
            ],
        ),
        CortexDomain::new(
            "support",
            "SUPPORT_CASES",
            &[
                "support case",
                "phone call",
                "sla",
                "csat",
                "abandonment",
                "first response",
                "repeat case",
                "customer satisfaction",
            ],
        ),
        CortexDomain::new(
            "accounts",
            "ACCOUNTS",
            &[
                "churn",
                "save rate",
                "cancellation",
                "retention",
                "account health",
                "revenue at risk",
            ],
        ),
        CortexDomain::new(
            "product",
            "PRODUCT",
            &[
                "gmv",
                "order count",
                "session",
                "product conversion",
                "customer",
                "guest",
                "location performance",
                "brand analytics",
            ],
        ),
        CortexDomain::new(
            "finance",
            "FINANCE",
            &[
                "cohort",
                "lifecycle",
                "launch",
                "reactivation",
                "upgrade",
                "downgrade",
                "data tape",
                "pricing",
                "discount",
                "flex",
                "coupon",
                "subscription count",
            ],
        ),
    ]
}

/// Build a router over `domains`.
pub fn router_for(domains: &[CortexDomain], default_domain: &str) -> DomainRouter {
    let rules = domains
        .iter()
        .map(|d| DomainRule {
            name: d.name.clone(),
            keywords: d.keywords.clone(),
        })
        .collect();
    DomainRouter::new(rules, default_domain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_semantic_model_naming() {
        let domains = default_domains();
        let support = domains.iter().find(|d| d.name == "support").unwrap();
        assert_eq!(
            support.semantic_model("DBT_ANALYTICS_PROD", "ANALYTICS"),
            "DBT_ANALYTICS_PROD.ANALYTICS_SUPPORT_CASES.SUPPORT_CASES_SEMANTIC_VIEW"
        );
    }

    #[test]
    fn test_default_table_order() {
        let names: Vec<String> = default_domains().into_iter().map(|d| d.name).collect();
        assert_eq!(
            names,
            vec!["billing", "gtm", "support", "accounts", "product", "finance"]
        );
    }

    #[test]
    fn test_default_routing() {
        let router = router_for(&default_domains(), DEFAULT_DOMAIN);
        assert_eq!(router.route("What is our current ARR?"), "billing");
        assert_eq!(router.route("Show the sales pipeline by funnel stage"), "gtm");
        assert_eq!(router.route("CSAT by support case type"), "support");
        assert_eq!(router.route("churn and retention last quarter"), "accounts");
        assert_eq!(router.route("coupon and discount usage by cohort"), "finance");
        assert_eq!(router.route("hello"), "billing");
    }

    #[test]
    fn test_tie_prefers_earlier_domain() {
        let router = router_for(&default_domains(), DEFAULT_DOMAIN);
        // "revenue" (billing) vs "funnel" (gtm): one point each.
        assert_eq!(router.route("revenue through the funnel"), "billing");
    }
}
