//! Snowflake Cortex adapter.
//!
//! Authenticates with a key-pair assertion from [`TokenSigner`] and exposes:
//!
//! - `cortex_analyst`: natural language to SQL via per-domain semantic views
//! - `cortex_complete`: completions from Snowflake-hosted models
//! - `cortex_search`: Cortex Search service queries

pub mod domains;

pub use domains::{CortexDomain, DEFAULT_DOMAIN, default_domains};

use crate::http::{JsonReply, post_json};
use async_trait::async_trait;
use prism_core::normalize::{chat_completion_text, chat_stream_text, value_text};
use prism_core::{
    DomainRouter, ServerInfo, SignerConfig, TokenCache, TokenSigner, ToolDef, ToolError,
    ToolOutput, ToolResult, ToolServer, parse_arguments,
};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::path::PathBuf;
use std::sync::Arc;

/// Default database holding the semantic views.
pub const DEFAULT_DATABASE: &str = "DBT_ANALYTICS_PROD";

/// Default schema prefix for the semantic views.
pub const DEFAULT_SCHEMA_PREFIX: &str = "ANALYTICS";

/// Default model for `cortex_complete`.
pub const DEFAULT_COMPLETE_MODEL: &str = "claude-3-5-sonnet";

/// Default result limit for `cortex_search`.
pub const DEFAULT_SEARCH_LIMIT: u64 = 10;

const ANALYST_PATH: &str = "/api/v2/cortex/analyst/message";
const COMPLETE_PATH: &str = "/api/v2/cortex/inference:complete";

/// Resolved settings for the Cortex adapter.
#[derive(Debug, Clone)]
pub struct CortexSettings {
    pub account: Option<String>,
    pub user: Option<String>,
    pub private_key_path: Option<PathBuf>,
    pub role: Option<String>,
    pub database: String,
    pub schema_prefix: String,
    /// Overrides the account-derived base URL.
    pub base_url: Option<String>,
    pub domains: Vec<CortexDomain>,
    pub default_domain: String,
}

impl Default for CortexSettings {
    fn default() -> Self {
        Self {
            account: None,
            user: None,
            private_key_path: None,
            role: None,
            database: DEFAULT_DATABASE.to_string(),
            schema_prefix: DEFAULT_SCHEMA_PREFIX.to_string(),
            base_url: None,
            domains: default_domains(),
            default_domain: DEFAULT_DOMAIN.to_string(),
        }
    }
}

impl CortexSettings {
    /// API base URL, from the override or the account name.
    pub fn resolved_base_url(&self) -> ToolResult<String> {
        if let Some(base_url) = self.base_url.as_deref().filter(|u| !u.is_empty()) {
            return Ok(base_url.trim_end_matches('/').to_string());
        }
        match self.account.as_deref().filter(|a| !a.is_empty()) {
            Some(account) => Ok(format!("https://{}.snowflakecomputing.com", account)),
            None => Err(ToolError::config("SNOWFLAKE_ACCOUNT not set.")),
        }
    }

    fn signer_config(&self) -> SignerConfig {
        SignerConfig {
            account: self.account.clone(),
            user: self.user.clone(),
            private_key_path: self.private_key_path.clone(),
        }
    }
}

/// The semantic model reference as sent to Cortex Analyst.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SemanticModel {
    /// A staged YAML file (`@DB.SCHEMA.STAGE/model.yaml`).
    StageFile(String),
    /// A semantic view (`DB.SCHEMA.VIEW`).
    View(String),
}

impl SemanticModel {
    pub fn parse(reference: &str) -> Self {
        if reference.starts_with('@') {
            Self::StageFile(reference.to_string())
        } else {
            Self::View(reference.to_string())
        }
    }

    pub fn reference(&self) -> &str {
        match self {
            Self::StageFile(r) | Self::View(r) => r,
        }
    }

    fn body_field(&self) -> &'static str {
        match self {
            Self::StageFile(_) => "semantic_model_file",
            Self::View(_) => "semantic_view",
        }
    }
}

/// Request body for Cortex Analyst.
pub fn analyst_body(question: &str, model: &SemanticModel) -> Value {
    let mut body = Map::new();
    body.insert(
        "messages".to_string(),
        json!([{ "role": "user", "content": [{ "type": "text", "text": question }] }]),
    );
    body.insert(model.body_field().to_string(), json!(model.reference()));
    Value::Object(body)
}

/// The parts of an Analyst reply worth showing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalystAnswer {
    pub text: String,
    pub sql: String,
    pub suggestions: Vec<String>,
}

impl AnalystAnswer {
    /// Collect text, SQL and suggestions from a document or a chunk stream.
    pub fn from_reply(reply: &JsonReply) -> Self {
        let mut answer = Self::default();
        match reply {
            JsonReply::Events(chunks) => {
                for chunk in chunks {
                    if let Some(content) = chunk.pointer("/message/content") {
                        answer.absorb(content);
                    }
                }
            }
            JsonReply::Document(document) => {
                if let Some(content) = document.pointer("/message/content") {
                    answer.absorb(content);
                }
                if let Some(suggestions) = document
                    .pointer("/message/suggestions")
                    .and_then(Value::as_array)
                {
                    answer.suggestions = suggestions.iter().map(value_text).collect();
                }
            }
        }
        answer
    }

    fn absorb(&mut self, content: &Value) {
        let Some(parts) = content.as_array() else {
            return;
        };
        for part in parts {
            match part.get("type").and_then(Value::as_str) {
                Some("text") => {
                    if let Some(text) = part.get("text").and_then(Value::as_str) {
                        self.text.push_str(text);
                    }
                }
                Some("sql") => {
                    self.sql = part
                        .get("statement")
                        .or_else(|| part.get("text"))
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                }
                Some("suggestions") => {
                    self.suggestions = part
                        .get("suggestions")
                        .and_then(Value::as_array)
                        .map(|s| s.iter().map(value_text).collect())
                        .unwrap_or_default();
                }
                _ => {}
            }
        }
    }

    /// Render the answer as markdown.
    pub fn render(&self, domain: &str, semantic_model: &str) -> String {
        let mut lines = vec![
            format!("**Domain:** {}", domain),
            format!("**Semantic Model:** {}", semantic_model),
            String::new(),
        ];
        if self.text.is_empty() {
            lines.push("(No text response)".to_string());
        } else {
            lines.push(format!("**Answer:** {}", self.text));
        }
        if !self.sql.is_empty() {
            lines.extend([
                String::new(),
                "**Generated SQL:**".to_string(),
                String::new(),
                "```sql".to_string(),
                self.sql.clone(),
                "```".to_string(),
            ]);
        }
        if !self.suggestions.is_empty() {
            lines.push(String::new());
            lines.push("**Follow-up suggestions:**".to_string());
            lines.extend(self.suggestions.iter().map(|s| format!("- {}", s)));
        }
        lines.join("\n")
    }
}

/// Split `DB.SCHEMA.SERVICE` into its three parts.
pub fn parse_service_name(service_name: &str) -> ToolResult<(&str, &str, &str)> {
    let parts: Vec<&str> = service_name.split('.').collect();
    match parts.as_slice() {
        [db, schema, service] => Ok((*db, *schema, *service)),
        _ => Err(ToolError::invalid_args(
            "service_name must be fully qualified: DB.SCHEMA.SERVICE_NAME",
        )),
    }
}

/// Render Cortex Search results.
pub fn render_search_results(reply: &JsonReply) -> String {
    let results = match reply {
        JsonReply::Document(document) => document
            .get("results")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
        JsonReply::Events(_) => Vec::new(),
    };

    if results.is_empty() {
        return "No results found.".to_string();
    }

    results
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let mut lines = vec![format!("**Result {}:**", i + 1)];
            if let Some(fields) = row.as_object() {
                lines.extend(
                    fields
                        .iter()
                        .map(|(key, value)| format!("  {}: {}", key, value_text(value))),
                );
            }
            lines.join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[derive(Debug, Deserialize)]
struct AnalystArgs {
    question: String,
    domain: Option<String>,
    semantic_model_file: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompleteArgs {
    prompt: String,
    model: Option<String>,
    system: Option<String>,
    temperature: Option<f64>,
    max_tokens: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
    service_name: String,
    columns: Option<Vec<String>>,
    limit: Option<u64>,
}

/// Cortex tool adapter.
pub struct CortexAdapter {
    settings: CortexSettings,
    signer: TokenSigner,
    router: DomainRouter,
    client: reqwest::Client,
}

impl CortexAdapter {
    /// Create an adapter whose signer shares `cache`.
    pub fn new(settings: CortexSettings, cache: Arc<TokenCache>) -> Self {
        let signer = TokenSigner::new(settings.signer_config(), cache);
        Self::with_signer(settings, signer)
    }

    /// Create an adapter with an explicit signer.
    pub fn with_signer(settings: CortexSettings, signer: TokenSigner) -> Self {
        let router = domains::router_for(&settings.domains, &settings.default_domain);
        Self {
            settings,
            signer,
            router,
            client: reqwest::Client::new(),
        }
    }

    fn domain(&self, name: &str) -> Option<&CortexDomain> {
        self.settings.domains.iter().find(|d| d.name == name)
    }

    async fn snowflake_post(&self, path: &str, body: &Value) -> ToolResult<JsonReply> {
        let base_url = self.settings.resolved_base_url()?;
        let token = self.signer.signed_assertion()?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| ToolError::config(format!("invalid assertion header: {}", e)))?,
        );
        headers.insert(
            HeaderName::from_static("x-snowflake-authorization-token-type"),
            HeaderValue::from_static("KEYPAIR_JWT"),
        );
        if let Some(role) = self.settings.role.as_deref().filter(|r| !r.is_empty()) {
            headers.insert(
                HeaderName::from_static("x-snowflake-role"),
                HeaderValue::from_str(role)
                    .map_err(|_| ToolError::config("SNOWFLAKE_ROLE contains invalid characters"))?,
            );
        }

        let url = format!("{}{}", base_url, path);
        post_json(&self.client, "Snowflake", &url, headers, body).await
    }

    async fn analyst(&self, args: AnalystArgs) -> ToolResult<String> {
        let domain = match args.domain {
            Some(domain) => domain,
            None => self.router.route(&args.question).to_string(),
        };

        let reference = match args.semantic_model_file.filter(|m| !m.is_empty()) {
            Some(reference) => reference,
            None => self
                .domain(&domain)
                .map(|d| d.semantic_model(&self.settings.database, &self.settings.schema_prefix))
                .ok_or_else(|| ToolError::invalid_args(format!("unknown domain '{}'", domain)))?,
        };
        let model = SemanticModel::parse(&reference);

        tracing::info!("Cortex Analyst query in domain '{}'", domain);
        let reply = self
            .snowflake_post(ANALYST_PATH, &analyst_body(&args.question, &model))
            .await?;

        Ok(AnalystAnswer::from_reply(&reply).render(&domain, model.reference()))
    }

    async fn complete(&self, args: CompleteArgs) -> ToolResult<String> {
        if let Some(t) = args.temperature.filter(|t| !(0.0..=1.0).contains(t)) {
            return Err(ToolError::invalid_args(format!(
                "temperature must be between 0 and 1, got {}",
                t
            )));
        }

        let mut messages = Vec::new();
        if let Some(system) = args.system.filter(|s| !s.is_empty()) {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.push(json!({ "role": "user", "content": args.prompt }));

        let mut body = Map::new();
        body.insert(
            "model".to_string(),
            json!(args.model.as_deref().unwrap_or(DEFAULT_COMPLETE_MODEL)),
        );
        body.insert("messages".to_string(), Value::Array(messages));
        if let Some(temperature) = args.temperature {
            body.insert("temperature".to_string(), json!(temperature));
        }
        if let Some(max_tokens) = args.max_tokens {
            body.insert("max_tokens".to_string(), json!(max_tokens));
        }

        match self.snowflake_post(COMPLETE_PATH, &Value::Object(body)).await? {
            JsonReply::Document(document) => Ok(chat_completion_text(&document)),
            JsonReply::Events(chunks) => Ok(chat_stream_text(&chunks)),
        }
    }

    async fn search(&self, args: SearchArgs) -> ToolResult<String> {
        let (db, schema, service) = parse_service_name(&args.service_name)?;
        let path = format!(
            "/api/v2/databases/{}/schemas/{}/cortex-search-services/{}:query",
            db, schema, service
        );
        let body = json!({
            "query": args.query,
            "columns": args.columns.unwrap_or_default(),
            "limit": args.limit.filter(|l| *l > 0).unwrap_or(DEFAULT_SEARCH_LIMIT),
        });

        let reply = self.snowflake_post(&path, &body).await?;
        Ok(render_search_results(&reply))
    }
}

#[async_trait]
impl ToolServer for CortexAdapter {
    fn info(&self) -> ServerInfo {
        ServerInfo::new("prism-cortex")
    }

    fn tools(&self) -> Vec<ToolDef> {
        let domain_names: Vec<&str> = self
            .settings
            .domains
            .iter()
            .map(|d| d.name.as_str())
            .collect();

        vec![
            ToolDef::new(
                "cortex_analyst",
                "Query Owner.com data using natural language via Snowflake Cortex Analyst. \
                 Converts questions to SQL using semantic models across 6 domains: \
                 billing, GTM funnel, support cases, accounts, product, and finance.",
                json!({
                    "type": "object",
                    "properties": {
                        "question": {
                            "type": "string",
                            "description": "Natural language question about Owner.com data (e.g., 'What is our current ARR?')"
                        },
                        "domain": {
                            "type": "string",
                            "enum": domain_names,
                            "description": "Data domain to query. Auto-detected from question if not specified."
                        },
                        "semantic_model_file": {
                            "type": "string",
                            "description": "Override: stage path (@DB.SCHEMA.STAGE/model.yaml) or semantic view FQN (DB.SCHEMA.VIEW)"
                        }
                    },
                    "required": ["question"]
                }),
            ),
            ToolDef::new(
                "cortex_complete",
                "Run LLM completions through Snowflake-hosted models (Claude, Llama, Mistral, etc.). \
                 Serverless, no warehouse required.",
                json!({
                    "type": "object",
                    "properties": {
                        "prompt": { "type": "string", "description": "The prompt to send to the model" },
                        "model": {
                            "type": "string",
                            "description": "Snowflake-hosted model (e.g., 'claude-3-5-sonnet', 'llama3.1-70b', 'mistral-large2'). Default: claude-3-5-sonnet"
                        },
                        "system": { "type": "string", "description": "Optional system message" },
                        "temperature": { "type": "number", "minimum": 0, "maximum": 1, "description": "Temperature 0-1" },
                        "max_tokens": { "type": "number", "description": "Max output tokens" }
                    },
                    "required": ["prompt"]
                }),
            ),
            ToolDef::new(
                "cortex_search",
                "Search unstructured text data using Snowflake Cortex Search. \
                 Combines semantic, keyword, and reranking for high-quality retrieval.",
                json!({
                    "type": "object",
                    "properties": {
                        "query": { "type": "string", "description": "Search query in natural language" },
                        "service_name": {
                            "type": "string",
                            "description": "Fully qualified Cortex Search service name (DB.SCHEMA.SERVICE_NAME)"
                        },
                        "columns": {
                            "type": "array",
                            "items": { "type": "string" },
                            "description": "Columns to return from search results"
                        },
                        "limit": { "type": "number", "description": "Max results to return (default: 10)" }
                    },
                    "required": ["query", "service_name"]
                }),
            ),
        ]
    }

    async fn call(&self, name: &str, arguments: Value) -> Option<ToolOutput> {
        let result = match name {
            "cortex_analyst" => match parse_arguments(arguments) {
                Ok(args) => self.analyst(args).await,
                Err(e) => Err(e),
            },
            "cortex_complete" => match parse_arguments(arguments) {
                Ok(args) => self.complete(args).await,
                Err(e) => Err(e),
            },
            "cortex_search" => match parse_arguments(arguments) {
                Ok(args) => self.search(args).await,
                Err(e) => Err(e),
            },
            _ => return None,
        };
        Some(ToolOutput::from_result(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_semantic_model_kinds() {
        let stage = SemanticModel::parse("@DB.SCHEMA.STAGE/model.yaml");
        assert_eq!(
            analyst_body("q", &stage)["semantic_model_file"],
            json!("@DB.SCHEMA.STAGE/model.yaml")
        );

        let view = SemanticModel::parse("DB.SCHEMA.VIEW");
        let body = analyst_body("q", &view);
        assert_eq!(body["semantic_view"], json!("DB.SCHEMA.VIEW"));
        assert!(body.get("semantic_model_file").is_none());
        assert_eq!(
            body["messages"],
            json!([{ "role": "user", "content": [{ "type": "text", "text": "q" }] }])
        );
    }

    #[test]
    fn test_analyst_answer_from_document() {
        let reply = JsonReply::Document(json!({
            "message": {
                "content": [
                    { "type": "text", "text": "ARR is " },
                    { "type": "text", "text": "$10M." },
                    { "type": "sql", "statement": "SELECT SUM(arr) FROM t" }
                ],
                "suggestions": ["By region?"]
            }
        }));
        let answer = AnalystAnswer::from_reply(&reply);
        assert_eq!(
            answer,
            AnalystAnswer {
                text: "ARR is $10M.".to_string(),
                sql: "SELECT SUM(arr) FROM t".to_string(),
                suggestions: vec!["By region?".to_string()],
            }
        );
    }

    #[test]
    fn test_analyst_answer_from_events() {
        let reply = JsonReply::Events(vec![
            json!({ "message": { "content": [{ "type": "text", "text": "a" }] } }),
            json!({ "status": "streaming" }),
            json!({ "message": { "content": [
                { "type": "text", "text": "b" },
                { "type": "suggestions", "suggestions": ["next"] }
            ] } }),
        ]);
        let answer = AnalystAnswer::from_reply(&reply);
        assert_eq!(answer.text, "ab");
        assert_eq!(answer.suggestions, vec!["next".to_string()]);
    }

    #[test]
    fn test_render_full_answer() {
        let answer = AnalystAnswer {
            text: "42".to_string(),
            sql: "SELECT 42".to_string(),
            suggestions: vec!["Why?".to_string()],
        };
        assert_eq!(
            answer.render("billing", "DB.S.V"),
            "**Domain:** billing\n**Semantic Model:** DB.S.V\n\n**Answer:** 42\n\n**Generated SQL:**\n\n```sql\nSELECT 42\n```\n\n**Follow-up suggestions:**\n- Why?"
        );
    }

    #[test]
    fn test_render_empty_answer() {
        assert_eq!(
            AnalystAnswer::default().render("gtm", "X"),
            "**Domain:** gtm\n**Semantic Model:** X\n\n(No text response)"
        );
    }

    #[test]
    fn test_parse_service_name() {
        assert_eq!(
            parse_service_name("DB.SCHEMA.SVC").unwrap(),
            ("DB", "SCHEMA", "SVC")
        );
        let err = parse_service_name("SCHEMA.SVC").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid arguments: service_name must be fully qualified: DB.SCHEMA.SERVICE_NAME"
        );
    }

    #[test]
    fn test_render_search_results() {
        assert_eq!(
            render_search_results(&JsonReply::Document(json!({ "results": [] }))),
            "No results found."
        );
        assert_eq!(
            render_search_results(&JsonReply::Document(json!({}))),
            "No results found."
        );

        let reply = JsonReply::Document(json!({
            "results": [
                { "title": "Refunds", "score": 0.9 },
                { "title": "Invoices", "tags": ["billing"] }
            ]
        }));
        assert_eq!(
            render_search_results(&reply),
            "**Result 1:**\n  title: Refunds\n  score: 0.9\n\n**Result 2:**\n  title: Invoices\n  tags: [\"billing\"]"
        );
    }

    #[test]
    fn test_base_url() {
        let mut settings = CortexSettings::default();
        assert_eq!(
            settings.resolved_base_url().unwrap_err().to_string(),
            "SNOWFLAKE_ACCOUNT not set."
        );

        settings.account = Some("acme-xy123".to_string());
        assert_eq!(
            settings.resolved_base_url().unwrap(),
            "https://acme-xy123.snowflakecomputing.com"
        );

        settings.base_url = Some("http://127.0.0.1:9000/".to_string());
        assert_eq!(settings.resolved_base_url().unwrap(), "http://127.0.0.1:9000");
    }

    #[tokio::test]
    async fn test_missing_credentials_is_error_envelope() {
        let settings = CortexSettings {
            account: Some("acme".to_string()),
            ..Default::default()
        };
        let adapter = CortexAdapter::new(settings, Arc::new(TokenCache::new()));
        let output = adapter
            .call("cortex_complete", json!({ "prompt": "hi" }))
            .await
            .unwrap();
        assert!(output.is_error);
        assert_eq!(
            output.joined_text(),
            "Error: Missing Snowflake credentials. Set SNOWFLAKE_ACCOUNT, SNOWFLAKE_USER, and SNOWFLAKE_PRIVATE_KEY_PATH."
        );
    }

    #[test]
    fn test_domain_enum_follows_table() {
        let adapter = CortexAdapter::new(CortexSettings::default(), Arc::new(TokenCache::new()));
        let tools = adapter.tools();
        assert_eq!(
            tools[0].input_schema["properties"]["domain"]["enum"],
            json!(["billing", "gtm", "support", "accounts", "product", "finance"])
        );
    }
}
