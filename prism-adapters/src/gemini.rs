//! Gemini adapter.
//!
//! The three operations are backend-agnostic: they shape a prompt and hand a
//! [`GenerationRequest`] to a [`GenerativeBackend`]. Two backends exist:
//!
//! - [`GeminiCli`] spawns the `gemini` CLI with `--output-format json`
//! - [`GeminiApi`] calls the generative-language REST API directly
//!
//! Both route the raw reply through [`UpstreamReply`].

use crate::http::{JsonReply, post_json};
use async_trait::async_trait;
use prism_core::{
    ProcessRunner, RunOptions, ServerInfo, ToolDef, ToolError, ToolOutput, ToolResult, ToolServer,
    UpstreamReply, parse_arguments,
};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::{Value, json};

/// Timeout for CLI calls; research tasks can run for minutes.
pub const CLI_TIMEOUT_MS: u64 = 180_000;

/// Default generative-language API base URL.
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Model used by the API backend when none is configured or requested.
pub const DEFAULT_API_MODEL: &str = "gemini-2.5-flash";

const QUICK_INSTRUCTION: &str = "Provide a concise, focused answer.";
const THOROUGH_INSTRUCTION: &str =
    "Provide a comprehensive, detailed analysis with multiple sources and perspectives.";

/// One prompt ready to send upstream.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub model: Option<String>,
    /// Ask for web-grounded answers. The CLI backend drops its sandbox so the
    /// search tool can reach the network; the API backend enables search.
    pub grounded: bool,
}

/// Something that can turn a prompt into Gemini's answer text.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    async fn generate(&self, request: GenerationRequest) -> ToolResult<String>;
}

/// Backend driving the `gemini` CLI.
#[derive(Debug, Clone)]
pub struct GeminiCli {
    binary: String,
    timeout_ms: u64,
    runner: ProcessRunner,
}

impl GeminiCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            timeout_ms: CLI_TIMEOUT_MS,
            runner: ProcessRunner,
        }
    }

    /// Set the timeout in milliseconds (builder pattern).
    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }

    /// Build the CLI argument list for `request`.
    pub fn build_args(request: &GenerationRequest) -> Vec<String> {
        let mut args = vec!["--output-format".to_string(), "json".to_string()];
        if !request.grounded {
            args.push("--sandbox".to_string());
        }
        if let Some(model) = request.model.as_deref().filter(|m| !m.is_empty()) {
            args.push("--model".to_string());
            args.push(model.to_string());
        }
        args.push("-p".to_string());
        args.push(request.prompt.clone());
        args
    }
}

#[async_trait]
impl GenerativeBackend for GeminiCli {
    fn name(&self) -> &'static str {
        "cli"
    }

    async fn generate(&self, request: GenerationRequest) -> ToolResult<String> {
        let args = Self::build_args(&request);
        let output = self
            .runner
            .run(
                &self.binary,
                &args,
                RunOptions::default().with_timeout_ms(self.timeout_ms),
            )
            .await?;

        if !output.success() {
            let stderr = output.stderr.trim();
            let message = if stderr.is_empty() {
                match output.exit_code {
                    Some(code) => format!("Gemini exited with code {}", code),
                    None => "Gemini was terminated by a signal".to_string(),
                }
            } else {
                stderr.to_string()
            };
            return Err(ToolError::CommandFailed(message));
        }

        Ok(UpstreamReply::decode(&output.stdout).into_text())
    }
}

/// Backend calling the generative-language REST API.
pub struct GeminiApi {
    api_key: Option<String>,
    api_base: String,
    model: String,
    client: reqwest::Client,
}

impl GeminiApi {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_API_MODEL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Override the API base URL (builder pattern).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Override the default model (builder pattern).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Request body for `request`.
    pub fn build_body(request: &GenerationRequest) -> Value {
        let mut body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": request.prompt }] }]
        });
        if request.grounded {
            body["tools"] = json!([{ "google_search": {} }]);
        }
        body
    }
}

#[async_trait]
impl GenerativeBackend for GeminiApi {
    fn name(&self) -> &'static str {
        "api"
    }

    async fn generate(&self, request: GenerationRequest) -> ToolResult<String> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ToolError::config("GEMINI_API_KEY not set."))?;

        let model = request
            .model
            .as_deref()
            .filter(|m| !m.is_empty())
            .unwrap_or(&self.model);
        let url = format!(
            "{}/models/{}:generateContent",
            self.api_base.trim_end_matches('/'),
            model
        );

        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(api_key)
            .map_err(|_| ToolError::config("GEMINI_API_KEY contains invalid characters"))?;
        headers.insert("x-goog-api-key", key);

        let body = Self::build_body(&request);
        match post_json(&self.client, "Gemini", &url, headers, &body).await? {
            JsonReply::Document(document) => {
                Ok(UpstreamReply::decode(&document.to_string()).into_text())
            }
            JsonReply::Events(chunks) => Ok(chunks
                .iter()
                .map(|chunk| UpstreamReply::decode(&chunk.to_string()).into_text())
                .collect()),
        }
    }
}

/// Research depth for `gemini_research`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResearchDepth {
    #[default]
    Quick,
    Thorough,
}

impl ResearchDepth {
    fn instruction(self) -> &'static str {
        match self {
            Self::Quick => QUICK_INSTRUCTION,
            Self::Thorough => THOROUGH_INSTRUCTION,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateArgs {
    prompt: String,
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnalyzeArgs {
    prompt: String,
    context: Option<String>,
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResearchArgs {
    query: String,
    #[serde(default)]
    depth: ResearchDepth,
    model: Option<String>,
}

/// Prompt sent by `gemini_analyze`.
pub fn analyze_prompt(prompt: &str, context: Option<&str>) -> String {
    match context.filter(|c| !c.is_empty()) {
        Some(context) => format!("{}\n\n--- Context ---\n{}", prompt, context),
        None => prompt.to_string(),
    }
}

/// Prompt sent by `gemini_research`.
pub fn research_prompt(query: &str, depth: ResearchDepth) -> String {
    format!(
        "Research the following topic. Use Google Search to find current, accurate information. {}\n\nTopic: {}",
        depth.instruction(),
        query
    )
}

/// Gemini tool adapter over any [`GenerativeBackend`].
pub struct GeminiAdapter {
    backend: Box<dyn GenerativeBackend>,
}

impl GeminiAdapter {
    pub fn new(backend: Box<dyn GenerativeBackend>) -> Self {
        Self { backend }
    }

    async fn dispatch(&self, name: &str, arguments: Value) -> Option<ToolResult<String>> {
        let request = match name {
            "gemini_generate" => parse_arguments::<GenerateArgs>(arguments).map(|args| {
                GenerationRequest {
                    prompt: args.prompt,
                    model: args.model,
                    grounded: false,
                }
            }),
            "gemini_analyze" => parse_arguments::<AnalyzeArgs>(arguments).map(|args| {
                GenerationRequest {
                    prompt: analyze_prompt(&args.prompt, args.context.as_deref()),
                    model: args.model,
                    grounded: false,
                }
            }),
            "gemini_research" => parse_arguments::<ResearchArgs>(arguments).map(|args| {
                GenerationRequest {
                    prompt: research_prompt(&args.query, args.depth),
                    model: args.model,
                    grounded: true,
                }
            }),
            _ => return None,
        };

        tracing::debug!("{} via {} backend", name, self.backend.name());
        Some(match request {
            Ok(request) => self.backend.generate(request).await,
            Err(e) => Err(e),
        })
    }
}

#[async_trait]
impl ToolServer for GeminiAdapter {
    fn info(&self) -> ServerInfo {
        ServerInfo::new("prism-gemini")
    }

    fn tools(&self) -> Vec<ToolDef> {
        vec![
            ToolDef::new(
                "gemini_generate",
                "Generate text or code using Gemini. Good for multi-file generation, creative tasks, and leveraging Gemini's large context window.",
                json!({
                    "type": "object",
                    "properties": {
                        "prompt": { "type": "string", "description": "The prompt to send to Gemini" },
                        "model": { "type": "string", "description": "Gemini model to use (e.g. gemini-2.5-pro, gemini-2.5-flash)" }
                    },
                    "required": ["prompt"]
                }),
            ),
            ToolDef::new(
                "gemini_analyze",
                "Analyze code, files, or data using Gemini's 1M token context window. Ideal for large codebases, complex analysis, and multi-file understanding.",
                json!({
                    "type": "object",
                    "properties": {
                        "prompt": { "type": "string", "description": "Analysis prompt: describe what to analyze and any specific questions" },
                        "context": { "type": "string", "description": "Additional context (file contents, code snippets) to include in the analysis" },
                        "model": { "type": "string", "description": "Gemini model to use" }
                    },
                    "required": ["prompt"]
                }),
            ),
            ToolDef::new(
                "gemini_research",
                "Research a topic using Gemini with Google Search grounding. Returns web-sourced information with citations. Best for API docs, library research, and current information.",
                json!({
                    "type": "object",
                    "properties": {
                        "query": { "type": "string", "description": "Research query: what to look up" },
                        "depth": {
                            "type": "string",
                            "enum": ["quick", "thorough"],
                            "default": "quick",
                            "description": "Research depth: 'quick' for brief answers, 'thorough' for comprehensive research"
                        },
                        "model": { "type": "string", "description": "Gemini model to use" }
                    },
                    "required": ["query"]
                }),
            ),
        ]
    }

    async fn call(&self, name: &str, arguments: Value) -> Option<ToolOutput> {
        self.dispatch(name, arguments)
            .await
            .map(ToolOutput::from_result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};

    /// Records requests and answers with a fixed string.
    #[derive(Clone, Default)]
    struct RecordingBackend {
        seen: Arc<Mutex<Vec<GenerationRequest>>>,
    }

    #[async_trait]
    impl GenerativeBackend for RecordingBackend {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn generate(&self, request: GenerationRequest) -> ToolResult<String> {
            self.seen.lock().unwrap().push(request);
            Ok("answer".to_string())
        }
    }

    fn request(prompt: &str, model: Option<&str>, grounded: bool) -> GenerationRequest {
        GenerationRequest {
            prompt: prompt.to_string(),
            model: model.map(str::to_string),
            grounded,
        }
    }

    #[test]
    fn test_cli_args_sandboxed_by_default() {
        let args = GeminiCli::build_args(&request("hi", None, false));
        assert_eq!(args, vec!["--output-format", "json", "--sandbox", "-p", "hi"]);
    }

    #[test]
    fn test_cli_args_grounded_with_model() {
        let args = GeminiCli::build_args(&request("hi", Some("gemini-2.5-pro"), true));
        assert_eq!(
            args,
            vec!["--output-format", "json", "--model", "gemini-2.5-pro", "-p", "hi"]
        );
    }

    #[test]
    fn test_cli_args_skip_empty_model() {
        let args = GeminiCli::build_args(&request("hi", Some(""), false));
        assert_eq!(args, vec!["--output-format", "json", "--sandbox", "-p", "hi"]);
    }

    #[test]
    fn test_api_body() {
        assert_eq!(
            GeminiApi::build_body(&request("hi", None, false)),
            json!({ "contents": [{ "role": "user", "parts": [{ "text": "hi" }] }] })
        );
        assert_eq!(
            GeminiApi::build_body(&request("hi", None, true))["tools"],
            json!([{ "google_search": {} }])
        );
    }

    #[test]
    fn test_prompts() {
        assert_eq!(analyze_prompt("Review", None), "Review");
        assert_eq!(
            analyze_prompt("Review", Some("fn main() {}")),
            "Review\n\n--- Context ---\nfn main() {}"
        );
        assert_eq!(
            research_prompt("tokio", ResearchDepth::Quick),
            "Research the following topic. Use Google Search to find current, accurate information. Provide a concise, focused answer.\n\nTopic: tokio"
        );
        assert!(research_prompt("tokio", ResearchDepth::Thorough).contains(THOROUGH_INSTRUCTION));
    }

    #[tokio::test]
    async fn test_research_is_grounded_and_defaults_to_quick() {
        let backend = RecordingBackend::default();
        let adapter = GeminiAdapter::new(Box::new(backend.clone()));

        let output = adapter
            .call("gemini_research", json!({ "query": "rust 2024 edition" }))
            .await
            .unwrap();
        assert_eq!(output, ToolOutput::text("answer"));

        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].grounded);
        assert!(seen[0].prompt.ends_with("Provide a concise, focused answer.\n\nTopic: rust 2024 edition"));
    }

    #[tokio::test]
    async fn test_generate_passes_model() {
        let backend = RecordingBackend::default();
        let adapter = GeminiAdapter::new(Box::new(backend.clone()));

        adapter
            .call("gemini_generate", json!({ "prompt": "hi", "model": "gemini-2.5-pro" }))
            .await
            .unwrap();

        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen[0], request("hi", Some("gemini-2.5-pro"), false));
    }

    #[tokio::test]
    async fn test_invalid_depth_is_error_envelope() {
        let adapter = GeminiAdapter::new(Box::new(RecordingBackend::default()));
        let output = adapter
            .call("gemini_research", json!({ "query": "q", "depth": "deep" }))
            .await
            .unwrap();
        assert!(output.is_error);
        assert!(output.joined_text().starts_with("Error: Invalid arguments:"));
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let api = GeminiApi::new(None);
        let err = api.generate(request("hi", None, false)).await.unwrap_err();
        assert_eq!(err.to_string(), "GEMINI_API_KEY not set.");
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let adapter = GeminiAdapter::new(Box::new(RecordingBackend::default()));
        assert!(adapter.call("gemini_paint", json!({})).await.is_none());
    }
}
