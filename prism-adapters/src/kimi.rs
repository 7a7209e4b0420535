//! Kimi (Moonshot AI) adapter.
//!
//! Talks to Moonshot's OpenAI-compatible chat completions endpoint and
//! exposes three operations:
//!
//! - `kimi_write`: long-form writing, documentation, prose
//! - `kimi_generate`: general-purpose generation and coding
//! - `kimi_analyze`: analysis leveraging the 256K context window
//!
//! Requires `MOONSHOT_API_KEY`.

use crate::http::{JsonReply, post_json};
use async_trait::async_trait;
use prism_core::normalize::{chat_message_content, chat_stream_text};
use prism_core::{
    ServerInfo, ToolDef, ToolError, ToolOutput, ToolResult, ToolServer, parse_arguments,
};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Default Moonshot API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.moonshot.ai/v1";

/// Default Kimi model.
pub const DEFAULT_MODEL: &str = "kimi-k2.5";

const WRITER_SYSTEM_PROMPT: &str = "You are an expert writer. Produce polished, well-structured content. \
Focus on clarity, natural flow, and strong prose. \
Match the requested tone and format precisely.";

const WRITE_TEMPERATURE: f64 = 0.7;
const ANALYZE_TEMPERATURE: f64 = 0.3;

/// Resolved settings for the Kimi adapter.
#[derive(Debug, Clone)]
pub struct KimiSettings {
    pub api_key: Option<String>,
    pub api_base: String,
    pub model: String,
}

impl Default for KimiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

/// A chat message sent upstream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WriteArgs {
    prompt: String,
    context: Option<String>,
    model: Option<String>,
    temperature: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct GenerateArgs {
    prompt: String,
    system: Option<String>,
    model: Option<String>,
    temperature: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct AnalyzeArgs {
    prompt: String,
    context: Option<String>,
    model: Option<String>,
}

/// Adapter for the Kimi chat API.
pub struct KimiAdapter {
    settings: KimiSettings,
    client: reqwest::Client,
}

impl KimiAdapter {
    pub fn new(settings: KimiSettings) -> Self {
        Self {
            settings,
            client: reqwest::Client::new(),
        }
    }

    async fn write(&self, args: WriteArgs) -> ToolResult<String> {
        check_temperature(args.temperature)?;
        let user = with_section(&args.prompt, "Reference Material", args.context.as_deref());
        let messages = vec![ChatMessage::system(WRITER_SYSTEM_PROMPT), ChatMessage::user(user)];
        self.chat(
            messages,
            args.model,
            Some(args.temperature.unwrap_or(WRITE_TEMPERATURE)),
        )
        .await
    }

    async fn generate(&self, args: GenerateArgs) -> ToolResult<String> {
        check_temperature(args.temperature)?;
        let mut messages = Vec::new();
        if let Some(system) = args.system.filter(|s| !s.is_empty()) {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(args.prompt));
        self.chat(messages, args.model, args.temperature).await
    }

    async fn analyze(&self, args: AnalyzeArgs) -> ToolResult<String> {
        let user = with_section(&args.prompt, "Content to Analyze", args.context.as_deref());
        self.chat(
            vec![ChatMessage::user(user)],
            args.model,
            Some(ANALYZE_TEMPERATURE),
        )
        .await
    }

    async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        model: Option<String>,
        temperature: Option<f64>,
    ) -> ToolResult<String> {
        let api_key = self.settings.api_key.as_deref().filter(|k| !k.is_empty()).ok_or_else(|| {
            ToolError::config("MOONSHOT_API_KEY not set. Get one at https://platform.moonshot.ai/")
        })?;

        let model = model.unwrap_or_else(|| self.settings.model.clone());
        let body = completion_body(&model, &messages, temperature);
        let url = format!("{}/chat/completions", self.settings.api_base.trim_end_matches('/'));

        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|_| ToolError::config("MOONSHOT_API_KEY contains invalid characters"))?;
        headers.insert(AUTHORIZATION, bearer);

        match post_json(&self.client, "Kimi", &url, headers, &body).await? {
            JsonReply::Document(document) => Ok(chat_message_content(&document)),
            JsonReply::Events(chunks) => Ok(chat_stream_text(&chunks)),
        }
    }
}

/// Build the chat completion request body.
pub fn completion_body(model: &str, messages: &[ChatMessage], temperature: Option<f64>) -> Value {
    let mut body = Map::new();
    body.insert("model".to_string(), json!(model));
    body.insert("messages".to_string(), json!(messages));
    body.insert("stream".to_string(), json!(false));
    if let Some(temperature) = temperature {
        body.insert("temperature".to_string(), json!(temperature));
    }
    Value::Object(body)
}

/// Append `context` to `prompt` under a `--- title ---` divider.
pub(crate) fn with_section(prompt: &str, title: &str, context: Option<&str>) -> String {
    match context.filter(|c| !c.is_empty()) {
        Some(context) => format!("{}\n\n--- {} ---\n{}", prompt, title, context),
        None => prompt.to_string(),
    }
}

pub(crate) fn check_temperature(temperature: Option<f64>) -> ToolResult<()> {
    match temperature {
        Some(t) if !(0.0..=1.0).contains(&t) => Err(ToolError::invalid_args(format!(
            "temperature must be between 0 and 1, got {}",
            t
        ))),
        _ => Ok(()),
    }
}

fn model_schema() -> Value {
    json!({ "type": "string", "description": "Kimi model (default: kimi-k2.5)" })
}

#[async_trait]
impl ToolServer for KimiAdapter {
    fn info(&self) -> ServerInfo {
        ServerInfo::new("prism-kimi")
    }

    fn tools(&self) -> Vec<ToolDef> {
        vec![
            ToolDef::new(
                "kimi_write",
                "Write polished prose, documentation, or long-form content using Kimi. Kimi excels at natural, well-structured writing with strong narrative flow.",
                json!({
                    "type": "object",
                    "properties": {
                        "prompt": { "type": "string", "description": "Writing prompt: describe what to write, the audience, tone, and any constraints" },
                        "context": { "type": "string", "description": "Reference material, outlines, or source content to inform the writing" },
                        "model": model_schema(),
                        "temperature": { "type": "number", "minimum": 0, "maximum": 1, "description": "Creativity level 0-1 (default: 0.7 for writing)" }
                    },
                    "required": ["prompt"]
                }),
            ),
            ToolDef::new(
                "kimi_generate",
                "General-purpose text and code generation using Kimi. Supports Kimi's 256K context window for large inputs.",
                json!({
                    "type": "object",
                    "properties": {
                        "prompt": { "type": "string", "description": "The prompt to send to Kimi" },
                        "system": { "type": "string", "description": "Optional system message to set behavior" },
                        "model": model_schema(),
                        "temperature": { "type": "number", "minimum": 0, "maximum": 1, "description": "Temperature 0-1" }
                    },
                    "required": ["prompt"]
                }),
            ),
            ToolDef::new(
                "kimi_analyze",
                "Analyze large amounts of text, code, or data using Kimi's 256K context window. Good for codebase analysis, document review, and comparative analysis.",
                json!({
                    "type": "object",
                    "properties": {
                        "prompt": { "type": "string", "description": "Analysis prompt: what to analyze and what questions to answer" },
                        "context": { "type": "string", "description": "Content to analyze (code, documents, data)" },
                        "model": model_schema()
                    },
                    "required": ["prompt"]
                }),
            ),
        ]
    }

    async fn call(&self, name: &str, arguments: Value) -> Option<ToolOutput> {
        let result = match name {
            "kimi_write" => match parse_arguments(arguments) {
                Ok(args) => self.write(args).await,
                Err(e) => Err(e),
            },
            "kimi_generate" => match parse_arguments(arguments) {
                Ok(args) => self.generate(args).await,
                Err(e) => Err(e),
            },
            "kimi_analyze" => match parse_arguments(arguments) {
                Ok(args) => self.analyze(args).await,
                Err(e) => Err(e),
            },
            _ => return None,
        };
        Some(ToolOutput::from_result(result))
    }
}
