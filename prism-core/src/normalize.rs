//! Turning raw upstream payloads into answer text.
//!
//! Upstream tools interleave diagnostics with their payloads, so nothing in
//! this module fails: every routine degrades to a best-effort string.

use serde_json::Value;

/// Parse a line-delimited JSON event log, skipping lines that are not JSON.
pub fn parse_event_log(raw: &str) -> Vec<Value> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| match serde_json::from_str(line) {
            Ok(event) => Some(event),
            Err(_) => {
                tracing::debug!("Skipping non-JSON event line: {}", line);
                None
            }
        })
        .collect()
}

/// Extract the final answer from a parsed event log.
///
/// Scans backwards for the latest assistant message or `turn.completed`
/// output. Falls back to the whole log as pretty JSON.
pub fn event_log_answer(events: &[Value]) -> String {
    for event in events.iter().rev() {
        match event.get("type").and_then(Value::as_str) {
            Some("message") if event.get("role").and_then(Value::as_str) == Some("assistant") => {
                return non_empty_field(event, "content")
                    .or_else(|| non_empty_field(event, "text"))
                    .unwrap_or_else(|| event.to_string());
            }
            Some("turn.completed") => {
                if let Some(output) = event.get("output").filter(|v| is_truthy(v)) {
                    return value_text(output);
                }
            }
            _ => {}
        }
    }

    to_pretty(&Value::Array(events.to_vec()))
}

/// Recognized shapes of a single-document upstream reply.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamReply {
    /// A line-delimited event log.
    EventLog(Vec<Value>),
    /// Generative-language `candidates[0].content.parts`, one entry per part.
    Candidates(Vec<String>),
    /// A document carrying its answer in `text` or `response`.
    DirectText(String),
    /// Valid JSON with no recognized answer field.
    Structured(Value),
    /// Not JSON at all.
    PlainText(String),
}

impl UpstreamReply {
    /// Classify a single JSON document or plain text.
    pub fn decode(raw: &str) -> Self {
        let Ok(parsed) = serde_json::from_str::<Value>(raw) else {
            return Self::PlainText(raw.trim().to_string());
        };

        if let Some(candidates) = parsed.get("candidates").filter(|v| is_truthy(v)) {
            let parts = candidates
                .get(0)
                .and_then(|c| c.get("content"))
                .and_then(|c| c.get("parts"))
                .and_then(Value::as_array)
                .map(|parts| parts.iter().map(part_text).collect())
                .unwrap_or_default();
            return Self::Candidates(parts);
        }

        if let Some(text) = non_empty_field(&parsed, "text") {
            return Self::DirectText(text);
        }
        if let Some(text) = non_empty_field(&parsed, "response") {
            return Self::DirectText(text);
        }

        Self::Structured(parsed)
    }

    /// Classify a line-delimited event log.
    pub fn decode_event_log(raw: &str) -> Self {
        Self::EventLog(parse_event_log(raw))
    }

    /// Render the reply as answer text.
    pub fn into_text(self) -> String {
        match self {
            Self::EventLog(events) => event_log_answer(&events),
            Self::Candidates(parts) => parts.join("\n"),
            Self::DirectText(text) | Self::PlainText(text) => text,
            Self::Structured(value) => to_pretty(&value),
        }
    }
}

/// Reassemble a server-sent event stream into its JSON payloads.
///
/// Only `data: ` lines count; `data: [DONE]` ends the stream and payloads
/// that fail to parse are skipped.
pub fn parse_event_stream(raw: &str) -> Vec<Value> {
    let mut chunks = Vec::new();
    for line in raw.lines() {
        let Some(data) = line.strip_prefix("data: ") else {
            continue;
        };
        let data = data.trim_end_matches('\r');
        if data == "[DONE]" {
            break;
        }
        match serde_json::from_str(data) {
            Ok(chunk) => chunks.push(chunk),
            Err(_) => tracing::debug!("Skipping malformed event-stream chunk: {}", data),
        }
    }
    chunks
}

/// Answer text of an OpenAI-compatible chat completion document.
pub fn chat_completion_text(document: &Value) -> String {
    let choice = document.get("choices").and_then(|c| c.get(0));
    choice
        .and_then(|c| c.get("message"))
        .and_then(|m| non_empty_field(m, "content"))
        .or_else(|| choice.and_then(|c| non_empty_field(c, "text")))
        .unwrap_or_else(|| document.to_string())
}

/// `choices[0].message.content` of a chat completion, empty strings included.
///
/// Only a missing or null field falls back to the whole document as JSON.
pub fn chat_message_content(document: &Value) -> String {
    match document.pointer("/choices/0/message/content") {
        None | Some(Value::Null) => document.to_string(),
        Some(content) => value_text(content),
    }
}

/// Concatenated `choices[0].delta.content` of streamed completion chunks.
pub fn chat_stream_text(chunks: &[Value]) -> String {
    chunks
        .iter()
        .filter_map(|chunk| {
            chunk
                .get("choices")
                .and_then(|c| c.get(0))
                .and_then(|c| c.get("delta"))
                .and_then(|d| d.get("content"))
                .and_then(Value::as_str)
        })
        .collect()
}

/// Text of a value: strings as-is, everything else as compact JSON.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn part_text(part: &Value) -> String {
    non_empty_field(part, "text").unwrap_or_else(|| part.to_string())
}

/// A field rendered as text, ignoring absent, null, empty or false values.
fn non_empty_field(value: &Value, field: &str) -> Option<String> {
    value.get(field).filter(|v| is_truthy(v)).map(value_text)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn to_pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
