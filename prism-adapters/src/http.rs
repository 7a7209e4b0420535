//! Authenticated JSON POST shared by the HTTP-backed adapters.

use prism_core::normalize::parse_event_stream;
use prism_core::{ToolError, ToolResult};
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use serde_json::Value;

/// A successful HTTP reply before JSON decoding.
#[derive(Debug, Clone)]
pub struct RawReply {
    pub content_type: String,
    pub body: String,
}

impl RawReply {
    /// Whether the upstream answered with a server-sent event stream.
    pub fn is_event_stream(&self) -> bool {
        self.content_type.contains("text/event-stream")
    }
}

/// A decoded JSON reply.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonReply {
    /// A single JSON document.
    Document(Value),
    /// The reassembled chunks of an event stream.
    Events(Vec<Value>),
}

/// POST `body` as JSON to `url`.
///
/// # Errors
/// - `ToolError::Network` if no response was received
/// - `ToolError::Upstream` for a non-success status, carrying the body text
pub async fn post(
    client: &reqwest::Client,
    service: &str,
    url: &str,
    headers: HeaderMap,
    body: &Value,
) -> ToolResult<RawReply> {
    tracing::debug!("POST {}", url);

    let response = client
        .post(url)
        .headers(headers)
        .json(body)
        .send()
        .await
        .map_err(|e| ToolError::Network(format!("{} request failed: {}", service, e)))?;

    let status = response.status();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let body = response
        .text()
        .await
        .map_err(|e| ToolError::Network(format!("failed to read {} response: {}", service, e)))?;

    if !status.is_success() {
        return Err(ToolError::Upstream {
            service: service.to_string(),
            status: status.as_u16(),
            body,
        });
    }

    Ok(RawReply { content_type, body })
}

/// POST `body` and decode the reply as JSON, reassembling event streams.
///
/// # Errors
/// As [`post`], plus `ToolError::MalformedResponse` when a non-stream body is
/// not JSON.
pub async fn post_json(
    client: &reqwest::Client,
    service: &str,
    url: &str,
    headers: HeaderMap,
    body: &Value,
) -> ToolResult<JsonReply> {
    let reply = post(client, service, url, headers, body).await?;

    if reply.is_event_stream() {
        return Ok(JsonReply::Events(parse_event_stream(&reply.body)));
    }

    serde_json::from_str(&reply.body)
        .map(JsonReply::Document)
        .map_err(|e| {
            ToolError::MalformedResponse(format!("{} returned invalid JSON: {}", service, e))
        })
}
