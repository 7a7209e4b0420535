//! Tool server contract and the stdio JSON-RPC loop that serves it.
//!
//! Each adapter implements [`ToolServer`]. [`serve`] reads newline-delimited
//! JSON-RPC 2.0 messages, answers `initialize`, `ping`, `tools/list` and
//! `tools/call`, and writes one response line per request. Notifications are
//! never answered.

use crate::envelope::ToolOutput;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// Protocol version announced when the client does not request one.
pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";

const PARSE_ERROR: i32 = -32700;
const METHOD_NOT_FOUND: i32 = -32601;
const INVALID_PARAMS: i32 = -32602;
const INTERNAL_ERROR: i32 = -32603;

/// Name and version reported in the `initialize` handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

impl ServerInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// An advertised operation and its argument schema.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

impl ToolDef {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// An adapter exposing named operations.
///
/// # Example
///
/// ```rust,ignore
/// use prism_core::server::{ToolServer, serve_stdio};
///
/// serve_stdio(Arc::new(adapter)).await?;
/// ```
#[async_trait]
pub trait ToolServer: Send + Sync {
    /// Server identity for the handshake.
    fn info(&self) -> ServerInfo;

    /// The advertised operations.
    fn tools(&self) -> Vec<ToolDef>;

    /// Invoke `name` with `arguments`.
    ///
    /// Returns `None` for an unknown operation. Operation failures are
    /// reported inside the returned envelope, never as `None`.
    async fn call(&self, name: &str, arguments: Value) -> Option<ToolOutput>;
}

/// Deserialize tool arguments into a typed record.
///
/// Missing arguments are treated as an empty object.
pub fn parse_arguments<T: serde::de::DeserializeOwned>(
    arguments: Value,
) -> crate::error::ToolResult<T> {
    let arguments = if arguments.is_null() {
        json!({})
    } else {
        arguments
    };
    serde_json::from_value(arguments)
        .map_err(|e| crate::error::ToolError::invalid_args(e.to_string()))
}

/// JSON-RPC 2.0 request or notification.
#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    #[allow(dead_code)]
    #[serde(default)]
    jsonrpc: Option<String>,
    method: String,
    #[serde(default)]
    params: Option<Value>,
    #[serde(default)]
    id: Option<Value>,
}

/// JSON-RPC 2.0 response.
#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
    id: Value,
}

#[derive(Debug, Serialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

impl JsonRpcResponse {
    fn result(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            result: Some(result),
            error: None,
            id,
        }
    }

    fn error(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
            id,
        }
    }
}

/// Serve `server` over process stdin/stdout until stdin closes.
pub async fn serve_stdio(server: Arc<dyn ToolServer>) -> std::io::Result<()> {
    serve(
        server,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await
}

/// Serve `server` over an arbitrary line-oriented reader and writer.
///
/// Every request is handled on its own task; a single writer task serializes
/// responses. Returns after the reader hits end of input and all in-flight
/// requests have been answered. Lines that are not UTF-8 get a parse error
/// reply; a read failure is returned only after in-flight requests drain.
pub async fn serve<R, W>(server: Arc<dyn ToolServer>, reader: R, writer: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let info = server.info();
    tracing::info!("Starting {} {} on stdio", info.name, info.version);

    let (tx, rx) = mpsc::unbounded_channel::<JsonRpcResponse>();
    let writer_task = tokio::spawn(write_responses(writer, rx));
    let mut in_flight = JoinSet::new();

    let mut reader = reader;
    let mut buf = Vec::new();
    let read_result = loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break Ok(()),
            Ok(_) => {}
            Err(e) => {
                tracing::error!("Failed to read from input: {}", e);
                break Err(e);
            }
        }

        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line,
            Err(e) => {
                tracing::error!("Received a line that is not valid UTF-8: {}", e);
                let _ = tx.send(JsonRpcResponse::error(
                    Value::Null,
                    PARSE_ERROR,
                    format!("Parse error: {}", e),
                ));
                continue;
            }
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        tracing::debug!("Received: {}", trimmed);

        let request: JsonRpcRequest = match serde_json::from_str(trimmed) {
            Ok(request) => request,
            Err(e) => {
                tracing::error!("Failed to parse JSON-RPC request: {}", e);
                let _ = tx.send(JsonRpcResponse::error(
                    Value::Null,
                    PARSE_ERROR,
                    format!("Parse error: {}", e),
                ));
                continue;
            }
        };

        let server = server.clone();
        let tx = tx.clone();
        in_flight.spawn(async move {
            if let Some(response) = handle_request(server.as_ref(), request).await {
                let _ = tx.send(response);
            }
        });
    };

    while let Some(joined) = in_flight.join_next().await {
        if let Err(e) = joined {
            tracing::error!("Request task failed: {}", e);
        }
    }

    drop(tx);
    writer_task
        .await
        .map_err(|e| std::io::Error::other(e.to_string()))??;

    tracing::info!("{} shutting down", info.name);
    read_result
}

async fn write_responses<W>(
    mut writer: W,
    mut rx: mpsc::UnboundedReceiver<JsonRpcResponse>,
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let mut line = serde_json::to_vec(&response).map_err(std::io::Error::other)?;
        line.push(b'\n');
        writer.write_all(&line).await?;
        writer.flush().await?;
    }
    Ok(())
}

async fn handle_request(server: &dyn ToolServer, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
    let Some(id) = request.id else {
        tracing::debug!("Handling notification {}", request.method);
        return None;
    };

    let response = match request.method.as_str() {
        "initialize" => {
            let requested = request
                .params
                .as_ref()
                .and_then(|p| p.get("protocolVersion"))
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_PROTOCOL_VERSION);
            JsonRpcResponse::result(
                id,
                json!({
                    "protocolVersion": requested,
                    "capabilities": { "tools": {} },
                    "serverInfo": server.info(),
                }),
            )
        }
        "ping" => JsonRpcResponse::result(id, json!({})),
        "tools/list" => JsonRpcResponse::result(id, json!({ "tools": server.tools() })),
        "tools/call" => handle_tool_call(server, id, request.params).await,
        other => JsonRpcResponse::error(id, METHOD_NOT_FOUND, format!("Method not found: {}", other)),
    };
    Some(response)
}

async fn handle_tool_call(server: &dyn ToolServer, id: Value, params: Option<Value>) -> JsonRpcResponse {
    let params = params.unwrap_or(Value::Null);
    let Some(name) = params.get("name").and_then(Value::as_str) else {
        return JsonRpcResponse::error(id, INVALID_PARAMS, "Missing tool name");
    };
    let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

    tracing::debug!("Tool call: {}", name);

    match server.call(name, arguments).await {
        Some(output) => match serde_json::to_value(output) {
            Ok(result) => JsonRpcResponse::result(id, result),
            Err(e) => JsonRpcResponse::error(id, INTERNAL_ERROR, e.to_string()),
        },
        None => JsonRpcResponse::error(id, INVALID_PARAMS, format!("Unknown tool: {}", name)),
    }
}
