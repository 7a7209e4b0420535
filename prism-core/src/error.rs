//! Error taxonomy shared by every Prism adapter.
//!
//! Errors never leave an operation as a transport fault: the server loop
//! converts them into an error envelope via
//! [`ToolOutput::from_result`](crate::envelope::ToolOutput::from_result).

use thiserror::Error;

/// Errors that can occur while serving a tool operation.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Required credential or identity material is missing.
    #[error("{0}")]
    Configuration(String),

    /// The private key could not be read or decoded.
    #[error("Failed to load private key: {0}")]
    KeyLoad(String),

    /// The subprocess could not be started.
    #[error("Failed to spawn process '{command}': {message}")]
    Spawn { command: String, message: String },

    /// The subprocess exceeded its time bound and was killed.
    #[error("Command timed out after {timeout_ms}ms: {command_line}")]
    Timeout { command_line: String, timeout_ms: u64 },

    /// The upstream service answered with a non-success status.
    #[error("{service} API error ({status}): {body}")]
    Upstream {
        service: String,
        status: u16,
        body: String,
    },

    /// The upstream payload had a shape no fallback could render.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Tool arguments did not match the advertised schema.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// A wrapped CLI exited unsuccessfully.
    #[error("{0}")]
    CommandFailed(String),

    /// The request never produced an HTTP response.
    #[error("Network error: {0}")]
    Network(String),
}

/// Result type for tool operations.
pub type ToolResult<T> = Result<T, ToolError>;

impl ToolError {
    /// Shorthand for a missing-configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Shorthand for an invalid-arguments error.
    pub fn invalid_args(message: impl Into<String>) -> Self {
        Self::InvalidArguments(message.into())
    }
}
