//! Uniform operation envelope.
//!
//! Every tool call answers with a `content` array of text blocks. Failures
//! carry `isError: true` and a message prefixed with `Error: `.

use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// One block of tool output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    /// Plain text.
    Text { text: String },
}

/// The result of a tool operation as seen by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub content: Vec<ContentBlock>,
    #[serde(rename = "isError", default, skip_serializing_if = "is_false")]
    pub is_error: bool,
}

fn is_false(flag: &bool) -> bool {
    !*flag
}

impl ToolOutput {
    /// Successful text result.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::Text { text: text.into() }],
            is_error: false,
        }
    }

    /// Error result; the message is prefixed with `Error: `.
    pub fn error(message: impl Display) -> Self {
        Self {
            content: vec![ContentBlock::Text {
                text: format!("Error: {}", message),
            }],
            is_error: true,
        }
    }

    /// Wrap an operation result, converting any error into an error envelope.
    pub fn from_result<E: Display>(result: Result<String, E>) -> Self {
        match result {
            Ok(text) => Self::text(text),
            Err(e) => {
                tracing::debug!("Operation failed: {}", e);
                Self::error(e)
            }
        }
    }

    /// Concatenated text of all blocks.
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .map(|block| match block {
                ContentBlock::Text { text } => text.as_str(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
