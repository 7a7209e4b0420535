//! Tool adapters for Prism.
//!
//! Each adapter implements [`prism_core::ToolServer`]:
//!
//! - [`codex`]: passthrough to `codex mcp-server`, or `codex_exec` over `codex exec --json`
//! - [`cortex`]: Snowflake Cortex Analyst, Complete and Search
//! - [`gemini`]: Gemini via its CLI or its REST API
//! - [`kimi`]: Moonshot's Kimi chat API
//!
//! # Example
//!
//! ```rust,ignore
//! use prism_adapters::kimi::{KimiAdapter, KimiSettings};
//! use prism_core::serve_stdio;
//!
//! let adapter = KimiAdapter::new(KimiSettings::default());
//! serve_stdio(Arc::new(adapter)).await?;
//! ```

pub mod codex;
pub mod cortex;
pub mod gemini;
pub mod http;
pub mod kimi;

// Re-export main types for convenience
pub use codex::{CodexExecAdapter, run_passthrough};
pub use cortex::{CortexAdapter, CortexSettings};
pub use gemini::{GeminiAdapter, GeminiApi, GeminiCli, GenerativeBackend};
pub use kimi::{KimiAdapter, KimiSettings};
