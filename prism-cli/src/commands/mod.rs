//! CLI commands for Prism.
//!
//! Every subcommand serves one adapter over stdio:
//!
//! - `prism codex` - passthrough to `codex mcp-server` (`--exec-tools` serves `codex_exec`)
//! - `prism cortex` - Snowflake Cortex Analyst, Complete and Search
//! - `prism gemini` - Gemini via its CLI or REST API (`--mode cli|api`)
//! - `prism kimi` - Moonshot's Kimi chat API

pub mod serve;

pub use serve::{AdapterKind, ServeOptions, build_adapter, run_serve};
