//! Shared runtime for Prism tool adapters.
//!
//! Prism exposes AI CLIs and cloud APIs to an orchestrating host as named
//! tool operations over the MCP stdio protocol. This crate holds everything
//! the individual adapters have in common:
//!
//! - [`runner`]: subprocess spawning with stdin, output capture and timeout
//! - [`normalize`]: turning event logs, event streams and JSON documents into answer text
//! - [`signer`]: key-pair assertion signing with an injectable cache
//! - [`router`]: keyword-based domain routing
//! - [`envelope`]: the uniform success/error result
//! - [`server`]: the [`ToolServer`] trait and the JSON-RPC stdio loop
//!
//! # Example
//!
//! ```rust,ignore
//! use prism_core::{ToolServer, serve_stdio};
//!
//! let adapter: Arc<dyn ToolServer> = Arc::new(MyAdapter::new());
//! serve_stdio(adapter).await?;
//! ```

pub mod envelope;
pub mod error;
pub mod normalize;
pub mod router;
pub mod runner;
pub mod server;
pub mod signer;

// Re-export main types for convenience
pub use envelope::{ContentBlock, ToolOutput};
pub use error::{ToolError, ToolResult};
pub use normalize::UpstreamReply;
pub use router::{DomainRouter, DomainRule};
pub use runner::{ProcessRunner, RunOptions, RunOutput};
pub use server::{ServerInfo, ToolDef, ToolServer, parse_arguments, serve, serve_stdio};
pub use signer::{Clock, SignerConfig, SystemClock, TokenCache, TokenSigner};
