//! Prism CLI library - configuration and adapter startup.
//!
//! Exposed as a library to enable integration testing.
//!
//! # Modules
//!
//! - [`config`]: `prism.yaml` loading, environment overrides and validation
//! - [`commands`]: building and serving the adapters
//! - [`errors`]: startup errors with user-facing suggestions

pub mod commands;
pub mod config;
pub mod errors;

// Re-export commonly used types for convenience
pub use commands::{AdapterKind, ServeOptions, build_adapter, run_serve};
pub use config::{ConfigError, GeminiMode, PrismConfig};
pub use errors::CliError;
