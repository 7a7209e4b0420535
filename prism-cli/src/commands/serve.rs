//! Implementation of the adapter subcommands.
//!
//! Each run:
//! 1. Loads configuration (file, then environment, then command-line flags)
//! 2. Verifies that any CLI the adapter wraps can be found
//! 3. Serves the adapter's tools over stdin/stdout until the host hangs up
//!
//! `prism codex` without `--exec-tools` skips the tool loop and hands stdio
//! to `codex mcp-server` instead.

use crate::config::{GeminiMode, PrismConfig};
use crate::errors::CliError;
use prism_adapters::{
    CodexExecAdapter, CortexAdapter, GeminiAdapter, GeminiApi, GeminiCli, GenerativeBackend,
    KimiAdapter, run_passthrough,
};
use prism_core::{ProcessRunner, TokenCache, ToolServer, serve_stdio};
use std::path::PathBuf;
use std::sync::Arc;

/// Which adapter to serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterKind {
    Codex,
    Cortex,
    Gemini,
    Kimi,
}

/// Options for an adapter subcommand.
#[derive(Debug, Clone)]
pub struct ServeOptions {
    pub adapter: AdapterKind,
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Override the wrapped CLI binary (codex and gemini).
    pub binary: Option<PathBuf>,
    /// Serve `codex_exec` instead of the passthrough.
    pub exec_tools: bool,
    /// Override the Gemini backend.
    pub gemini_mode: Option<GeminiMode>,
}

impl ServeOptions {
    pub fn new(adapter: AdapterKind) -> Self {
        Self {
            adapter,
            config: None,
            binary: None,
            exec_tools: false,
            gemini_mode: None,
        }
    }

    /// Apply command-line flags on top of file and environment values.
    fn apply_to(&self, config: &mut PrismConfig) {
        if let Some(mode) = self.gemini_mode {
            config.gemini.mode = mode;
        }
        if let Some(binary) = &self.binary {
            match self.adapter {
                AdapterKind::Codex => config.codex.path = Some(binary.clone()),
                AdapterKind::Gemini => config.gemini.path = Some(binary.clone()),
                AdapterKind::Cortex | AdapterKind::Kimi => {
                    tracing::warn!("--path has no effect for this adapter");
                }
            }
        }
    }
}

/// Run an adapter subcommand and return the process exit code.
pub async fn run_serve(options: ServeOptions) -> Result<i32, CliError> {
    let mut config = PrismConfig::load(options.config.as_deref())?;
    options.apply_to(&mut config);

    if options.adapter == AdapterKind::Codex && !options.exec_tools {
        let binary = config.codex.binary();
        ensure_available("Codex", &binary, "CODEX_PATH").await?;
        return run_passthrough(&binary)
            .await
            .map_err(|e| CliError::CodexStart(e.to_string()));
    }

    let adapter = build_adapter(&config, options.adapter).await?;
    serve_stdio(adapter).await?;
    Ok(0)
}

/// Build the tool server for `kind`, failing fast on a missing CLI.
///
/// For [`AdapterKind::Codex`] this is the `codex_exec` adapter.
pub async fn build_adapter(
    config: &PrismConfig,
    kind: AdapterKind,
) -> Result<Arc<dyn ToolServer>, CliError> {
    let adapter: Arc<dyn ToolServer> = match kind {
        AdapterKind::Codex => {
            let binary = config.codex.binary();
            ensure_available("Codex", &binary, "CODEX_PATH").await?;
            Arc::new(CodexExecAdapter::new(binary).with_timeout_ms(config.codex.exec_timeout_ms))
        }
        AdapterKind::Cortex => Arc::new(CortexAdapter::new(
            config.cortex.settings(),
            Arc::new(TokenCache::new()),
        )),
        AdapterKind::Gemini => {
            let backend: Box<dyn GenerativeBackend> = match config.gemini.mode {
                GeminiMode::Cli => {
                    let binary = config.gemini.binary();
                    ensure_available("Gemini", &binary, "GEMINI_PATH").await?;
                    Box::new(GeminiCli::new(binary).with_timeout_ms(config.gemini.timeout_ms))
                }
                GeminiMode::Api => {
                    if config.gemini.api_key.is_none() {
                        tracing::warn!("GEMINI_API_KEY is not set; calls will fail until it is");
                    }
                    Box::new(
                        GeminiApi::new(config.gemini.api_key.clone())
                            .with_api_base(config.gemini.api_base.clone())
                            .with_model(config.gemini.model.clone()),
                    )
                }
            };
            Arc::new(GeminiAdapter::new(backend))
        }
        AdapterKind::Kimi => {
            if config.kimi.api_key.is_none() {
                tracing::warn!("MOONSHOT_API_KEY is not set; calls will fail until it is");
            }
            Arc::new(KimiAdapter::new(config.kimi.settings()))
        }
    };
    Ok(adapter)
}

async fn ensure_available(
    name: &'static str,
    binary: &str,
    env_var: &'static str,
) -> Result<(), CliError> {
    if ProcessRunner::is_available(binary).await {
        tracing::debug!("Found {} CLI at {}", name, binary);
        Ok(())
    } else {
        Err(CliError::BinaryNotFound {
            name,
            binary: binary.to_string(),
            env_var,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_flag_targets_adapter_binary() {
        let mut config = PrismConfig::default();
        let options = ServeOptions {
            binary: Some(PathBuf::from("/opt/bin/gemini")),
            gemini_mode: Some(GeminiMode::Cli),
            ..ServeOptions::new(AdapterKind::Gemini)
        };
        options.apply_to(&mut config);

        assert_eq!(config.gemini.binary(), "/opt/bin/gemini");
        assert_eq!(config.codex.binary(), "codex");
    }

    #[test]
    fn test_mode_flag_overrides_config() {
        let mut config = PrismConfig::default();
        config.gemini.mode = GeminiMode::Cli;

        let options = ServeOptions {
            gemini_mode: Some(GeminiMode::Api),
            ..ServeOptions::new(AdapterKind::Gemini)
        };
        options.apply_to(&mut config);
        assert_eq!(config.gemini.mode, GeminiMode::Api);
    }

    #[tokio::test]
    async fn test_missing_cli_fails_fast() {
        let mut config = PrismConfig::default();
        config.gemini.path = Some(PathBuf::from("/nonexistent/prism-test-gemini"));

        let result = build_adapter(&config, AdapterKind::Gemini).await;
        assert!(matches!(
            result,
            Err(CliError::BinaryNotFound { name: "Gemini", .. })
        ));
    }

    #[tokio::test]
    async fn test_api_adapters_need_no_binary() {
        let config = PrismConfig::default();
        for kind in [AdapterKind::Cortex, AdapterKind::Kimi] {
            assert!(build_adapter(&config, kind).await.is_ok());
        }
    }
}
