use crate::config::ConfigError;
use thiserror::Error;

/// Failures that stop `prism` before or outside the tool loop.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{name} CLI not found: {binary}")]
    BinaryNotFound {
        name: &'static str,
        binary: String,
        env_var: &'static str,
    },

    #[error("Failed to start codex: {0}")]
    CodexStart(String),

    #[error("Failed to create tokio runtime: {0}")]
    Runtime(String),

    #[error("Stdio transport failed: {0}")]
    Transport(#[from] std::io::Error),
}

impl CliError {
    /// Get a suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            CliError::Config(ConfigError::NotFound(_)) => Some(
                "Create prism.yaml in the current directory, or use --config to specify a path"
                    .to_string(),
            ),
            CliError::Config(_) => {
                Some("Check prism.yaml for typos and unsupported values.".to_string())
            }
            CliError::BinaryNotFound { name, env_var, .. } => Some(format!(
                "Install the {} CLI and make sure it is on PATH, or point {} (or --path) at the binary.",
                name, env_var
            )),
            CliError::CodexStart(_) => {
                Some("Make sure Codex CLI is installed: npm install -g @openai/codex".to_string())
            }
            CliError::Runtime(_) | CliError::Transport(_) => None,
        }
    }

    /// Format error with suggestion for CLI output
    pub fn format_for_cli(&self) -> String {
        let mut output = format!("Error: {}", self);

        if let Some(suggestion) = self.suggestion() {
            output.push_str(&format!("\n\nSuggestion: {}", suggestion));
        }

        output
    }
}
