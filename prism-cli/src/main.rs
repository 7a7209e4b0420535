//! Prism CLI - serve AI CLIs and cloud APIs as MCP tools.
//!
//! Each subcommand runs one adapter speaking JSON-RPC over stdin/stdout.
//! Logs go to stderr.
//!
//! # Commands
//!
//! - `prism codex` - Passthrough to `codex mcp-server`
//! - `prism cortex` - Snowflake Cortex Analyst, Complete and Search
//! - `prism gemini` - Gemini generation, analysis and research
//! - `prism kimi` - Kimi writing, generation and analysis
//!
//! # Usage
//!
//! ```bash
//! # Serve Gemini through its REST API
//! GEMINI_API_KEY=... prism gemini --mode api
//!
//! # Serve codex_exec with debug logging
//! prism -v codex --exec-tools
//!
//! # Use a specific configuration file
//! prism --config ./prism.yaml cortex
//! ```

use clap::{Parser, Subcommand};
use prism_cli::{AdapterKind, CliError, GeminiMode, ServeOptions, run_serve};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Prism - serve AI CLIs and cloud APIs as MCP tools
#[derive(Parser)]
#[command(name = "prism")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the configuration file (default: ./prism.yaml if present)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level (overrides PRISM_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve Codex (passthrough to `codex mcp-server`)
    Codex {
        /// Path to the codex binary
        #[arg(long)]
        path: Option<PathBuf>,

        /// Serve codex_exec over `codex exec --json` instead of the passthrough
        #[arg(long)]
        exec_tools: bool,
    },

    /// Serve Snowflake Cortex Analyst, Complete and Search
    Cortex,

    /// Serve Gemini generate, analyze and research
    Gemini {
        /// Backend: the gemini CLI or the REST API
        #[arg(long, value_enum)]
        mode: Option<GeminiMode>,

        /// Path to the gemini binary (CLI mode)
        #[arg(long)]
        path: Option<PathBuf>,
    },

    /// Serve Kimi write, generate and analyze
    Kimi,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("PRISM_LOG").unwrap_or_else(|_| EnvFilter::new("info"))
    };

    // stdout carries the protocol
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init()
        .ok();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut options = match cli.command {
        Commands::Codex { path, exec_tools } => ServeOptions {
            binary: path,
            exec_tools,
            ..ServeOptions::new(AdapterKind::Codex)
        },
        Commands::Cortex => ServeOptions::new(AdapterKind::Cortex),
        Commands::Gemini { mode, path } => ServeOptions {
            binary: path,
            gemini_mode: mode,
            ..ServeOptions::new(AdapterKind::Gemini)
        },
        Commands::Kimi => ServeOptions::new(AdapterKind::Kimi),
    };
    options.config = cli.config;

    let result = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime.block_on(run_serve(options)),
        Err(e) => Err(CliError::Runtime(e.to_string())),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{}", e.format_for_cli());
            std::process::exit(1);
        }
    }
}
