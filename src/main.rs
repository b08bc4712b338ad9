//! materials-project-mcp: MCP server for Materials Project database queries
//!
//! Exposes materials search, crystal structure, phase diagram and electronic
//! structure lookups as MCP tools for AI assistants.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use materials_project_mcp::config::{self, Config};
use materials_project_mcp::format::Formatter;
use materials_project_mcp::mcp::server::McpServer;
use materials_project_mcp::tools::Dispatcher;
use materials_project_mcp::upstream::{MpSession, UpstreamAdapter};

/// MCP server for Materials Project database queries.
///
/// Speaks MCP over stdio by default. The API key is read from the
/// environment variable named in the configuration (`MP_API_KEY` unless
/// overridden).
#[derive(Parser, Debug)]
#[command(name = "materials-project-mcp")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease logging verbosity (only show errors)
    #[arg(short, long)]
    quiet: bool,

    /// Serve MCP on a local Unix socket instead of stdio
    #[cfg(unix)]
    #[arg(long, value_name = "PATH")]
    socket: Option<PathBuf>,
}

/// Determines the log level from CLI arguments.
#[allow(clippy::match_same_arms)] // Explicit "warn" arm for clarity
fn get_log_level(verbose: u8, quiet: bool, config_level: &str) -> Level {
    if quiet {
        return Level::ERROR;
    }

    match verbose {
        0 => match config_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::WARN,
        },
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Initialises the tracing subscriber. Logs go to stderr; stdout is
/// reserved for protocol messages.
fn init_tracing(level: Level) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Reads the API key from the configured environment variable.
fn read_api_key(cfg: &Config) -> Option<String> {
    let var = &cfg.upstream.api_key_env;
    match std::env::var(var) {
        Ok(key) if !key.trim().is_empty() => Some(key.trim().to_string()),
        _ => {
            warn!(
                env = %var,
                "No Materials Project API key set; upstream requests will be rejected as unauthorised"
            );
            None
        }
    }
}

fn build_server(cfg: &Config) -> Result<McpServer, String> {
    let api_key = read_api_key(cfg);
    let session = MpSession::new(api_key.as_deref(), &cfg.upstream)
        .map_err(|e| format!("Failed to create HTTP client: {e}"))?;

    info!(base_url = %cfg.upstream.base_url, "Materials Project session ready");

    let adapter = UpstreamAdapter::new(Arc::new(session))
        .with_retry_delay(Duration::from_millis(cfg.upstream.retry_delay_ms))
        .with_thermo_type(cfg.upstream.thermo_type.as_str());
    let dispatcher = Dispatcher::new(adapter, Formatter::from_config(&cfg.output));

    Ok(McpServer::new(dispatcher))
}

/// Entry point for the materials-project-mcp server.
fn main() -> ExitCode {
    let args = Args::parse();

    let config_path = args.config.as_deref();
    let cfg = match config::load_config(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            if config_path.is_none() {
                if let Some(default_path) = config::default_config_path() {
                    eprintln!("\nConfig is read from: {}", default_path.display());
                    eprintln!("See config/example-config.json for the format");
                }
            }
            return ExitCode::FAILURE;
        }
    };

    let log_level = get_log_level(args.verbose, args.quiet, &cfg.logging.level);
    init_tracing(log_level);

    // GPL license notice (GPLv3 Section 5d)
    eprintln!(
        "materials-project-mcp {}  Copyright (C) 2026  The Embedded Society",
        env!("CARGO_PKG_VERSION")
    );
    eprintln!("This program comes with ABSOLUTELY NO WARRANTY.");
    eprintln!("This is free software, licensed under GPL-3.0-or-later.");
    eprintln!("Source: {}", env!("CARGO_PKG_REPOSITORY"));
    eprintln!();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting materials-project-mcp server"
    );

    let mut server = match build_server(&cfg) {
        Ok(server) => server,
        Err(e) => {
            error!(error = %e, "Startup failed");
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to create Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    #[cfg(unix)]
    let result = match args.socket {
        Some(ref path) => runtime.block_on(server.run_socket(path)),
        None => runtime.block_on(server.run_stdio()),
    };
    #[cfg(not(unix))]
    let result = runtime.block_on(server.run_stdio());

    match result {
        Ok(()) => {
            info!("Server shut down gracefully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}
