//! Sentinel - host-resident security observability agent
//!
//! Tails system log files, runs them through the detection pipeline,
//! persists threats, and answers a thin client over a local socket.
//!
//! ## Usage
//!
//! ```bash
//! # Start the agent with the default configuration
//! sentinel
//!
//! # With an explicit configuration file
//! sentinel --config /etc/sentinel/config.yml
//!
//! # With verbose logging
//! sentinel -v
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use sentinel_agent::Agent;
use sentinel_config::SentinelConfig;
use sentinel_core::{init_logging, LogGuard, Result, SentinelError};
use tracing::{error, info};

/// Sentinel security observability agent
#[derive(Parser, Debug)]
#[command(name = "sentinel")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file (defaults to /etc/sentinel/config.yml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging (increases log level)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Directory for log files (defaults to /var/log/sentinel/)
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match SentinelConfig::load_or_default(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return exit_code(&e);
        }
    };

    let _guard = match setup_logging(&cli, &config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            return ExitCode::from(1);
        }
    };

    info!("starting Sentinel agent");

    match run_agent(config) {
        Ok(()) => {
            info!("Sentinel agent exited normally");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Sentinel agent error: {e}");
            eprintln!("Error: {e}");
            exit_code(&e)
        }
    }
}

/// Map an error to the process exit code. Unrecoverable startup failures
/// (invalid config, unusable store, unbindable socket) get a distinct
/// code so supervisors can tell them from runtime errors.
fn exit_code(e: &SentinelError) -> ExitCode {
    if e.is_fatal() {
        ExitCode::from(2)
    } else {
        ExitCode::from(1)
    }
}

/// Set up logging from CLI flags and the agent configuration.
fn setup_logging(cli: &Cli, config: &SentinelConfig) -> Result<LogGuard> {
    let level = if cli.verbose > 0 {
        "DEBUG"
    } else {
        config.agent.log_level.as_str()
    };
    init_logging(cli.log_dir.clone(), level)
}

/// Build the runtime, assemble the agent, and run it to completion.
fn run_agent(config: SentinelConfig) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| SentinelError::internal(format!("failed to start runtime: {e}")))?;

    runtime.block_on(async {
        let agent = Agent::new(config)?;
        agent.run().await
    })
}
