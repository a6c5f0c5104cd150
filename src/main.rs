//! Guardian CLI entry point.
//!
//! Provides `handle`, which answers one JSON message read from stdin, and
//! `status`, which prints the membrane's configuration and journal state.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::AsyncReadExt;
use tracing::debug;

use guardian::actions::{CommandLimits, ReqwestTransport};
use guardian::config::GuardianConfig;
use guardian::guard::Guardian;
use guardian::ipc::Dispatcher;
use guardian::logging;

/// Guardian: audited execution membrane for high-risk actions.
#[derive(Parser)]
#[command(name = "guardian", version, about)]
struct Cli {
    /// Config file to load instead of the default location.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Also write JSON logs to this directory with daily rotation.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Read one JSON message from stdin and write the reply to stdout.
    Handle,
    /// Print membrane status as JSON.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    let _logging_guard = match &cli.log_dir {
        Some(dir) => Some(logging::init_production(dir, &config.log_level)?),
        None => {
            logging::init_cli(&config.log_level);
            None
        }
    };
    debug!(enabled = config.enabled, "configuration loaded");

    match cli.command {
        Command::Handle => handle(&config).await,
        Command::Status => status(&config),
    }
}

/// Load config from an explicit path or the default location, then apply env overrides.
fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<GuardianConfig> {
    match path {
        Some(path) => {
            let mut config = GuardianConfig::load_from_file(path)?;
            config.apply_overrides(|key| std::env::var(key).ok());
            Ok(config)
        }
        None => GuardianConfig::load().context("failed to load configuration"),
    }
}

/// Answer one message from stdin.
async fn handle(config: &GuardianConfig) -> anyhow::Result<ExitCode> {
    let mut raw = String::new();
    tokio::io::stdin()
        .read_to_string(&mut raw)
        .await
        .context("failed to read stdin")?;

    let transport = ReqwestTransport::new(Duration::from_secs(config.http.timeout_secs))
        .context("failed to build HTTP client")?;
    let dispatcher = Dispatcher::new(
        Guardian::from_config(config),
        CommandLimits::from_config(&config.command),
        Arc::new(transport),
    );

    let reply = dispatcher.handle(&raw).await;
    println!("{}", reply.body);
    Ok(ExitCode::from(u8::try_from(reply.exit_code).unwrap_or(1)))
}

/// Print membrane status.
fn status(config: &GuardianConfig) -> anyhow::Result<ExitCode> {
    let guardian = Guardian::from_config(config);
    let rendered = serde_json::to_string_pretty(&guardian.status())?;
    println!("{rendered}");
    Ok(ExitCode::SUCCESS)
}
