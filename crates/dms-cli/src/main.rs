mod commands;
mod config;
mod output;

use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dms_core::{FanOutExecutor, FleetGateway, Operation, StartMode};
use dms_gateway::DmsClient;
use dms_tui::TuiOptions;
use tracing::debug;
use tracing_subscriber::EnvFilter;

const LOG_FILE_ENV: &str = "DMS_MANAGER_LOG_FILE";

#[derive(Parser)]
#[command(name = "dms-manager", version)]
#[command(about = "Manage AWS DMS replication tasks", long_about = None)]
struct Cli {
    /// AWS profile to use
    #[arg(short, long, global = true)]
    profile: Option<String>,
    /// AWS region (default: from profile or AWS_REGION)
    #[arg(short, long, global = true)]
    region: Option<String>,
    /// Custom control-plane endpoint, e.g. a local mock server
    #[arg(long, global = true)]
    endpoint_url: Option<String>,
    /// Configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List all replication tasks
    List {
        /// Show detailed statistics for each task
        #[arg(long)]
        stats: bool,
        /// Print the listing as JSON
        #[arg(long, conflicts_with = "stats")]
        json: bool,
    },
    /// Show detailed information about tasks
    Describe {
        #[arg(required = true, value_name = "TASK")]
        tasks: Vec<String>,
        /// Include per-table statistics
        #[arg(long)]
        tables: bool,
    },
    /// Start tasks in parallel (names, ARNs, "all" or quoted patterns like "prod-*")
    Start {
        #[arg(required = true, value_name = "TASK")]
        tasks: Vec<String>,
        /// start-replication, resume-processing or reload-target
        #[arg(short = 't', long = "type", default_value = "start-replication")]
        start_type: StartMode,
    },
    /// Stop tasks in parallel
    Stop {
        #[arg(required = true, value_name = "TASK")]
        tasks: Vec<String>,
    },
    /// Resume processing on tasks in parallel
    Resume {
        #[arg(required = true, value_name = "TASK")]
        tasks: Vec<String>,
    },
    /// Stop and reload the target of tasks in parallel
    Reload {
        #[arg(required = true, value_name = "TASK")]
        tasks: Vec<String>,
    },
    /// Interactive terminal UI
    Tui,
}

fn filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter("warn"))
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

/// The TUI owns the terminal, so logs go to a file or nowhere.
fn init_tui_logging() -> Result<()> {
    match config::process_env(LOG_FILE_ENV) {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("failed to open log file {path}"))?;
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter("info"))
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .try_init();
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter("info"))
                .with_writer(io::sink)
                .try_init();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Tui => init_tui_logging()?,
        _ => init_logging(),
    }

    let settings = config::load(&config::Overrides {
        profile: cli.profile,
        region: cli.region,
        endpoint_url: cli.endpoint_url,
        config: cli.config,
    })?;
    debug!(?settings, "settings resolved");

    let client = DmsClient::connect(&settings.session)
        .await
        .context("failed to create DMS client")?;
    let region = client.region().to_string();
    let profile = client.profile().to_string();
    let gateway: Arc<dyn FleetGateway> = Arc::new(client);
    let executor =
        FanOutExecutor::new(Arc::clone(&gateway)).with_restart_policy(settings.restart_policy);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match cli.command {
        Command::List { stats, json } => {
            commands::list(gateway.as_ref(), &mut out, (&region, &profile), stats, json).await
        }
        Command::Describe { tasks, tables } => {
            commands::describe(gateway.as_ref(), &mut out, &tasks, tables).await
        }
        Command::Start { tasks, start_type } => {
            let op = Operation::Start(start_type);
            commands::batch(gateway.as_ref(), &executor, &mut out, &tasks, op).await
        }
        Command::Stop { tasks } => {
            commands::batch(gateway.as_ref(), &executor, &mut out, &tasks, Operation::Stop).await
        }
        Command::Resume { tasks } => {
            commands::batch(gateway.as_ref(), &executor, &mut out, &tasks, Operation::resume())
                .await
        }
        Command::Reload { tasks } => {
            commands::batch(gateway.as_ref(), &executor, &mut out, &tasks, Operation::reload())
                .await
        }
        Command::Tui => {
            drop(out);
            let options = TuiOptions {
                region,
                profile,
                auto_refresh: true,
                refresh_interval: settings.refresh_interval,
            };
            dms_tui::run(gateway, executor, options).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn start_type_parses_and_globals_work_after_subcommand() {
        let cli = Cli::try_parse_from([
            "dms-manager",
            "start",
            "prod-*",
            "--type",
            "resume-processing",
            "-r",
            "eu-west-1",
        ])
        .unwrap();
        assert_eq!(cli.region.as_deref(), Some("eu-west-1"));
        match cli.command {
            Command::Start { tasks, start_type } => {
                assert_eq!(tasks, vec!["prod-*"]);
                assert_eq!(start_type, StartMode::ResumeProcessing);
            }
            _ => panic!("expected start"),
        }

        assert!(Cli::try_parse_from(["dms-manager", "start", "x", "--type", "sideways"]).is_err());
        assert!(Cli::try_parse_from(["dms-manager", "stop"]).is_err());
    }
}
