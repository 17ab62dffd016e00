use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cmd;

#[derive(Parser)]
#[command(name = "gauntlet")]
#[command(version, about = "Quality-gate orchestrator for AI-assisted development workflows")]
pub struct Cli {
    /// Project root the checks run against.
    #[arg(long, global = true)]
    pub project_root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute one gate run and print the JSON report
    Run {
        /// Task or session identity the failure streak is keyed by
        #[arg(long, default_value = "default")]
        task_key: String,

        /// Files touched by the current change (comma separated)
        #[arg(long, value_delimiter = ',')]
        changed_files: Vec<String>,

        /// Estimated dependent-file count for the change
        #[arg(long, default_value = "0")]
        blast_radius: u32,

        /// Also print a human-readable summary to stderr
        #[arg(long)]
        human: bool,
    },
    /// Show the effective check registry
    Checks,
    /// Show breaker state and recent gate runs
    Status {
        /// Limit output to one task key
        #[arg(long)]
        task_key: Option<String>,

        /// Number of recent runs to show
        #[arg(long, default_value = "10")]
        limit: usize,
    },
    /// Reset the failure streak for a task key (explicit user override)
    Reset {
        #[arg(long)]
        task_key: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let project_root = cli
        .project_root
        .map(Ok)
        .unwrap_or_else(std::env::current_dir)?;

    match cli.command {
        Commands::Run {
            task_key,
            changed_files,
            blast_radius,
            human,
        } => {
            let code =
                cmd::cmd_run(&project_root, &task_key, changed_files, blast_radius, human).await?;
            std::process::exit(code);
        }
        Commands::Checks => cmd::cmd_checks(&project_root),
        Commands::Status { task_key, limit } => {
            cmd::cmd_status(&project_root, task_key.as_deref(), limit)
        }
        Commands::Reset { task_key } => cmd::cmd_reset(&project_root, &task_key),
    }
}
