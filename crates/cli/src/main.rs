//! Jobtrack CLI
//!
//! Terminal front end for resume onboarding and job-search Q&A.

mod ask;
mod config;
mod logging;
mod onboard;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;

#[derive(Parser)]
#[command(name = "jobtrack")]
#[command(about = "Jobtrack CLI - resume onboarding and job-search Q&A", long_about = None)]
struct Cli {
    /// API base URL (overrides the config file and JOBTRACK_API_URL)
    #[arg(long, global = true)]
    server: Option<String>,

    /// Config file (default: ~/.jobtrack/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a resume and answer the profile questions
    Onboard {
        /// Resume to analyze (PDF)
        resume: PathBuf,

        /// Print the created profile as JSON when done
        #[arg(long)]
        json: bool,
    },
    /// Ask the reasoning service a job-search question
    Ask {
        /// Question to ask
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },
    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_guard = logging::init_logging()?;
    let config = config::load(cli.config.as_deref(), cli.server.as_deref())?;

    tracing::info!(
        component = "cli",
        event = "cli.started",
        api_base_url = %config.api_base_url,
        "Jobtrack CLI started"
    );

    let result = match cli.command {
        Commands::Onboard { resume, json } => onboard::run(config, resume, json).await,
        Commands::Ask { query } => ask::run(config, query.join(" ")).await,
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(
            component = "cli",
            event = "cli.failed",
            error = %e,
            "Command failed"
        );
        drop(log_guard);
        eprintln!("{} {e:#}", style("error:").red().bold());
        std::process::exit(1);
    }
    Ok(())
}
