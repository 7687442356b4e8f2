mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "arena-cli")]
#[command(about = "Arena CLI - Inspect languages, import problems, and judge code locally", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the languages submissions may use
    Languages,

    /// Store a problem definition (JSON) in Redis
    ImportProblem {
        /// Path to the problem JSON file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Judge a source file against a problem file through the execution backend
    Run {
        /// Path to the problem JSON file
        #[arg(short, long)]
        problem: PathBuf,

        /// Language name or alias (e.g. cpp, java, js)
        #[arg(short, long)]
        language: String,

        /// Path to the source file
        #[arg(short, long)]
        source: PathBuf,

        /// Use the hidden cases instead of the visible ones
        #[arg(long, default_value = "false")]
        hidden: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Languages => {
            commands::list_languages()?;
        }
        Commands::ImportProblem { file } => {
            commands::import_problem(&file).await?;
        }
        Commands::Run {
            problem,
            language,
            source,
            hidden,
        } => {
            commands::run_source(&problem, &language, &source, hidden).await?;
        }
    }

    Ok(())
}
