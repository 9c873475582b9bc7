#![deny(unsafe_code)]

use anyhow::Result;
use clap::{Parser, Subcommand};
use pentest_cli::commands;
use pentest_cli::format::{format_budget_snapshot, format_confidence_score, OutputFormat};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Exit code for runtime errors.
const EXIT_RUNTIME_ERROR: i32 = 1;

#[derive(Parser, Debug)]
#[command(name = "pentest", version, about = "Pentest harness operator CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging.
    #[arg(long)]
    debug: bool,

    /// Output format for subcommands that print structured data.
    #[arg(long, global = true, default_value = "text")]
    format: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Offline-validate an engagement contract file (schema + semantics).
    Contract {
        /// Path to the contract YAML file.
        file: PathBuf,
    },

    /// Print a fresh budget snapshot for a contract, as if no usage had
    /// occurred yet.
    Status {
        /// Path to the contract YAML file.
        file: PathBuf,
    },

    /// Replay a recorded finding through reproduction, without starting the
    /// daemon, and print the resulting confidence score.
    ReplayFinding {
        /// Path to the contract YAML file the replay is gated against.
        #[arg(long)]
        contract: PathBuf,

        /// Path to the JSON-encoded finding to replay.
        finding: PathBuf,

        /// Number of reproduction attempts.
        #[arg(long, default_value_t = 3)]
        count: usize,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.debug { EnvFilter::new("pentest_cli=debug") } else { EnvFilter::new("pentest_cli=info") };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let format: OutputFormat = match cli.format.parse() {
        Ok(f) => f,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(EXIT_RUNTIME_ERROR);
        }
    };

    let result = match cli.command {
        Commands::Contract { file } => cmd_contract(&file),
        Commands::Status { file } => cmd_status(&file, &format),
        Commands::ReplayFinding { contract, finding, count } => cmd_replay_finding(&contract, &finding, count, &format).await,
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(EXIT_RUNTIME_ERROR);
    }
}

fn cmd_contract(file: &std::path::Path) -> Result<()> {
    commands::validate_contract_file(file)?;
    println!("valid");
    Ok(())
}

fn cmd_status(file: &std::path::Path, format: &OutputFormat) -> Result<()> {
    let snapshot = commands::budget_snapshot(file)?;
    println!("{}", format_budget_snapshot(&snapshot, format));
    Ok(())
}

async fn cmd_replay_finding(contract: &std::path::Path, finding_path: &std::path::Path, count: usize, format: &OutputFormat) -> Result<()> {
    let finding = commands::load_finding(finding_path)?;
    let score = commands::replay_finding(contract, &finding, count).await?;
    println!("{}", format_confidence_score(&score, format));
    Ok(())
}
