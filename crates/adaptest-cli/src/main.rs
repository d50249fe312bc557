//! adaptest CLI: take an adaptive quiz in the terminal and manage banks.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(
    name = "adaptest",
    version,
    about = "Adaptive programming quiz scored by an AI judge"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Take an adaptive quiz interactively
    Take {
        /// Path to the question bank .toml
        #[arg(long)]
        bank: PathBuf,

        /// Oracle to score with (default: `default_oracle` from config)
        #[arg(long)]
        oracle: Option<String>,

        /// Override the quiz length (5-15)
        #[arg(long)]
        max_questions: Option<usize>,

        /// Print the summary as JSON instead of a table
        #[arg(long)]
        json: bool,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Validate a question bank
    Validate {
        /// Path to the question bank .toml
        #[arg(long)]
        bank: PathBuf,

        /// Config file path (policy and quiz length to validate against)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Check that an oracle is reachable and the credentials work
    CheckOracle {
        /// Oracle name (default: `default_oracle` from config)
        #[arg(long)]
        oracle: Option<String>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create starter config and example question bank
    Init,
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::from_default_env();
    let filter = match "adaptest=info".parse::<Directive>() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Take {
            bank,
            oracle,
            max_questions,
            json,
            config,
        } => commands::take::execute(bank, oracle, max_questions, json, config).await,
        Commands::Validate { bank, config } => commands::validate::execute(bank, config),
        Commands::CheckOracle { oracle, config } => {
            commands::check_oracle::execute(oracle, config).await
        }
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
