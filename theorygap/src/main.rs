//! theorygap - find the opening positions you keep getting wrong.
//!
//! Three subcommands:
//!
//! 1. **`analyze`**: runs a local Stockfish on one position and prints the
//!    best lines.
//! 2. **`run`**: starts a remote analysis job over your recent games and
//!    shows its progress until it completes.
//! 3. **`errors`**: lists the positions where you most often go wrong.
//!
//! See [`config`] for the environment variables that tune it.

use clap::{Parser, Subcommand};

mod commands;
mod config;
mod logging;
mod render;

#[derive(Parser)]
#[command(name = "theorygap", about = "Opening analysis with engine support")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a single position with the local engine.
    Analyze(commands::analyze::AnalyzeArgs),

    /// Start a remote analysis job and follow its progress.
    Run(commands::run::RunArgs),

    /// List recorded problem positions for a player.
    Errors(commands::errors::ErrorsArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = logging::init(config::get_log_dir().as_deref())?;

    tracing::debug!("theorygap starting up");
    match cli.command {
        Commands::Analyze(args) => commands::analyze::run(args).await,
        Commands::Run(args) => commands::run::run(args).await,
        Commands::Errors(args) => commands::errors::run(args).await,
    }
}
