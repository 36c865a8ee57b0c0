use std::sync::Arc;
use std::time::Duration;

use analysis::{AnalysisController, AnalysisOptions, AnalysisSessionState};
use anyhow::Context;
use clap::Args;
use engine::StockfishLauncher;

use crate::render;

#[derive(Args)]
pub struct AnalyzeArgs {
    /// Position to analyze, in FEN.
    #[arg(long)]
    pub fen: String,

    /// Search depth.
    #[arg(long, default_value_t = engine::DEFAULT_DEPTH)]
    pub depth: u32,

    /// Number of lines to show.
    #[arg(long, default_value_t = engine::DEFAULT_MULTIPV)]
    pub multipv: u32,

    /// Print the final lines as JSON.
    #[arg(long)]
    pub json: bool,

    /// Give up after this many seconds.
    #[arg(long, default_value_t = 120)]
    pub timeout_secs: u64,
}

pub async fn run(args: AnalyzeArgs) -> anyhow::Result<()> {
    let fen = args.fen.trim().to_string();
    chess::parse_fen(&fen).with_context(|| format!("cannot analyze {fen:?}"))?;

    let launcher = StockfishLauncher::new(crate::config::get_engine_path());
    let options = AnalysisOptions {
        depth: args.depth,
        multipv: args.multipv,
        ..AnalysisOptions::default()
    };
    let controller = AnalysisController::spawn(Arc::new(launcher), options);
    controller.set_position(Some(fen));

    let outcome = tokio::select! {
        result = tokio::time::timeout(Duration::from_secs(args.timeout_secs), wait_for_result(&controller)) => {
            result.context("analysis timed out")
        }
        _ = tokio::signal::ctrl_c() => Err(anyhow::anyhow!("interrupted")),
    };
    let state = controller.state();
    controller.shutdown().await;
    outcome?;

    if let Some(error) = &state.error {
        anyhow::bail!("Engine error: {error}");
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&state.lines)?);
    } else {
        println!("{}", render::format_analysis(&state));
    }
    Ok(())
}

/// Wait until the search concludes or the engine fails, echoing status
/// changes to stderr.
async fn wait_for_result(controller: &AnalysisController) {
    let mut rx = controller.watch();
    let mut last_status = "";
    let mut started = false;

    loop {
        let state: AnalysisSessionState = rx.borrow_and_update().clone();
        let status = state.status_text();
        if status != last_status {
            eprintln!("{status}");
            last_status = status;
        }
        started |= state.analyzing;
        if state.error.is_some() || (started && !state.analyzing) {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}
