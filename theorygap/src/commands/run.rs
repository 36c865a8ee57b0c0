use std::io::Write;
use std::time::Duration;

use clap::Args;
use jobs::{JobController, JobOptions, JobPhase, JobRequest};

use crate::render;

/// Minimum time between progress redraws.
const REDRAW_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Args)]
pub struct RunArgs {
    /// Player to analyze.
    #[arg(long)]
    pub username: String,

    /// How many months of games to include.
    #[arg(long, default_value_t = jobs::api::DEFAULT_MONTHS)]
    pub months: u32,

    /// Maximum number of games (1-500).
    #[arg(long, default_value_t = jobs::api::DEFAULT_LIMIT)]
    pub limit: u32,

    /// Server-side engine depth (1-25).
    #[arg(long)]
    pub engine_depth: Option<u32>,

    /// Server-side engine move time in ms (0-1000).
    #[arg(long)]
    pub engine_move_time: Option<u32>,

    /// Bound the server-side engine by depth instead of move time.
    #[arg(long)]
    pub use_depth: bool,
}

impl RunArgs {
    fn request(&self) -> JobRequest {
        JobRequest {
            months: self.months,
            limit: self.limit,
            engine_depth: self.engine_depth,
            engine_move_time_ms: self.engine_move_time,
            engine_use_depth: self.use_depth.then_some(true),
            ..JobRequest::new(self.username.clone())
        }
    }
}

pub async fn run(args: RunArgs) -> anyhow::Result<()> {
    let request = args.request();
    if request.username.trim().is_empty() {
        anyhow::bail!("a username is required");
    }

    let api = super::job_api()?;
    let options = JobOptions {
        poll_interval: crate::config::get_poll_interval(),
        ..JobOptions::default()
    };
    let controller = JobController::start(api, request, options);
    let mut rx = controller.watch();
    let mut redraw = tokio::time::interval(REDRAW_INTERVAL);

    let progress = loop {
        tokio::select! {
            _ = redraw.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                controller.cancel();
                eprintln!();
                anyhow::bail!("interrupted");
            }
        }

        let progress = rx.borrow_and_update().clone();
        eprint!("\r{}", render::format_progress(&progress));
        std::io::stderr().flush()?;
        if progress.phase.is_terminal() || controller.is_finished() {
            break progress;
        }
    };
    eprintln!();

    match progress.phase {
        JobPhase::Completed => {
            if let Some(job_id) = &progress.job_id {
                println!("Job {job_id} finished ({} batches).", progress.total);
            } else {
                println!("Nothing new to analyze.");
            }
            Ok(())
        }
        _ => {
            let message = progress
                .error
                .unwrap_or_else(|| "Analysis failed".to_string());
            anyhow::bail!(message)
        }
    }
}
