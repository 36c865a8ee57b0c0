//! Job launch, polling and progress smoothing.
//!
//! Two tasks cooperate through a `watch` channel of [`JobSnapshot`]s. The
//! driver creates the job and polls it; it is the only writer of the
//! snapshot. The smoother ticks at frame rate, reads the latest snapshot and
//! is the only writer of the displayed percentage. The driver always stops
//! first: the smoother exits after it observes a terminal snapshot or once the
//! snapshot sender is gone.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::Instrument;

use crate::api::{JobApi, JobRequest, JobState, JobStatus};
use crate::smoother::{confirmed_percent, ProgressSmoother};
use crate::JobError;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1500);
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);
/// Bar width shown while a job is active but nothing is confirmed yet.
pub const ACTIVE_SLIVER_PERCENT: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Idle,
    Starting,
    Running,
    Completed,
    Failed,
}

impl JobPhase {
    pub fn is_active(self) -> bool {
        matches!(self, Self::Starting | Self::Running)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Cached view of the job, written only by the driver.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSnapshot {
    pub phase: JobPhase,
    pub job_id: Option<String>,
    pub completed: u64,
    pub total: u64,
    /// Highest server-confirmed percentage seen so far.
    pub confirmed: f64,
    pub error: Option<JobError>,
}

impl Default for JobSnapshot {
    fn default() -> Self {
        Self {
            phase: JobPhase::Idle,
            job_id: None,
            completed: 0,
            total: 0,
            confirmed: 0.0,
            error: None,
        }
    }
}

impl JobSnapshot {
    /// Fold one poll response into the snapshot.
    ///
    /// Completed batches never go backward. A response without a total
    /// keeps the total from job creation.
    fn apply(&mut self, job: &JobStatus) {
        if job.total_batches > 0 {
            self.total = job.total_batches;
        }
        self.completed = self.completed.max(job.completed_batches);
        self.confirmed = self
            .confirmed
            .max(confirmed_percent(self.completed, self.total));

        if job.status == JobState::Completed || self.completed >= self.total {
            self.phase = JobPhase::Completed;
            self.confirmed = 100.0;
        } else if job.status.is_failed() {
            self.phase = JobPhase::Failed;
            self.error = Some(JobError::JobFailed);
        } else {
            self.phase = JobPhase::Running;
        }
    }

    fn fail(&mut self, error: JobError) {
        self.phase = JobPhase::Failed;
        self.error = Some(error);
    }
}

/// What the front end renders.
#[derive(Debug, Clone, PartialEq)]
pub struct JobProgress {
    pub phase: JobPhase,
    /// Smoothed display value in `[0, 100]`.
    pub percent: f64,
    pub job_id: Option<String>,
    pub completed: u64,
    pub total: u64,
    /// User-facing error text.
    pub error: Option<String>,
}

impl Default for JobProgress {
    fn default() -> Self {
        Self {
            phase: JobPhase::Idle,
            percent: 0.0,
            job_id: None,
            completed: 0,
            total: 0,
            error: None,
        }
    }
}

impl JobProgress {
    fn from_snapshot(snapshot: &JobSnapshot, percent: f64) -> Self {
        Self {
            phase: snapshot.phase,
            percent,
            job_id: snapshot.job_id.clone(),
            completed: snapshot.completed,
            total: snapshot.total,
            error: snapshot.error.as_ref().map(JobError::user_message),
        }
    }

    pub fn status_text(&self) -> String {
        match self.phase {
            JobPhase::Idle => String::new(),
            JobPhase::Starting => "Starting analysis…".to_string(),
            JobPhase::Running => format!("Analyzing games ({:.1}%)", self.percent),
            JobPhase::Completed => "Analysis complete!".to_string(),
            JobPhase::Failed => "Analysis failed.".to_string(),
        }
    }

    /// Width of the progress bar, showing a sliver while active at zero.
    pub fn bar_percent(&self) -> f64 {
        if self.phase.is_active() && self.percent <= 0.0 {
            ACTIVE_SLIVER_PERCENT
        } else {
            self.percent
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobOptions {
    pub poll_interval: Duration,
    pub frame_interval: Duration,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            frame_interval: DEFAULT_FRAME_INTERVAL,
        }
    }
}

/// Handle to one running job. Dropping it stops polling and smoothing.
pub struct JobController {
    progress_rx: watch::Receiver<JobProgress>,
    driver: JoinHandle<()>,
    smoother: JoinHandle<()>,
}

impl JobController {
    /// Create the job and start tracking it.
    pub fn start(api: Arc<dyn JobApi>, request: JobRequest, options: JobOptions) -> Self {
        let request = request.clamped();
        let (snapshot_tx, snapshot_rx) = watch::channel(JobSnapshot::default());
        let (progress_tx, progress_rx) = watch::channel(JobProgress::default());

        let span = tracing::info_span!("job", username = %request.username);
        let driver = tokio::spawn(
            drive_job(api, request, options.poll_interval, snapshot_tx).instrument(span.clone()),
        );
        let smoother = tokio::spawn(
            run_smoother(snapshot_rx, progress_tx, options.frame_interval).instrument(span),
        );

        Self {
            progress_rx,
            driver,
            smoother,
        }
    }

    pub fn progress(&self) -> JobProgress {
        self.progress_rx.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<JobProgress> {
        self.progress_rx.clone()
    }

    /// Wait until the job completes or fails. Returns the last progress if
    /// tracking was cancelled first.
    pub async fn finished(&self) -> JobProgress {
        let mut rx = self.progress_rx.clone();
        let result = rx.wait_for(|p| p.phase.is_terminal()).await.map(|p| p.clone());
        match result {
            Ok(progress) => progress,
            Err(_) => self.progress(),
        }
    }

    /// Stop polling, then smoothing. The displayed progress is left as is.
    pub fn cancel(&self) {
        self.driver.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.driver.is_finished() && self.smoother.is_finished()
    }
}

impl Drop for JobController {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

async fn drive_job(
    api: Arc<dyn JobApi>,
    request: JobRequest,
    poll_interval: Duration,
    snapshot_tx: watch::Sender<JobSnapshot>,
) {
    snapshot_tx.send_modify(|s| s.phase = JobPhase::Starting);
    tracing::info!(months = request.months, limit = request.limit, "Starting analysis job");

    let response = match api.start_job(&request).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!("Failed to start job: {}", e);
            snapshot_tx.send_modify(|s| s.fail(e));
            return;
        }
    };

    let Some((job_id, total)) = response.started_job() else {
        tracing::info!(count = ?response.count, "Nothing to analyze");
        snapshot_tx.send_modify(|s| {
            s.phase = JobPhase::Completed;
            s.confirmed = 100.0;
        });
        return;
    };
    let job_id = job_id.to_string();

    tracing::info!(job_id = %job_id, total, "Job started");
    snapshot_tx.send_modify(|s| {
        s.phase = JobPhase::Running;
        s.job_id = Some(job_id.clone());
        s.total = total;
        s.completed = 0;
    });

    let mut polls = tokio::time::interval_at(Instant::now() + poll_interval, poll_interval);
    polls.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        polls.tick().await;

        match api.job_status(&job_id).await {
            Ok(job) => {
                snapshot_tx.send_modify(|s| s.apply(&job));
                let snapshot = snapshot_tx.borrow().clone();
                tracing::debug!(
                    completed = snapshot.completed,
                    total = snapshot.total,
                    status = ?job.status,
                    "Polled job"
                );
                match snapshot.phase {
                    JobPhase::Completed => {
                        tracing::info!(job_id = %job_id, "Job completed");
                        break;
                    }
                    JobPhase::Failed => {
                        tracing::warn!(job_id = %job_id, "Job failed");
                        break;
                    }
                    _ => {}
                }
            }
            Err(e) => {
                tracing::warn!(job_id = %job_id, "Polling failed: {}", e);
                snapshot_tx.send_modify(|s| s.fail(e));
                break;
            }
        }
    }
}

async fn run_smoother(
    mut snapshot_rx: watch::Receiver<JobSnapshot>,
    progress_tx: watch::Sender<JobProgress>,
    frame_interval: Duration,
) {
    let mut smoother = ProgressSmoother::new();
    let mut frames = tokio::time::interval(frame_interval);
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut driver_alive = true;

    loop {
        if driver_alive {
            tokio::select! {
                changed = snapshot_rx.changed() => driver_alive = changed.is_ok(),
                _ = frames.tick() => {}
            }
        }

        let snapshot = snapshot_rx.borrow_and_update().clone();
        let percent = match snapshot.phase {
            JobPhase::Idle => smoother.displayed(),
            JobPhase::Starting | JobPhase::Running => {
                smoother.observe(snapshot.confirmed);
                smoother.tick(snapshot.completed, snapshot.total, snapshot.confirmed)
            }
            JobPhase::Completed => {
                smoother.complete();
                smoother.displayed()
            }
            JobPhase::Failed => smoother.observe(snapshot.confirmed),
        };
        progress_tx.send_replace(JobProgress::from_snapshot(&snapshot, percent));

        if snapshot.phase.is_terminal() || !driver_alive {
            break;
        }
    }

    tracing::debug!("Progress smoother stopped");
}
