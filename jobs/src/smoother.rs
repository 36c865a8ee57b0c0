//! Displayed progress between coarse server updates.
//!
//! The server only reports whole batches. Between polls the displayed value
//! eases toward the end of the batch in flight, never past it. The last batch
//! is held below 100 until the server confirms completion.

/// Fraction of the remaining distance covered per frame.
pub const EASE_FACTOR: f64 = 0.00375;
/// Smallest per-frame step, in percentage points.
pub const MIN_STEP: f64 = 0.02;
/// Ceiling while the final batch is still running.
pub const FINAL_BATCH_CAP: f64 = 99.0;

/// Percentage confirmed by the server, rounded to a whole number.
pub fn confirmed_percent(completed: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (completed as f64 / total as f64 * 100.0).round().min(100.0)
}

/// Highest value the display may reach while `completed` batches are done.
pub fn batch_ceiling(completed: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let per_batch = 100.0 / total as f64;
    let lower = completed as f64 * per_batch;
    let cap = (lower + per_batch).min(100.0);
    if completed + 1 >= total {
        cap.min(FINAL_BATCH_CAP)
    } else {
        cap
    }
}

/// Monotonic displayed progress in `[0, 100]` for one job.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProgressSmoother {
    displayed: f64,
}

impl ProgressSmoother {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn displayed(&self) -> f64 {
        self.displayed
    }

    /// Raise the display to a server-confirmed value. Never lowers it.
    pub fn observe(&mut self, confirmed: f64) -> f64 {
        self.displayed = self.displayed.max(confirmed.clamp(0.0, 100.0));
        self.displayed
    }

    /// Advance one frame given the latest job snapshot.
    pub fn tick(&mut self, completed: u64, total: u64, confirmed: f64) -> f64 {
        if total == 0 {
            return self.displayed;
        }

        let upper = batch_ceiling(completed, total);
        let mut next = self.displayed.max(confirmed.clamp(0.0, 100.0));

        if next < upper {
            let increment = ((upper - next) * EASE_FACTOR).max(MIN_STEP);
            next = upper.min(next + increment);
        }

        self.displayed = next;
        next
    }

    /// Server confirmed the job is done.
    pub fn complete(&mut self) {
        self.displayed = 100.0;
    }
}
