//! Remote analysis jobs: the service client, the launch/poll controller and
//! progress smoothing.

pub mod api;
pub mod controller;
pub mod error;
pub mod http;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod smoother;

pub use api::{
    BadFen, ErrorGame, ErrorPosition, ErrorPositions, JobApi, JobEnvelope, JobRequest, JobState,
    JobStatus, StartJobResponse,
};
pub use controller::{
    JobController, JobOptions, JobPhase, JobProgress, JobSnapshot, DEFAULT_FRAME_INTERVAL,
    DEFAULT_POLL_INTERVAL,
};
pub use error::JobError;
pub use http::HttpJobApi;
pub use smoother::ProgressSmoother;
