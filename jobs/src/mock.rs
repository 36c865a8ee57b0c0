//! Mock job service for testing - only compiled in test mode or with mock feature

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::api::{ErrorPositions, JobApi, JobRequest, JobState, JobStatus, StartJobResponse};
use crate::JobError;

#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    StartJob(JobRequest),
    JobStatus(String),
    ErrorPositions(String),
}

#[derive(Default)]
struct MockResponses {
    start: Option<Result<StartJobResponse, JobError>>,
    /// Served in order; the last one repeats.
    statuses: VecDeque<Result<JobStatus, JobError>>,
    errors: Option<Result<ErrorPositions, JobError>>,
}

/// Scripted [`JobApi`]. Clones share responses and the call log.
#[derive(Clone, Default)]
pub struct MockJobApi {
    responses: Arc<Mutex<MockResponses>>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
}

impl MockJobApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_start_response(self, response: Result<StartJobResponse, JobError>) -> Self {
        self.responses.lock().unwrap().start = Some(response);
        self
    }

    /// A started job with `batches` units of work.
    pub fn with_started_job(self, job_id: &str, batches: u64) -> Self {
        self.with_start_response(Ok(StartJobResponse {
            job_id: Some(job_id.to_string()),
            batches: Some(batches),
            ..StartJobResponse::default()
        }))
    }

    pub fn with_status(self, response: Result<JobStatus, JobError>) -> Self {
        self.responses.lock().unwrap().statuses.push_back(response);
        self
    }

    pub fn with_progress(self, status: JobState, completed: u64, total: u64) -> Self {
        self.with_status(Ok(JobStatus {
            id: "job".to_string(),
            status,
            completed_batches: completed,
            total_batches: total,
        }))
    }

    pub fn with_error_positions(self, response: Result<ErrorPositions, JobError>) -> Self {
        self.responses.lock().unwrap().errors = Some(response);
        self
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.call_log.lock().unwrap().clone()
    }

    pub fn status_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, MockCall::JobStatus(_)))
            .count()
    }

    fn record(&self, call: MockCall) {
        self.call_log.lock().unwrap().push(call);
    }
}

#[async_trait]
impl JobApi for MockJobApi {
    async fn start_job(&self, request: &JobRequest) -> Result<StartJobResponse, JobError> {
        self.record(MockCall::StartJob(request.clone()));
        self.responses
            .lock()
            .unwrap()
            .start
            .clone()
            .unwrap_or_else(|| Ok(StartJobResponse::default()))
    }

    async fn job_status(&self, job_id: &str) -> Result<JobStatus, JobError> {
        self.record(MockCall::JobStatus(job_id.to_string()));
        let mut responses = self.responses.lock().unwrap();
        let response = if responses.statuses.len() > 1 {
            responses.statuses.pop_front()
        } else {
            responses.statuses.front().cloned()
        };
        response.unwrap_or(Err(JobError::Malformed("job status")))
    }

    async fn error_positions(&self, username: &str) -> Result<ErrorPositions, JobError> {
        self.record(MockCall::ErrorPositions(username.to_string()));
        self.responses
            .lock()
            .unwrap()
            .errors
            .clone()
            .unwrap_or_else(|| Ok(ErrorPositions::default()))
    }
}
