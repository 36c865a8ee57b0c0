//! Remote job service: request/response types and the client trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::JobError;

pub const DEFAULT_MONTHS: u32 = 3;
pub const DEFAULT_LIMIT: u32 = 200;
pub const MAX_LIMIT: u32 = 500;
pub const MAX_ENGINE_DEPTH: u32 = 25;
pub const MAX_ENGINE_MOVE_TIME_MS: u32 = 1000;

/// Parameters for a new analysis job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    pub username: String,
    /// Look-back window in months.
    pub months: u32,
    /// Maximum number of games.
    pub limit: u32,
    pub engine_depth: Option<u32>,
    pub engine_move_time_ms: Option<u32>,
    /// Bound the server-side engine by depth rather than move time.
    pub engine_use_depth: Option<bool>,
}

impl JobRequest {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            months: DEFAULT_MONTHS,
            limit: DEFAULT_LIMIT,
            engine_depth: None,
            engine_move_time_ms: None,
            engine_use_depth: None,
        }
    }

    /// Clamp every parameter into the range the service accepts.
    pub fn clamped(mut self) -> Self {
        self.username = self.username.trim().to_string();
        self.limit = self.limit.clamp(1, MAX_LIMIT);
        self.engine_depth = self.engine_depth.map(|d| d.clamp(1, MAX_ENGINE_DEPTH));
        self.engine_move_time_ms = self
            .engine_move_time_ms
            .map(|t| t.min(MAX_ENGINE_MOVE_TIME_MS));
        self
    }

    /// Query parameters for the job-creation request. Unset engine settings
    /// are omitted.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("months", self.months.to_string()),
            ("limit", self.limit.to_string()),
        ];
        if let Some(depth) = self.engine_depth {
            pairs.push(("engine_depth", depth.to_string()));
        }
        if let Some(move_time) = self.engine_move_time_ms {
            pairs.push(("engine_move_time", move_time.to_string()));
        }
        if let Some(use_depth) = self.engine_use_depth {
            pairs.push(("engine_depth_or_time", use_depth.to_string()));
        }
        pairs
    }
}

/// Body of a job-creation response. A response without a job id or with no
/// batches means there was nothing to analyze.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartJobResponse {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub batches: Option<u64>,
}

impl StartJobResponse {
    /// Job id and batch count when there is work to poll for.
    pub fn started_job(&self) -> Option<(&str, u64)> {
        let id = self.job_id.as_deref().filter(|id| !id.is_empty())?;
        let batches = self.batches.filter(|b| *b > 0)?;
        Some((id, batches))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    #[default]
    Running,
    Completed,
    Failed,
    /// Any status this client does not know. Treated as running.
    #[serde(other)]
    Unknown,
}

impl JobState {
    pub fn is_failed(self) -> bool {
        self == Self::Failed
    }
}

/// Server-side view of a job, as returned by the status endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub status: JobState,
    #[serde(default)]
    pub completed_batches: u64,
    #[serde(default)]
    pub total_batches: u64,
}

/// Status endpoint body. A missing `job` is a malformed response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct JobEnvelope {
    #[serde(default)]
    pub job: Option<JobStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BadFen {
    pub normalized_fen_before: String,
    #[serde(default)]
    pub times_seen: u64,
    #[serde(default)]
    pub suboptimal_count: u64,
    #[serde(default)]
    pub inaccuracy_count: u64,
    #[serde(default)]
    pub mistake_count: u64,
    #[serde(default)]
    pub error_count: u64,
    #[serde(default)]
    pub error_rate: f64,
    #[serde(default)]
    pub side_to_move: Option<String>,
}

/// A game in which the position was reached.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorGame {
    #[serde(rename = "Move", default)]
    pub mv: String,
    #[serde(rename = "Color", default)]
    pub color: String,
    #[serde(rename = "Opponent", default)]
    pub opponent: String,
    #[serde(rename = "URL", default)]
    pub url: String,
    #[serde(rename = "ECO", default)]
    pub eco: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorPosition {
    #[serde(rename = "BadFen")]
    pub bad_fen: BadFen,
    #[serde(rename = "Moves", default)]
    pub moves: Vec<ErrorGame>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorPositions {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub positions: Vec<ErrorPosition>,
}

impl ErrorPositions {
    /// The recorded position matching `fen`, ignoring move counters.
    pub fn find_position(&self, fen: &str) -> Option<&ErrorPosition> {
        let key = chess::normalize_fen(fen);
        self.positions
            .iter()
            .find(|p| chess::normalize_fen(&p.bad_fen.normalized_fen_before) == key)
    }
}

/// Client for the remote job service.
#[async_trait]
pub trait JobApi: Send + Sync {
    /// Create a job for `request`.
    async fn start_job(&self, request: &JobRequest) -> Result<StartJobResponse, JobError>;

    /// Fetch the current status of job `job_id`.
    async fn job_status(&self, job_id: &str) -> Result<JobStatus, JobError>;

    /// Fetch the recorded problem positions for `username`.
    async fn error_positions(&self, username: &str) -> Result<ErrorPositions, JobError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_clamps_parameters() {
        let request = JobRequest {
            limit: 9000,
            engine_depth: Some(40),
            engine_move_time_ms: Some(5000),
            ..JobRequest::new("  magnus ")
        }
        .clamped();
        assert_eq!(request.username, "magnus");
        assert_eq!(request.limit, MAX_LIMIT);
        assert_eq!(request.engine_depth, Some(MAX_ENGINE_DEPTH));
        assert_eq!(request.engine_move_time_ms, Some(MAX_ENGINE_MOVE_TIME_MS));

        let request = JobRequest {
            limit: 0,
            engine_depth: Some(0),
            ..JobRequest::new("a")
        }
        .clamped();
        assert_eq!(request.limit, 1);
        assert_eq!(request.engine_depth, Some(1));
    }

    #[test]
    fn test_query_pairs() {
        let request = JobRequest::new("a");
        assert_eq!(
            request.query_pairs(),
            vec![("months", "3".to_string()), ("limit", "200".to_string())]
        );

        let request = JobRequest {
            engine_depth: Some(18),
            engine_move_time_ms: Some(250),
            engine_use_depth: Some(true),
            ..JobRequest::new("a")
        };
        let pairs = request.query_pairs();
        assert!(pairs.contains(&("engine_depth", "18".to_string())));
        assert!(pairs.contains(&("engine_move_time", "250".to_string())));
        assert!(pairs.contains(&("engine_depth_or_time", "true".to_string())));
    }

    #[test]
    fn test_start_response_without_work() {
        let body: StartJobResponse =
            serde_json::from_str(r#"{"username":"a","count":0}"#).unwrap();
        assert_eq!(body.started_job(), None);

        let body: StartJobResponse =
            serde_json::from_str(r#"{"job_id":"j1","batches":0}"#).unwrap();
        assert_eq!(body.started_job(), None);

        let body: StartJobResponse =
            serde_json::from_str(r#"{"job_id":"j1","batches":4,"count":120}"#).unwrap();
        assert_eq!(body.started_job(), Some(("j1", 4)));
    }

    #[test]
    fn test_job_envelope_parsing() {
        let body: JobEnvelope = serde_json::from_str(
            r#"{"job":{"id":"j1","status":"failed","completed_batches":2,"total_batches":5}}"#,
        )
        .unwrap();
        let job = body.job.unwrap();
        assert_eq!(job.status, JobState::Failed);
        assert_eq!(job.completed_batches, 2);
        assert_eq!(job.total_batches, 5);

        let body: JobEnvelope =
            serde_json::from_str(r#"{"job":{"id":"j1","status":"queued"}}"#).unwrap();
        assert_eq!(body.job.unwrap().status, JobState::Unknown);

        let body: JobEnvelope = serde_json::from_str(r#"{"error":"nope"}"#).unwrap();
        assert!(body.job.is_none());
    }

    #[test]
    fn test_error_positions_parsing_and_lookup() {
        let body = r#"{
            "username": "a",
            "count": 1,
            "positions": [{
                "BadFen": {
                    "NormalizedFenBefore": "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq -",
                    "TimesSeen": 7,
                    "SuboptimalCount": 1,
                    "InaccuracyCount": 2,
                    "MistakeCount": 1,
                    "ErrorCount": 4,
                    "ErrorRate": 0.57,
                    "SideToMove": "black"
                },
                "Moves": [{
                    "Move": "f6",
                    "Color": "black",
                    "Opponent": "b",
                    "URL": "https://example.org/game/1",
                    "ECO": "C20"
                }]
            }]
        }"#;
        let errors: ErrorPositions = serde_json::from_str(body).unwrap();
        assert_eq!(errors.count, 1);
        let position = errors
            .find_position("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1")
            .unwrap();
        assert_eq!(position.bad_fen.times_seen, 7);
        assert_eq!(position.bad_fen.side_to_move.as_deref(), Some("black"));
        assert_eq!(position.moves[0].eco, "C20");
        assert!(errors.find_position("8/8/8/8/8/8/8/8 w - -").is_none());
    }
}
