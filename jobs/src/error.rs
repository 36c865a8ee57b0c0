use thiserror::Error;

/// Shown for a 429 without a server message.
pub const QUOTA_REACHED_COPY: &str = "Weekly analysis quota reached.";
/// Shown for a 402 without a server message.
pub const PLAN_REQUIRED_COPY: &str = "An active plan is required to run this analysis.";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("Invalid API base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("{0}")]
    Transport(String),

    #[error("Failed to start analysis (status {0})")]
    StartStatus(u16),

    #[error("Status request failed ({0})")]
    PollStatus(u16),

    #[error("Failed to load errors ({0})")]
    ErrorsStatus(u16),

    /// 402 or 429 from job creation. `message` is the server's own copy.
    #[error("Quota exceeded (status {status})")]
    Quota {
        status: u16,
        message: Option<String>,
    },

    #[error("Malformed {0} response")]
    Malformed(&'static str),

    #[error("Analysis failed")]
    JobFailed,
}

impl JobError {
    pub fn is_quota(&self) -> bool {
        matches!(self, Self::Quota { .. })
    }

    /// Text to show the user for this error.
    pub fn user_message(&self) -> String {
        match self {
            Self::Quota {
                message: Some(message),
                ..
            } if !message.trim().is_empty() => message.clone(),
            Self::Quota { status: 402, .. } => PLAN_REQUIRED_COPY.to_string(),
            Self::Quota { .. } => QUOTA_REACHED_COPY.to_string(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for JobError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_message_is_verbatim() {
        let err = JobError::Quota {
            status: 429,
            message: Some("Free users can analyze up to 100 games per week.".to_string()),
        };
        assert_eq!(
            err.user_message(),
            "Free users can analyze up to 100 games per week."
        );
        assert!(err.is_quota());
    }

    #[test]
    fn test_quota_fallback_copy() {
        let quota = JobError::Quota {
            status: 429,
            message: None,
        };
        let plan = JobError::Quota {
            status: 402,
            message: Some("  ".to_string()),
        };
        assert_eq!(quota.user_message(), QUOTA_REACHED_COPY);
        assert_eq!(plan.user_message(), PLAN_REQUIRED_COPY);
    }

    #[test]
    fn test_generic_messages() {
        assert_eq!(
            JobError::StartStatus(500).user_message(),
            "Failed to start analysis (status 500)"
        );
        assert_eq!(
            JobError::PollStatus(404).user_message(),
            "Status request failed (404)"
        );
        assert_eq!(
            JobError::Malformed("job status").user_message(),
            "Malformed job status response"
        );
        assert_eq!(JobError::JobFailed.user_message(), "Analysis failed");
    }
}
