use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;

use crate::api::{ErrorPositions, JobApi, JobEnvelope, JobRequest, JobStatus, StartJobResponse};
use crate::JobError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Body of a quota rejection.
#[derive(Debug, Default, Deserialize)]
struct QuotaBody {
    #[serde(default)]
    message: Option<String>,
}

/// [`JobApi`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpJobApi {
    client: Client,
    base: Url,
    token: Option<String>,
}

impl HttpJobApi {
    pub fn new(base: &str, token: Option<String>) -> Result<Self, JobError> {
        let base = Url::parse(base.trim_end_matches('/'))
            .map_err(|e| JobError::InvalidBaseUrl(format!("{base}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(JobError::InvalidBaseUrl(base.to_string()));
        }
        let client = Client::builder()
            .user_agent(concat!("theorygap/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base,
            token: token.filter(|t| !t.is_empty()),
        })
    }

    /// `base` with `segments` appended, each percent-encoded as one segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, JobError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| JobError::InvalidBaseUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn get(&self, url: Url) -> reqwest::RequestBuilder {
        let request = self.client.get(url);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl JobApi for HttpJobApi {
    #[tracing::instrument(level = "debug", skip(self, request), fields(username = %request.username))]
    async fn start_job(&self, request: &JobRequest) -> Result<StartJobResponse, JobError> {
        let url = self.endpoint(&["chessgames", &request.username])?;
        let resp = self.get(url).query(&request.query_pairs()).send().await?;

        let status = resp.status();
        if status == StatusCode::PAYMENT_REQUIRED || status == StatusCode::TOO_MANY_REQUESTS {
            let body: QuotaBody = resp.json().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Job rejected by quota");
            return Err(JobError::Quota {
                status: status.as_u16(),
                message: body.message,
            });
        }
        if !status.is_success() {
            return Err(JobError::StartStatus(status.as_u16()));
        }

        resp.json()
            .await
            .map_err(|_| JobError::Malformed("job creation"))
    }

    #[tracing::instrument(level = "trace", skip(self))]
    async fn job_status(&self, job_id: &str) -> Result<JobStatus, JobError> {
        let url = self.endpoint(&["jobs", job_id])?;
        let resp = self.get(url).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(JobError::PollStatus(status.as_u16()));
        }

        let envelope: JobEnvelope = resp
            .json()
            .await
            .map_err(|_| JobError::Malformed("job status"))?;
        envelope.job.ok_or(JobError::Malformed("job status"))
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn error_positions(&self, username: &str) -> Result<ErrorPositions, JobError> {
        let url = self.endpoint(&["errors", username])?;
        let resp = self.get(url).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(JobError::ErrorsStatus(status.as_u16()));
        }

        resp.json()
            .await
            .map_err(|_| JobError::Malformed("error positions"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_encodes_path_segments() {
        let api = HttpJobApi::new("http://localhost:8080/", None).unwrap();
        let url = api.endpoint(&["chessgames", "some user/x"]).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/chessgames/some%20user%2Fx"
        );
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let api = HttpJobApi::new("https://api.example.org/v1", None).unwrap();
        let url = api.endpoint(&["jobs", "j-1"]).unwrap();
        assert_eq!(url.as_str(), "https://api.example.org/v1/jobs/j-1");
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            HttpJobApi::new("not a url", None),
            Err(JobError::InvalidBaseUrl(_))
        ));
        assert!(matches!(
            HttpJobApi::new("mailto:someone@example.org", None),
            Err(JobError::InvalidBaseUrl(_))
        ));
    }
}
