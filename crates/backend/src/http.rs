use std::env;

use async_trait::async_trait;
use exam_core::model::{ExamId, SessionId};
use reqwest::{Client, RequestBuilder, Response};
use tracing::{debug, warn};
use url::Url;

use crate::api::{ExamBackend, ProgressSnapshot, StartedExam, Submission, SubmissionReceipt};
use crate::error::BackendError;
use crate::wire::StartExamResponse;

#[derive(Clone, Debug)]
pub struct HttpBackendConfig {
    pub base_url: Url,
    pub token: Option<String>,
}

impl HttpBackendConfig {
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            token: None,
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Read `EXAM_API_BASE_URL` and `EXAM_API_TOKEN`.
    ///
    /// Returns `None` when no usable base URL is configured.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let raw = env::var("EXAM_API_BASE_URL").ok()?;
        let base_url = match Url::parse(raw.trim()) {
            Ok(url) => url,
            Err(err) => {
                warn!(value = %raw, error = %err, "ignoring invalid EXAM_API_BASE_URL");
                return None;
            }
        };
        let token = env::var("EXAM_API_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());
        Some(Self { base_url, token })
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// `ExamBackend` over the REST API.
///
/// Request timeouts are left to the `reqwest` client.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    config: HttpBackendConfig,
}

impl HttpBackend {
    #[must_use]
    pub fn new(config: HttpBackendConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    #[must_use]
    pub fn with_client(client: Client, config: HttpBackendConfig) -> Self {
        Self { client, config }
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, BackendError> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        debug!(status = status.as_u16(), "exam api returned an error status");
        Err(BackendError::from_status(status.as_u16(), &body))
    }
}

#[async_trait]
impl ExamBackend for HttpBackend {
    async fn start_exam(&self, exam_id: ExamId) -> Result<StartedExam, BackendError> {
        let url = self.config.endpoint(&format!("exams/{exam_id}/start"));
        let response = self.send(self.client.post(url)).await?;
        let body: StartExamResponse = response.json().await?;
        body.into_started()
            .map_err(|err| BackendError::Decode(err.to_string()))
    }

    async fn save_progress(
        &self,
        exam_id: ExamId,
        session_id: SessionId,
        progress: &ProgressSnapshot,
    ) -> Result<(), BackendError> {
        let url = self
            .config
            .endpoint(&format!("exams/{exam_id}/sessions/{session_id}/progress"));
        self.send(self.client.put(url).json(progress)).await?;
        Ok(())
    }

    async fn submit_exam(
        &self,
        exam_id: ExamId,
        submission: &Submission,
    ) -> Result<SubmissionReceipt, BackendError> {
        let url = self.config.endpoint(&format!("exams/{exam_id}/submit"));
        let response = self.send(self.client.post(url).json(submission)).await?;
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_without_double_slashes() {
        let config = HttpBackendConfig::new(Url::parse("https://lms.example.com/api/").unwrap());
        assert_eq!(
            config.endpoint("/exams/7/start"),
            "https://lms.example.com/api/exams/7/start"
        );

        let bare = HttpBackendConfig::new(Url::parse("http://localhost:3000").unwrap());
        assert_eq!(bare.endpoint("exams/1/submit"), "http://localhost:3000/exams/1/submit");
    }
}
