//! HTTP collaborators: a remote exam lookup and a remote result store.
//!
//! `GET {base}/exams/{code}` returns an exam definition as camelCase JSON, or
//! 404 when the code is unknown. `POST {base}/results` accepts one result.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use tracing::instrument;

use examguard_core::model::ExamDefinition;
use examguard_core::result::ExamResult;
use examguard_core::traits::{ExamLookup, ResultPersister};

use crate::error::{LookupError, PersistError};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

fn build_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build HTTP client: {e}"))
}

fn parse_base(base_url: &str) -> Result<Url> {
    let url = Url::parse(base_url.trim_end_matches('/'))
        .map_err(|e| anyhow::anyhow!("invalid base URL '{base_url}': {e}"))?;
    if url.cannot_be_a_base() {
        anyhow::bail!("invalid base URL '{base_url}': cannot be a base");
    }
    Ok(url)
}

/// Append path segments to `base`, percent-encoding each one.
fn endpoint(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

// ---------------------------------------------------------------------------
// Exam lookup
// ---------------------------------------------------------------------------

/// Exam lookup against a remote exam service.
pub struct HttpExamLookup {
    base_url: Url,
    client: reqwest::Client,
}

impl HttpExamLookup {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            base_url: parse_base(base_url)?,
            client: build_client()?,
        })
    }
}

#[async_trait]
impl ExamLookup for HttpExamLookup {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip(self), fields(base = %self.base_url))]
    async fn lookup(&self, code: &str) -> Result<Option<ExamDefinition>> {
        let url = endpoint(&self.base_url, &["exams", code.trim()]);
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                LookupError::Timeout(DEFAULT_TIMEOUT_SECS)
            } else {
                LookupError::NetworkError(e.to_string())
            }
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LookupError::ApiError {
                status: status.as_u16(),
                message: body,
            }
            .into());
        }

        let exam: ExamDefinition = response
            .json()
            .await
            .map_err(|e| LookupError::InvalidDefinition(e.to_string()))?;
        Ok(Some(exam))
    }
}

// ---------------------------------------------------------------------------
// Result persister
// ---------------------------------------------------------------------------

/// Posts each completed result to a remote results service.
pub struct HttpResultPersister {
    base_url: Url,
    client: reqwest::Client,
}

impl HttpResultPersister {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            base_url: parse_base(base_url)?,
            client: build_client()?,
        })
    }
}

#[async_trait]
impl ResultPersister for HttpResultPersister {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip(self, result), fields(result_id = %result.id))]
    async fn append(&self, result: &ExamResult) -> Result<()> {
        let url = endpoint(&self.base_url, &["results"]);
        let response = self
            .client
            .post(url)
            .json(result)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PersistError::Timeout(DEFAULT_TIMEOUT_SECS)
                } else {
                    PersistError::NetworkError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PersistError::ApiError {
                status: status.as_u16(),
                message: body,
            }
            .into());
        }
        Ok(())
    }
}
