//! Job-related API endpoints

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use jobwatch_core::domain::{JobFile, JobId};
use jobwatch_core::dto::job::{JobRecord, RunResponse, SubmitResponse};
use reqwest::multipart::{Form, Part};
use serde_json::Value;

use crate::JobApiClient;
use crate::error::Result;

/// A document to submit as a new job
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }

    /// Reads a local file, keeping only its file name for the upload
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        Ok(Self::new(filename, bytes))
    }
}

/// Request/response calls the job tracker consumes
///
/// `options` and `source` are opaque, server-defined payloads.
#[async_trait]
pub trait JobApi: Send + Sync {
    /// Submits a document, returning the new job id and initial status
    async fn submit(&self, upload: Upload, options: &Value, source: &Value)
    -> Result<SubmitResponse>;

    /// Asks the server to start running a submitted job
    async fn run(&self, job_id: &JobId) -> Result<RunResponse>;

    /// Lists the files a finished job produced
    async fn fetch_files(&self, job_id: &JobId) -> Result<Vec<JobFile>>;

    /// Requests cancellation of a job
    async fn cancel(&self, job_id: &JobId) -> Result<()>;
}

impl JobApiClient {
    // =============================================================================
    // Job Lifecycle
    // =============================================================================

    /// Submit a document as a new job
    ///
    /// `options` and `source` are sent as JSON-encoded multipart fields.
    ///
    /// # Example
    /// ```no_run
    /// # use jobwatch_client::{JobApiClient, Upload};
    /// # async fn example() -> anyhow::Result<()> {
    /// let client = JobApiClient::new("http://localhost:8000");
    /// let upload = Upload::from_path("paper.pdf").await?;
    /// let created = client
    ///     .submit_job(upload, &serde_json::json!({"lang_out": "zh"}), &serde_json::json!({"mode": "platform"}))
    ///     .await?;
    /// println!("submitted {}", created.job_id);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn submit_job(
        &self,
        upload: Upload,
        options: &Value,
        source: &Value,
    ) -> Result<SubmitResponse> {
        let url = format!("{}/api/jobs", self.base_url);
        let form = Form::new()
            .part("file", Part::bytes(upload.bytes).file_name(upload.filename))
            .text("options", options.to_string())
            .text("source", source.to_string());

        let response = self.client.post(&url).multipart(form).send().await?;

        self.handle_response(response).await
    }

    /// Start running a submitted job
    pub async fn run_job(&self, job_id: &JobId) -> Result<RunResponse> {
        let url = format!("{}/api/jobs/{}/run", self.base_url, job_id);
        let response = self.client.post(&url).send().await?;

        self.handle_response(response).await
    }

    /// Cancel a queued or running job
    pub async fn cancel_job(&self, job_id: &JobId) -> Result<()> {
        let url = format!("{}/api/jobs/{}/cancel", self.base_url, job_id);
        let response = self.client.post(&url).send().await?;

        self.handle_empty_response(response).await
    }

    /// Get a job's current status
    pub async fn get_job(&self, job_id: &JobId) -> Result<JobRecord> {
        let url = format!("{}/api/jobs/{}", self.base_url, job_id);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    // =============================================================================
    // Job Files
    // =============================================================================

    /// List the files produced by a job
    pub async fn get_job_files(&self, job_id: &JobId) -> Result<Vec<JobFile>> {
        let url = format!("{}/api/jobs/{}/files", self.base_url, job_id);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// URL of a job's event stream
    pub fn events_url(&self, job_id: &JobId) -> String {
        format!("{}/api/jobs/{}/events", self.base_url, job_id)
    }
}

#[async_trait]
impl JobApi for JobApiClient {
    async fn submit(
        &self,
        upload: Upload,
        options: &Value,
        source: &Value,
    ) -> Result<SubmitResponse> {
        self.submit_job(upload, options, source).await
    }

    async fn run(&self, job_id: &JobId) -> Result<RunResponse> {
        self.run_job(job_id).await
    }

    async fn fetch_files(&self, job_id: &JobId) -> Result<Vec<JobFile>> {
        self.get_job_files(job_id).await
    }

    async fn cancel(&self, job_id: &JobId) -> Result<()> {
        self.cancel_job(job_id).await
    }
}

#[async_trait]
impl<T: JobApi + ?Sized> JobApi for Arc<T> {
    async fn submit(
        &self,
        upload: Upload,
        options: &Value,
        source: &Value,
    ) -> Result<SubmitResponse> {
        (**self).submit(upload, options, source).await
    }

    async fn run(&self, job_id: &JobId) -> Result<RunResponse> {
        (**self).run(job_id).await
    }

    async fn fetch_files(&self, job_id: &JobId) -> Result<Vec<JobFile>> {
        (**self).fetch_files(job_id).await
    }

    async fn cancel(&self, job_id: &JobId) -> Result<()> {
        (**self).cancel(job_id).await
    }
}
