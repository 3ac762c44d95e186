//! Jobwatch HTTP Client
//!
//! Async side of Jobwatch: a type-safe client for the job server's
//! request/response calls, the push-stream consumer, and the
//! [`JobTracker`] that keeps a job snapshot in sync with the stream.
//!
//! # Example
//!
//! ```no_run
//! use jobwatch_client::{JobApiClient, JobTracker, SseEventStream};
//! use jobwatch_client::config::ReconnectPolicy;
//! use jobwatch_core::domain::{JobId, JobStatus};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = JobApiClient::new("http://localhost:8000");
//!     let stream = SseEventStream::new(&client);
//!     let mut tracker = JobTracker::new(client, stream, ReconnectPolicy::default());
//!
//!     tracker.attach(JobId::new("4f1c"), JobStatus::Running);
//!     let snapshot = tracker.run_to_completion().await;
//!     println!("job ended as {}", snapshot.status);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
mod hook;
mod jobs;
mod stream;
mod tracker;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use hook::CompletionHook;
pub use jobs::{JobApi, Upload};
pub use stream::{EventSink, EventStream, SseEventStream, StreamMessage};
pub use tracker::{JobTracker, TrackerError};

use jobwatch_core::dto::job::ErrorBody;
use reqwest::Client;
use serde::de::DeserializeOwned;

/// HTTP client for the job server API
///
/// Covers the calls the tracker depends on:
/// - Job submission and run
/// - Listing a finished job's files
/// - Cancellation
#[derive(Debug, Clone)]
pub struct JobApiClient {
    /// Base URL of the job server (e.g., "http://localhost:8000")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl JobApiClient {
    /// Create a new job server client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the job server (e.g., "http://localhost:8000")
    ///
    /// # Example
    /// ```
    /// use jobwatch_client::JobApiClient;
    ///
    /// let client = JobApiClient::new("http://localhost:8000");
    /// ```
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new job server client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    /// The event stream shares this client, so a total request timeout
    /// also bounds how long a stream may stay open.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the job server
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn http(&self) -> &Client {
        &self.client
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            return Err(Self::error_from(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Handle an API response whose body is not needed
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        Ok(())
    }

    /// Builds an API error, preferring the server's `detail` field
    async fn error_from(response: reqwest::Response) -> ClientError {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        let message = match serde_json::from_str::<ErrorBody>(&body) {
            Ok(parsed) => parsed.message(),
            Err(_) => body,
        };
        ClientError::api_error(status, message)
    }
}
