//! Completion hook
//!
//! One-shot fetch of a finished job's files.

use jobwatch_core::domain::{JobFile, JobId};
use tracing::{debug, info, warn};

use crate::jobs::JobApi;

/// Fires at most once per job, after the snapshot reaches `finished`
#[derive(Debug, Default)]
pub struct CompletionHook {
    fired: bool,
}

impl CompletionHook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetches the job's files on the first call; later calls do nothing
    ///
    /// A failed fetch is logged and yields `None`. It never affects the
    /// job's status.
    pub async fn fire<A>(&mut self, api: &A, job_id: &JobId) -> Option<Vec<JobFile>>
    where
        A: JobApi + ?Sized,
    {
        if self.fired {
            debug!("Completion hook already fired for job {}", job_id);
            return None;
        }
        self.fired = true;

        match api.fetch_files(job_id).await {
            Ok(files) => {
                info!("Job {} produced {} file(s)", job_id, files.len());
                Some(files)
            }
            Err(e) => {
                warn!("Failed to load files for job {}: {}", job_id, e);
                None
            }
        }
    }

    /// Re-arms the hook for the next job
    pub fn reset(&mut self) {
        self.fired = false;
    }
}
