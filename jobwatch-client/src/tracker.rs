//! Job tracker
//!
//! Owns everything bound to one job slot: the snapshot, the event stream,
//! the progress throttle and the completion hook. Stream messages are
//! applied strictly one at a time through the core state machine, and
//! every change is published to `watch` subscribers.

use jobwatch_core::domain::{JobFile, JobId, JobSnapshot, JobStatus};
use jobwatch_core::dto::event::EventEnvelope;
use jobwatch_core::machine::{Effect, Msg, update};
use jobwatch_core::throttle::{Clock, SystemClock, UpdateThrottle};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

use crate::config::ReconnectPolicy;
use crate::error::ClientError;
use crate::hook::CompletionHook;
use crate::jobs::{JobApi, Upload};
use crate::stream::{EventStream, StreamMessage};

/// Errors surfaced to the caller separately from job status
#[derive(Debug, Error)]
pub enum TrackerError {
    /// The server did not confirm cancellation; the job keeps its status
    #[error("Failed to cancel job {job_id}: {source}")]
    CancelFailed {
        job_id: JobId,
        #[source]
        source: ClientError,
    },
}

/// Keeps a [`JobSnapshot`] in sync with one job's event stream
pub struct JobTracker<A, S, C = SystemClock> {
    api: A,
    stream: S,
    clock: C,
    reconnect: ReconnectPolicy,
    throttle: UpdateThrottle,
    hook: CompletionHook,
    snapshot: JobSnapshot,
    snapshot_tx: watch::Sender<JobSnapshot>,
    files_tx: watch::Sender<Vec<JobFile>>,
    /// Receiving end of the currently open stream, if any
    inbox: Option<mpsc::UnboundedReceiver<StreamMessage>>,
    reconnect_attempts: u32,
    reconnect_at: Option<Instant>,
}

impl<A: JobApi, S: EventStream> JobTracker<A, S, SystemClock> {
    pub fn new(api: A, stream: S, reconnect: ReconnectPolicy) -> Self {
        Self::with_clock(api, stream, reconnect, SystemClock)
    }
}

impl<A: JobApi, S: EventStream, C: Clock> JobTracker<A, S, C> {
    /// Creates a tracker whose throttle reads time from `clock`
    pub fn with_clock(api: A, stream: S, reconnect: ReconnectPolicy, clock: C) -> Self {
        let (snapshot_tx, _) = watch::channel(JobSnapshot::default());
        let (files_tx, _) = watch::channel(Vec::new());
        Self {
            api,
            stream,
            clock,
            reconnect,
            throttle: UpdateThrottle::new(),
            hook: CompletionHook::new(),
            snapshot: JobSnapshot::default(),
            snapshot_tx,
            files_tx,
            inbox: None,
            reconnect_attempts: 0,
            reconnect_at: None,
        }
    }

    pub fn snapshot(&self) -> &JobSnapshot {
        &self.snapshot
    }

    /// Files fetched by the completion hook; empty until the job finishes
    pub fn files(&self) -> Vec<JobFile> {
        self.files_tx.borrow().clone()
    }

    /// Observe every snapshot change
    pub fn subscribe(&self) -> watch::Receiver<JobSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Observe the produced files once the job finishes
    pub fn subscribe_files(&self) -> watch::Receiver<Vec<JobFile>> {
        self.files_tx.subscribe()
    }

    pub fn is_streaming(&self) -> bool {
        self.inbox.is_some() && self.stream.is_open()
    }

    // =============================================================================
    // Job Lifecycle
    // =============================================================================

    /// Submits and runs a new job, then starts streaming its events
    ///
    /// A failed submission leaves the snapshot `failed` with the server's
    /// detail. The run call can only confirm `queued` or `running`; any
    /// other reported status, or a failed call, is logged and the stream
    /// decides the outcome.
    pub async fn start_job(
        &mut self,
        upload: Upload,
        options: &Value,
        source: &Value,
    ) -> &JobSnapshot {
        self.reset();

        let created = match self.api.submit(upload, options, source).await {
            Ok(created) => created,
            Err(e) => {
                error!("Failed to create job: {}", e);
                self.dispatch(Msg::SubmitFailed(e.detail()));
                return &self.snapshot;
            }
        };

        let job_id = created.job_id.clone();
        info!("Job {} created ({})", job_id, created.initial_status());
        self.dispatch(Msg::Submitted {
            id: job_id.clone(),
            status: created.initial_status(),
        });

        match self.api.run(&job_id).await {
            Ok(run) if run.status.is_active() => {
                self.dispatch(Msg::RunAcknowledged(run.status));
            }
            Ok(run) => debug!(
                "Run of job {} reported '{}', waiting for the stream",
                job_id, run.status
            ),
            Err(e) => warn!("Failed to run job {} immediately: {}", job_id, e),
        }

        self.open_stream();
        &self.snapshot
    }

    /// Starts tracking a job that was submitted elsewhere
    pub fn attach(&mut self, job_id: JobId, status: JobStatus) {
        self.reset();
        self.dispatch(Msg::Submitted { id: job_id, status });
        if !self.snapshot.is_terminal() {
            self.open_stream();
        }
    }

    /// Requests cancellation of the current job
    ///
    /// Does nothing when there is no job or it already ended. The snapshot
    /// only becomes `canceled` once the server confirms.
    pub async fn cancel(&mut self) -> Result<(), TrackerError> {
        if !self.snapshot.has_job() || self.snapshot.is_terminal() {
            debug!("Nothing to cancel (status: {})", self.snapshot.status);
            return Ok(());
        }

        let job_id = self.snapshot.id.clone();
        self.api
            .cancel(&job_id)
            .await
            .map_err(|source| TrackerError::CancelFailed {
                job_id: job_id.clone(),
                source,
            })?;

        info!("Job {} canceled", job_id);
        let effects = self.dispatch(Msg::Cancelled);
        self.run_effects(effects).await;
        Ok(())
    }

    /// Drops the current job: closes its stream and returns to idle
    ///
    /// Messages still in flight from the old stream are discarded with it.
    pub fn reset(&mut self) {
        for effect in self.dispatch(Msg::Reset) {
            if effect == Effect::CloseStream {
                self.close_stream();
            }
        }
        self.throttle.reset();
        self.hook.reset();
        self.reconnect_attempts = 0;
        self.files_tx.send_replace(Vec::new());
    }

    // =============================================================================
    // Stream Delivery
    // =============================================================================

    /// Waits for the next message from the job's stream
    ///
    /// Performs a pending re-open first. Returns `None` once no stream is
    /// open or the open one has ended.
    pub async fn next_message(&mut self) -> Option<StreamMessage> {
        if let Some(deadline) = self.reconnect_at {
            tokio::time::sleep_until(deadline).await;
            self.reconnect_at = None;
            if self.snapshot.is_terminal() {
                return None;
            }
            info!(
                "Re-opening event stream for job {} (attempt {}/{})",
                self.snapshot.id, self.reconnect_attempts, self.reconnect.max_attempts
            );
            self.open_stream();
        }

        self.inbox.as_mut()?.recv().await
    }

    /// Applies one stream message
    pub async fn handle(&mut self, message: StreamMessage) {
        match message {
            StreamMessage::Event(envelope) => self.handle_event(envelope).await,
            StreamMessage::TransportError(detail) => self.handle_transport_error(detail),
        }
    }

    /// Pumps the stream until the job reaches a terminal status or the
    /// stream ends for good
    pub async fn run_to_completion(&mut self) -> &JobSnapshot {
        while !self.snapshot.is_terminal() {
            let Some(message) = self.next_message().await else {
                break;
            };
            self.handle(message).await;
        }
        &self.snapshot
    }

    async fn handle_event(&mut self, envelope: EventEnvelope) {
        if self.snapshot.is_terminal() {
            debug!(
                "Ignoring '{}' event for finished job {}",
                envelope.event.kind(),
                self.snapshot.id
            );
            return;
        }
        if !self.throttle.admit(&envelope.event, self.clock.now()) {
            trace!("Throttled progress update");
            return;
        }

        self.reconnect_attempts = 0;
        trace!("Applying '{}' event", envelope.event.kind());
        let effects = self.dispatch(Msg::Event(envelope));
        self.run_effects(effects).await;
    }

    fn handle_transport_error(&mut self, detail: String) {
        if self.snapshot.is_terminal() || !self.snapshot.has_job() {
            debug!("Ignoring stream error after job ended: {}", detail);
            return;
        }
        warn!("Event stream for job {} failed: {}", self.snapshot.id, detail);

        let attempt = self.reconnect_attempts + 1;
        let notice = match self.reconnect.delay_for(attempt) {
            Some(delay) => {
                self.reconnect_attempts = attempt;
                self.reconnect_at = Some(Instant::now() + delay);
                format!(
                    "Connection lost, reconnecting (attempt {}/{})...",
                    attempt, self.reconnect.max_attempts
                )
            }
            None => "Connection lost; live updates stopped".to_string(),
        };
        self.dispatch(Msg::TransportError(notice));
    }

    // =============================================================================
    // Internals
    // =============================================================================

    fn dispatch(&mut self, msg: Msg) -> Vec<Effect> {
        let current = std::mem::take(&mut self.snapshot);
        let (next, effects) = update(current, msg);
        self.snapshot = next;

        let snapshot = &self.snapshot;
        self.snapshot_tx.send_if_modified(|published| {
            if published == snapshot {
                return false;
            }
            *published = snapshot.clone();
            true
        });
        effects
    }

    async fn run_effects(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::CloseStream => self.close_stream(),
                Effect::FetchFiles(job_id) => {
                    if let Some(files) = self.hook.fire(&self.api, &job_id).await {
                        self.files_tx.send_replace(files);
                    }
                }
            }
        }
    }

    fn open_stream(&mut self) {
        self.close_stream();
        let (sink, inbox) = mpsc::unbounded_channel();
        self.stream
            .open(&self.snapshot.id, self.snapshot.last_event_id, sink);
        self.inbox = Some(inbox);
    }

    fn close_stream(&mut self) {
        self.stream.close();
        self.inbox = None;
        self.reconnect_at = None;
    }
}
