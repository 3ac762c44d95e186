//! Job event stream
//!
//! One push connection per job, delivering decoded events in arrival
//! order over a channel owned by a single consumer. Undecodable messages
//! are logged and dropped; transport failures are reported, never retried
//! here.

use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use jobwatch_core::domain::JobId;
use jobwatch_core::dto::event::EventEnvelope;
use reqwest::Client;
use reqwest::header::ACCEPT;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::JobApiClient;

/// Something delivered by an open event stream
#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage {
    /// A successfully decoded event
    Event(EventEnvelope),
    /// The connection failed or ended; carries a description
    TransportError(String),
}

/// Receiving end handed to [`EventStream::open`]
pub type EventSink = mpsc::UnboundedSender<StreamMessage>;

/// Capability to open and close a job's event stream
pub trait EventStream: Send {
    /// Opens a stream for `job_id`, closing any stream already open
    ///
    /// `resume_from` is the id of the last event already applied; the
    /// producer replays everything after it.
    fn open(&mut self, job_id: &JobId, resume_from: Option<u64>, sink: EventSink);

    /// Stops delivery; safe to call when already closed
    fn close(&mut self);

    fn is_open(&self) -> bool;
}

/// Server-sent events implementation of [`EventStream`]
///
/// Reads `GET {base}/api/jobs/{id}/events` in a background task.
pub struct SseEventStream {
    api: JobApiClient,
    task: Option<JoinHandle<()>>,
}

impl SseEventStream {
    /// Creates a stream that shares the API client's connection pool
    pub fn new(api: &JobApiClient) -> Self {
        Self {
            api: api.clone(),
            task: None,
        }
    }
}

impl EventStream for SseEventStream {
    fn open(&mut self, job_id: &JobId, resume_from: Option<u64>, sink: EventSink) {
        self.close();

        let url = self.api.events_url(job_id);
        info!("Opening event stream for job {}", job_id);
        let client = self.api.http().clone();
        self.task = Some(tokio::spawn(pump(client, url, resume_from, sink)));
    }

    fn close(&mut self) {
        if let Some(task) = self.task.take() {
            debug!("Closing event stream");
            task.abort();
        }
    }

    fn is_open(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for SseEventStream {
    fn drop(&mut self) {
        self.close();
    }
}

/// Reads one SSE connection until it ends or the consumer goes away
async fn pump(client: Client, url: String, resume_from: Option<u64>, sink: EventSink) {
    let mut request = client.get(&url).header(ACCEPT, "text/event-stream");
    if let Some(last_id) = resume_from {
        request = request.header("Last-Event-ID", last_id.to_string());
    }

    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => {
            let _ = sink.send(StreamMessage::TransportError(format!(
                "failed to connect: {}",
                e
            )));
            return;
        }
    };

    let status = response.status();
    if !status.is_success() {
        let _ = sink.send(StreamMessage::TransportError(format!(
            "event stream returned status {}",
            status.as_u16()
        )));
        return;
    }

    let mut events = response.bytes_stream().eventsource();
    while let Some(item) = events.next().await {
        let message = match item {
            Ok(message) => message,
            Err(e) => {
                let _ = sink.send(StreamMessage::TransportError(e.to_string()));
                return;
            }
        };

        if message.data.trim().is_empty() {
            continue;
        }

        let mut envelope = match EventEnvelope::decode(&message.data) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Dropping undecodable event: {}", e);
                continue;
            }
        };
        if envelope.id.is_none() {
            envelope.id = message.id.parse().ok();
        }

        if sink.send(StreamMessage::Event(envelope)).is_err() {
            debug!("Event consumer gone, stopping stream");
            return;
        }
    }

    let _ = sink.send(StreamMessage::TransportError(
        "event stream closed by server".to_string(),
    ));
}
