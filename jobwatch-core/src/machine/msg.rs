use crate::domain::job::{JobId, JobStatus};
use crate::dto::event::EventEnvelope;

/// Input to the job state machine
#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// The submit call returned a job; starts a fresh snapshot.
    Submitted { id: JobId, status: JobStatus },
    /// The submit call itself failed, with the server's detail message.
    SubmitFailed(String),
    /// The run call reported a status for the current job.
    RunAcknowledged(JobStatus),
    /// A decoded event that passed the throttle.
    Event(EventEnvelope),
    /// The stream transport failed; carries the advisory notice to show.
    TransportError(String),
    /// The server confirmed a cancel request.
    Cancelled,
    /// Discard the current job and return to idle.
    Reset,
}
