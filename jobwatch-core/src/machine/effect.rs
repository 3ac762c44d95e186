use crate::domain::job::JobId;

/// Side effect requested by the state machine, executed by its owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Stop delivery from the job's event stream
    CloseStream,
    /// Run the completion hook: fetch the files a finished job produced
    FetchFiles(JobId),
}
