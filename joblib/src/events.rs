use crate::types::{JobId, Line, Parameter};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Exited { code: i32 },
    Killed { signal: i32 },
    Cancelled,
    /// The process ended but its exit status could not be retrieved.
    Unknown,
}

impl JobStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, JobStatus::Running)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_running()
    }

    /// Exit code in the usual convention: a process killed by signal `n` reports `-n`.
    pub fn exit_code(&self) -> Option<i32> {
        match *self {
            JobStatus::Exited { code } => Some(code),
            JobStatus::Killed { signal } => Some(-signal),
            JobStatus::Running | JobStatus::Cancelled | JobStatus::Unknown => None,
        }
    }
}

/// What a single poll observed: the lines drained by this call and the job status at that time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResult {
    pub id: JobId,
    pub parameter: Parameter,
    pub lines: Vec<Line>,
    pub running: bool,
    pub exit_code: Option<i32>,
    pub status: JobStatus,
}

impl PollResult {
    pub(crate) fn new(id: JobId, parameter: Parameter, status: JobStatus, lines: Vec<Line>) -> Self {
        Self {
            id,
            parameter,
            lines,
            running: status.is_running(),
            exit_code: status.exit_code(),
            status,
        }
    }
}
