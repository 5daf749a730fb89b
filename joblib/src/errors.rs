use crate::types::{JobId, Program};
use std::{io, result};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum JobError {
    #[error("job parameter must not be empty")]
    EmptyParameter,
    #[error("executable not found at {}. {}", .path.display(), .hint)]
    ExecutableNotFound { path: Program, hint: String },
    #[error("failed to spawn job process: {0}")]
    SpawnFailed(#[source] io::Error),
    #[error("no job with id {0}")]
    NotFound(JobId),
    #[error("job id {0} is already registered")]
    DuplicateIdentifier(JobId),
    #[error("job {0} is not running")]
    NotRunning(JobId),
    #[error("job {0} is still running")]
    StillRunning(JobId),
    #[error("job {0} still has undrained output")]
    UndrainedOutput(JobId),
}

pub type Result<T> = result::Result<T, JobError>;
