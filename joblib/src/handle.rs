use crate::channel::OutputChannel;
use crate::events::{JobStatus, PollResult};
use crate::types::{JobId, Parameter};
use std::sync::{Mutex, PoisonError};
use tokio::sync::{oneshot, watch};

/// Bookkeeping for one launched process.
///
/// The capture routine owns the writing ends (the output sender and the status sender);
/// the handle only ever reads status and drains output.
#[derive(Debug)]
pub struct JobHandle {
    id: JobId,
    parameter: Parameter,
    pid: Option<u32>,
    status: watch::Receiver<JobStatus>,
    channel: OutputChannel,
    cancel_tx: Mutex<Option<oneshot::Sender<()>>>,
}

impl JobHandle {
    pub(crate) fn new(
        id: JobId,
        parameter: Parameter,
        pid: Option<u32>,
        status: watch::Receiver<JobStatus>,
        channel: OutputChannel,
        cancel_tx: oneshot::Sender<()>,
    ) -> Self {
        Self {
            id,
            parameter,
            pid,
            status,
            channel,
            cancel_tx: Mutex::new(Some(cancel_tx)),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    /// OS process id, if the process was still alive when it was spawned.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn status(&self) -> JobStatus {
        *self.status.borrow()
    }

    pub fn has_undrained_output(&self) -> bool {
        !self.channel.is_empty()
    }

    /// Status first, then drain.
    ///
    /// The capture routine appends every line before it publishes a terminal status, so a result
    /// that reports the job finished also carries the last of its output.
    pub fn poll(&self) -> PollResult {
        let status = self.status();
        let lines = self.channel.drain_available();
        PollResult::new(self.id, self.parameter.clone(), status, lines)
    }

    /// Fire the cancel trigger. Returns false if it was already fired, or if the capture routine
    /// has stopped reading output and would no longer act on it.
    pub(crate) fn trigger_cancel(&self) -> bool {
        if self.status().is_terminal() {
            return false;
        }
        let maybe_tx = self
            .cancel_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match maybe_tx {
            // the routine drops the receiver as soon as it stops reading output
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }
}
