use crate::types::Line;
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc::{self, error::TryRecvError};

/// Create the two ends of a job's output channel.
///
/// The `OutputSender` belongs to the capture routine, the `OutputChannel` to the job handle.
pub fn output_channel() -> (OutputSender, OutputChannel) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        OutputSender { tx },
        OutputChannel {
            rx: Mutex::new(rx),
        },
    )
}

/// Producer side of an `OutputChannel`. Not `Clone`: one writer per job.
#[derive(Debug)]
pub struct OutputSender {
    tx: mpsc::UnboundedSender<Line>,
}

impl OutputSender {
    /// Never blocks.
    pub fn append(&self, line: Line) {
        // the receiver lives in the job handle, which outlives the capture routine unless reaped
        let _ = self.tx.send(line);
    }
}

/// Unbounded FIFO of the lines produced by one job, drained destructively by pollers.
#[derive(Debug)]
pub struct OutputChannel {
    rx: Mutex<mpsc::UnboundedReceiver<Line>>,
}

impl OutputChannel {
    /// Remove and return every line buffered right now, oldest first.
    ///
    /// Returns an empty vec instead of waiting when nothing is buffered. The receiver stays locked
    /// for the whole drain, so concurrent drains split the buffered lines between them.
    pub fn drain_available(&self) -> Vec<Line> {
        let mut rx = self.rx.lock().unwrap_or_else(PoisonError::into_inner);
        let mut lines = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(line) => lines.push(line),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        lines
    }

    pub fn is_empty(&self) -> bool {
        self.rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }
}
