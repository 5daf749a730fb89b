use crate::channel::OutputSender;
use crate::events::JobStatus;
use crate::lines::LineReader;
use crate::types::{JobId, Line};

use futures::future::{self, FutureExt};
use std::{io, process::ExitStatus};
use tokio::{
    io::AsyncRead,
    process::Child,
    select,
    sync::{oneshot, watch},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

/// The per-job task that pumps the child's stdout and stderr into its output channel and
/// publishes the terminal status once both pipes close.
///
/// It is the only writer of the job's output and status, so it owns both senders.
pub struct CaptureRoutine {
    job_id: JobId,
    pid: Option<u32>,
    child: Child,
    output: OutputSender,
    status_tx: watch::Sender<JobStatus>,
}

impl CaptureRoutine {
    pub fn spawn(
        job_id: JobId,
        child: Child,
        output: OutputSender,
        status_tx: watch::Sender<JobStatus>,
        cancel_rx: oneshot::Receiver<()>,
    ) -> JoinHandle<()> {
        let routine = Self {
            job_id,
            pid: child.id(),
            child,
            output,
            status_tx,
        };
        tokio::spawn(async move { routine.run(cancel_rx).await })
    }

    async fn run(mut self, cancel_rx: oneshot::Receiver<()>) {
        let stdout = self.child.stdout.take().map(LineReader::new);
        let stderr = self.child.stderr.take().map(LineReader::new);
        let cancelled = self.pump(stdout, stderr, cancel_rx).await;
        self.finish(cancelled).await;
    }

    /// Forward lines until both streams are finished. Returns whether the job was cancelled.
    ///
    /// Takes the cancel receiver by value: once reading is over it is dropped, so a late cancel
    /// request fails instead of being silently ignored.
    async fn pump<O, E>(
        &mut self,
        mut stdout: Option<LineReader<O>>,
        mut stderr: Option<LineReader<E>>,
        cancel_rx: oneshot::Receiver<()>,
    ) -> bool
    where
        O: AsyncRead + Unpin,
        E: AsyncRead + Unpin,
    {
        let mut cancel_rx = cancel_rx.fuse();
        let mut cancelled = false;

        while stdout.is_some() || stderr.is_some() {
            select! {
                request = &mut cancel_rx => {
                    // an Err means the job handle was dropped: nobody can observe this job anymore
                    if request.is_ok() {
                        info!(job_id = self.job_id, pid = ?self.pid, "cancelling job");
                    }
                    cancelled = self.kill();
                }
                line = next_line(&mut stdout) => {
                    if !self.forward(line, "stdout") {
                        stdout = None;
                    }
                }
                line = next_line(&mut stderr) => {
                    if !self.forward(line, "stderr") {
                        stderr = None;
                    }
                }
            }
        }
        cancelled
    }

    async fn finish(&mut self, cancelled: bool) {
        let exit_status = self.child.wait().await;
        if let Err(err) = &exit_status {
            warn!(job_id = self.job_id, pid = ?self.pid, %err, "could not retrieve exit status");
        }
        let status = settle(exit_status, cancelled);
        info!(job_id = self.job_id, pid = ?self.pid, ?status, "job finished");

        // every line was appended before this, so pollers that see this status have all the output
        self.status_tx.send_if_modified(|current| {
            if current.is_running() {
                *current = status;
                true
            } else {
                false
            }
        });
    }

    /// Returns false once the stream is finished.
    fn forward(&self, line: io::Result<Option<Line>>, stream: &'static str) -> bool {
        match line {
            Ok(Some(line)) => {
                debug!(job_id = self.job_id, pid = ?self.pid, stream, "{}", line);
                self.output.append(line);
                true
            }
            Ok(None) => false,
            Err(err) => {
                warn!(job_id = self.job_id, pid = ?self.pid, stream, %err, "output read failed");
                false
            }
        }
    }

    fn kill(&mut self) -> bool {
        match self.child.start_kill() {
            Ok(()) => true,
            Err(err) => {
                warn!(job_id = self.job_id, pid = ?self.pid, %err, "failed to kill job process");
                false
            }
        }
    }
}

/// Pending forever once the stream is gone, so a closed pipe never wins the `select!`.
async fn next_line<R: AsyncRead + Unpin>(
    reader: &mut Option<LineReader<R>>,
) -> io::Result<Option<Line>> {
    match reader {
        Some(reader) => reader.next_line().await,
        None => future::pending().await,
    }
}

fn settle(exit_status: io::Result<ExitStatus>, cancelled: bool) -> JobStatus {
    match exit_status {
        _ if cancelled => JobStatus::Cancelled,
        Ok(exit_status) => terminal_status(exit_status),
        Err(_) => JobStatus::Unknown,
    }
}

fn terminal_status(exit_status: ExitStatus) -> JobStatus {
    if let Some(code) = exit_status.code() {
        return JobStatus::Exited { code };
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = exit_status.signal() {
            return JobStatus::Killed { signal };
        }
    }
    JobStatus::Unknown
}
