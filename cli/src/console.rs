use joblib::{errors::JobError, types::JobId, PollResult, Supervisor};
use std::time::Duration;
use tokio::{select, time};
use tracing::{error, info, warn};

/// Starts jobs on a local supervisor and prints their output as it is polled.
pub struct Console {
    supervisor: Supervisor,
    interval: Duration,
    json: bool,
}

impl Console {
    pub fn new(supervisor: Supervisor, interval: Duration, json: bool) -> Self {
        Self {
            supervisor,
            interval,
            json,
        }
    }

    /// Start one job per parameter. Returns the started ids and the number of launch failures.
    pub fn start_all(&self, parameters: &[String]) -> (Vec<JobId>, usize) {
        let mut jobs = vec![];
        let mut failures = 0;
        for parameter in parameters {
            match self.supervisor.start(parameter.as_str()) {
                Ok(job_id) => {
                    info!(job_id, %parameter, "job started");
                    jobs.push(job_id);
                }
                Err(err) => {
                    error!(%parameter, %err, "could not start job");
                    failures += 1;
                }
            }
        }
        (jobs, failures)
    }

    /// Poll every job until all have finished, reaping each one as it ends.
    ///
    /// Ctrl-C cancels whatever is still running; polling carries on until those jobs are gone too.
    /// Returns true if every job exited with code 0.
    pub async fn follow(&self, jobs: Vec<JobId>) -> Result<bool, Box<dyn std::error::Error>> {
        let mut pending = jobs;
        let mut all_succeeded = true;
        let mut ticker = time::interval(self.interval);
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        let mut interrupted = false;

        while !pending.is_empty() {
            select! {
                _ = ticker.tick() => {}
                _ = &mut ctrl_c, if !interrupted => {
                    interrupted = true;
                    warn!("interrupted, cancelling {} job(s)", pending.len());
                    self.cancel_all(&pending);
                }
            }

            let mut still_running = vec![];
            for job_id in pending {
                let poll = self.supervisor.poll(job_id)?;
                for line in self.render(&poll)? {
                    println!("{}", line);
                }
                if poll.running {
                    still_running.push(job_id);
                } else {
                    all_succeeded &= poll.exit_code == Some(0);
                    let status = self.supervisor.reap(job_id)?;
                    info!(job_id, ?status, "job done");
                }
            }
            pending = still_running;
        }
        Ok(all_succeeded)
    }

    fn cancel_all(&self, jobs: &[JobId]) {
        for &job_id in jobs {
            match self.supervisor.cancel(job_id) {
                // finished between the last poll and now
                Ok(()) | Err(JobError::NotRunning(_)) => {}
                Err(err) => warn!(job_id, %err, "cancel failed"),
            }
        }
    }

    fn render(&self, poll: &PollResult) -> Result<Vec<String>, serde_json::Error> {
        if self.json {
            if poll.lines.is_empty() && poll.running {
                return Ok(vec![]);
            }
            return Ok(vec![serde_json::to_string(poll)?]);
        }
        let mut rendered: Vec<String> = poll
            .lines
            .iter()
            .map(|line| format!("[{}] {}", poll.id, line))
            .collect();
        if !poll.running {
            let outcome = match poll.exit_code {
                Some(code) => format!("exited with code {}", code),
                None => format!("ended: {:?}", poll.status),
            };
            rendered.push(format!("[{}] {}", poll.id, outcome));
        }
        Ok(rendered)
    }
}
