mod capture;

use self::capture::CaptureRoutine;
use crate::channel::output_channel;
use crate::errors::{JobError, Result};
use crate::events::{JobStatus, PollResult};
use crate::handle::JobHandle;
use crate::registry::ProcessRegistry;
use crate::types::{Args, Dir, Envs, JobId, Parameter, Program};
use std::{
    env,
    path::Path,
    process::Stdio,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};
use tokio::{
    process,
    sync::{oneshot, watch},
};
use tracing::info;

const DEFAULT_HINT: &str =
    "Build or install the executable at that path, or point the supervisor at an existing one.";

/// Where and how job processes are launched.
///
/// Every job runs `executable [args...] <parameter>`.
#[derive(Clone, Debug)]
pub struct SupervisorConfig {
    executable: Program,
    working_dir: Option<Dir>,
    args: Args,
    envs: Envs,
    hint: String,
}

impl SupervisorConfig {
    pub fn new(executable: impl Into<Program>) -> Self {
        Self {
            executable: executable.into(),
            working_dir: None,
            args: Args::new(),
            envs: Envs::new(),
            hint: DEFAULT_HINT.to_string(),
        }
    }

    /// Defaults to the directory containing the executable.
    pub fn working_dir(mut self, dir: impl Into<Dir>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Argument placed before the job parameter.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, val: impl Into<String>) -> Self {
        self.envs.push((key.into(), val.into()));
        self
    }

    /// Remediation advice attached to `ExecutableNotFound`.
    pub fn hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = hint.into();
        self
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }
}

/// Launches jobs and answers status and output queries about them.
///
/// This is a cheap handle: clones share the same registry, so it can be handed to any number of
/// request handlers.
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<Inner>,
}

struct Inner {
    config: SupervisorConfig,
    registry: ProcessRegistry,
    next_id: AtomicU64,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                registry: ProcessRegistry::new(),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.inner.config
    }

    /// Start a job and return its id without waiting for any output.
    ///
    /// Must be called from within a Tokio runtime: the capture routine is spawned onto it.
    pub fn start(&self, parameter: impl Into<Parameter>) -> Result<JobId> {
        let parameter = parameter.into();
        if parameter.trim().is_empty() {
            return Err(JobError::EmptyParameter);
        }
        let config = &self.inner.config;
        let program = resolve_executable(config)?;

        let mut command = process::Command::new(&program);
        command
            .args(&config.args)
            .arg(&parameter)
            .envs(config.envs.iter().cloned())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        match config.working_dir.as_deref() {
            Some(dir) => {
                command.current_dir(dir);
            }
            None => {
                if let Some(dir) = program.parent().filter(|p| !p.as_os_str().is_empty()) {
                    command.current_dir(dir);
                }
            }
        }
        let mut child = command.spawn().map_err(JobError::SpawnFailed)?;

        let job_id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let pid = child.id();
        let (output_tx, channel) = output_channel();
        let (status_tx, status_rx) = watch::channel(JobStatus::Running);
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let handle = JobHandle::new(job_id, parameter, pid, status_rx, channel, cancel_tx);

        if let Err(err) = self.inner.registry.register(Arc::new(handle)) {
            let _ = child.start_kill();
            return Err(err);
        }
        CaptureRoutine::spawn(job_id, child, output_tx, status_tx, cancel_rx);
        info!(job_id, pid = ?pid, program = %program.display(), "started job");
        Ok(job_id)
    }

    /// Drain the job's buffered output and report its status. Never waits.
    pub fn poll(&self, job_id: JobId) -> Result<PollResult> {
        Ok(self.inner.registry.lookup(job_id)?.poll())
    }

    /// Current status without draining any output.
    pub fn status(&self, job_id: JobId) -> Result<JobStatus> {
        Ok(self.inner.registry.lookup(job_id)?.status())
    }

    /// Ask a running job to stop. Its status becomes `Cancelled` once the process is gone.
    pub fn cancel(&self, job_id: JobId) -> Result<()> {
        let handle = self.inner.registry.lookup(job_id)?;
        if !handle.trigger_cancel() {
            return Err(JobError::NotRunning(job_id));
        }
        info!(job_id, pid = ?handle.pid(), "cancel requested");
        Ok(())
    }

    /// Forget a finished job whose output has been fully drained, returning its final status.
    pub fn reap(&self, job_id: JobId) -> Result<JobStatus> {
        let handle = self.inner.registry.lookup(job_id)?;
        let status = handle.status();
        if status.is_running() {
            return Err(JobError::StillRunning(job_id));
        }
        if handle.has_undrained_output() {
            return Err(JobError::UndrainedOutput(job_id));
        }
        self.inner.registry.remove(job_id)?;
        info!(job_id, ?status, "reaped job");
        Ok(status)
    }

    /// Ids of every registered job, ascending.
    pub fn jobs(&self) -> Vec<JobId> {
        self.inner.registry.ids()
    }
}

fn resolve_executable(config: &SupervisorConfig) -> Result<Program> {
    let path = &config.executable;
    let not_found = || JobError::ExecutableNotFound {
        path: path.clone(),
        hint: config.hint.clone(),
    };

    // a bare name is looked up on PATH
    let on_path = if path.components().count() == 1 && !path.is_absolute() {
        env::var_os("PATH")
            .and_then(|dirs| env::split_paths(&dirs).find_map(|dir| find_file(&dir.join(path))))
    } else {
        None
    };
    let found = on_path.or_else(|| find_file(path)).ok_or_else(not_found)?;

    // the child changes into its working directory before exec, so a relative path would
    // resolve against the wrong directory
    if found.is_absolute() {
        return Ok(found);
    }
    let cwd = env::current_dir().map_err(JobError::SpawnFailed)?;
    Ok(cwd.join(found))
}

/// `path` itself, or `path` with the platform's executable suffix.
fn find_file(path: &Path) -> Option<Program> {
    if path.is_file() {
        return Some(path.to_path_buf());
    }
    let suffix = env::consts::EXE_EXTENSION;
    if !suffix.is_empty() && path.extension().is_none() {
        let with_suffix = path.with_extension(suffix);
        if with_suffix.is_file() {
            return Some(with_suffix);
        }
    }
    None
}
