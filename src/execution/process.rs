//! Runner Process Handling
//!
//! Handles everything that touches the OS for one job:
//! - Creating the job's private work directory and log file
//! - Spawning `<runner> <workflow> -` with stdin/stdout piped and
//!   stderr redirected into the log
//! - Delivering terminate/suspend/continue signals
//!
//! On unix the runner is started as the leader of a new process group and
//! signals go to the whole group, so tools the runner launched are stopped
//! along with it.

use std::fs::File;
use std::path::Path;
use std::process::{Child, Command, Stdio};

use log::debug;
use tempfile::{Builder, TempDir, TempPath};

use crate::error::{JobError, Result};
use crate::job::JobId;

/// True when the platform can suspend, resume and terminate runners.
pub const SUPPORTS_SIGNALS: bool = cfg!(unix);

/// Control signals a job can send its runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    /// Ask the runner to exit (SIGTERM)
    Terminate,
    /// Stop the runner (SIGSTOP)
    Suspend,
    /// Continue a stopped runner (SIGCONT)
    Continue,
}

/// Files exclusively owned by one job.
///
/// Both the directory and the log file are removed when this is dropped.
#[derive(Debug)]
pub struct JobWorkspace {
    dir: TempDir,
    log: TempPath,
}

impl JobWorkspace {
    /// Creates a fresh work directory and an empty log file under `root`.
    ///
    /// Returns the workspace and a write handle to the log for the
    /// runner's stderr.
    pub fn create(root: &Path, id: JobId) -> Result<(Self, File)> {
        let dir = Builder::new()
            .prefix(&format!("job-{}-", id))
            .tempdir_in(root)?;

        let (log_file, log) = Builder::new()
            .prefix(&format!("job-{}-", id))
            .suffix(".log")
            .tempfile_in(root)?
            .into_parts();

        debug!(
            "Job {} workspace: {} (log {})",
            id,
            dir.path().display(),
            log.display()
        );

        Ok((Self { dir, log }, log_file))
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn log_path(&self) -> &Path {
        &self.log
    }
}

/// Builds the runner command line: `<runner> <workflow> -`.
pub fn runner_command(runner: &Path, workflow: &str, work_dir: &Path, log: File) -> Command {
    let mut cmd = Command::new(runner);
    cmd.arg(workflow)
        .arg("-")
        .current_dir(work_dir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::from(log));

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    cmd
}

/// Spawns the runner for a job.
pub fn spawn_runner(runner: &Path, workflow: &str, work_dir: &Path, log: File) -> Result<Child> {
    debug!(
        "Spawning: {} {} - (in {})",
        runner.display(),
        workflow,
        work_dir.display()
    );

    Ok(runner_command(runner, workflow, work_dir, log).spawn()?)
}

/// Sends `signal` to the runner process group led by `pid`.
#[cfg(unix)]
pub fn send_signal(pid: u32, signal: ControlSignal) -> Result<()> {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let sig = match signal {
        ControlSignal::Terminate => Signal::SIGTERM,
        ControlSignal::Suspend => Signal::SIGSTOP,
        ControlSignal::Continue => Signal::SIGCONT,
    };

    debug!("Sending {:?} to process group {}", sig, pid);

    killpg(Pid::from_raw(pid as i32), sig).map_err(|errno| JobError::Io(errno.into()))
}

/// Sends `signal` to the runner process group led by `pid`.
#[cfg(not(unix))]
pub fn send_signal(_pid: u32, _signal: ControlSignal) -> Result<()> {
    Err(JobError::Unsupported("process signals"))
}

/// Appends a diagnostic line to a job log.
pub fn append_to_log(path: &Path, message: &str) -> Result<()> {
    use std::io::Write;

    let mut file = std::fs::OpenOptions::new().append(true).open(path)?;
    writeln!(file, "{}", message)?;
    Ok(())
}
