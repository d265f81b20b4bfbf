//! Job Lifecycle
//!
//! A [`Job`] owns one runner process from spawn to exit. It holds the
//! job's state machine behind a single status lock, runs a supervision
//! thread that waits for the runner and records the outcome, and accepts
//! `cancel`/`pause`/`resume` from any thread while that happens.
//!
//! # Consistency
//!
//! Every externally visible field (`state`, `output`) is only written while
//! holding the status lock, and [`Job::status`] copies them under the same
//! lock. A snapshot therefore never mixes fields from two transitions, and
//! since terminal states have no exits, a state once observed never reverts.

pub mod state;
pub mod status;

use std::fmt;
use std::io::{Read, Write};
use std::path::Path;
use std::process::{Child, ExitStatus};
use std::str::FromStr;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::RunnerConfig;
use crate::error::{JobError, Result};
use crate::execution::process::{
    append_to_log, send_signal, spawn_runner, ControlSignal, JobWorkspace, SUPPORTS_SIGNALS,
};
use crate::monitoring::{JobTimeline, LogSpooler, TransitionEvent};

pub use state::JobState;
pub use status::{render_list, JobRequest, StatusSnapshot};

/// Registry-assigned job identifier.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.trim().parse().map(JobId)
    }
}

/// Mutable fields guarded by the status lock.
#[derive(Debug)]
struct StatusFields {
    state: JobState,
    output: Option<Value>,
    /// Runner pid while the process has not been reaped
    pid: Option<u32>,
    timeline: JobTimeline,
}

/// One workflow execution.
#[derive(Debug)]
pub struct Job {
    id: JobId,
    request: JobRequest,
    url: String,
    log_url: String,
    workspace: Option<JobWorkspace>,
    log_poll_interval: Duration,
    log_chunk_size: usize,
    status: Mutex<StatusFields>,
    settled: Condvar,
}

impl Job {
    /// Creates the job's workspace, spawns its runner and starts supervising it.
    ///
    /// Returns with the job in `Running`, or in `SystemError` if the
    /// workspace or the process could not be created. Startup failures are
    /// never returned as errors.
    pub fn start(id: JobId, request: JobRequest, config: &RunnerConfig) -> Arc<Job> {
        let (workspace, spawned) = match JobWorkspace::create(&config.work_root(), id) {
            Ok((workspace, log)) => {
                let child = spawn_runner(config.runner(), &request.workflow, workspace.dir(), log);
                (Some(workspace), child)
            }
            Err(e) => (None, Err(e)),
        };

        let (state, child) = match spawned {
            Ok(child) => {
                info!(
                    "Job {} started: {} (pid {})",
                    id,
                    request.workflow,
                    child.id()
                );
                (JobState::Running, Some(child))
            }
            Err(e) => {
                error!(
                    "Job {} could not start runner '{}': {}",
                    id,
                    config.runner().display(),
                    e
                );
                (JobState::SystemError, None)
            }
        };

        let mut timeline = JobTimeline::new();
        timeline.record(state);

        let job = Arc::new(Job {
            id,
            url: config.job_url(id),
            log_url: config.log_url(id),
            request,
            workspace,
            log_poll_interval: config.log_poll_interval(),
            log_chunk_size: config.log_chunk_size(),
            status: Mutex::new(StatusFields {
                state,
                output: None,
                pid: child.as_ref().map(Child::id),
                timeline,
            }),
            settled: Condvar::new(),
        });

        if let Some(child) = child {
            job.supervise_in_background(child, config.max_runtime());
        }

        job
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn workflow(&self) -> &str {
        &self.request.workflow
    }

    pub fn name(&self) -> &str {
        &self.request.name
    }

    pub fn input(&self) -> &Value {
        &self.request.input
    }

    /// Job work directory, absent if it could not be created.
    pub fn work_dir(&self) -> Option<&Path> {
        self.workspace.as_ref().map(JobWorkspace::dir)
    }

    /// Runner log file, absent if it could not be created.
    pub fn log_path(&self) -> Option<&Path> {
        self.workspace.as_ref().map(JobWorkspace::log_path)
    }

    /// Runner pid, until the process has been reaped.
    pub fn pid(&self) -> Option<u32> {
        self.lock_status().pid
    }

    /// Whether `pause`/`resume` are available on this platform.
    pub fn can_pause(&self) -> bool {
        SUPPORTS_SIGNALS
    }

    /// Current state.
    pub fn state(&self) -> JobState {
        self.lock_status().state
    }

    /// Consistent copy of the job's visible fields.
    pub fn status(&self) -> StatusSnapshot {
        let status = self.lock_status();
        self.snapshot_of(&status)
    }

    /// All state transitions so far, oldest first.
    pub fn history(&self) -> Vec<TransitionEvent> {
        self.lock_status().timeline.events().to_vec()
    }

    /// Time from start to the terminal transition, once there is one.
    pub fn runtime(&self) -> Option<chrono::Duration> {
        self.lock_status().timeline.runtime()
    }

    /// Total time spent `Paused` so far.
    pub fn paused_for(&self) -> chrono::Duration {
        self.lock_status().timeline.paused_for()
    }

    /// Opens a fresh live tail of the runner log from its beginning.
    pub fn open_log(self: &Arc<Self>) -> Result<LogSpooler> {
        LogSpooler::open(Arc::clone(self), self.log_poll_interval, self.log_chunk_size)
    }

    /// Blocks until the job reaches a terminal state or `timeout` elapses.
    ///
    /// Returns the snapshot at the moment the wait ended.
    pub fn wait(&self, timeout: Option<Duration>) -> StatusSnapshot {
        let status = self.lock_status();
        let status = match timeout {
            None => self
                .settled
                .wait_while(status, |s| s.state.is_active())
                .unwrap_or_else(PoisonError::into_inner),
            Some(limit) => {
                self.settled
                    .wait_timeout_while(status, limit, |s| s.state.is_active())
                    .unwrap_or_else(PoisonError::into_inner)
                    .0
            }
        };
        self.snapshot_of(&status)
    }

    /// Terminates a running runner and marks the job `Cancelled`.
    ///
    /// No-op unless the job is `Running`. If the signal cannot be delivered
    /// (the runner already exited) the state is left for the supervisor
    /// to settle.
    ///
    /// Platforms without process signals (see [`Job::can_pause`]) cannot
    /// terminate a runner, so there the job keeps running and the returned
    /// snapshot still reads `Running`.
    pub fn cancel(&self) -> StatusSnapshot {
        let mut status = self.lock_status();
        if status.state == JobState::Running && self.deliver(&status, ControlSignal::Terminate) {
            self.transition(&mut status, JobState::Cancelled);
        }
        self.snapshot_of(&status)
    }

    /// Suspends a running runner. No-op unless the job is `Running`.
    pub fn pause(&self) -> Result<StatusSnapshot> {
        if !SUPPORTS_SIGNALS {
            return Err(JobError::Unsupported("pause"));
        }

        let mut status = self.lock_status();
        if status.state == JobState::Running && self.deliver(&status, ControlSignal::Suspend) {
            self.transition(&mut status, JobState::Paused);
        }
        Ok(self.snapshot_of(&status))
    }

    /// Continues a paused runner. No-op unless the job is `Paused`.
    pub fn resume(&self) -> Result<StatusSnapshot> {
        if !SUPPORTS_SIGNALS {
            return Err(JobError::Unsupported("resume"));
        }

        let mut status = self.lock_status();
        if status.state == JobState::Paused && self.deliver(&status, ControlSignal::Continue) {
            self.transition(&mut status, JobState::Running);
        }
        Ok(self.snapshot_of(&status))
    }

    /// Cancels the job from any active state.
    ///
    /// A paused runner is continued first so it can act on the terminate
    /// signal. Used for deletion and deadline expiry.
    pub fn stop(&self) -> StatusSnapshot {
        let mut status = self.lock_status();
        if status.state == JobState::Paused && self.deliver(&status, ControlSignal::Continue) {
            self.transition(&mut status, JobState::Running);
        }
        if status.state == JobState::Running && self.deliver(&status, ControlSignal::Terminate) {
            self.transition(&mut status, JobState::Cancelled);
        }
        self.snapshot_of(&status)
    }

    fn lock_status(&self) -> MutexGuard<'_, StatusFields> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot_of(&self, status: &StatusFields) -> StatusSnapshot {
        StatusSnapshot {
            job_id: self.id,
            id: self.url.clone(),
            log: self.log_url.clone(),
            workflow: self.request.workflow.clone(),
            state: status.state,
            input: self.request.input.clone(),
            output: status.output.clone(),
            name: self.request.name.clone(),
        }
    }

    /// Records a transition. Caller holds the status lock.
    fn transition(&self, status: &mut StatusFields, next: JobState) {
        debug_assert!(status.state.can_transition_to(next));

        info!("Job {}: {} -> {}", self.id, status.state, next);
        status.state = next;
        status.timeline.record(next);
        self.settled.notify_all();
    }

    /// Sends a signal to the runner, absorbing delivery failures.
    fn deliver(&self, status: &StatusFields, signal: ControlSignal) -> bool {
        let Some(pid) = status.pid else {
            debug!("Job {}: no live runner to send {:?}", self.id, signal);
            return false;
        };

        match send_signal(pid, signal) {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    "Job {}: could not deliver {:?} to pid {}: {}",
                    self.id, signal, pid, e
                );
                false
            }
        }
    }

    fn supervise_in_background(self: &Arc<Self>, child: Child, max_runtime: Option<Duration>) {
        let (child_tx, child_rx) = mpsc::channel::<Child>();
        let (done_tx, done_rx) = mpsc::channel::<()>();

        let job = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name(format!("job-{}", self.id))
            .spawn(move || {
                if let Ok(child) = child_rx.recv() {
                    job.supervise(child);
                }
                drop(done_tx);
            });

        // The child only moves to the supervisor once it is running, so a
        // failed spawn leaves it here to be reaped.
        let handed_over = match spawned {
            Ok(_) => child_tx.send(child).map_err(|mpsc::SendError(child)| child),
            Err(e) => {
                error!("Job {}: could not start supervisor thread: {}", self.id, e);
                Err(child)
            }
        };

        if let Err(child) = handed_over {
            self.reap_unsupervised(child);
            return;
        }

        if let Some(limit) = max_runtime {
            let job = Arc::clone(self);
            let watchdog = thread::Builder::new()
                .name(format!("job-{}-deadline", self.id))
                .spawn(move || {
                    if let Err(RecvTimeoutError::Timeout) = done_rx.recv_timeout(limit) {
                        warn!("Job {} exceeded its {:?} deadline; stopping", job.id, limit);
                        job.stop();
                    }
                });

            if let Err(e) = watchdog {
                warn!("Job {}: deadline not enforced: {}", self.id, e);
            }
        }
    }

    /// Kills and reaps a runner nobody supervises, failing the job.
    fn reap_unsupervised(&self, mut child: Child) {
        if let Err(e) = send_signal(child.id(), ControlSignal::Terminate) {
            debug!("Job {}: could not terminate runner group: {}", self.id, e);
        }
        if let Err(e) = child.kill() {
            debug!("Job {}: could not kill runner: {}", self.id, e);
        }
        if let Err(e) = child.wait() {
            warn!("Job {}: could not reap runner: {}", self.id, e);
        }
        self.mark_reaped();
        self.settle(JobState::PermanentFailure, None);
    }

    /// Forgets the runner pid once the process has been waited for.
    fn mark_reaped(&self) {
        self.lock_status().pid = None;
    }

    /// Feeds the input, collects stdout, waits for exit and records the outcome.
    fn supervise(&self, mut child: Child) {
        let payload = self.request.input.to_string().into_bytes();
        let feeder = child.stdin.take().map(|mut stdin| {
            let id = self.id;
            thread::spawn(move || {
                if let Err(e) = stdin.write_all(&payload) {
                    debug!("Job {}: runner closed stdin early: {}", id, e);
                }
            })
        });

        let mut stdout = Vec::new();
        if let Some(mut out) = child.stdout.take() {
            if let Err(e) = out.read_to_end(&mut stdout) {
                warn!("Job {}: failed reading runner output: {}", self.id, e);
            }
        }

        let exit = child.wait();
        self.mark_reaped();

        if let Some(feeder) = feeder {
            if feeder.join().is_err() {
                warn!("Job {}: input feeder panicked", self.id);
            }
        }

        match exit {
            Ok(code) => self.record_exit(code, &stdout),
            Err(e) => {
                error!("Job {}: failed waiting for runner: {}", self.id, e);
                self.settle(JobState::PermanentFailure, None);
            }
        }
    }

    fn record_exit(&self, code: ExitStatus, stdout: &[u8]) {
        if !code.success() {
            info!("Job {}: runner exited with {}", self.id, code);
            self.settle(JobState::PermanentFailure, None);
            return;
        }

        match parse_output(stdout) {
            Ok(output) => self.settle(JobState::Success, Some(output)),
            Err(e) => {
                warn!("Job {}: {}", self.id, e);
                if let Some(log) = self.log_path() {
                    if let Err(log_err) = append_to_log(log, &format!("jobkeeper: {}", e)) {
                        debug!("Job {}: could not note failure in log: {}", self.id, log_err);
                    }
                }
                self.settle(JobState::PermanentFailure, None);
            }
        }
    }

    /// Applies the runner's exit outcome unless the job already settled.
    fn settle(&self, outcome: JobState, output: Option<Value>) {
        let mut status = self.lock_status();
        if !status.state.can_transition_to(outcome) {
            debug!(
                "Job {}: runner exited while {}; keeping state",
                self.id, status.state
            );
            return;
        }

        if outcome == JobState::Success {
            status.output = output;
        }
        self.transition(&mut status, outcome);
    }
}

/// Parses runner stdout as YAML, which also accepts JSON.
pub fn parse_output(stdout: &[u8]) -> Result<Value> {
    if stdout.iter().all(u8::is_ascii_whitespace) {
        return Err(JobError::InvalidOutput(
            "runner produced no output".to_string(),
        ));
    }

    serde_yaml::from_slice(stdout)
        .map_err(|e| JobError::InvalidOutput(format!("output is not valid YAML/JSON: {}", e)))
}
