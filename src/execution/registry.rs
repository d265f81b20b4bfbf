//! Job Registry
//!
//! Owns every job created during the process lifetime and exposes the
//! operations callers use: create, query, stream, control and delete.
//!
//! Job ids are allocated from a counter and never reused, so deleting a job
//! does not renumber the others. The registry lock only guards the
//! collection itself; spawning a runner and reading a job's status happen
//! outside it.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info};

use crate::config::RunnerConfig;
use crate::error::{JobError, Result};
use crate::job::{Job, JobId, JobRequest, StatusSnapshot};
use crate::monitoring::LogSpooler;

#[derive(Debug, Default)]
struct Jobs {
    next_id: u64,
    entries: BTreeMap<JobId, Arc<Job>>,
}

/// Thread-safe ordered collection of jobs.
///
/// # Example
///
/// ```rust,no_run
/// use jobkeeper::{JobRegistry, JobRequest, RunnerConfig};
/// use serde_json::json;
///
/// let registry = JobRegistry::new(RunnerConfig::with_runner("cwl-runner"));
/// let id = registry.create(JobRequest::new("wf.cwl", json!({"reads": "a.fq"})));
///
/// for chunk in registry.stream_log(id)? {
///     eprint!("{}", String::from_utf8_lossy(&chunk));
/// }
/// println!("{}", registry.status(id)?.state);
/// # Ok::<(), jobkeeper::JobError>(())
/// ```
#[derive(Debug)]
pub struct JobRegistry {
    config: RunnerConfig,
    jobs: Mutex<Jobs>,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new(RunnerConfig::default())
    }
}

impl JobRegistry {
    /// Creates an empty registry whose jobs use `config`.
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config,
            jobs: Mutex::new(Jobs::default()),
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Starts a job and returns its id.
    ///
    /// The job is `Running` (or `SystemError` if it could not start) by the
    /// time this returns. Failures to start are only visible via status.
    pub fn create(&self, request: JobRequest) -> JobId {
        let id = {
            let mut jobs = self.lock_jobs();
            let id = JobId(jobs.next_id);
            jobs.next_id += 1;
            id
        };

        let job = Job::start(id, request, &self.config);
        self.lock_jobs().entries.insert(id, job);

        id
    }

    /// Looks up a job.
    pub fn get(&self, id: JobId) -> Result<Arc<Job>> {
        self.lock_jobs()
            .entries
            .get(&id)
            .cloned()
            .ok_or(JobError::NotFound(id))
    }

    /// Shallow copy of all jobs in id order.
    pub fn list(&self) -> Vec<Arc<Job>> {
        self.lock_jobs().entries.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock_jobs().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Status of one job.
    pub fn status(&self, id: JobId) -> Result<StatusSnapshot> {
        Ok(self.get(id)?.status())
    }

    /// Status of every job in id order.
    ///
    /// Each job's status is read under its own lock after the registry
    /// lock has been released.
    pub fn statuses(&self) -> Vec<StatusSnapshot> {
        self.list().iter().map(|job| job.status()).collect()
    }

    /// Opens a live tail of a job's log.
    pub fn stream_log(&self, id: JobId) -> Result<LogSpooler> {
        self.get(id)?.open_log()
    }

    /// Cancels a running job. See [`Job::cancel`] for platforms without
    /// process signals.
    pub fn cancel(&self, id: JobId) -> Result<StatusSnapshot> {
        Ok(self.get(id)?.cancel())
    }

    /// Suspends a running job.
    pub fn pause(&self, id: JobId) -> Result<StatusSnapshot> {
        self.get(id)?.pause()
    }

    /// Continues a paused job.
    pub fn resume(&self, id: JobId) -> Result<StatusSnapshot> {
        self.get(id)?.resume()
    }

    /// Removes a job, stopping its runner first if it is still active.
    ///
    /// Returns the job's final status. Its work directory and log are
    /// removed once nothing else holds the job.
    pub fn delete(&self, id: JobId) -> Result<StatusSnapshot> {
        let job = self.get(id)?;

        let status = if job.state().is_active() {
            debug!("Job {} still active; stopping before delete", id);
            job.stop()
        } else {
            job.status()
        };

        self.lock_jobs()
            .entries
            .remove(&id)
            .ok_or(JobError::NotFound(id))?;

        info!("Job {} deleted ({})", id, status.state);
        Ok(status)
    }

    fn lock_jobs(&self) -> MutexGuard<'_, Jobs> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
