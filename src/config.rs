//! Runner Configuration
//!
//! Settings shared by every job a registry launches. Values not set
//! explicitly use the defaults below.

use std::path::PathBuf;
use std::time::Duration;

use crate::environment::DEFAULT_RUNNER;
use crate::job::JobId;

/// Default prefix for job and log URLs.
pub const DEFAULT_BASE_URL: &str = "/";

/// Default sleep between empty log reads.
pub const DEFAULT_LOG_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default maximum size of one log chunk.
pub const DEFAULT_LOG_CHUNK_SIZE: usize = 4096;

/// Configuration applied to every job.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    runner: PathBuf,
    base_url: String,
    work_root: Option<PathBuf>,
    log_poll_interval: Duration,
    log_chunk_size: usize,
    max_runtime: Option<Duration>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::with_runner(DEFAULT_RUNNER.clone())
    }
}

impl RunnerConfig {
    /// Creates a configuration using `runner` and defaults for everything else.
    pub fn with_runner(runner: impl Into<PathBuf>) -> Self {
        Self {
            runner: runner.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            work_root: None,
            log_poll_interval: DEFAULT_LOG_POLL_INTERVAL,
            log_chunk_size: DEFAULT_LOG_CHUNK_SIZE,
            max_runtime: None,
        }
    }

    /// Sets the runner executable.
    pub fn set_runner(&mut self, runner: impl Into<PathBuf>) {
        self.runner = runner.into();
    }

    /// Sets the URL prefix for job and log URLs. A trailing `/` is added
    /// if missing.
    pub fn set_base_url(&mut self, base_url: impl Into<String>) {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        self.base_url = base_url;
    }

    /// Sets the parent directory for job work dirs and log files.
    pub fn set_work_root(&mut self, dir: impl Into<PathBuf>) {
        self.work_root = Some(dir.into());
    }

    /// Sets the sleep between empty log reads.
    pub fn set_log_poll_interval(&mut self, interval: Duration) {
        self.log_poll_interval = interval;
    }

    /// Sets the maximum size of one log chunk. Zero is clamped to one.
    pub fn set_log_chunk_size(&mut self, size: usize) {
        self.log_chunk_size = size.max(1);
    }

    /// Sets or clears the execution deadline.
    pub fn set_max_runtime(&mut self, limit: Option<Duration>) {
        self.max_runtime = limit;
    }

    pub fn runner(&self) -> &PathBuf {
        &self.runner
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the directory jobs create their files under.
    pub fn work_root(&self) -> PathBuf {
        self.work_root.clone().unwrap_or_else(std::env::temp_dir)
    }

    pub fn log_poll_interval(&self) -> Duration {
        self.log_poll_interval
    }

    pub fn log_chunk_size(&self) -> usize {
        self.log_chunk_size
    }

    pub fn max_runtime(&self) -> Option<Duration> {
        self.max_runtime
    }

    /// URL identifying a job.
    pub fn job_url(&self, id: JobId) -> String {
        format!("{}jobs/{}", self.base_url, id)
    }

    /// URL of a job's log stream.
    pub fn log_url(&self, id: JobId) -> String {
        format!("{}jobs/{}/log", self.base_url, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RunnerConfig::with_runner("cwl-runner");

        assert_eq!(config.runner(), &PathBuf::from("cwl-runner"));
        assert_eq!(config.base_url(), "/");
        assert_eq!(config.log_poll_interval(), Duration::from_secs(1));
        assert_eq!(config.log_chunk_size(), 4096);
        assert!(config.max_runtime().is_none());
        assert_eq!(config.work_root(), std::env::temp_dir());
    }

    #[test]
    fn test_urls() {
        let mut config = RunnerConfig::with_runner("cwl-runner");
        assert_eq!(config.job_url(JobId(4)), "/jobs/4");
        assert_eq!(config.log_url(JobId(4)), "/jobs/4/log");

        config.set_base_url("http://localhost:8080");
        assert_eq!(config.job_url(JobId(0)), "http://localhost:8080/jobs/0");
        assert_eq!(config.log_url(JobId(0)), "http://localhost:8080/jobs/0/log");
    }

    #[test]
    fn test_setters() {
        let mut config = RunnerConfig::with_runner("sh");
        config.set_work_root("/var/tmp/jobs");
        config.set_log_poll_interval(Duration::from_millis(25));
        config.set_log_chunk_size(0);
        config.set_max_runtime(Some(Duration::from_secs(60)));

        assert_eq!(config.work_root(), PathBuf::from("/var/tmp/jobs"));
        assert_eq!(config.log_poll_interval(), Duration::from_millis(25));
        assert_eq!(config.log_chunk_size(), 1);
        assert_eq!(config.max_runtime(), Some(Duration::from_secs(60)));
    }
}
