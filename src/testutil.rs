//! Shared fixtures for unit tests.
//!
//! Tests use `sh` as the runner and small shell scripts as workflows, so a
//! job runs `sh <script> -`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::config::RunnerConfig;

/// Upper bound for waiting on jobs that should settle quickly.
pub const WAIT: Duration = Duration::from_secs(10);

/// Config running `sh` with files under `root` and a fast log poll.
pub fn sh_config(root: &Path) -> RunnerConfig {
    let mut config = RunnerConfig::with_runner("sh");
    config.set_work_root(root);
    config.set_log_poll_interval(Duration::from_millis(20));
    config
}

/// Writes a shell script workflow and returns its path.
pub fn write_script(dir: &Path, name: &str, body: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, body).expect("write test script");
    path.to_string_lossy().into_owned()
}
