//! Runner Executable Resolution
//!
//! Locates the external workflow runner that jobs launch.
//!
//! # Resolution Priority
//!
//! 1. `JOBKEEPER_RUNNER` environment variable
//! 2. Production path: a `cwl-runner` next to the jobkeeper executable
//! 3. System PATH
//! 4. The bare name, left for the OS to resolve at spawn time

use std::env;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use once_cell::sync::Lazy;

/// Environment variable that overrides runner resolution.
pub const RUNNER_ENV_VAR: &str = "JOBKEEPER_RUNNER";

/// Runner looked up when nothing else is configured.
pub const DEFAULT_RUNNER_NAME: &str = "cwl-runner";

/// Lazily-resolved default runner path.
pub static DEFAULT_RUNNER: Lazy<PathBuf> = Lazy::new(|| {
    if let Some(path) = env::var_os(RUNNER_ENV_VAR).filter(|v| !v.is_empty()) {
        let path = PathBuf::from(path);
        info!("Using runner from {}: {}", RUNNER_ENV_VAR, path.display());
        return path;
    }

    resolve_runner(DEFAULT_RUNNER_NAME)
});

/// Resolves a runner name to a path.
///
/// Names containing a path separator are returned unchanged. Otherwise the
/// directory of the current executable is checked first, then `PATH`.
/// If neither has it, the bare name is returned and spawning it will fail,
/// which jobs record as `SystemError`.
pub fn resolve_runner(name: &str) -> PathBuf {
    let candidate = Path::new(name);
    if candidate.components().count() > 1 {
        return candidate.to_path_buf();
    }

    if let Ok(exe_path) = env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            let bundled = exe_dir.join(name);
            if is_executable(&bundled) {
                info!("Using bundled runner: {}", bundled.display());
                return bundled;
            }
        }
    }

    if let Some(found) = find_on_path(name) {
        info!("Using system runner: {}", found.display());
        return found;
    }

    warn!("Runner '{}' not found; jobs will fail to start", name);
    PathBuf::from(name)
}

/// Searches the directories in `PATH` for an executable named `name`.
pub fn find_on_path(name: &str) -> Option<PathBuf> {
    let path_var = env::var_os("PATH")?;

    env::split_paths(&path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| {
            debug!("Checking {}", candidate.display());
            is_executable(candidate)
        })
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
