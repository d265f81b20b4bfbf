//! Jobkeeper - Workflow Job Lifecycle Manager
//!
//! Runs workflow documents through an external runner executable and
//! supervises each run as a job: clients submit a workflow plus an input
//! object, then poll status, stream the runner's log, or cancel, pause and
//! resume the run while it executes.
//!
//! # Architecture
//!
//! The library is organized into these modules:
//!
//! - [`job`]: Job state machine, supervision and status snapshots
//! - [`execution`]: Job registry and runner process handling
//! - [`monitoring`]: Live log tailing and transition timelines
//! - [`environment`]: Runner executable resolution
//! - [`config`]: Settings applied to every job
//!
//! # Example
//!
//! ```rust,no_run
//! use jobkeeper::{JobRegistry, JobRequest, RunnerConfig};
//! use serde_json::json;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = JobRegistry::new(RunnerConfig::default());
//!
//!     // Start the runner on a workflow
//!     let id = registry.create(JobRequest::new("align.cwl", json!({"reads": "a.fq"})));
//!
//!     // Wait for it to finish and print the result
//!     let status = registry.get(id)?.wait(None);
//!     println!("{}", status.to_json_pretty()?);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod environment;
pub mod error;
pub mod execution;
pub mod job;
pub mod monitoring;

#[cfg(test)]
pub(crate) mod testutil;

// Re-export commonly used types
pub use config::RunnerConfig;
pub use error::{JobError, Result};
pub use execution::registry::JobRegistry;
pub use job::{Job, JobId, JobRequest, JobState, StatusSnapshot};
pub use monitoring::LogSpooler;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "Jobkeeper";
