//! Job Execution Module
//!
//! Launches runner processes and keeps track of every job created
//! during the service's lifetime.
//!
//! # Architecture
//!
//! - [`registry`]: Thread-safe collection of jobs and the caller-facing operations
//! - [`process`]: Workspace creation, runner spawning and signal delivery

pub mod process;
pub mod registry;

pub use registry::JobRegistry;
