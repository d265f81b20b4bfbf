//! Job Monitoring Module
//!
//! Utilities for observing jobs while they run.
//!
//! # Components
//!
//! - [`LogSpooler`]: Live tail of a job's runner log
//! - [`JobTimeline`]: Timestamped state-transition history

pub mod spooler;
pub mod timeline;

pub use spooler::LogSpooler;
pub use timeline::{JobTimeline, TransitionEvent};
