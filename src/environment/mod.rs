//! Runner Environment Module
//!
//! Locates the external runner executable that jobs launch.

pub mod runner;

pub use runner::{find_on_path, resolve_runner, DEFAULT_RUNNER};
