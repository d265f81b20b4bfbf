//! Job State Machine
//!
//! The six externally visible job states and the transitions allowed
//! between them.
//!
//! ```text
//!            spawn ok                      exit 0
//!  (init) ────────────► Running ─────────────────► Success
//!    │                  │  ▲  │  exit != 0
//!    │ spawn fails      │  │  └─────────────────► PermanentFailure
//!    ▼          pause() │  │ resume()
//!  SystemError          ▼  │
//!                       Paused      Running ──cancel()──► Cancelled
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Externally visible state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobState {
    /// Runner process is alive and not suspended
    Running,
    /// Runner process has been suspended by `pause()`
    Paused,
    /// Runner exited with code 0 and its output was parsed
    Success,
    /// Runner exited nonzero, was killed, or produced unparseable output
    PermanentFailure,
    /// Runner could not be started
    SystemError,
    /// Job was cancelled by a caller
    Cancelled,
}

impl JobState {
    /// All states, in declaration order.
    pub const ALL: [JobState; 6] = [
        JobState::Running,
        JobState::Paused,
        JobState::Success,
        JobState::PermanentFailure,
        JobState::SystemError,
        JobState::Cancelled,
    ];

    /// Returns true if no further transition can happen from this state.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Success
                | JobState::PermanentFailure
                | JobState::SystemError
                | JobState::Cancelled
        )
    }

    /// Returns true if the job's runner process may still be alive.
    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if moving from `self` to `next` is a legal transition.
    ///
    /// `SystemError` is only ever an initial state, so nothing transitions
    /// into it. A paused runner can still exit (e.g. killed externally), so
    /// exit outcomes are accepted from `Paused` as well.
    pub fn can_transition_to(self, next: JobState) -> bool {
        use JobState::*;

        matches!(
            (self, next),
            (Running, Paused)
                | (Paused, Running)
                | (Running, Cancelled)
                | (Running | Paused, Success)
                | (Running | Paused, PermanentFailure)
        )
    }

    /// Returns the state's wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Running => "Running",
            JobState::Paused => "Paused",
            JobState::Success => "Success",
            JobState::PermanentFailure => "PermanentFailure",
            JobState::SystemError => "SystemError",
            JobState::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
