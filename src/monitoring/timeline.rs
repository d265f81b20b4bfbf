//! Job Timeline
//!
//! Records every state transition of a job with a wall-clock timestamp,
//! for run-time reporting and auditing.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::job::JobState;

/// A single state transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionEvent {
    /// State entered
    pub state: JobState,
    /// When the state was entered
    pub timestamp: DateTime<Utc>,
}

/// Ordered transition history of one job.
#[derive(Debug, Clone, Default)]
pub struct JobTimeline {
    events: Vec<TransitionEvent>,
}

impl JobTimeline {
    /// Creates an empty timeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records entry into `state` now.
    pub fn record(&mut self, state: JobState) {
        self.events.push(TransitionEvent {
            state,
            timestamp: Utc::now(),
        });
    }

    /// Returns all recorded transitions, oldest first.
    pub fn events(&self) -> &[TransitionEvent] {
        &self.events
    }

    /// Returns when the job entered its first state.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.events.first().map(|e| e.timestamp)
    }

    /// Returns when the job entered a terminal state, if it has.
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.events
            .iter()
            .find(|e| e.state.is_terminal())
            .map(|e| e.timestamp)
    }

    /// Time from the first transition to the terminal one.
    ///
    /// Returns `None` while the job is still active.
    pub fn runtime(&self) -> Option<Duration> {
        Some(self.finished_at()? - self.started_at()?)
    }

    /// Total time spent in `Paused`, counting an open pause up to now.
    pub fn paused_for(&self) -> Duration {
        let mut total = Duration::zero();
        let mut paused_since: Option<DateTime<Utc>> = None;

        for event in &self.events {
            match (event.state, paused_since) {
                (JobState::Paused, None) => paused_since = Some(event.timestamp),
                (JobState::Paused, Some(_)) => {}
                (_, Some(since)) => {
                    total = total + (event.timestamp - since);
                    paused_since = None;
                }
                (_, None) => {}
            }
        }

        if let Some(since) = paused_since {
            total = total + (Utc::now() - since);
        }

        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration as StdDuration;

    #[test]
    fn test_timeline_creation() {
        let timeline = JobTimeline::new();
        assert!(timeline.events().is_empty());
        assert!(timeline.started_at().is_none());
        assert!(timeline.runtime().is_none());
    }

    #[test]
    fn test_record_order() {
        let mut timeline = JobTimeline::new();
        timeline.record(JobState::Running);
        timeline.record(JobState::Paused);
        timeline.record(JobState::Running);

        let states: Vec<JobState> = timeline.events().iter().map(|e| e.state).collect();
        assert_eq!(
            states,
            vec![JobState::Running, JobState::Paused, JobState::Running]
        );
    }

    #[test]
    fn test_runtime_only_when_finished() {
        let mut timeline = JobTimeline::new();
        timeline.record(JobState::Running);
        assert!(timeline.runtime().is_none());

        thread::sleep(StdDuration::from_millis(20));
        timeline.record(JobState::Success);

        let runtime = timeline.runtime().unwrap();
        assert!(runtime.num_milliseconds() >= 20);
    }

    #[test]
    fn test_system_error_has_zero_runtime() {
        let mut timeline = JobTimeline::new();
        timeline.record(JobState::SystemError);

        assert_eq!(timeline.runtime(), Some(Duration::zero()));
    }

    #[test]
    fn test_paused_for() {
        let mut timeline = JobTimeline::new();
        timeline.record(JobState::Running);
        timeline.record(JobState::Paused);
        thread::sleep(StdDuration::from_millis(30));
        timeline.record(JobState::Running);
        timeline.record(JobState::Cancelled);

        assert!(timeline.paused_for().num_milliseconds() >= 30);
    }

    #[test]
    fn test_paused_for_never_paused() {
        let mut timeline = JobTimeline::new();
        timeline.record(JobState::Running);
        timeline.record(JobState::Success);

        assert_eq!(timeline.paused_for(), Duration::zero());
    }
}
