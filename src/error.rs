//! Error Types
//!
//! Only caller mistakes (unknown job ids, malformed input documents),
//! missing platform capabilities and I/O surface as errors. Runner failures
//! of any kind are recorded as job state.

use thiserror::Error;

use crate::job::JobId;

/// Errors returned by job and registry operations.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("Not supported on this platform: {0}")]
    Unsupported(&'static str),

    #[error("Invalid runner output: {0}")]
    InvalidOutput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, JobError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = JobError::NotFound(JobId(7));
        assert_eq!(err.to_string(), "Job not found: 7");
    }

    #[test]
    fn test_unsupported_display() {
        let err = JobError::Unsupported("pause");
        assert_eq!(err.to_string(), "Not supported on this platform: pause");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err: JobError = io.into();
        assert!(matches!(err, JobError::Io(_)));
        assert!(err.to_string().contains("disk gone"));
    }

    #[test]
    fn test_serde_conversions() {
        let json: JobError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(json, JobError::Json(_)));

        let yaml: JobError = serde_yaml::from_str::<serde_json::Value>("[")
            .unwrap_err()
            .into();
        assert!(matches!(yaml, JobError::Yaml(_)));
    }
}
