//! Job Requests and Status Snapshots
//!
//! [`JobRequest`] is what a caller submits; [`StatusSnapshot`] is the
//! race-free copy of a job's visible fields that callers get back.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::state::JobState;
use super::JobId;
use crate::error::Result;

/// A request to run a workflow.
///
/// Deserializes from a submission body where only `workflow` is required:
///
/// ```json
/// { "workflow": "wf.cwl", "input": {"x": 1}, "name": "nightly" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    /// Path or identifier of the workflow document, passed to the runner as-is
    pub workflow: String,

    /// Input object written to the runner's stdin
    #[serde(default = "empty_object")]
    pub input: Value,

    /// Optional label; no uniqueness constraint
    #[serde(default)]
    pub name: String,
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}

impl JobRequest {
    /// Parses an input object from YAML or JSON text.
    pub fn parse_input(text: &str) -> Result<Value> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Creates a request with no name.
    pub fn new(workflow: impl Into<String>, input: Value) -> Self {
        Self {
            workflow: workflow.into(),
            input,
            name: String::new(),
        }
    }

    /// Sets the job name (builder pattern).
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Immutable view of a job at one instant.
///
/// Always produced under the job's status lock, so `state` and `output`
/// come from the same transition. `output` is only ever present when
/// `state` is [`JobState::Success`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    #[serde(skip)]
    pub job_id: JobId,

    /// Job URL
    pub id: String,

    /// Log stream URL
    pub log: String,

    pub workflow: String,
    pub state: JobState,
    pub input: Value,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,

    pub name: String,
}

impl StatusSnapshot {
    /// Renders the snapshot as indented JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Renders a list of snapshots as a JSON array.
pub fn render_list(snapshots: &[StatusSnapshot]) -> Result<String> {
    Ok(serde_json::to_string_pretty(snapshots)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::JobError;
    use serde_json::json;

    fn snapshot(state: JobState, output: Option<Value>) -> StatusSnapshot {
        StatusSnapshot {
            job_id: JobId(3),
            id: "/jobs/3".to_string(),
            log: "/jobs/3/log".to_string(),
            workflow: "wf.cwl".to_string(),
            state,
            input: json!({"x": 1}),
            output,
            name: "nightly".to_string(),
        }
    }

    #[test]
    fn test_request_defaults() {
        let request: JobRequest = serde_json::from_str(r#"{"workflow": "wf.cwl"}"#).unwrap();
        assert_eq!(request.workflow, "wf.cwl");
        assert_eq!(request.input, json!({}));
        assert_eq!(request.name, "");
    }

    #[test]
    fn test_request_requires_workflow() {
        let result: serde_json::Result<JobRequest> = serde_json::from_str(r#"{"input": {}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_input_yaml_and_json() {
        assert_eq!(
            JobRequest::parse_input("reads:\n  - a.fq\nthreads: 4\n").unwrap(),
            json!({"reads": ["a.fq"], "threads": 4})
        );
        assert_eq!(
            JobRequest::parse_input(r#"{"x": [1, 2]}"#).unwrap(),
            json!({"x": [1, 2]})
        );
    }

    #[test]
    fn test_parse_input_error() {
        let err = JobRequest::parse_input("{unclosed: [").unwrap_err();
        assert!(matches!(err, JobError::Yaml(_)));
        assert!(err.to_string().starts_with("YAML error"));
    }

    #[test]
    fn test_request_builder() {
        let request = JobRequest::new("wf.cwl", json!({"a": [1, 2]})).with_name("run-a");
        assert_eq!(request.name, "run-a");
        assert_eq!(request.input["a"][1], 2);
    }

    #[test]
    fn test_snapshot_keys() {
        let rendered = serde_json::to_value(snapshot(JobState::Success, Some(json!({"result": 42})))).unwrap();

        assert_eq!(rendered["id"], "/jobs/3");
        assert_eq!(rendered["log"], "/jobs/3/log");
        assert_eq!(rendered["workflow"], "wf.cwl");
        assert_eq!(rendered["state"], "Success");
        assert_eq!(rendered["input"], json!({"x": 1}));
        assert_eq!(rendered["output"], json!({"result": 42}));
        assert_eq!(rendered["name"], "nightly");
        assert!(rendered.get("job_id").is_none());
    }

    #[test]
    fn test_snapshot_omits_absent_output() {
        let rendered = serde_json::to_value(snapshot(JobState::Running, None)).unwrap();
        assert!(rendered.get("output").is_none());
    }

    #[test]
    fn test_render_list() {
        let list = vec![
            snapshot(JobState::Running, None),
            snapshot(JobState::Cancelled, None),
        ];
        let text = render_list(&list).unwrap();
        let parsed: Value = serde_json::from_str(&text).unwrap();

        assert_eq!(parsed.as_array().unwrap().len(), 2);
        assert_eq!(parsed[1]["state"], "Cancelled");
    }

    #[test]
    fn test_render_empty_list() {
        assert_eq!(render_list(&[]).unwrap(), "[]");
    }
}
