use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EngineError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepError {
    pub kind: String,
    pub message: String,
    /// Semantic keys that were searched, for resolution failures.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<String>,
}

impl From<&EngineError> for StepError {
    fn from(err: &EngineError) -> Self {
        let candidates = match err {
            EngineError::ElementNotFound { candidates, .. }
            | EngineError::AmbiguousMatch { candidates, .. } => candidates.clone(),
            _ => Vec::new(),
        };
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
            candidates,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutcome {
    /// Zero-based index into the workflow's step list.
    pub index: usize,
    pub step_type: String,
    pub success: bool,
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StepError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_data: Option<Value>,
}

impl StepOutcome {
    pub fn ok(index: usize, step_type: &str, attempts: u32) -> Self {
        Self {
            index,
            step_type: step_type.to_string(),
            success: true,
            attempts,
            error: None,
            extracted_data: None,
        }
    }

    pub fn failed(index: usize, step_type: &str, attempts: u32, err: &EngineError) -> Self {
        Self {
            index,
            step_type: step_type.to_string(),
            success: false,
            attempts,
            error: Some(err.into()),
            extracted_data: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: String,
    pub workflow_name: String,
    pub success: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<StepOutcome>,
    /// Accumulated extraction output, keyed by each step's `output` name.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub context: Value,
}
