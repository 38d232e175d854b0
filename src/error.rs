use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Element not found for target '{target}' ({} candidates on page)", candidates.len())]
    ElementNotFound {
        target: String,
        /// Semantic keys that were available when the lookup failed.
        candidates: Vec<String>,
    },

    #[error("Ambiguous target '{target}': matches {candidates:?}")]
    AmbiguousMatch {
        target: String,
        candidates: Vec<String>,
    },

    #[error("Step {step} failed verification after {attempts} attempts: {detail}")]
    StepVerificationFailed {
        step: usize,
        attempts: u32,
        detail: String,
    },

    #[error("Interaction failed: {0}")]
    InteractionError(String),

    #[error("Timed out after {0:?}: {1}")]
    Timeout(std::time::Duration, String),

    #[error("Invalid workflow: {0}")]
    InvalidWorkflow(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    /// Stable machine-readable kind used in step outcomes.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::ElementNotFound { .. } => "element_not_found",
            EngineError::AmbiguousMatch { .. } => "ambiguous_match",
            EngineError::StepVerificationFailed { .. } => "step_verification_failed",
            EngineError::InteractionError(_) => "interaction_error",
            EngineError::Timeout(_, _) => "timeout",
            EngineError::InvalidWorkflow(_) => "invalid_workflow",
            EngineError::Cancelled => "cancelled",
            EngineError::Internal(_) => "internal",
        }
    }
}
