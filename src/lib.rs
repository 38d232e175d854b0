pub mod browser;
pub mod config;
pub mod converter;
pub mod error;
pub mod models;
pub mod replay;
pub mod semantic;

pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use models::{RawRecording, RunResult, Workflow, WorkflowStep};
pub use replay::WorkflowRunner;
