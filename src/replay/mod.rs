pub mod executor;
pub mod runner;
pub mod verify;

pub use executor::StepExecutor;
pub use runner::{AgentCollaborator, ContentExtractor, WorkflowRunner};
pub use verify::Verifier;
