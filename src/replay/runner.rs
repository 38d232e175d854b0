use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::executor::StepExecutor;
use crate::browser::PageDriver;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::models::{resolve_placeholders, RunResult, StepOutcome, Workflow, WorkflowStep};

const DEFAULT_AGENT_STEPS: u32 = 10;

/// Hands a free-form task to an autonomous agent when a workflow step asks
/// for one. The engine only knows the task string and a step budget.
#[async_trait]
pub trait AgentCollaborator: Send + Sync {
    async fn run_task(&self, task: &str, max_steps: u32) -> Result<Value>;
}

/// Pulls structured data out of the current page for `extract` steps.
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    async fn extract(&self, driver: &dyn PageDriver, goal: &str) -> Result<Value>;
}

/// Drives a workflow front to back: validates inputs, substitutes
/// placeholders, executes steps sequentially, and aggregates outcomes.
pub struct WorkflowRunner {
    driver: Arc<dyn PageDriver>,
    config: EngineConfig,
    agent: Option<Arc<dyn AgentCollaborator>>,
    extractor: Option<Arc<dyn ContentExtractor>>,
    cancel: CancellationToken,
}

impl WorkflowRunner {
    pub fn new(driver: Arc<dyn PageDriver>, config: EngineConfig) -> Self {
        Self {
            driver,
            config,
            agent: None,
            extractor: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_agent(mut self, agent: Arc<dyn AgentCollaborator>) -> Self {
        self.agent = Some(agent);
        self
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn ContentExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Token for cancelling the run from outside. Checked between steps
    /// and inside every retry loop.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn run(
        &self,
        workflow: &Workflow,
        inputs: HashMap<String, Value>,
    ) -> Result<RunResult> {
        workflow.validate_inputs(&inputs)?;

        let run_id = uuid::Uuid::new_v4().to_string();
        let started_at = Utc::now();
        tracing::info!(run_id = %run_id, workflow = %workflow.name, steps = workflow.steps.len(), "run started");

        let mut context = inputs;
        let mut outputs = serde_json::Map::new();
        let mut outcomes: Vec<StepOutcome> = Vec::new();
        let mut aborted = false;

        for (index, step) in workflow.steps.iter().enumerate() {
            if self.cancel.is_cancelled() {
                tracing::info!(run_id = %run_id, step = index, "run cancelled");
                outcomes.push(StepOutcome::failed(
                    index,
                    step.kind_name(),
                    0,
                    &EngineError::Cancelled,
                ));
                aborted = true;
                break;
            }

            let step = self.substitute(step, &context)?;
            tracing::info!(run_id = %run_id, step = index, kind = step.kind_name(), "executing step");

            match self.execute_step(index, &step).await {
                Ok((attempts, data)) => {
                    let mut outcome = StepOutcome::ok(index, step.kind_name(), attempts);
                    if let Some(data) = data {
                        if let Some(key) = &step.meta().output {
                            context.insert(key.clone(), data.clone());
                            outputs.insert(key.clone(), data.clone());
                        }
                        outcome.extracted_data = Some(data);
                    }
                    outcomes.push(outcome);
                }
                Err(err) => {
                    tracing::error!(run_id = %run_id, step = index, error = %err, "step failed");
                    let attempts = self.attempts_consumed(&step, &err);
                    outcomes.push(StepOutcome::failed(index, step.kind_name(), attempts, &err));
                    if matches!(err, EngineError::Cancelled) || !self.config.continue_on_error {
                        aborted = true;
                        break;
                    }
                }
            }

            if index + 1 < workflow.steps.len() {
                tokio::time::sleep(self.config.step_delay).await;
            }
        }

        let success = !aborted && outcomes.iter().all(|o| o.success);
        let finished_at = Utc::now();
        tracing::info!(run_id = %run_id, success, "run finished");

        Ok(RunResult {
            run_id,
            workflow_name: workflow.name.clone(),
            success,
            started_at,
            finished_at,
            outcomes,
            context: Value::Object(outputs),
        })
    }

    /// How many attempts a failed step burned. Element steps exhaust the
    /// configured budget unless cancellation cut them short; everything
    /// else fails on its single attempt.
    fn attempts_consumed(&self, step: &WorkflowStep, err: &EngineError) -> u32 {
        match err {
            EngineError::StepVerificationFailed { attempts, .. } => *attempts,
            EngineError::Cancelled => 0,
            _ if step.target().is_some() => self.config.max_attempts,
            _ => 1,
        }
    }

    /// Apply `{name}` placeholder substitution to one step.
    fn substitute(&self, step: &WorkflowStep, context: &HashMap<String, Value>) -> Result<WorkflowStep> {
        let value = serde_json::to_value(step)
            .map_err(|e| EngineError::Internal(anyhow::anyhow!("step serialization: {}", e)))?;
        let resolved = resolve_placeholders(&value, context);
        serde_json::from_value(resolved)
            .map_err(|e| EngineError::InvalidWorkflow(format!("placeholder substitution broke step: {}", e)))
    }

    async fn execute_step(&self, index: usize, step: &WorkflowStep) -> Result<(u32, Option<Value>)> {
        match step {
            WorkflowStep::Navigation { url, .. } => {
                self.driver.navigate(url).await?;
                Ok((1, None))
            }
            WorkflowStep::Scroll { scroll_x, scroll_y, .. } => {
                self.driver.scroll_by(*scroll_x, *scroll_y).await?;
                Ok((1, None))
            }
            WorkflowStep::Extract { goal, .. } => {
                let extractor = self.extractor.as_ref().ok_or_else(|| {
                    EngineError::InvalidWorkflow(
                        "workflow has an extract step but no content extractor is configured"
                            .to_string(),
                    )
                })?;
                let data = extractor.extract(self.driver.as_ref(), goal).await?;
                Ok((1, Some(data)))
            }
            WorkflowStep::Agent { task, max_steps, .. } => {
                let agent = self.agent.as_ref().ok_or_else(|| {
                    EngineError::InvalidWorkflow(
                        "workflow has an agent step but no agent collaborator is configured"
                            .to_string(),
                    )
                })?;
                let budget = max_steps.unwrap_or(DEFAULT_AGENT_STEPS);
                let data = agent.run_task(task, budget).await?;
                Ok((1, Some(data)))
            }
            element_step => {
                let executor =
                    StepExecutor::new(self.driver.as_ref(), &self.config, self.cancel.clone());
                let attempts = executor.run_step(index, element_step).await?;
                Ok((attempts, None))
            }
        }
    }
}
