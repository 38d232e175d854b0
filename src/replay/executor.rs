use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use super::verify::{AlwaysPass, CheckedIs, SelectedIs, ValueIs, Verifier};
use crate::browser::PageDriver;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::models::{Target, WorkflowStep};
use crate::semantic::matcher::{resolve, Resolution};
use crate::semantic::{Descriptor, MapperPass, SemanticMapping};

/// Executes single element-targeted steps: resolve the target against a
/// fresh mapping, interact, verify, and retry with backoff on any failure.
pub struct StepExecutor<'a> {
    driver: &'a dyn PageDriver,
    config: &'a EngineConfig,
    cancel: CancellationToken,
}

/// Where an interaction should be sent after resolution.
struct ResolvedElement {
    selector: String,
    descriptor: Option<Descriptor>,
}

impl<'a> StepExecutor<'a> {
    pub fn new(driver: &'a dyn PageDriver, config: &'a EngineConfig, cancel: CancellationToken) -> Self {
        Self {
            driver,
            config,
            cancel,
        }
    }

    /// Run one step to completion. Returns the number of attempts used.
    pub async fn run_step(&self, index: usize, step: &WorkflowStep) -> Result<u32> {
        self.run_step_with(index, step, None).await
    }

    /// Like `run_step` but with a caller-supplied verification predicate
    /// replacing the per-step default.
    pub async fn run_step_with(
        &self,
        index: usize,
        step: &WorkflowStep,
        verifier: Option<&dyn Verifier>,
    ) -> Result<u32> {
        let target = step.target().ok_or_else(|| {
            EngineError::InvalidWorkflow(format!(
                "step {} ({}) has no element target",
                index,
                step.kind_name()
            ))
        })?;

        let mut last_error: Option<EngineError> = None;

        for attempt in 1..=self.config.max_attempts {
            if self.cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }

            match self.attempt(step, target, verifier).await {
                Ok(()) => {
                    tracing::info!(step = index, attempt, kind = step.kind_name(), "step ok");
                    return Ok(attempt);
                }
                Err(EngineError::Cancelled) => return Err(EngineError::Cancelled),
                Err(err) => {
                    tracing::warn!(
                        step = index,
                        attempt,
                        error = %err,
                        "step attempt failed"
                    );
                    last_error = Some(err);
                    if attempt < self.config.max_attempts {
                        tokio::time::sleep(self.config.retry_backoff).await;
                    }
                }
            }
        }

        // A target that never resolved is reported as such, candidates and
        // all. The verification wording is reserved for actions that ran
        // but whose outcome stayed unconfirmed.
        let last = last_error
            .unwrap_or_else(|| EngineError::InteractionError("unknown failure".to_string()));
        match last {
            err @ (EngineError::ElementNotFound { .. } | EngineError::AmbiguousMatch { .. }) => {
                Err(err)
            }
            err => Err(EngineError::StepVerificationFailed {
                step: index,
                attempts: self.config.max_attempts,
                detail: err.to_string(),
            }),
        }
    }

    /// One full attempt: fresh snapshot + mapping, resolve, interact,
    /// verify. Any error makes the whole attempt count as failed so the
    /// retry loop rebuilds everything.
    async fn attempt(
        &self,
        step: &WorkflowStep,
        target: &Target,
        verifier: Option<&dyn Verifier>,
    ) -> Result<()> {
        let resolved = timeout(self.config.resolve_timeout, self.resolve_element(step, target))
            .await
            .map_err(|_| {
                EngineError::Timeout(self.config.resolve_timeout, "target resolution".to_string())
            })??;

        self.interact(step, &resolved).await?;

        let default = self.default_verifier(step);
        let verifier = verifier.unwrap_or(default.as_ref());
        let verified = timeout(
            self.config.verify_timeout,
            verifier.verify(self.driver, &resolved.selector),
        )
        .await
        .map_err(|_| EngineError::Timeout(self.config.verify_timeout, "verification".to_string()))??;

        if !verified {
            return Err(EngineError::InteractionError(format!(
                "verification reported no effect on '{}'",
                resolved.selector
            )));
        }
        Ok(())
    }

    async fn resolve_element(&self, step: &WorkflowStep, target: &Target) -> Result<ResolvedElement> {
        let elements = self.driver.snapshot_elements().await?;
        let mapping = MapperPass::new().build(&elements);

        let resolution = resolve(&mapping, target, self.config.min_confidence)?;
        match resolution {
            Resolution::Mapped { key, descriptor } => {
                let descriptor = self.retarget_toggle(step, &mapping, descriptor, &key)?;
                let selector = self.first_live_selector(&descriptor).await?;
                Ok(ResolvedElement {
                    selector,
                    descriptor: Some(descriptor),
                })
            }
            Resolution::Direct { selectors } => {
                for selector in &selectors {
                    if self.driver.selector_exists(selector).await? {
                        return Ok(ResolvedElement {
                            selector: selector.clone(),
                            descriptor: None,
                        });
                    }
                }
                Err(EngineError::ElementNotFound {
                    target: target.target_text.clone(),
                    candidates: mapping.keys(),
                })
            }
        }
    }

    /// A radio step may fuzzily resolve to a sibling of the intended
    /// option. When the mapping has an entry for the same group with the
    /// requested option label, prefer it.
    fn retarget_toggle(
        &self,
        step: &WorkflowStep,
        mapping: &SemanticMapping,
        descriptor: Descriptor,
        key: &str,
    ) -> Result<Descriptor> {
        let wanted_option = match step {
            WorkflowStep::Radio { selected_option, .. } => selected_option.as_str(),
            _ => return Ok(descriptor),
        };

        if descriptor.option_value.as_deref() == Some(wanted_option) {
            return Ok(descriptor);
        }

        let replacement = mapping.iter().find(|(_, candidate)| {
            candidate.kind == descriptor.kind
                && candidate.field_name == descriptor.field_name
                && candidate.option_value.as_deref() == Some(wanted_option)
        });

        match replacement {
            Some((other_key, candidate)) => {
                tracing::debug!(from = %key, to = %other_key, "retargeted to requested option");
                Ok(candidate.clone())
            }
            None => Ok(descriptor),
        }
    }

    async fn first_live_selector(&self, descriptor: &Descriptor) -> Result<String> {
        for selector in descriptor.selectors.chain() {
            if self.driver.selector_exists(selector).await? {
                return Ok(selector.to_string());
            }
        }
        // The mapping was built from a snapshot moments ago; a vanished
        // element means the DOM moved under us. Let the retry rebuild.
        Err(EngineError::InteractionError(format!(
            "mapped element disappeared before interaction ('{}')",
            descriptor.selectors.primary
        )))
    }

    async fn interact(&self, step: &WorkflowStep, resolved: &ResolvedElement) -> Result<()> {
        let selector = resolved.selector.as_str();
        match step {
            WorkflowStep::Click { .. } => {
                // Styled buttons frequently sit under overlays; clicking
                // through the DOM API is what the recorder captured anyway.
                let force = resolved
                    .descriptor
                    .as_ref()
                    .map(|d| d.kind.is_button_like())
                    .unwrap_or(true);
                self.driver.click(selector, force).await
            }
            WorkflowStep::Input { value, .. } => {
                self.driver.fill(selector, value).await?;
                // Give reactive frameworks a beat to propagate the value.
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok(())
            }
            WorkflowStep::Select { selected_text, .. } => {
                self.driver.select_option(selector, selected_text).await
            }
            WorkflowStep::Radio { .. } => self.driver.set_checked(selector, true).await,
            WorkflowStep::Checkbox { checked, .. } => self.driver.set_checked(selector, *checked).await,
            WorkflowStep::KeyPress { key, .. } => self.driver.press_key(selector, key).await,
            other => Err(EngineError::InvalidWorkflow(format!(
                "step type '{}' is not an element interaction",
                other.kind_name()
            ))),
        }
    }

    fn default_verifier(&self, step: &WorkflowStep) -> Box<dyn Verifier> {
        match step {
            WorkflowStep::Input { value, .. } => Box::new(ValueIs(value.clone())),
            WorkflowStep::Select { selected_text, .. } => Box::new(SelectedIs(selected_text.clone())),
            WorkflowStep::Radio { .. } => Box::new(CheckedIs(true)),
            WorkflowStep::Checkbox { checked, .. } => Box::new(CheckedIs(*checked)),
            _ => Box::new(AlwaysPass),
        }
    }
}
