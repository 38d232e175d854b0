use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use retrace::browser::PageDriver;
use retrace::converter;
use retrace::error::EngineError;
use retrace::models::{RawRecording, StepMeta, Target, WorkflowStep};
use retrace::replay::{ContentExtractor, StepExecutor, WorkflowRunner};
use retrace::semantic::descriptor::build_selectors;
use retrace::semantic::{ElementKind, RawElement};
use retrace::{EngineConfig, Workflow};

/// In-memory page: serves a fixed element snapshot and records every
/// interaction keyed by the selector it was sent to.
#[derive(Default)]
struct FakeDriver {
    state: Mutex<FakeState>,
}

#[derive(Default)]
struct FakeState {
    elements: Vec<RawElement>,
    url: String,
    clicks: Vec<String>,
    values: HashMap<String, String>,
    checked: HashMap<String, bool>,
    selected: HashMap<String, String>,
    scrolls: Vec<(i64, i64)>,
    fill_calls: u32,
    /// When set, `fill` silently drops the value so verification fails.
    swallow_fills: bool,
    /// Tokens cancelled from inside an interaction, to exercise the
    /// cooperative cancellation checkpoints.
    cancel_on_navigate: Option<CancellationToken>,
    cancel_on_fill: Option<CancellationToken>,
}

impl FakeDriver {
    fn with_elements(elements: Vec<RawElement>) -> Self {
        Self {
            state: Mutex::new(FakeState {
                elements,
                ..Default::default()
            }),
        }
    }

    fn matches(state: &FakeState, selector: &str) -> bool {
        state.elements.iter().any(|el| {
            let kind = ElementKind::classify(el);
            build_selectors(el, kind)
                .chain()
                .iter()
                .any(|candidate| *candidate == selector)
        })
    }

    fn clicks(&self) -> Vec<String> {
        self.state.lock().unwrap().clicks.clone()
    }

    fn value_of(&self, selector: &str) -> Option<String> {
        self.state.lock().unwrap().values.get(selector).cloned()
    }

    fn checked_map(&self) -> HashMap<String, bool> {
        self.state.lock().unwrap().checked.clone()
    }

    fn scrolls(&self) -> Vec<(i64, i64)> {
        self.state.lock().unwrap().scrolls.clone()
    }
}

#[async_trait]
impl PageDriver for FakeDriver {
    async fn navigate(&self, url: &str) -> retrace::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.url = url.to_string();
        if let Some(token) = &state.cancel_on_navigate {
            token.cancel();
        }
        Ok(())
    }

    async fn current_url(&self) -> retrace::Result<String> {
        Ok(self.state.lock().unwrap().url.clone())
    }

    async fn snapshot_elements(&self) -> retrace::Result<Vec<RawElement>> {
        Ok(self.state.lock().unwrap().elements.clone())
    }

    async fn selector_exists(&self, selector: &str) -> retrace::Result<bool> {
        let state = self.state.lock().unwrap();
        Ok(Self::matches(&state, selector))
    }

    async fn click(&self, selector: &str, _force: bool) -> retrace::Result<()> {
        self.state.lock().unwrap().clicks.push(selector.to_string());
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str) -> retrace::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.fill_calls += 1;
        if let Some(token) = &state.cancel_on_fill {
            token.cancel();
        }
        if !state.swallow_fills {
            state.values.insert(selector.to_string(), value.to_string());
        }
        Ok(())
    }

    async fn select_option(&self, selector: &str, option_label: &str) -> retrace::Result<()> {
        self.state
            .lock()
            .unwrap()
            .selected
            .insert(selector.to_string(), option_label.to_string());
        Ok(())
    }

    async fn set_checked(&self, selector: &str, checked: bool) -> retrace::Result<()> {
        self.state
            .lock()
            .unwrap()
            .checked
            .insert(selector.to_string(), checked);
        Ok(())
    }

    async fn press_key(&self, _selector: &str, _key: &str) -> retrace::Result<()> {
        Ok(())
    }

    async fn scroll_by(&self, x: i64, y: i64) -> retrace::Result<()> {
        self.state.lock().unwrap().scrolls.push((x, y));
        Ok(())
    }

    async fn field_value(&self, selector: &str) -> retrace::Result<Option<String>> {
        Ok(self.state.lock().unwrap().values.get(selector).cloned())
    }

    async fn is_checked(&self, selector: &str) -> retrace::Result<Option<bool>> {
        let state = self.state.lock().unwrap();
        if !Self::matches(&state, selector) {
            return Ok(None);
        }
        Ok(Some(state.checked.get(selector).copied().unwrap_or(false)))
    }

    async fn selected_label(&self, selector: &str) -> retrace::Result<Option<String>> {
        Ok(self.state.lock().unwrap().selected.get(selector).cloned())
    }
}

fn fast_config() -> EngineConfig {
    EngineConfig {
        retry_backoff: Duration::from_millis(1),
        step_delay: Duration::from_millis(1),
        ..EngineConfig::default()
    }
}

fn labelled_input(id: &str, label: &str) -> RawElement {
    RawElement {
        tag: "input".to_string(),
        input_type: Some("text".to_string()),
        id: Some(id.to_string()),
        label_for_text: Some(label.to_string()),
        width: 200,
        height: 30,
        ..Default::default()
    }
}

fn submit_button(testid: &str, container: &str) -> RawElement {
    let mut attributes = HashMap::new();
    attributes.insert("data-testid".to_string(), testid.to_string());
    RawElement {
        tag: "button".to_string(),
        text_content: Some("Submit".to_string()),
        container_text: Some(container.to_string()),
        attributes,
        width: 80,
        height: 30,
        ..Default::default()
    }
}

fn gender_radio(value: &str, label: &str) -> RawElement {
    let mut attributes = HashMap::new();
    attributes.insert("name".to_string(), "gender".to_string());
    attributes.insert("type".to_string(), "radio".to_string());
    RawElement {
        tag: "input".to_string(),
        input_type: Some("radio".to_string()),
        name: Some("gender".to_string()),
        value: Some(value.to_string()),
        label_for_text: Some(label.to_string()),
        legend_text: Some("Gender".to_string()),
        width: 16,
        height: 16,
        ..Default::default()
    }
}

fn input_step(target_text: &str, value: &str) -> WorkflowStep {
    WorkflowStep::Input {
        meta: StepMeta::default(),
        target: Target::from_text(target_text),
        value: value.to_string(),
    }
}

fn click_step(target: Target) -> WorkflowStep {
    WorkflowStep::Click {
        meta: StepMeta::default(),
        target,
    }
}

fn workflow(steps: Vec<WorkflowStep>) -> Workflow {
    Workflow {
        workflow_analysis: None,
        name: "test".to_string(),
        description: String::new(),
        version: "1.0".to_string(),
        steps,
        input_schema: Vec::new(),
    }
}

#[tokio::test]
async fn fills_labelled_field_through_placeholder_input() {
    let driver = Arc::new(FakeDriver::with_elements(vec![labelled_input(
        "email",
        "Email Address",
    )]));
    let wf = workflow(vec![
        WorkflowStep::Navigation {
            meta: StepMeta::default(),
            url: "https://app.example/signup".to_string(),
        },
        input_step("Email Address", "{email}"),
    ]);

    let runner = WorkflowRunner::new(driver.clone(), fast_config());
    let mut inputs = HashMap::new();
    inputs.insert("email".to_string(), json!("user@example.com"));
    let result = runner.run(&wf, inputs).await.unwrap();

    assert!(result.success);
    assert_eq!(result.outcomes.len(), 2);
    assert_eq!(driver.value_of("#email").as_deref(), Some("user@example.com"));
}

#[tokio::test]
async fn container_hint_picks_the_button_in_the_right_section() {
    let driver = FakeDriver::with_elements(vec![
        submit_button("billing-submit", "Billing Address"),
        submit_button("shipping-submit", "Shipping Address"),
    ]);

    let mut target = Target::from_text("Submit");
    target.container_hint = Some("Shipping Address".to_string());
    let step = click_step(target);

    let config = fast_config();
    let executor = StepExecutor::new(&driver, &config, CancellationToken::new());
    let attempts = executor.run_step(0, &step).await.unwrap();

    assert_eq!(attempts, 1);
    let clicks = driver.clicks();
    assert_eq!(clicks.len(), 1);
    assert!(clicks[0].contains("shipping-submit"), "clicked {}", clicks[0]);
}

#[tokio::test]
async fn radio_step_checks_only_the_requested_option() {
    let driver = FakeDriver::with_elements(vec![
        gender_radio("male", "Male"),
        gender_radio("female", "Female"),
    ]);

    let step = WorkflowStep::Radio {
        meta: StepMeta::default(),
        target: Target::from_text("Gender: Male"),
        field_name: Some("Gender".to_string()),
        selected_option: "Male".to_string(),
        options: vec!["Male".to_string(), "Female".to_string()],
    };

    let config = fast_config();
    let executor = StepExecutor::new(&driver, &config, CancellationToken::new());
    executor.run_step(0, &step).await.unwrap();

    let checked = driver.checked_map();
    assert_eq!(checked.len(), 1, "exactly one radio touched: {:?}", checked);
    let (selector, state) = checked.iter().next().unwrap();
    assert!(selector.contains("[value=\"male\"]"), "touched {}", selector);
    assert!(*state);
}

#[tokio::test]
async fn position_hint_clicks_the_second_row_action() {
    let edit = |id: &str, index| RawElement {
        tag: "a".to_string(),
        id: Some(id.to_string()),
        text_content: Some("Edit".to_string()),
        sibling_position: Some(retrace::semantic::element::SiblingSlot { index, total: 3 }),
        width: 40,
        height: 20,
        ..Default::default()
    };
    let driver = FakeDriver::with_elements(vec![
        edit("edit-1", 1),
        edit("edit-2", 2),
        edit("edit-3", 3),
    ]);

    let mut target = Target::from_text("Edit");
    target.position_hint = Some("item 2 of 3".to_string());
    let step = click_step(target);

    let config = fast_config();
    let executor = StepExecutor::new(&driver, &config, CancellationToken::new());
    executor.run_step(0, &step).await.unwrap();

    assert_eq!(driver.clicks(), vec!["#edit-2".to_string()]);
}

#[tokio::test]
async fn failed_verification_exhausts_attempts_then_fails_terminally() {
    let driver = FakeDriver::with_elements(vec![labelled_input("email", "Email Address")]);
    driver.state.lock().unwrap().swallow_fills = true;

    let step = input_step("Email Address", "user@example.com");
    let config = fast_config();
    let executor = StepExecutor::new(&driver, &config, CancellationToken::new());
    let err = executor.run_step(4, &step).await.unwrap_err();

    match err {
        EngineError::StepVerificationFailed { step, attempts, .. } => {
            assert_eq!(step, 4);
            assert_eq!(attempts, config.max_attempts);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn continue_on_error_runs_the_remaining_steps() {
    let driver = Arc::new(FakeDriver::with_elements(vec![labelled_input(
        "email",
        "Email Address",
    )]));
    let wf = workflow(vec![
        click_step(Target::from_text("Nonexistent Thing")),
        WorkflowStep::Scroll {
            meta: StepMeta::default(),
            scroll_x: 0,
            scroll_y: 400,
        },
    ]);

    let mut config = fast_config();
    config.max_attempts = 1;
    config.continue_on_error = true;
    let runner = WorkflowRunner::new(driver.clone(), config);
    let result = runner.run(&wf, HashMap::new()).await.unwrap();

    assert!(!result.success);
    assert_eq!(result.outcomes.len(), 2);
    assert!(!result.outcomes[0].success);
    assert_eq!(result.outcomes[0].attempts, 1);
    let error = result.outcomes[0].error.as_ref().unwrap();
    assert_eq!(error.kind, "element_not_found");
    assert_eq!(error.candidates, vec!["Email Address".to_string()]);
    assert!(result.outcomes[1].success);
    assert_eq!(driver.scrolls(), vec![(0, 400)]);
}

#[tokio::test]
async fn unresolved_target_surfaces_its_candidate_keys() {
    let driver = FakeDriver::with_elements(vec![labelled_input("email", "Email Address")]);
    let step = click_step(Target::from_text("Shipping Method"));

    let mut config = fast_config();
    config.max_attempts = 2;
    let executor = StepExecutor::new(&driver, &config, CancellationToken::new());
    let err = executor.run_step(0, &step).await.unwrap_err();

    match err {
        EngineError::ElementNotFound { target, candidates } => {
            assert_eq!(target, "Shipping Method");
            assert_eq!(candidates, vec!["Email Address".to_string()]);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn cancellation_between_steps_stops_the_run() {
    let driver = Arc::new(FakeDriver::with_elements(vec![submit_button(
        "submit",
        "Checkout",
    )]));
    let wf = workflow(vec![
        WorkflowStep::Navigation {
            meta: StepMeta::default(),
            url: "https://app.example".to_string(),
        },
        click_step(Target::from_text("Submit")),
    ]);

    let runner = WorkflowRunner::new(driver.clone(), fast_config());
    driver.state.lock().unwrap().cancel_on_navigate = Some(runner.cancel_token());
    let result = runner.run(&wf, HashMap::new()).await.unwrap();

    assert!(!result.success);
    assert_eq!(result.outcomes.len(), 2);
    assert!(result.outcomes[0].success);
    let error = result.outcomes[1].error.as_ref().unwrap();
    assert_eq!(error.kind, "cancelled");
    assert_eq!(result.outcomes[1].attempts, 0);
    assert!(driver.clicks().is_empty());
}

#[tokio::test]
async fn cancellation_mid_retry_stops_further_attempts() {
    let driver = FakeDriver::with_elements(vec![labelled_input("email", "Email Address")]);
    let token = CancellationToken::new();
    {
        let mut state = driver.state.lock().unwrap();
        state.swallow_fills = true;
        state.cancel_on_fill = Some(token.clone());
    }

    let step = input_step("Email Address", "user@example.com");
    let config = fast_config();
    let executor = StepExecutor::new(&driver, &config, token);
    let err = executor.run_step(0, &step).await.unwrap_err();

    assert!(matches!(err, EngineError::Cancelled));
    assert_eq!(driver.state.lock().unwrap().fill_calls, 1);
}

struct FixedExtractor(Value);

#[async_trait]
impl ContentExtractor for FixedExtractor {
    async fn extract(&self, _driver: &dyn PageDriver, _goal: &str) -> retrace::Result<Value> {
        Ok(self.0.clone())
    }
}

#[tokio::test]
async fn extract_output_lands_in_run_context() {
    let driver = Arc::new(FakeDriver::with_elements(vec![]));
    let wf = workflow(vec![WorkflowStep::Extract {
        meta: StepMeta {
            description: None,
            output: Some("totals".to_string()),
        },
        goal: "invoice totals".to_string(),
    }]);

    let runner = WorkflowRunner::new(driver, fast_config())
        .with_extractor(Arc::new(FixedExtractor(json!({ "total": 42 }))));
    let result = runner.run(&wf, HashMap::new()).await.unwrap();

    assert!(result.success);
    assert_eq!(result.context["totals"]["total"], json!(42));
    assert_eq!(
        result.outcomes[0].extracted_data.as_ref().unwrap()["total"],
        json!(42)
    );
}

#[tokio::test]
async fn recording_converts_and_replays_end_to_end() {
    let raw = json!({
        "name": "Signup",
        "description": "Fill the signup form",
        "steps": [
            { "type": "navigation", "url": "https://app.example/signup", "timestamp": 1 },
            {
                "type": "input",
                "cssSelector": "input#email.form-control",
                "semanticInfo": { "labelText": "Email Address" },
                "value": "user@example.com"
            },
            {
                "type": "click",
                "targetText": "Submit",
                "cssSelector": "button.submit-btn"
            }
        ]
    });
    let recording: RawRecording = serde_json::from_value(raw).unwrap();
    let converted = converter::convert(&recording);
    assert_eq!(converted.name, "Signup (Semantic)");

    // Round-trip through JSON the way a saved workflow file would.
    let serialized = serde_json::to_string(&converted).unwrap();
    let wf: Workflow = serde_json::from_str(&serialized).unwrap();

    let mut button = HashMap::new();
    button.insert("data-testid".to_string(), "submit".to_string());
    let driver = Arc::new(FakeDriver::with_elements(vec![
        labelled_input("email", "Email Address"),
        RawElement {
            tag: "button".to_string(),
            text_content: Some("Submit".to_string()),
            attributes: button,
            width: 80,
            height: 30,
            ..Default::default()
        },
    ]));

    let runner = WorkflowRunner::new(driver.clone(), fast_config());
    let result = runner.run(&wf, HashMap::new()).await.unwrap();

    assert!(result.success, "outcomes: {:?}", result.outcomes);
    assert_eq!(driver.value_of("#email").as_deref(), Some("user@example.com"));
    assert_eq!(driver.clicks().len(), 1);
}
