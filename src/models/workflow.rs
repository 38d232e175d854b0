use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

use crate::error::{EngineError, Result};

/// Fields shared by every step regardless of type.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StepMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Context key to store this step's output under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

/// Text-based element target with optional disambiguation hints.
/// Legacy selectors are carried for migration but never trusted as primary.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Target {
    pub target_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interaction_type: Option<String>,
    #[serde(default, alias = "cssSelector", skip_serializing_if = "Option::is_none")]
    pub css_selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xpath: Option<String>,
    #[serde(default, alias = "elementTag", skip_serializing_if = "Option::is_none")]
    pub element_tag: Option<String>,
}

impl Target {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            target_text: text.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowStep {
    Navigation {
        #[serde(flatten)]
        meta: StepMeta,
        url: String,
    },
    Click {
        #[serde(flatten)]
        meta: StepMeta,
        #[serde(flatten)]
        target: Target,
    },
    Input {
        #[serde(flatten)]
        meta: StepMeta,
        #[serde(flatten)]
        target: Target,
        value: String,
    },
    #[serde(alias = "select_change")]
    Select {
        #[serde(flatten)]
        meta: StepMeta,
        #[serde(flatten)]
        target: Target,
        #[serde(alias = "selectedText")]
        selected_text: String,
    },
    Radio {
        #[serde(flatten)]
        meta: StepMeta,
        #[serde(flatten)]
        target: Target,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        field_name: Option<String>,
        selected_option: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        options: Vec<String>,
    },
    Checkbox {
        #[serde(flatten)]
        meta: StepMeta,
        #[serde(flatten)]
        target: Target,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        field_name: Option<String>,
        checked: bool,
    },
    KeyPress {
        #[serde(flatten)]
        meta: StepMeta,
        #[serde(flatten)]
        target: Target,
        key: String,
    },
    Scroll {
        #[serde(flatten)]
        meta: StepMeta,
        #[serde(alias = "scrollX")]
        scroll_x: i64,
        #[serde(alias = "scrollY")]
        scroll_y: i64,
    },
    #[serde(alias = "extract_page_content")]
    Extract {
        #[serde(flatten)]
        meta: StepMeta,
        #[serde(alias = "extractionGoal")]
        goal: String,
    },
    Agent {
        #[serde(flatten)]
        meta: StepMeta,
        task: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_steps: Option<u32>,
    },
}

impl WorkflowStep {
    pub fn kind_name(&self) -> &'static str {
        match self {
            WorkflowStep::Navigation { .. } => "navigation",
            WorkflowStep::Click { .. } => "click",
            WorkflowStep::Input { .. } => "input",
            WorkflowStep::Select { .. } => "select",
            WorkflowStep::Radio { .. } => "radio",
            WorkflowStep::Checkbox { .. } => "checkbox",
            WorkflowStep::KeyPress { .. } => "key_press",
            WorkflowStep::Scroll { .. } => "scroll",
            WorkflowStep::Extract { .. } => "extract",
            WorkflowStep::Agent { .. } => "agent",
        }
    }

    pub fn meta(&self) -> &StepMeta {
        match self {
            WorkflowStep::Navigation { meta, .. }
            | WorkflowStep::Click { meta, .. }
            | WorkflowStep::Input { meta, .. }
            | WorkflowStep::Select { meta, .. }
            | WorkflowStep::Radio { meta, .. }
            | WorkflowStep::Checkbox { meta, .. }
            | WorkflowStep::KeyPress { meta, .. }
            | WorkflowStep::Scroll { meta, .. }
            | WorkflowStep::Extract { meta, .. }
            | WorkflowStep::Agent { meta, .. } => meta,
        }
    }

    /// The element target, for step types that interact with one.
    pub fn target(&self) -> Option<&Target> {
        match self {
            WorkflowStep::Click { target, .. }
            | WorkflowStep::Input { target, .. }
            | WorkflowStep::Select { target, .. }
            | WorkflowStep::Radio { target, .. }
            | WorkflowStep::Checkbox { target, .. }
            | WorkflowStep::KeyPress { target, .. } => Some(target),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    String,
    Number,
    Bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: InputType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_analysis: Option<String>,
    pub name: String,
    pub description: String,
    pub version: String,
    pub steps: Vec<WorkflowStep>,
    #[serde(default)]
    pub input_schema: Vec<InputField>,
}

impl Workflow {
    pub fn load_from_json(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| EngineError::InvalidWorkflow(format!("cannot read file: {}", e)))?;
        let workflow: Workflow = serde_json::from_str(&raw)
            .map_err(|e| EngineError::InvalidWorkflow(format!("cannot parse workflow: {}", e)))?;
        if workflow.steps.is_empty() {
            return Err(EngineError::InvalidWorkflow(
                "workflow has no steps".to_string(),
            ));
        }
        Ok(workflow)
    }

    /// Check supplied run inputs against the declared input schema.
    pub fn validate_inputs(&self, inputs: &HashMap<String, Value>) -> Result<()> {
        for field in &self.input_schema {
            match inputs.get(&field.name) {
                None => {
                    if field.required.unwrap_or(false) {
                        return Err(EngineError::InvalidWorkflow(format!(
                            "missing required input '{}'",
                            field.name
                        )));
                    }
                }
                Some(value) => {
                    let ok = match field.field_type {
                        InputType::String => value.is_string(),
                        InputType::Number => value.is_number(),
                        InputType::Bool => value.is_boolean(),
                    };
                    if !ok {
                        return Err(EngineError::InvalidWorkflow(format!(
                            "input '{}' has wrong type, expected {:?}",
                            field.name, field.field_type
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Replace `{name}` placeholders in every string of `value` with the
/// matching entry from `context`. A string that is exactly one placeholder
/// takes the context value as-is (numbers stay numbers); unknown
/// placeholders are left untouched.
pub fn resolve_placeholders(value: &Value, context: &HashMap<String, Value>) -> Value {
    match value {
        Value::String(s) => resolve_string(s, context),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|v| resolve_placeholders(v, context))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_placeholders(v, context)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn resolve_string(s: &str, context: &HashMap<String, Value>) -> Value {
    // Whole-string placeholder keeps the context value's JSON type.
    if s.len() > 2 && s.starts_with('{') && s.ends_with('}') && !s[1..s.len() - 1].contains('{') {
        let key = &s[1..s.len() - 1];
        if let Some(v) = context.get(key) {
            return v.clone();
        }
    }

    let mut out = s.to_string();
    for (key, v) in context {
        let needle = format!("{{{}}}", key);
        if out.contains(&needle) {
            let replacement = match v {
                Value::String(inner) => inner.clone(),
                other => other.to_string(),
            };
            out = out.replace(&needle, &replacement);
        }
    }
    Value::String(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn step_round_trips_with_flattened_target() {
        let json_step = json!({
            "type": "input",
            "target_text": "Email Address",
            "container_hint": "Contact",
            "value": "{email}"
        });
        let step: WorkflowStep = serde_json::from_value(json_step).unwrap();
        match &step {
            WorkflowStep::Input { target, value, .. } => {
                assert_eq!(target.target_text, "Email Address");
                assert_eq!(target.container_hint.as_deref(), Some("Contact"));
                assert_eq!(value, "{email}");
            }
            other => panic!("unexpected step: {:?}", other),
        }
        let back = serde_json::to_value(&step).unwrap();
        assert_eq!(back["type"], "input");
        assert_eq!(back["target_text"], "Email Address");
    }

    #[test]
    fn legacy_step_type_aliases_accepted() {
        let step: WorkflowStep = serde_json::from_value(json!({
            "type": "select_change",
            "target_text": "Country",
            "selectedText": "Germany"
        }))
        .unwrap();
        assert_eq!(step.kind_name(), "select");

        let step: WorkflowStep = serde_json::from_value(json!({
            "type": "extract_page_content",
            "goal": "invoice totals"
        }))
        .unwrap();
        assert_eq!(step.kind_name(), "extract");
    }

    #[test]
    fn placeholder_resolution_preserves_types_and_unknowns() {
        let mut ctx = HashMap::new();
        ctx.insert("email".to_string(), json!("user@example.com"));
        ctx.insert("count".to_string(), json!(7));

        let value = json!({
            "value": "{email}",
            "note": "send {count} copies to {email}",
            "missing": "{nope}"
        });
        let resolved = resolve_placeholders(&value, &ctx);
        assert_eq!(resolved["value"], json!("user@example.com"));
        assert_eq!(resolved["note"], json!("send 7 copies to user@example.com"));
        assert_eq!(resolved["missing"], json!("{nope}"));

        let whole = resolve_placeholders(&json!("{count}"), &ctx);
        assert_eq!(whole, json!(7));
    }

    #[test]
    fn input_validation_checks_required_and_types() {
        let workflow = Workflow {
            workflow_analysis: None,
            name: "t".to_string(),
            description: String::new(),
            version: "1".to_string(),
            steps: vec![WorkflowStep::Scroll {
                meta: StepMeta::default(),
                scroll_x: 0,
                scroll_y: 100,
            }],
            input_schema: vec![InputField {
                name: "email".to_string(),
                field_type: InputType::String,
                format: None,
                required: Some(true),
            }],
        };

        assert!(workflow.validate_inputs(&HashMap::new()).is_err());

        let mut wrong = HashMap::new();
        wrong.insert("email".to_string(), json!(42));
        assert!(workflow.validate_inputs(&wrong).is_err());

        let mut ok = HashMap::new();
        ok.insert("email".to_string(), json!("a@b.c"));
        assert!(workflow.validate_inputs(&ok).is_ok());
    }
}
