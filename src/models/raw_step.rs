use serde::{Deserialize, Serialize};

/// One event as emitted by the browser-side recorder. Field names follow
/// the recorder's camelCase JSON; everything is optional because event
/// payloads differ per event type.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RawStep {
    #[serde(rename = "type")]
    pub step_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, alias = "targetText", skip_serializing_if = "Option::is_none")]
    pub target_text: Option<String>,
    #[serde(default, alias = "elementText", skip_serializing_if = "Option::is_none")]
    pub element_text: Option<String>,
    #[serde(default, alias = "elementTag", skip_serializing_if = "Option::is_none")]
    pub element_tag: Option<String>,
    #[serde(default, alias = "cssSelector", skip_serializing_if = "Option::is_none")]
    pub css_selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xpath: Option<String>,
    #[serde(default, alias = "semanticInfo", skip_serializing_if = "Option::is_none")]
    pub semantic_info: Option<SemanticInfo>,

    // Action payloads
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, alias = "selectedText", skip_serializing_if = "Option::is_none")]
    pub selected_text: Option<String>,
    #[serde(default, alias = "fieldName", skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,
    #[serde(default, alias = "selectedOption", skip_serializing_if = "Option::is_none")]
    pub selected_option: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked: Option<bool>,
    #[serde(default, alias = "scrollX", skip_serializing_if = "Option::is_none")]
    pub scroll_x: Option<i64>,
    #[serde(default, alias = "scrollY", skip_serializing_if = "Option::is_none")]
    pub scroll_y: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

/// Semantic facts the recorder captured about the event's target element.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SemanticInfo {
    #[serde(default, alias = "labelText", skip_serializing_if = "Option::is_none")]
    pub label_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, alias = "ariaLabel", skip_serializing_if = "Option::is_none")]
    pub aria_label: Option<String>,
    #[serde(default, alias = "textContent", skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Nearest container text (fieldset legend, section heading, ...).
    #[serde(default, alias = "containerContext", skip_serializing_if = "Option::is_none")]
    pub container_context: Option<String>,
    #[serde(default, alias = "containerId", skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
    #[serde(default, alias = "siblingPosition", skip_serializing_if = "Option::is_none")]
    pub sibling_position: Option<SiblingPosition>,
    #[serde(default, alias = "interactionHints", skip_serializing_if = "Vec::is_empty")]
    pub interaction_hints: Vec<String>,
    // Radio / checkbox group facts
    #[serde(default, alias = "fieldName", skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,
    #[serde(default, alias = "optionValue", skip_serializing_if = "Option::is_none")]
    pub option_value: Option<String>,
    #[serde(default, alias = "allOptions", skip_serializing_if = "Vec::is_empty")]
    pub all_options: Vec<String>,
}

/// Position among same-tag siblings, 1-based.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SiblingPosition {
    pub index: usize,
    pub total: usize,
}

/// A raw recording file: metadata plus the ordered event list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRecording {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_analysis: Option<String>,
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_version")]
    pub version: String,
    pub steps: Vec<RawStep>,
    #[serde(default)]
    pub input_schema: Vec<super::workflow::InputField>,
}

fn default_name() -> String {
    "Recorded Workflow".to_string()
}

fn default_version() -> String {
    "1.0".to_string()
}
