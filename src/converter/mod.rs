use regex::Regex;
use std::sync::OnceLock;

use crate::models::{
    RawRecording, RawStep, SemanticInfo, StepMeta, Target, Workflow, WorkflowStep,
};

const MAX_TARGET_LEN: usize = 100;
const MAX_CONTAINER_LEN: usize = 50;
const MAX_CONTAINER_ID_LEN: usize = 30;
const MAX_MINED_LEN: usize = 50;

/// Class tokens too generic to identify an element, mostly utility CSS.
const NOISE_CLASSES: &[&str] = &[
    "btn", "button", "flex", "inline", "items", "justify", "gap", "rounded", "text", "font",
    "ring", "transition", "colors", "bg", "primary", "foreground",
];

/// Convert a raw recording into a text-targeted workflow. Pure: no DOM
/// access, everything is derived from what the recorder captured.
pub fn convert(recording: &RawRecording) -> Workflow {
    let steps = recording
        .steps
        .iter()
        .filter_map(convert_step)
        .collect::<Vec<_>>();

    Workflow {
        workflow_analysis: Some(
            "Semantic version of recorded workflow. Uses visible text to identify elements \
             instead of CSS selectors for improved reliability."
                .to_string(),
        ),
        name: format!("{} (Semantic)", recording.name),
        description: recording.description.clone(),
        version: recording.version.clone(),
        steps,
        input_schema: recording.input_schema.clone(),
    }
}

fn convert_step(raw: &RawStep) -> Option<WorkflowStep> {
    let meta = StepMeta {
        description: raw.description.clone(),
        output: raw.output.clone(),
    };

    match raw.step_type.as_str() {
        "navigation" => {
            let url = raw.url.clone()?;
            Some(WorkflowStep::Navigation { meta, url })
        }
        "scroll" => Some(WorkflowStep::Scroll {
            meta,
            scroll_x: raw.scroll_x.unwrap_or(0),
            scroll_y: raw.scroll_y.unwrap_or(0),
        }),
        "click" => Some(WorkflowStep::Click {
            meta: described(meta, "Click"),
            target: build_target(raw),
        }),
        "input" => Some(WorkflowStep::Input {
            meta: described(meta, "Input"),
            target: build_target(raw),
            value: raw.value.clone().unwrap_or_default(),
        }),
        "select_change" | "select" => Some(WorkflowStep::Select {
            meta: described(meta, "Select"),
            target: build_target(raw),
            selected_text: raw.selected_text.clone().or_else(|| raw.value.clone())?,
        }),
        "key_press" => Some(WorkflowStep::KeyPress {
            meta: described(meta, "Press key on"),
            target: build_target(raw),
            key: raw.key.clone()?,
        }),
        "radio" => {
            let selected_option = raw
                .selected_option
                .clone()
                .or_else(|| semantic(raw).and_then(|s| s.option_value.clone()))
                .or_else(|| raw.value.clone())?;
            Some(WorkflowStep::Radio {
                meta,
                target: build_target(raw),
                field_name: raw
                    .field_name
                    .clone()
                    .or_else(|| semantic(raw).and_then(|s| s.field_name.clone())),
                selected_option,
                options: if !raw.options.is_empty() {
                    raw.options.clone()
                } else {
                    semantic(raw).map(|s| s.all_options.clone()).unwrap_or_default()
                },
            })
        }
        "checkbox" => Some(WorkflowStep::Checkbox {
            meta,
            target: build_target(raw),
            field_name: raw
                .field_name
                .clone()
                .or_else(|| semantic(raw).and_then(|s| s.field_name.clone())),
            checked: raw.checked.unwrap_or(true),
        }),
        "extract" | "extract_page_content" => Some(WorkflowStep::Extract {
            meta,
            goal: raw.value.clone().or_else(|| raw.description.clone())?,
        }),
        "agent" => Some(WorkflowStep::Agent {
            meta,
            task: raw.value.clone().or_else(|| raw.description.clone())?,
            max_steps: None,
        }),
        other => {
            tracing::warn!(step_type = %other, "skipping unrecognized recorded step");
            None
        }
    }
}

fn described(mut meta: StepMeta, action: &str) -> StepMeta {
    if meta.description.is_none() {
        meta.description = Some(format!("{} element", action));
    }
    meta
}

fn semantic(raw: &RawStep) -> Option<&SemanticInfo> {
    raw.semantic_info.as_ref()
}

fn build_target(raw: &RawStep) -> Target {
    let target_text = extract_target_text(raw);
    if target_text.is_none() {
        tracing::warn!(
            step_type = %raw.step_type,
            selector = raw.css_selector.as_deref().unwrap_or(""),
            "no semantic text found, keeping legacy selector only"
        );
    }

    let info = semantic(raw);
    Target {
        target_text: target_text.unwrap_or_default(),
        container_hint: info.and_then(container_hint),
        position_hint: info.and_then(position_hint),
        interaction_type: info.and_then(|s| s.interaction_hints.first().cloned()),
        css_selector: raw.css_selector.clone(),
        xpath: raw.xpath.clone(),
        element_tag: raw.element_tag.clone(),
    }
}

fn container_hint(info: &SemanticInfo) -> Option<String> {
    if let Some(text) = info
        .container_context
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty() && t.chars().count() < MAX_CONTAINER_LEN)
    {
        return Some(text.to_string());
    }
    info.container_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(title_case_identifier)
}

fn position_hint(info: &SemanticInfo) -> Option<String> {
    let position = info.sibling_position?;
    if position.total > 1 {
        Some(format!("item {} of {}", position.index, position.total))
    } else {
        None
    }
}

fn extract_target_text(raw: &RawStep) -> Option<String> {
    // The recorder's own contextual text wins when present.
    if let Some(text) = raw.target_text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        return Some(text.to_string());
    }

    if let Some(info) = semantic(raw) {
        // Radio/checkbox events carry group facts the combined key is
        // built from.
        if let (Some(field), Some(option)) = (info.field_name.as_deref(), info.option_value.as_deref()) {
            return Some(format!("{}: {}", field.trim(), option.trim()));
        }

        let base = [&info.label_text, &info.text_content, &info.name, &info.id]
            .into_iter()
            .filter_map(|f| f.as_deref())
            .map(str::trim)
            .find(|v| !v.is_empty() && v.chars().count() < MAX_TARGET_LEN);

        if let Some(base) = base {
            if let Some(container) = contextual_container(info) {
                return Some(format!("{} (in {})", base, container));
            }
            return Some(base.to_string());
        }

        for field in [&info.placeholder, &info.aria_label] {
            if let Some(value) = field
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty() && v.chars().count() < MAX_TARGET_LEN)
            {
                return Some(value.to_string());
            }
        }
    }

    if let Some(text) = raw
        .element_text
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty() && t.chars().count() < MAX_TARGET_LEN)
    {
        return Some(text.to_string());
    }

    raw.css_selector.as_deref().and_then(mine_legacy_selector)
}

fn contextual_container(info: &SemanticInfo) -> Option<String> {
    if let Some(text) = info
        .container_context
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty() && t.chars().count() < MAX_CONTAINER_LEN)
    {
        return Some(text.to_string());
    }
    info.container_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty() && id.chars().count() < MAX_CONTAINER_ID_LEN)
        .map(title_case_identifier)
}

/// "billing-address" -> "Billing Address".
fn title_case_identifier(id: &str) -> String {
    id.replace(['-', '_'], " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn attr_re(attr: &'static str, cell: &'static OnceLock<Regex>) -> &'static Regex {
    cell.get_or_init(|| {
        Regex::new(&format!(r#"\[{}=["']([^"']+)["']\]"#, attr)).expect("valid regex")
    })
}

/// Last resort: pull something human-recognisable out of a legacy CSS
/// selector so the step still has text to match with.
fn mine_legacy_selector(selector: &str) -> Option<String> {
    static ID_RE: OnceLock<Regex> = OnceLock::new();
    static NAME_RE: OnceLock<Regex> = OnceLock::new();
    static VALUE_RE: OnceLock<Regex> = OnceLock::new();
    static CLASS_RE: OnceLock<Regex> = OnceLock::new();

    if let Some(captures) = attr_re("id", &ID_RE).captures(selector) {
        let id = captures[1].to_string();
        if id.chars().count() < MAX_MINED_LEN {
            return Some(id);
        }
    }

    if let Some(rest) = selector.split('#').nth(1) {
        let id: String = rest
            .chars()
            .take_while(|c| *c != '.' && *c != '[' && *c != ':' && *c != ' ')
            .collect();
        if !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
            return Some(id);
        }
    }

    if let Some(captures) = attr_re("name", &NAME_RE).captures(selector) {
        let name = captures[1].to_string();
        if name.chars().count() < MAX_MINED_LEN {
            return Some(name);
        }
    }

    if selector.contains("radio") || selector.contains("checkbox") {
        if let Some(captures) = attr_re("value", &VALUE_RE).captures(selector) {
            let value = captures[1].to_string();
            if value.chars().count() < MAX_MINED_LEN {
                return Some(value);
            }
        }
    }

    if selector.contains("button") && selector.matches('.').count() < 10 {
        let class_re = CLASS_RE
            .get_or_init(|| Regex::new(r"\.([a-zA-Z][a-zA-Z0-9_-]*)").expect("valid regex"));
        for captures in class_re.captures_iter(selector) {
            let class = captures[1].to_string();
            let lower = class.to_lowercase();
            let len = class.chars().count();
            if len > 2 && len < 20 && !NOISE_CLASSES.iter().any(|noise| lower.contains(noise)) {
                return Some(class);
            }
        }
    }

    None
}
