use super::element::{ElementKind, GroupOption, RawElement};

/// Longest text accepted as a semantic key; longer candidates are skipped
/// in favour of the next source.
const MAX_TEXT_LEN: usize = 100;

/// Sibling text is only trusted as an option label inside this window.
const OPTION_MIN_LEN: usize = 2;
const OPTION_MAX_LEN: usize = 50;

/// The extracted semantic identity of an element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SemanticText {
    /// The key text (before collision disambiguation).
    pub text: String,
    /// Group label for radio/checkbox fields ("Gender").
    pub field_name: Option<String>,
    /// The specific option this element represents ("Male").
    pub option_value: Option<String>,
    /// Every option label of the group, deduplicated, in DOM order.
    pub all_options: Vec<String>,
}

pub fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn usable(candidate: Option<&str>, max_len: usize) -> Option<String> {
    let text = normalize(candidate?);
    if text.is_empty() || text.chars().count() > max_len {
        None
    } else {
        Some(text)
    }
}

/// Extract the semantic text for an element, per its kind.
pub fn semantic_text(el: &RawElement, kind: ElementKind) -> SemanticText {
    if kind.is_toggle() {
        return toggle_text(el, kind);
    }

    let text = if kind == ElementKind::Button {
        button_text(el)
    } else {
        generic_text(el)
    };

    SemanticText {
        text: text.unwrap_or_else(|| fallback_text(el, kind)),
        ..Default::default()
    }
}

/// Buttons are labelled by what they show, not what labels point at them.
fn button_text(el: &RawElement) -> Option<String> {
    usable(el.text_content.as_deref(), MAX_TEXT_LEN)
        .or_else(|| usable(el.value.as_deref(), MAX_TEXT_LEN))
        .or_else(|| usable(el.aria_label.as_deref(), MAX_TEXT_LEN))
        .or_else(|| usable(el.title.as_deref(), MAX_TEXT_LEN))
        .or_else(|| generic_text(el))
}

fn generic_text(el: &RawElement) -> Option<String> {
    usable(el.label_for_text.as_deref(), MAX_TEXT_LEN)
        .or_else(|| usable(el.ancestor_label_text.as_deref(), MAX_TEXT_LEN))
        .or_else(|| usable(el.text_content.as_deref(), MAX_TEXT_LEN))
        .or_else(|| usable(el.placeholder.as_deref(), MAX_TEXT_LEN))
        .or_else(|| usable(el.title.as_deref(), MAX_TEXT_LEN))
        .or_else(|| usable(el.aria_label.as_deref(), MAX_TEXT_LEN))
        .or_else(|| usable(el.value.as_deref(), MAX_TEXT_LEN))
        .or_else(|| usable(el.name.as_deref(), MAX_TEXT_LEN))
        .or_else(|| usable(el.id.as_deref(), MAX_TEXT_LEN))
        .or_else(|| usable(el.parent_text.as_deref(), MAX_TEXT_LEN))
        .or_else(|| usable(el.aria_labelledby_text.as_deref(), MAX_TEXT_LEN))
}

/// Radio buttons and checkboxes get a `field: option` key when both parts
/// resolve, so "Gender: Male" and "Gender: Female" stay distinct.
fn toggle_text(el: &RawElement, kind: ElementKind) -> SemanticText {
    let option_value = option_label(
        el.label_for_text.as_deref(),
        el.ancestor_label_text.as_deref(),
        el.sibling_text_forward.as_deref(),
        el.sibling_text_backward.as_deref(),
        el.value.as_deref(),
    );

    let all_options = collect_options(&el.group_options);
    let field_name = field_label(el, &all_options);

    let text = match (&field_name, &option_value) {
        (Some(field), Some(option)) => format!("{}: {}", field, option),
        (None, Some(option)) => option.clone(),
        _ => fallback_text(el, kind),
    };

    SemanticText {
        text,
        field_name,
        option_value,
        all_options,
    }
}

fn option_label(
    label_for: Option<&str>,
    ancestor_label: Option<&str>,
    sibling_forward: Option<&str>,
    sibling_backward: Option<&str>,
    value: Option<&str>,
) -> Option<String> {
    usable(label_for, MAX_TEXT_LEN)
        .or_else(|| usable(ancestor_label, MAX_TEXT_LEN))
        .or_else(|| sibling_option(sibling_forward))
        .or_else(|| sibling_option(sibling_backward))
        .or_else(|| usable(value, MAX_TEXT_LEN))
}

fn sibling_option(candidate: Option<&str>) -> Option<String> {
    let text = usable(candidate, OPTION_MAX_LEN)?;
    if text.chars().count() < OPTION_MIN_LEN {
        None
    } else {
        Some(text)
    }
}

/// The group label: a fieldset legend wins, otherwise the nearest heading
/// as long as it is not itself one of the option labels.
fn field_label(el: &RawElement, options: &[String]) -> Option<String> {
    if let Some(legend) = usable(el.legend_text.as_deref(), MAX_TEXT_LEN) {
        return Some(legend);
    }
    let heading = usable(el.ancestor_heading_text.as_deref(), MAX_TEXT_LEN)?;
    if options.iter().any(|o| o.eq_ignore_ascii_case(&heading)) {
        None
    } else {
        Some(heading)
    }
}

fn collect_options(group: &[GroupOption]) -> Vec<String> {
    let mut seen = Vec::new();
    for option in group {
        if let Some(label) = option_label(
            option.label_for_text.as_deref(),
            option.ancestor_label_text.as_deref(),
            option.sibling_text_forward.as_deref(),
            option.sibling_text_backward.as_deref(),
            option.value.as_deref(),
        ) {
            if !seen.contains(&label) {
                seen.push(label);
            }
        }
    }
    seen
}

/// Bracketed placeholder for elements with no resolvable text, so every
/// element still gets a mapping key.
pub fn fallback_text(el: &RawElement, kind: ElementKind) -> String {
    match kind {
        ElementKind::Button => "[Button]".to_string(),
        ElementKind::Input => {
            let input_type = el.input_type.as_deref().unwrap_or("text");
            format!("[Input Field - {}]", input_type)
        }
        ElementKind::Select => "[Dropdown]".to_string(),
        ElementKind::Textarea => "[Text Area]".to_string(),
        ElementKind::Radio => "[Radio Button]".to_string(),
        ElementKind::Checkbox => "[Checkbox]".to_string(),
        ElementKind::Link => "[Link]".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_input() -> RawElement {
        RawElement {
            tag: "input".to_string(),
            input_type: Some("text".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn label_for_beats_placeholder() {
        let mut el = base_input();
        el.label_for_text = Some("Email Address".to_string());
        el.placeholder = Some("you@example.com".to_string());
        let text = semantic_text(&el, ElementKind::Input);
        assert_eq!(text.text, "Email Address");
    }

    #[test]
    fn over_cap_candidate_is_skipped() {
        let mut el = base_input();
        el.label_for_text = Some("x".repeat(150));
        el.placeholder = Some("Short placeholder".to_string());
        let text = semantic_text(&el, ElementKind::Input);
        assert_eq!(text.text, "Short placeholder");
    }

    #[test]
    fn whitespace_is_normalized() {
        let mut el = base_input();
        el.label_for_text = Some("  Email \n  Address ".to_string());
        let text = semantic_text(&el, ElementKind::Input);
        assert_eq!(text.text, "Email Address");
    }

    #[test]
    fn button_prefers_own_text_over_label() {
        let mut el = RawElement {
            tag: "button".to_string(),
            ..Default::default()
        };
        el.label_for_text = Some("Irrelevant".to_string());
        el.text_content = Some("Submit".to_string());
        let text = semantic_text(&el, ElementKind::Button);
        assert_eq!(text.text, "Submit");
    }

    #[test]
    fn submit_input_uses_value() {
        let mut el = RawElement {
            tag: "input".to_string(),
            input_type: Some("submit".to_string()),
            ..Default::default()
        };
        el.value = Some("Place Order".to_string());
        let text = semantic_text(&el, ElementKind::Button);
        assert_eq!(text.text, "Place Order");
    }

    #[test]
    fn textless_elements_get_bracketed_fallbacks() {
        let el = base_input();
        assert_eq!(
            semantic_text(&el, ElementKind::Input).text,
            "[Input Field - text]"
        );

        let button = RawElement {
            tag: "button".to_string(),
            ..Default::default()
        };
        assert_eq!(semantic_text(&button, ElementKind::Button).text, "[Button]");
    }

    fn radio(value: &str, sibling: &str) -> RawElement {
        RawElement {
            tag: "input".to_string(),
            input_type: Some("radio".to_string()),
            name: Some("gender".to_string()),
            value: Some(value.to_string()),
            sibling_text_forward: Some(sibling.to_string()),
            ..Default::default()
        }
    }

    fn group(entries: &[(&str, &str)]) -> Vec<GroupOption> {
        entries
            .iter()
            .map(|(value, sibling)| GroupOption {
                value: Some(value.to_string()),
                sibling_text_forward: Some(sibling.to_string()),
                ..Default::default()
            })
            .collect()
    }

    #[test]
    fn radio_combines_field_and_option() {
        let mut el = radio("m", "Male");
        el.legend_text = Some("Gender".to_string());
        el.group_options = group(&[("m", "Male"), ("f", "Female")]);

        let text = semantic_text(&el, ElementKind::Radio);
        assert_eq!(text.text, "Gender: Male");
        assert_eq!(text.field_name.as_deref(), Some("Gender"));
        assert_eq!(text.option_value.as_deref(), Some("Male"));
        assert_eq!(text.all_options, vec!["Male", "Female"]);
    }

    #[test]
    fn heading_equal_to_option_is_not_a_field_name() {
        let mut el = radio("yes", "Yes");
        el.ancestor_heading_text = Some("Yes".to_string());
        el.group_options = group(&[("yes", "Yes"), ("no", "No")]);

        let text = semantic_text(&el, ElementKind::Radio);
        assert!(text.field_name.is_none());
        assert_eq!(text.text, "Yes");
    }

    #[test]
    fn sibling_text_outside_window_falls_back_to_value() {
        let mut el = radio("option-a", &"long sibling text ".repeat(5));
        el.group_options.clear();
        let text = semantic_text(&el, ElementKind::Radio);
        assert_eq!(text.option_value.as_deref(), Some("option-a"));
    }

    #[test]
    fn single_char_sibling_is_rejected() {
        let el = radio("m", "*");
        let text = semantic_text(&el, ElementKind::Radio);
        assert_eq!(text.option_value.as_deref(), Some("m"));
    }

    #[test]
    fn group_options_are_deduplicated_in_order() {
        let mut el = radio("a", "Alpha");
        el.group_options = group(&[("a", "Alpha"), ("b", "Beta"), ("a2", "Alpha")]);
        let text = semantic_text(&el, ElementKind::Radio);
        assert_eq!(text.all_options, vec!["Alpha", "Beta"]);
    }
}
