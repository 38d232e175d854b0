use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use super::element::{ElementKind, RawElement, SiblingSlot};
use super::text::SemanticText;

/// Attributes considered stable enough to appear in generated selectors.
const SELECTOR_ATTRS: &[&str] = &["name", "type", "data-testid", "role", "placeholder"];

const MAX_CLASSES: usize = 3;

fn ident_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z_-][a-zA-Z0-9_-]*$").expect("valid regex"))
}

/// True when the token can be used verbatim in a CSS selector.
pub fn is_css_identifier(s: &str) -> bool {
    ident_re().is_match(s)
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SelectorSet {
    /// Richest selector: tag + stable attributes + safe classes, or `#id`.
    pub primary: String,
    /// Reduced selector built from the single most stable attribute.
    pub fallback: String,
    /// Positional or id-based XPath, the last resort.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xpath: Option<String>,
}

impl SelectorSet {
    /// Selectors in the order the executor should try them.
    pub fn chain(&self) -> Vec<&str> {
        let mut chain = vec![self.primary.as_str()];
        if self.fallback != self.primary {
            chain.push(self.fallback.as_str());
        }
        if let Some(xpath) = &self.xpath {
            chain.push(xpath.as_str());
        }
        chain
    }
}

/// Everything the engine records about one mapped element.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Descriptor {
    pub selectors: SelectorSet,
    pub kind: ElementKind,
    /// Per-pass deterministic id, e.g. `input_1`.
    pub deterministic_id: String,
    /// The key text before collision disambiguation.
    pub original_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option_value: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub all_options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<SiblingSlot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
}

impl Descriptor {
    pub fn new(el: &RawElement, kind: ElementKind, text: &SemanticText, id: String) -> Self {
        Self {
            selectors: build_selectors(el, kind),
            kind,
            deterministic_id: id,
            original_text: text.text.clone(),
            field_name: text.field_name.clone(),
            option_value: text.option_value.clone(),
            all_options: text.all_options.clone(),
            container_text: el.container_text.clone(),
            container_id: el.container_id.clone(),
            position: el.sibling_position,
            element_id: el.id.clone(),
            class_name: el.class_name.clone(),
        }
    }
}

pub fn build_selectors(el: &RawElement, kind: ElementKind) -> SelectorSet {
    SelectorSet {
        primary: primary_selector(el, kind),
        fallback: fallback_selector(el, kind),
        xpath: Some(xpath_selector(el)),
    }
}

/// `[attr="value"]`, or a substring form when the value cannot be quoted
/// verbatim.
fn attr_selector(attr: &str, value: &str) -> String {
    if !value.contains('"') && !value.contains('\\') && !value.contains('\n') {
        return format!("[{}=\"{}\"]", attr, value);
    }
    let safe: String = value
        .chars()
        .take_while(|c| *c != '"' && *c != '\\' && *c != '\n')
        .collect();
    format!("[{}*=\"{}\"]", attr, safe)
}

fn toggle_value_selector(el: &RawElement, kind: ElementKind) -> Option<String> {
    if !kind.is_toggle() {
        return None;
    }
    el.value
        .as_deref()
        .filter(|v| !v.is_empty())
        .map(|v| attr_selector("value", v))
}

fn primary_selector(el: &RawElement, kind: ElementKind) -> String {
    if let Some(id) = el.id.as_deref().filter(|id| is_css_identifier(id)) {
        return format!("#{}", id);
    }

    let mut selector = el.tag.to_lowercase();
    for attr in SELECTOR_ATTRS {
        if let Some(value) = el.attributes.get(*attr).filter(|v| !v.is_empty()) {
            selector.push_str(&attr_selector(attr, value));
        }
    }
    if let Some(value_sel) = toggle_value_selector(el, kind) {
        selector.push_str(&value_sel);
    }

    if let Some(class_name) = el.class_name.as_deref() {
        let classes: Vec<&str> = class_name
            .split_whitespace()
            .filter(|c| is_css_identifier(c))
            .take(MAX_CLASSES)
            .collect();
        for class in classes {
            selector.push('.');
            selector.push_str(class);
        }
    }
    selector
}

/// The single most stable attribute: id, then name, then type.
fn fallback_selector(el: &RawElement, kind: ElementKind) -> String {
    if let Some(id) = el.id.as_deref().filter(|id| is_css_identifier(id)) {
        return format!("#{}", id);
    }

    let tag = el.tag.to_lowercase();
    let type_attr = el.input_type.as_deref().filter(|t| !t.is_empty());

    if let Some(name) = el.name.as_deref().filter(|n| !n.is_empty()) {
        let mut selector = format!("{}{}", tag, attr_selector("name", name));
        if let Some(t) = type_attr {
            selector.push_str(&attr_selector("type", t));
        }
        if let Some(value_sel) = toggle_value_selector(el, kind) {
            selector.push_str(&value_sel);
        }
        return selector;
    }

    if let Some(t) = type_attr {
        let mut selector = format!("{}{}", tag, attr_selector("type", t));
        if let Some(value_sel) = toggle_value_selector(el, kind) {
            selector.push_str(&value_sel);
        }
        return selector;
    }

    tag
}

/// Id shortcut when possible, otherwise a full positional path built from
/// the recorded ancestor chain.
fn xpath_selector(el: &RawElement) -> String {
    if let Some(id) = el.id.as_deref().filter(|id| !id.is_empty() && !id.contains('"')) {
        return format!("//*[@id=\"{}\"]", id);
    }

    let mut path = String::from("/html");
    for hop in &el.ancestors {
        if hop.index > 1 {
            path.push_str(&format!("/{}[{}]", hop.tag, hop.index));
        } else {
            path.push_str(&format!("/{}", hop.tag));
        }
    }
    let own_index = el.sibling_position.map(|p| p.index).unwrap_or(1);
    if own_index > 1 {
        path.push_str(&format!("/{}[{}]", el.tag.to_lowercase(), own_index));
    } else {
        path.push_str(&format!("/{}", el.tag.to_lowercase()));
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::element::AncestorHop;
    use std::collections::HashMap;

    fn named_input(name: &str, input_type: &str) -> RawElement {
        let mut attributes = HashMap::new();
        attributes.insert("name".to_string(), name.to_string());
        attributes.insert("type".to_string(), input_type.to_string());
        RawElement {
            tag: "input".to_string(),
            input_type: Some(input_type.to_string()),
            name: Some(name.to_string()),
            attributes,
            ..Default::default()
        }
    }

    #[test]
    fn id_wins_everywhere() {
        let mut el = named_input("email", "email");
        el.id = Some("email-field".to_string());
        let set = build_selectors(&el, ElementKind::Input);
        assert_eq!(set.primary, "#email-field");
        assert_eq!(set.fallback, "#email-field");
        assert_eq!(set.xpath.as_deref(), Some("//*[@id=\"email-field\"]"));
        // The chain does not repeat the identical fallback.
        assert_eq!(set.chain().len(), 2);
    }

    #[test]
    fn unsafe_id_is_not_used_as_css() {
        let mut el = named_input("q", "text");
        el.id = Some("user:email".to_string());
        let set = build_selectors(&el, ElementKind::Input);
        assert!(set.primary.starts_with("input["));
        // XPath can still address it.
        assert_eq!(set.xpath.as_deref(), Some("//*[@id=\"user:email\"]"));
    }

    #[test]
    fn primary_includes_attrs_and_safe_classes() {
        let mut el = named_input("email", "email");
        el.class_name = Some("form-control weird:class js-input".to_string());
        let set = build_selectors(&el, ElementKind::Input);
        assert_eq!(
            set.primary,
            "input[name=\"email\"][type=\"email\"].form-control.js-input"
        );
    }

    #[test]
    fn unquotable_attr_value_uses_substring_match() {
        let sel = attr_selector("placeholder", "say \"hi\"");
        assert_eq!(sel, "[placeholder*=\"say \"]");
    }

    #[test]
    fn toggle_selectors_carry_value() {
        let mut el = named_input("gender", "radio");
        el.value = Some("m".to_string());
        let set = build_selectors(&el, ElementKind::Radio);
        assert!(set.primary.contains("[value=\"m\"]"));
        assert!(set.fallback.contains("[value=\"m\"]"));
    }

    #[test]
    fn positional_xpath_counts_same_tag_siblings() {
        let mut el = RawElement {
            tag: "input".to_string(),
            ..Default::default()
        };
        el.ancestors = vec![
            AncestorHop {
                tag: "body".to_string(),
                index: 1,
            },
            AncestorHop {
                tag: "div".to_string(),
                index: 2,
            },
            AncestorHop {
                tag: "form".to_string(),
                index: 1,
            },
        ];
        el.sibling_position = Some(SiblingSlot { index: 3, total: 5 });
        let set = build_selectors(&el, ElementKind::Input);
        assert_eq!(set.xpath.as_deref(), Some("/html/body/div[2]/form/input[3]"));
    }
}
