use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Raw per-element facts captured from the page in a single evaluation.
/// The script reports what is *there*; all prioritisation between these
/// fields happens on the Rust side.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RawElement {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Direct text content, trimmed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aria_label: Option<String>,
    /// Resolved text of the elements referenced by aria-labelledby.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aria_labelledby_text: Option<String>,
    /// Text of a `label[for=<id>]` pointing at this element.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_for_text: Option<String>,
    /// Text of an enclosing `<label>` element.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ancestor_label_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sibling_text_forward: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sibling_text_backward: Option<String>,
    /// Legend of an enclosing fieldset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legend_text: Option<String>,
    /// Nearest heading above this element in the ancestor chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ancestor_heading_text: Option<String>,
    /// First ancestor whose whole text is short enough to be a label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_text: Option<String>,
    /// Heading text of the nearest titled container section.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
    /// Allow-listed attributes present on the element.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, String>,
    /// Ancestor chain from `<body>` down to the parent, for positional XPath.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ancestors: Vec<AncestorHop>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sibling_position: Option<SiblingSlot>,
    /// For radio/checkbox: every element of the same-name group, in DOM order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_options: Vec<GroupOption>,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// One step in the ancestor chain; `index` is 1-based among same-tag siblings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AncestorHop {
    pub tag: String,
    pub index: usize,
}

/// 1-based position among same-tag siblings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SiblingSlot {
    pub index: usize,
    pub total: usize,
}

/// One member of a radio/checkbox group, with the same label candidates
/// the owning element carries.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GroupOption {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_for_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ancestor_label_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sibling_text_forward: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sibling_text_backward: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Input,
    Button,
    Select,
    Textarea,
    Link,
    Radio,
    Checkbox,
}

impl ElementKind {
    pub fn classify(el: &RawElement) -> Self {
        let tag = el.tag.to_lowercase();
        let input_type = el.input_type.as_deref().unwrap_or("").to_lowercase();
        let role = el.role.as_deref().unwrap_or("").to_lowercase();

        match tag.as_str() {
            "input" => match input_type.as_str() {
                "radio" => ElementKind::Radio,
                "checkbox" => ElementKind::Checkbox,
                "button" | "submit" | "reset" => ElementKind::Button,
                _ => ElementKind::Input,
            },
            "button" => ElementKind::Button,
            "select" => ElementKind::Select,
            "textarea" => ElementKind::Textarea,
            "a" => ElementKind::Link,
            _ => match role.as_str() {
                "button" => ElementKind::Button,
                "link" => ElementKind::Link,
                "radio" => ElementKind::Radio,
                "checkbox" => ElementKind::Checkbox,
                "combobox" | "listbox" => ElementKind::Select,
                _ => ElementKind::Input,
            },
        }
    }

    /// Stable name used for deterministic ids (`input_1`, `radio_2`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Input => "input",
            ElementKind::Button => "button",
            ElementKind::Select => "select",
            ElementKind::Textarea => "textarea",
            ElementKind::Link => "link",
            ElementKind::Radio => "radio",
            ElementKind::Checkbox => "checkbox",
        }
    }

    pub fn is_button_like(&self) -> bool {
        matches!(self, ElementKind::Button | ElementKind::Link)
    }

    pub fn is_toggle(&self) -> bool {
        matches!(self, ElementKind::Radio | ElementKind::Checkbox)
    }
}

/// Parse the evaluation result into element snapshots.
pub fn parse_elements(value: &serde_json::Value) -> Result<Vec<RawElement>> {
    let elements: Vec<RawElement> = serde_json::from_value(value.clone())
        .map_err(|e| anyhow!("Failed to parse page snapshot: {}", e))?;
    Ok(elements)
}

/// JavaScript that snapshots every visible interactive element together
/// with its label candidates and structural context.
pub const EXTRACT_ELEMENTS_SCRIPT: &str = r#"
(() => {
    const ATTR_ALLOW_LIST = ['name', 'type', 'value', 'placeholder', 'role', 'data-testid', 'aria-label'];

    const trimmed = (s) => (s || '').trim().replace(/\s+/g, ' ');

    const directText = (el) => {
        let text = '';
        for (const node of el.childNodes) {
            if (node.nodeType === Node.TEXT_NODE) {
                text += node.textContent;
            } else if (node.nodeType === Node.ELEMENT_NODE &&
                       !['SCRIPT', 'STYLE', 'SVG'].includes(node.tagName)) {
                text += node.textContent;
            }
        }
        return trimmed(text);
    };

    const labelForText = (el) => {
        if (!el.id) return null;
        const label = document.querySelector(`label[for="${CSS.escape(el.id)}"]`);
        return label ? trimmed(label.textContent) || null : null;
    };

    const ancestorLabelText = (el) => {
        const label = el.closest('label');
        return label ? trimmed(label.textContent) || null : null;
    };

    const siblingText = (el, forward) => {
        let node = forward ? el.nextSibling : el.previousSibling;
        while (node) {
            if (node.nodeType === Node.TEXT_NODE) {
                const t = trimmed(node.textContent);
                if (t) return t;
            } else if (node.nodeType === Node.ELEMENT_NODE) {
                const t = trimmed(node.textContent);
                if (t) return t;
            }
            node = forward ? node.nextSibling : node.previousSibling;
        }
        return null;
    };

    const legendText = (el) => {
        const fieldset = el.closest('fieldset');
        if (!fieldset) return null;
        const legend = fieldset.querySelector('legend');
        return legend ? trimmed(legend.textContent) || null : null;
    };

    const ancestorHeading = (el) => {
        let parent = el.parentElement;
        while (parent && parent !== document.body) {
            const heading = parent.querySelector(':scope > h1, :scope > h2, :scope > h3, :scope > h4, :scope > h5, :scope > h6');
            if (heading) {
                return { text: trimmed(heading.textContent) || null, id: parent.id || null };
            }
            parent = parent.parentElement;
        }
        return { text: null, id: null };
    };

    const shortParentText = (el) => {
        const ownText = trimmed(el.textContent);
        let parent = el.parentElement;
        while (parent && parent !== document.body) {
            let text = trimmed(parent.textContent);
            if (ownText && text.includes(ownText)) {
                text = trimmed(text.replace(ownText, ''));
            }
            if (text && text.length < 100) return text;
            parent = parent.parentElement;
        }
        return null;
    };

    const labelledByText = (el) => {
        const ref = el.getAttribute('aria-labelledby');
        if (!ref) return null;
        const parts = ref.split(/\s+/)
            .map(id => document.getElementById(id))
            .filter(n => n)
            .map(n => trimmed(n.textContent))
            .filter(t => t);
        return parts.length ? parts.join(' ') : null;
    };

    const siblingSlot = (el) => {
        const parent = el.parentElement;
        if (!parent) return null;
        const siblings = Array.from(parent.children).filter(c => c.tagName === el.tagName);
        if (siblings.length <= 1) return null;
        return { index: siblings.indexOf(el) + 1, total: siblings.length };
    };

    const ancestorChain = (el) => {
        const chain = [];
        let node = el.parentElement;
        while (node && node !== document.documentElement) {
            const parent = node.parentElement;
            let index = 1;
            if (parent) {
                const same = Array.from(parent.children).filter(c => c.tagName === node.tagName);
                index = same.indexOf(node) + 1;
            }
            chain.unshift({ tag: node.tagName.toLowerCase(), index: index });
            node = parent;
        }
        return chain;
    };

    const optionFacts = (el) => ({
        value: el.value || null,
        label_for_text: labelForText(el),
        ancestor_label_text: ancestorLabelText(el),
        sibling_text_forward: siblingText(el, true),
        sibling_text_backward: siblingText(el, false)
    });

    const groupOptions = (el) => {
        const type = el.type;
        if (type !== 'radio' && type !== 'checkbox') return [];
        if (!el.name) return [optionFacts(el)];
        const group = document.querySelectorAll(
            `input[type="${type}"][name="${CSS.escape(el.name)}"]`);
        return Array.from(group).map(optionFacts);
    };

    const selectors = [
        'input:not([type="hidden"])',
        'button',
        'select',
        'textarea',
        'a[href]',
        '[role="button"]',
        '[role="link"]',
        '[role="textbox"]',
        '[role="combobox"]',
        '[role="listbox"]',
        '[role="radio"]',
        '[role="checkbox"]'
    ];

    const elements = [];
    const seen = new Set();

    selectors.forEach(selector => {
        document.querySelectorAll(selector).forEach(el => {
            if (seen.has(el)) return;
            if (!el.offsetParent && el.tagName !== 'OPTION') return;
            const rect = el.getBoundingClientRect();
            if (rect.width === 0 || rect.height === 0) return;
            seen.add(el);

            const attributes = {};
            for (const attr of ATTR_ALLOW_LIST) {
                const v = el.getAttribute(attr);
                if (v) attributes[attr] = v;
            }

            const heading = ancestorHeading(el);

            elements.push({
                tag: el.tagName.toLowerCase(),
                input_type: el.type || null,
                role: el.getAttribute('role') || null,
                id: el.id || null,
                name: el.name || null,
                class_name: (typeof el.className === 'string' && el.className) || null,
                value: el.value || null,
                text_content: directText(el) || null,
                placeholder: el.placeholder || null,
                title: el.title || null,
                aria_label: el.getAttribute('aria-label') || null,
                aria_labelledby_text: labelledByText(el),
                label_for_text: labelForText(el),
                ancestor_label_text: ancestorLabelText(el),
                sibling_text_forward: siblingText(el, true),
                sibling_text_backward: siblingText(el, false),
                legend_text: legendText(el),
                ancestor_heading_text: heading.text,
                parent_text: shortParentText(el),
                container_text: heading.text,
                container_id: heading.id,
                attributes: attributes,
                ancestors: ancestorChain(el),
                sibling_position: siblingSlot(el),
                group_options: groupOptions(el),
                x: Math.round(rect.x),
                y: Math.round(rect.y),
                width: Math.round(rect.width),
                height: Math.round(rect.height)
            });
        });
    });

    return elements;
})()
"#;
