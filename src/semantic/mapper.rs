use std::collections::{BTreeMap, HashMap};

use super::descriptor::Descriptor;
use super::element::{ElementKind, RawElement};
use super::text::semantic_text;

/// Ordered map from semantic key text to element descriptor, produced by
/// one mapper pass over a page snapshot.
#[derive(Debug, Clone, Default)]
pub struct SemanticMapping {
    entries: BTreeMap<String, Descriptor>,
}

impl SemanticMapping {
    pub fn get(&self, key: &str) -> Option<&Descriptor> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Descriptor)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One mapping pass. Counters live here, not in any shared state, so two
/// passes over the same page always produce the same deterministic ids.
#[derive(Debug, Default)]
pub struct MapperPass {
    counters: HashMap<ElementKind, u32>,
}

impl MapperPass {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self, kind: ElementKind) -> String {
        let counter = self.counters.entry(kind).or_insert(0);
        *counter += 1;
        format!("{}_{}", kind.as_str(), counter)
    }

    pub fn build(mut self, elements: &[RawElement]) -> SemanticMapping {
        let mut mapping = SemanticMapping::default();
        let mut base_counts: HashMap<String, u32> = HashMap::new();

        for el in elements {
            let kind = ElementKind::classify(el);
            let id = self.next_id(kind);
            let text = semantic_text(el, kind);
            let descriptor = Descriptor::new(el, kind, &text, id);

            let seen = base_counts.entry(text.text.clone()).or_insert(0);
            *seen += 1;

            match *seen {
                1 => {
                    tracing::debug!(key = %text.text, selector = %descriptor.selectors.primary, "mapped");
                    mapping.entries.insert(text.text, descriptor);
                }
                2 => {
                    // First collision: the earlier entry loses its plain key
                    // and both get contextual ones.
                    if let Some(existing) = mapping.entries.remove(&text.text) {
                        let rekeyed = disambiguate(&text.text, &existing, &mapping);
                        mapping.entries.insert(rekeyed, existing);
                    }
                    let key = disambiguate(&text.text, &descriptor, &mapping);
                    tracing::debug!(key = %key, "mapped (disambiguated)");
                    mapping.entries.insert(key, descriptor);
                }
                _ => {
                    let key = disambiguate(&text.text, &descriptor, &mapping);
                    tracing::debug!(key = %key, "mapped (disambiguated)");
                    mapping.entries.insert(key, descriptor);
                }
            }
        }

        mapping
    }
}

/// Contextual key candidates in order of how readable they are for a
/// workflow author.
fn disambiguate(text: &str, descriptor: &Descriptor, mapping: &SemanticMapping) -> String {
    let mut candidates = Vec::new();

    if let Some(container) = descriptor.container_text.as_deref().filter(|c| !c.is_empty()) {
        candidates.push(format!("{} (in {})", text, container));
    }
    if let Some(position) = descriptor.position {
        candidates.push(format!(
            "{} (item {} of {})",
            text, position.index, position.total
        ));
    }
    if let Some(id) = descriptor.element_id.as_deref().filter(|id| !id.is_empty()) {
        candidates.push(format!("{} (id: {})", text, id));
    } else if let Some(class) = descriptor.class_name.as_deref().filter(|c| !c.is_empty()) {
        let short: String = class.chars().take(20).collect();
        candidates.push(format!("{} (class: {})", text, short));
    }

    for candidate in candidates {
        if mapping.get(&candidate).is_none() {
            return candidate;
        }
    }

    let mut counter = 2;
    loop {
        let candidate = format!("{} ({})", text, counter);
        if mapping.get(&candidate).is_none() {
            return candidate;
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::element::SiblingSlot;

    fn labelled_input(label: &str, name: &str) -> RawElement {
        RawElement {
            tag: "input".to_string(),
            input_type: Some("text".to_string()),
            name: Some(name.to_string()),
            label_for_text: Some(label.to_string()),
            ..Default::default()
        }
    }

    fn submit_button(container: Option<&str>) -> RawElement {
        RawElement {
            tag: "button".to_string(),
            text_content: Some("Submit".to_string()),
            container_text: container.map(|c| c.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn every_element_gets_a_unique_key() {
        let elements = vec![
            labelled_input("First Name", "first"),
            labelled_input("Last Name", "last"),
            submit_button(None),
        ];
        let mapping = MapperPass::new().build(&elements);
        assert_eq!(mapping.len(), 3);
        assert!(mapping.get("First Name").is_some());
        assert!(mapping.get("Last Name").is_some());
        assert!(mapping.get("Submit").is_some());
    }

    #[test]
    fn deterministic_ids_restart_each_pass() {
        let elements = vec![
            labelled_input("First Name", "first"),
            labelled_input("Last Name", "last"),
        ];
        let first = MapperPass::new().build(&elements);
        let second = MapperPass::new().build(&elements);
        assert_eq!(
            first.get("First Name").unwrap().deterministic_id,
            "input_1"
        );
        assert_eq!(first.get("Last Name").unwrap().deterministic_id, "input_2");
        assert_eq!(
            second.get("First Name").unwrap().deterministic_id,
            "input_1"
        );
    }

    #[test]
    fn collision_rekeys_both_entries_with_container() {
        let elements = vec![
            submit_button(Some("Personal Information")),
            submit_button(Some("Billing Address")),
        ];
        let mapping = MapperPass::new().build(&elements);
        assert!(mapping.get("Submit").is_none());
        assert!(mapping.get("Submit (in Personal Information)").is_some());
        assert!(mapping.get("Submit (in Billing Address)").is_some());
    }

    #[test]
    fn collision_falls_back_to_position_then_counter() {
        let mut first = submit_button(None);
        first.sibling_position = Some(SiblingSlot { index: 1, total: 2 });
        let mut second = submit_button(None);
        second.sibling_position = Some(SiblingSlot { index: 2, total: 2 });
        let third = submit_button(None);

        let mapping = MapperPass::new().build(&vec![first, second, third]);
        assert!(mapping.get("Submit (item 1 of 2)").is_some());
        assert!(mapping.get("Submit (item 2 of 2)").is_some());
        // The third has no context at all and gets a counter.
        assert!(mapping.get("Submit (2)").is_some());
    }

    #[test]
    fn textless_inputs_collide_on_fallback_labels() {
        let anonymous = |class: &str| RawElement {
            tag: "input".to_string(),
            input_type: Some("text".to_string()),
            class_name: Some(class.to_string()),
            ..Default::default()
        };
        let elements = vec![anonymous("first-field"), anonymous("second-field")];
        let mapping = MapperPass::new().build(&elements);
        assert!(mapping.get("[Input Field - text]").is_none());
        assert!(mapping
            .get("[Input Field - text] (class: first-field)")
            .is_some());
        assert!(mapping
            .get("[Input Field - text] (class: second-field)")
            .is_some());
    }
}
