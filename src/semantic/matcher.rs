use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

use super::descriptor::Descriptor;
use super::mapper::SemanticMapping;
use crate::error::{EngineError, Result};
use crate::models::Target;

const SCORE_EPSILON: f64 = 1e-9;

/// Minimum share of identifier parts that must appear in a key for the
/// camelCase/snake_case stage to accept it.
const PART_MATCH_RATIO: f64 = 0.7;

/// How a target was resolved.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// A mapping entry matched; interact through its selector chain.
    Mapped { key: String, descriptor: Descriptor },
    /// The target looks like a DOM identifier; probe these selectors
    /// directly on the page.
    Direct { selectors: Vec<String> },
}

/// Resolve a step target against the current page mapping.
///
/// Stages: exact key match, identifier lookup inside generated selectors,
/// hint-assisted disambiguation, fuzzy scoring, identifier-part matching,
/// and finally direct selector probes for identifier-shaped targets.
pub fn resolve(
    mapping: &SemanticMapping,
    target: &Target,
    min_confidence: f64,
) -> Result<Resolution> {
    let wanted = normalize_key(&target.target_text);
    if wanted.is_empty() {
        return Err(EngineError::ElementNotFound {
            target: target.target_text.clone(),
            candidates: mapping.keys(),
        });
    }

    // Stage 1: exact, case-insensitive.
    for (key, descriptor) in mapping.iter() {
        if normalize_key(key) == wanted {
            tracing::debug!(target = %target.target_text, key = %key, "exact match");
            return Ok(mapped(key, descriptor));
        }
    }

    // Stage 2: the target may be an element id or name attribute that the
    // recorder captured instead of visible text.
    let identifier_shaped = is_identifier_shaped(&target.target_text);
    if identifier_shaped {
        let needle = target.target_text.trim();
        for (key, descriptor) in mapping.iter() {
            if selector_mentions(descriptor, needle) {
                tracing::debug!(target = %needle, key = %key, "identifier match");
                return Ok(mapped(key, descriptor));
            }
        }
    }

    // Stage 3: context hints narrow the candidate set before fuzzy logic.
    if target.container_hint.is_some() || target.position_hint.is_some() {
        if let Some(resolution) = resolve_with_hints(mapping, target, &wanted, min_confidence)? {
            return Ok(resolution);
        }
    }

    // Stage 4: fuzzy scoring over every key.
    let all: Vec<(&String, &Descriptor)> = mapping.iter().collect();
    if let Some(resolution) = fuzzy_pick(&all, &target.target_text, &wanted, min_confidence)? {
        return Ok(resolution);
    }

    // Stage 5: single-word identifiers like "emailAddress" against keys
    // like "Email Address". Needs the raw text, case splits matter.
    if !wanted.contains(' ') {
        if let Some(resolution) = part_pick(&all, target.target_text.trim()) {
            return Ok(resolution);
        }
    }

    // Stage 6: let the executor probe the page directly.
    if identifier_shaped {
        let needle = target.target_text.trim().to_string();
        tracing::debug!(target = %needle, "no mapping match, returning direct probes");
        return Ok(Resolution::Direct {
            selectors: vec![
                format!("#{}", needle),
                format!("[name=\"{}\"]", needle),
                format!("[id=\"{}\"]", needle),
            ],
        });
    }

    Err(EngineError::ElementNotFound {
        target: target.target_text.clone(),
        candidates: mapping.keys(),
    })
}

fn mapped(key: &str, descriptor: &Descriptor) -> Resolution {
    Resolution::Mapped {
        key: key.to_string(),
        descriptor: descriptor.clone(),
    }
}

fn normalize_key(s: &str) -> String {
    s.trim().to_lowercase()
}

/// The key text without a trailing disambiguation suffix like
/// "(in Billing)" or "(item 2 of 3)".
fn base_key(key: &str) -> &str {
    match key.rfind(" (") {
        Some(idx) if key.ends_with(')') => &key[..idx],
        _ => key,
    }
}

fn is_identifier_shaped(s: &str) -> bool {
    let stripped: String = s.trim().chars().filter(|c| *c != '_' && *c != '-').collect();
    !stripped.is_empty() && stripped.chars().all(|c| c.is_ascii_alphanumeric())
}

fn selector_mentions(descriptor: &Descriptor, needle: &str) -> bool {
    let id_form = format!("#{}", needle);
    let name_form = format!("[name=\"{}\"]", needle);
    let id_attr_form = format!("[id=\"{}\"]", needle);
    descriptor.selectors.chain().iter().any(|sel| {
        sel.contains(&id_form) || sel.contains(&name_form) || sel.contains(&id_attr_form)
    })
}

fn resolve_with_hints(
    mapping: &SemanticMapping,
    target: &Target,
    wanted: &str,
    min_confidence: f64,
) -> Result<Option<Resolution>> {
    let container = target.container_hint.as_deref().map(normalize_key);
    let position = target.position_hint.as_deref().map(normalize_key);

    let filtered: Vec<(&String, &Descriptor)> = mapping
        .iter()
        .filter(|(key, descriptor)| {
            let key_lower = normalize_key(key);
            let container_ok = container.as_deref().map(|hint| {
                key_lower.contains(hint)
                    || descriptor
                        .container_text
                        .as_deref()
                        .map(|c| normalize_key(c).contains(hint))
                        .unwrap_or(false)
            });
            let position_ok = position.as_deref().map(|hint| key_lower.contains(hint));
            container_ok.unwrap_or(true) && position_ok.unwrap_or(true)
        })
        .collect();

    if filtered.is_empty() {
        return Ok(None);
    }

    // Within the filtered set an exact match on the undecorated key text
    // is authoritative.
    for (key, descriptor) in &filtered {
        if normalize_key(base_key(key)) == wanted {
            tracing::debug!(target = %target.target_text, key = %key, "hint match");
            return Ok(Some(mapped(key, descriptor)));
        }
    }

    fuzzy_pick(&filtered, &target.target_text, wanted, min_confidence)
}

fn fuzzy_pick(
    candidates: &[(&String, &Descriptor)],
    target_text: &str,
    wanted: &str,
    min_confidence: f64,
) -> Result<Option<Resolution>> {
    let mut best_score = 0.0_f64;
    let mut best: Vec<(&String, &Descriptor)> = Vec::new();

    for (key, descriptor) in candidates {
        let score = match_score(wanted, key);
        if score < min_confidence {
            continue;
        }
        if score > best_score + SCORE_EPSILON {
            best_score = score;
            best = vec![(key, descriptor)];
        } else if (score - best_score).abs() <= SCORE_EPSILON {
            best.push((key, descriptor));
        }
    }

    match best.len() {
        0 => Ok(None),
        1 => {
            let (key, descriptor) = best[0];
            tracing::debug!(target = %target_text, key = %key, score = best_score, "fuzzy match");
            Ok(Some(mapped(key, descriptor)))
        }
        _ => {
            // Equal scores: prefer the shorter key; a length tie is a real
            // ambiguity the workflow must resolve with hints.
            let min_len = best.iter().map(|(k, _)| k.chars().count()).min().unwrap_or(0);
            let shortest: Vec<(&String, &Descriptor)> = best
                .iter()
                .filter(|(k, _)| k.chars().count() == min_len)
                .copied()
                .collect();
            if shortest.len() == 1 {
                let (key, descriptor) = shortest[0];
                tracing::debug!(target = %target_text, key = %key, score = best_score, "fuzzy match (shortest)");
                Ok(Some(mapped(key, descriptor)))
            } else {
                Err(EngineError::AmbiguousMatch {
                    target: target_text.to_string(),
                    candidates: shortest.iter().map(|(k, _)| (*k).clone()).collect(),
                })
            }
        }
    }
}

/// Combined score: substring containment (both directions, against the
/// full and the undecorated key), token overlap, and Jaccard similarity.
fn match_score(wanted: &str, key: &str) -> f64 {
    let key_full = normalize_key(key);
    let key_base = normalize_key(base_key(key));

    let mut scores = Vec::new();
    for candidate in [key_full.as_str(), key_base.as_str()] {
        if candidate.is_empty() {
            continue;
        }
        if candidate.contains(wanted) {
            scores.push(wanted.chars().count() as f64 / candidate.chars().count() as f64);
        }
        if wanted.contains(candidate) {
            scores.push(candidate.chars().count() as f64 / wanted.chars().count() as f64);
        }
    }

    let target_words: HashSet<&str> = wanted.split_whitespace().collect();
    let key_words: HashSet<&str> = key_full.split_whitespace().collect();
    if !target_words.is_empty() && !key_words.is_empty() {
        let intersection = target_words.intersection(&key_words).count() as f64;
        let union = target_words.union(&key_words).count() as f64;
        if union > 0.0 {
            scores.push(intersection / union);
        }
        scores.push(intersection / target_words.len().max(key_words.len()) as f64);
    }

    scores.into_iter().fold(0.0, f64::max)
}

fn word_parts_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[a-z]+|[A-Z][a-z]*|[0-9]+").expect("valid regex"))
}

/// "emailAddress" / "email_address" split into parts and checked against
/// each key's text.
fn part_pick<'a>(candidates: &[(&'a String, &'a Descriptor)], wanted: &str) -> Option<Resolution> {
    let parts: Vec<String> = word_parts_re()
        .find_iter(wanted)
        .map(|m| m.as_str().to_lowercase())
        .filter(|p| !p.is_empty())
        .collect();
    if parts.len() < 2 {
        return None;
    }

    let mut best_score = 0.0_f64;
    let mut best: Option<(&String, &Descriptor)> = None;

    for (key, descriptor) in candidates {
        let key_lower = normalize_key(key);
        let found = parts.iter().filter(|p| key_lower.contains(p.as_str())).count();
        let ratio = found as f64 / parts.len() as f64;
        if ratio >= PART_MATCH_RATIO && ratio > best_score {
            best_score = ratio;
            best = Some((key, descriptor));
        }
    }

    best.map(|(key, descriptor)| {
        tracing::debug!(key = %key, score = best_score, "identifier-part match");
        mapped(key, descriptor)
    })
}
