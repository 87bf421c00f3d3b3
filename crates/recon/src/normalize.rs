//! Record → canonical identity key.
//!
//! A key is the space-joined, normalized value of each configured identity
//! field. Normalization is pure and idempotent: feeding a key back through
//! [`normalize_value`] returns it unchanged.

use crate::config::IdentityField;
use crate::model::Record;

/// Options that shape key derivation for one run.
#[derive(Debug, Clone)]
pub struct KeySpec {
    pub identity: Vec<IdentityField>,
    /// Rewrite `"Doe, Jane"` as `"Jane Doe"` in the first identity slot.
    pub swap_comma_names: bool,
}

impl KeySpec {
    pub fn new(identity: Vec<IdentityField>) -> Self {
        Self {
            identity,
            swap_comma_names: true,
        }
    }
}

/// Trim, lower-case, strip punctuation, collapse whitespace.
///
/// Characters that carry meaning in contact fields (`@ . + - _ '`) survive
/// so emails keep their shape.
pub fn normalize_value(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || is_kept_punct(*c))
        .collect();
    collapse_whitespace(&cleaned)
}

fn is_kept_punct(c: char) -> bool {
    matches!(c, '@' | '.' | '+' | '-' | '_' | '\'')
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `"Doe, Jane"` → `"Jane Doe"`. Anything without exactly one comma is
/// returned as-is.
fn swap_comma_name(raw: &str) -> String {
    let mut parts = raw.split(',');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(last), Some(first), None) if !first.trim().is_empty() => {
            format!("{} {}", first.trim(), last.trim())
        }
        _ => raw.to_string(),
    }
}

/// Value for one identity slot: first alternative whose joined columns are
/// non-empty after normalization, else empty.
fn slot_value(record: &Record, field: &IdentityField, swap_comma: bool) -> String {
    for alternative in &field.any_of {
        let joined = alternative
            .iter()
            .filter_map(|column| record.get(column))
            .map(|v| v.as_text())
            .collect::<Vec<_>>()
            .join(" ");
        let joined = if swap_comma { swap_comma_name(&joined) } else { joined };
        let value = normalize_value(&joined);
        if !value.is_empty() {
            return value;
        }
    }
    String::new()
}

/// Derive the canonical key of a record. Empty means the record carries no
/// identity at all and must be treated as invalid by the caller.
pub fn canonical_key(record: &Record, spec: &KeySpec) -> String {
    let slots: Vec<String> = spec
        .identity
        .iter()
        .enumerate()
        .map(|(i, field)| slot_value(record, field, spec.swap_comma_names && i == 0))
        .collect();
    collapse_whitespace(&slots.join(" "))
}
