//! Deterministic collection helpers shared by the analyzers.

use std::collections::BTreeSet;
use std::collections::HashSet;

use regex::Regex;

/// Compile a static pattern, panicking on a malformed literal.
///
/// Only ever called with compile-time constant patterns.
pub fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static pattern must compile")
}

/// Sort ascending and drop duplicates and empty strings.
pub fn sorted_unique<I>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    values
        .into_iter()
        .filter(|value| !value.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Deduplicate while keeping first-occurrence order.
pub fn unique_ordered<I>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|value| seen.insert(value.clone()))
        .collect()
}

/// Insertion-ordered signal list with a hard cap.
///
/// Mirrors the shape every analyzer uses for its `signals` output: first
/// occurrence wins, later duplicates and overflow pushes are ignored.
#[derive(Debug)]
pub struct SignalList {
    cap: usize,
    seen: HashSet<String>,
    items: Vec<String>,
}

impl SignalList {
    pub fn new(cap: usize) -> Self {
        Self { cap, seen: HashSet::new(), items: Vec::new() }
    }

    pub fn push(&mut self, signal: impl Into<String>) {
        let signal = signal.into();
        if self.seen.len() >= self.cap || self.seen.contains(&signal) {
            return;
        }
        self.seen.insert(signal.clone());
        self.items.push(signal);
    }

    pub fn extend<I: IntoIterator<Item = String>>(&mut self, signals: I) {
        for signal in signals {
            self.push(signal);
        }
    }

    pub fn into_vec(self) -> Vec<String> {
        self.items
    }
}

/// Strip `[brackets]` or `"quotes"` from a single identifier part.
pub fn clean_identifier(part: &str) -> &str {
    let part = part.trim();
    if part.len() > 1 && part.starts_with('[') && part.ends_with(']') {
        return &part[1..part.len() - 1];
    }
    if part.len() > 1 && part.starts_with('"') && part.ends_with('"') {
        return &part[1..part.len() - 1];
    }
    part
}

/// Split a dotted object name into cleaned parts, optionally ASCII-lowercased.
pub fn split_name(name: &str, case_insensitive: bool) -> Vec<String> {
    name.split('.')
        .filter(|part| !part.trim().is_empty())
        .map(|part| {
            let cleaned = clean_identifier(part);
            if case_insensitive { cleaned.to_ascii_lowercase() } else { cleaned.to_string() }
        })
        .collect()
}

/// Normalized dotted form used as the equality key in call resolution.
pub fn normalize_full_name(name: &str, case_insensitive: bool) -> String {
    split_name(name, case_insensitive).join(".")
}

/// `(schema, base)` view of a possibly-qualified name. Schema is the
/// second-to-last part when present.
pub fn split_schema_and_base(name: &str, case_insensitive: bool) -> (Option<String>, String) {
    let parts = split_name(name, case_insensitive);
    match parts.len() {
        0 => (None, String::new()),
        1 => (None, parts[0].clone()),
        n => (Some(parts[n - 2].clone()), parts[n - 1].clone()),
    }
}
