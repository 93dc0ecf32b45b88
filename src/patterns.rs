//! Pattern tables: per-game mapping from a symbol pattern to a predicted label
//!
//! Tables are loaded once from static files and never change afterwards.
//! Two file formats are accepted:
//! - a JSON object `{"TXT": "Tài", ...}`
//! - plain text, one rule per line, `TXT=Tài` or `"TXT": "Tài",`
//!
//! Malformed entries are skipped. A missing or unreadable file yields an
//! empty table, which always predicts the no-signal sentinel.

use crate::models::{Symbol, SymbolAlphabet};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// A single pattern rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternRule<'a> {
    pub pattern: &'a [Symbol],
    pub label: &'a str,
}

/// Immutable pattern table for one game
///
/// Rules iterate in lexicographic order over the pattern (`A < B`,
/// shorter prefixes first), which is the tie-break order of the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternTable {
    rules: BTreeMap<Vec<Symbol>, String>,
}

impl PatternTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, pattern: Vec<Symbol>, label: String) -> bool {
        if pattern.is_empty() || label.trim().is_empty() {
            return false;
        }
        self.rules.insert(pattern, label.trim().to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Length of the longest pattern (0 for an empty table)
    pub fn max_pattern_len(&self) -> usize {
        self.rules.keys().map(|p| p.len()).max().unwrap_or(0)
    }

    /// Exact lookup of a full pattern
    pub fn get(&self, pattern: &[Symbol]) -> Option<&str> {
        self.rules.get(pattern).map(|s| s.as_str())
    }

    /// All rules in match order
    pub fn iter(&self) -> impl Iterator<Item = PatternRule<'_>> {
        self.rules.iter().map(|(pattern, label)| PatternRule {
            pattern: pattern.as_slice(),
            label: label.as_str(),
        })
    }

    /// Parse file contents, trying JSON first and falling back to text
    pub fn parse(raw: &str, alphabet: &SymbolAlphabet) -> Self {
        let raw = raw.trim();
        if raw.starts_with('{') {
            match serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(raw) {
                Ok(map) => return Self::from_json_map(map, alphabet),
                Err(e) => debug!("Pattern source is not valid JSON ({}), parsing as text", e),
            }
        }
        Self::parse_text(raw, alphabet)
    }

    fn from_json_map(map: serde_json::Map<String, serde_json::Value>, alphabet: &SymbolAlphabet) -> Self {
        let mut table = Self::new();
        let mut skipped = 0usize;

        for (key, value) in map {
            let accepted = match (alphabet.parse(key.trim()), value.as_str()) {
                (Some(pattern), Some(label)) => table.insert(pattern, label.to_string()),
                _ => false,
            };
            if !accepted {
                skipped += 1;
            }
        }

        if skipped > 0 {
            warn!("Skipped {} malformed pattern entries", skipped);
        }
        table
    }

    fn parse_text(raw: &str, alphabet: &SymbolAlphabet) -> Self {
        let mut table = Self::new();
        let mut skipped = 0usize;

        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() || line == "{" || line == "}" || line.starts_with('#') {
                continue;
            }

            let accepted = match split_rule(line) {
                Some((key, value)) => match alphabet.parse(&key) {
                    Some(pattern) => table.insert(pattern, value),
                    None => false,
                },
                None => false,
            };
            if !accepted {
                skipped += 1;
            }
        }

        if skipped > 0 {
            warn!("Skipped {} malformed pattern lines", skipped);
        }
        table
    }

    /// Load a table from disk, degrading to an empty table on any failure
    pub fn load(path: &Path, alphabet: &SymbolAlphabet) -> Self {
        match std::fs::read_to_string(path) {
            Ok(raw) => {
                let table = Self::parse(&raw, alphabet);
                info!(
                    "Loaded {} patterns from {} (longest {})",
                    table.len(),
                    path.display(),
                    table.max_pattern_len()
                );
                table
            }
            Err(e) => {
                warn!("Failed to read pattern table {}: {} - using empty table", path.display(), e);
                Self::new()
            }
        }
    }
}

/// Split `key=value` or `key:value`, stripping quotes and trailing commas
fn split_rule(line: &str) -> Option<(String, String)> {
    let (key, value) = line.split_once('=').or_else(|| line.split_once(':'))?;

    let clean = |s: &str| {
        s.trim()
            .trim_end_matches(',')
            .replace('"', "")
            .trim()
            .to_string()
    };

    let key = clean(key);
    let value = clean(value);
    if key.is_empty() || value.is_empty() {
        return None;
    }
    Some((key, value))
}
