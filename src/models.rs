use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Two-valued encoding of a round outcome
///
/// `A` is the "big" side (Tài), `B` the "small" side (Xỉu).
/// Symbols order `A < B`, which fixes pattern-table iteration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Symbol {
    A,
    B,
}

/// Character encoding of the two symbols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolAlphabet {
    pub a: char,
    pub b: char,
}

impl Default for SymbolAlphabet {
    fn default() -> Self {
        Self { a: 'T', b: 'X' }
    }
}

impl SymbolAlphabet {
    pub fn encode(&self, symbol: Symbol) -> char {
        match symbol {
            Symbol::A => self.a,
            Symbol::B => self.b,
        }
    }

    /// Decode a single character, case-insensitively
    pub fn decode(&self, c: char) -> Option<Symbol> {
        if c.eq_ignore_ascii_case(&self.a) {
            Some(Symbol::A)
        } else if c.eq_ignore_ascii_case(&self.b) {
            Some(Symbol::B)
        } else {
            None
        }
    }

    /// Render a symbol sequence as a string
    pub fn render(&self, symbols: &[Symbol]) -> String {
        symbols.iter().map(|s| self.encode(*s)).collect()
    }

    /// Parse a whole string; `None` if any character is outside the alphabet
    pub fn parse(&self, text: &str) -> Option<Vec<Symbol>> {
        text.chars().map(|c| self.decode(c)).collect()
    }
}

/// Opaque round identifier as reported by an upstream source
///
/// Upstreams send either strings or numbers; both are kept in their
/// canonical string form so `12345` and `"12345"` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoundId(String);

impl RoundId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build from a loose JSON value. Null, blank strings and
    /// non-scalar values are not round ids.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(Self(trimmed.to_string()))
                }
            }
            serde_json::Value::Number(n) => Some(Self(n.to_string())),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoundId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<u64> for RoundId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

impl Serialize for RoundId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for RoundId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        RoundId::from_json(&value)
            .ok_or_else(|| serde::de::Error::custom("round id must be a non-empty string or a number"))
    }
}

/// Per-game symbol history plus the last applied round
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameStream {
    /// Oldest first
    pub history: Vec<Symbol>,
    pub last_round_id: Option<RoundId>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Result of a prediction query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    /// 0-100
    pub confidence: u8,
    /// Length of the matched tail (0 when there is no signal)
    pub matched_length: usize,
    /// The rule pattern that fired, rendered with the alphabet
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl Prediction {
    pub fn no_signal(label: &str, baseline: u8) -> Self {
        Self {
            label: label.to_string(),
            confidence: baseline,
            matched_length: 0,
            pattern: None,
        }
    }

    pub fn is_signal(&self) -> bool {
        self.matched_length > 0
    }
}

/// Recommended dice-sum positions, held for the duration of a round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionPick {
    /// Sorted ascending, distinct
    pub values: Vec<u8>,
    pub label: String,
    pub round_id: Option<RoundId>,
}

/// Latest tuple seen from an upstream source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub raw_label: Option<String>,
    pub round_id: Option<RoundId>,
    /// Sum of the three dice of the previous round (sicbo only)
    pub total: Option<u8>,
    pub dice: Option<[u8; 3]>,
    pub observed_at: Option<DateTime<Utc>>,
}

/// Combined per-game view served to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub game: String,
    pub round_id: Option<RoundId>,
    pub history: String,
    pub predicted_label: String,
    pub confidence: u8,
    pub matched_length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub positions: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_total: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dice: Option<[u8; 3]>,
}
