use crate::models::Symbol;

/// Keywords that mark the "small" side when no configuration is given
pub const DEFAULT_SMALL_KEYWORDS: &[&str] = &["xỉu", "xiu", "small"];

/// Maps raw upstream result labels to symbols
///
/// Any configured keyword found in the lowercased label selects `Symbol::B`,
/// everything else (including an empty label) is `Symbol::A`.
#[derive(Debug, Clone)]
pub struct RoundClassifier {
    small_keywords: Vec<String>,
}

impl Default for RoundClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_SMALL_KEYWORDS.iter().map(|s| s.to_string()))
    }
}

impl RoundClassifier {
    pub fn new<I>(keywords: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let small_keywords = keywords
            .into_iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self { small_keywords }
    }

    pub fn classify(&self, raw_label: &str) -> Symbol {
        let label = raw_label.to_lowercase();
        if self.small_keywords.iter().any(|k| label.contains(k.as_str())) {
            Symbol::B
        } else {
            Symbol::A
        }
    }

    pub fn keywords(&self) -> &[String] {
        &self.small_keywords
    }
}
