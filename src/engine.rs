use crate::models::{Prediction, Symbol, SymbolAlphabet};
use crate::patterns::PatternTable;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Label returned when no pattern matches
pub const DEFAULT_NO_SIGNAL_LABEL: &str = "Chờ cầu";

/// Default denominator of the proportional confidence curve
pub const DEFAULT_CONFIDENCE_SCALE: usize = 9;

/// How a rule is compared against the tail of the history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// History must end with the rule's full pattern
    #[default]
    Suffix,
    /// The rule's pattern must end with the history tail of the probed length
    TailOverlap,
}

/// Maps a matched length to a confidence score in [0, 100]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum ConfidencePolicy {
    /// round(100 * len / scale)
    Proportional { scale: usize },
    /// `ceiling` once `len >= min_len`, linear ramp below
    Ceiling { min_len: usize, ceiling: u8 },
    /// Uniform in [min, max] on any match, unrelated to match quality
    Randomized { min: u8, max: u8 },
}

impl Default for ConfidencePolicy {
    fn default() -> Self {
        ConfidencePolicy::Proportional {
            scale: DEFAULT_CONFIDENCE_SCALE,
        }
    }
}

impl ConfidencePolicy {
    /// Confidence for a match of `len` symbols (`len >= 1`)
    pub fn score<R: Rng + ?Sized>(&self, len: usize, rng: &mut R) -> u8 {
        let value = match *self {
            ConfidencePolicy::Proportional { scale } => {
                let scale = scale.max(1) as f64;
                (len as f64 / scale * 100.0).round()
            }
            ConfidencePolicy::Ceiling { min_len, ceiling } => {
                let ceiling = ceiling.min(100) as f64;
                if len >= min_len.max(1) {
                    ceiling
                } else {
                    (ceiling * len as f64 / min_len as f64).round()
                }
            }
            ConfidencePolicy::Randomized { min, max } => {
                let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
                rng.gen_range(lo.min(100)..=hi.min(100)) as f64
            }
        };
        value.clamp(0.0, 100.0) as u8
    }
}

/// Engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub match_mode: MatchMode,
    pub confidence: ConfidencePolicy,
    /// Longest tail probed; `None` means the longest pattern in the table
    pub max_pattern_len: Option<usize>,
    pub baseline_confidence: u8,
    pub no_signal_label: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            match_mode: MatchMode::Suffix,
            confidence: ConfidencePolicy::default(),
            max_pattern_len: None,
            baseline_confidence: 0,
            no_signal_label: DEFAULT_NO_SIGNAL_LABEL.to_string(),
        }
    }
}

/// Longest-suffix pattern matcher
#[derive(Debug, Clone, Default)]
pub struct PredictionEngine {
    config: EngineConfig,
    alphabet: SymbolAlphabet,
}

impl PredictionEngine {
    pub fn new(config: EngineConfig, alphabet: SymbolAlphabet) -> Self {
        Self { config, alphabet }
    }

    pub fn no_signal(&self) -> Prediction {
        Prediction::no_signal(&self.config.no_signal_label, self.config.baseline_confidence)
    }

    pub fn predict(&self, history: &[Symbol], table: &PatternTable) -> Prediction {
        self.predict_with_rng(history, table, &mut rand::thread_rng())
    }

    /// Probe tails from the longest configured length down to 1; the first
    /// rule that matches wins. Equal-length conflicts resolve to the first
    /// rule in table order.
    pub fn predict_with_rng<R: Rng + ?Sized>(
        &self,
        history: &[Symbol],
        table: &PatternTable,
        rng: &mut R,
    ) -> Prediction {
        if history.is_empty() || table.is_empty() {
            return self.no_signal();
        }

        let max_len = self
            .config
            .max_pattern_len
            .unwrap_or_else(|| table.max_pattern_len())
            .min(history.len());

        for len in (1..=max_len).rev() {
            let tail = &history[history.len() - len..];
            if let Some((pattern, label)) = self.find_rule(tail, table) {
                let confidence = self
                    .config
                    .confidence
                    .score(len, rng)
                    .max(self.config.baseline_confidence);
                return Prediction {
                    label: label.to_string(),
                    confidence,
                    matched_length: len,
                    pattern: Some(self.alphabet.render(pattern)),
                };
            }
        }

        self.no_signal()
    }

    fn find_rule<'a>(&self, tail: &'a [Symbol], table: &'a PatternTable) -> Option<(&'a [Symbol], &'a str)> {
        match self.config.match_mode {
            MatchMode::Suffix => table.get(tail).map(|label| (tail, label)),
            MatchMode::TailOverlap => table
                .iter()
                .find(|rule| rule.pattern.ends_with(tail))
                .map(|rule| (rule.pattern, rule.label)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ab() -> SymbolAlphabet {
        SymbolAlphabet { a: 'A', b: 'B' }
    }

    fn history(s: &str) -> Vec<Symbol> {
        ab().parse(s).unwrap()
    }

    fn table(raw: &str) -> PatternTable {
        PatternTable::parse(raw, &ab())
    }

    fn engine(mode: MatchMode) -> PredictionEngine {
        PredictionEngine::new(
            EngineConfig {
                match_mode: mode,
                ..EngineConfig::default()
            },
            ab(),
        )
    }

    #[test]
    fn test_suffix_match_beats_baseline() {
        let prediction = engine(MatchMode::Suffix).predict(&history("AABAB"), &table(r#"{"BAB": "X"}"#));
        assert_eq!(prediction.label, "X");
        assert_eq!(prediction.matched_length, 3);
        assert_eq!(prediction.pattern.as_deref(), Some("BAB"));
        // 3 / 9 * 100 = 33.3
        assert_eq!(prediction.confidence, 33);
        assert!(prediction.confidence > EngineConfig::default().baseline_confidence);
    }

    #[test]
    fn test_longest_suffix_wins() {
        let rules = table(r#"{"B": "short", "AB": "mid", "BAB": "long", "AAAAB": "none"}"#);
        let prediction = engine(MatchMode::Suffix).predict(&history("AABAB"), &rules);
        assert_eq!(prediction.label, "long");
    }

    #[test]
    fn test_no_signal_on_empty_inputs() {
        let e = engine(MatchMode::Suffix);
        let empty_table = e.predict(&history("ABAB"), &PatternTable::new());
        assert_eq!(empty_table.label, DEFAULT_NO_SIGNAL_LABEL);
        assert_eq!(empty_table.confidence, 0);
        assert!(!empty_table.is_signal());

        let empty_history = e.predict(&[], &table(r#"{"A": "X"}"#));
        assert_eq!(empty_history.label, DEFAULT_NO_SIGNAL_LABEL);
    }

    #[test]
    fn test_suffix_needs_full_pattern() {
        // History shorter than every pattern never matches in suffix mode
        let prediction = engine(MatchMode::Suffix).predict(&history("AB"), &table(r#"{"BAB": "X"}"#));
        assert!(!prediction.is_signal());
    }

    #[test]
    fn test_tail_overlap_matches_partial_agreement() {
        // "ABBA" is not a suffix of the history, but it ends with the tail "BA"
        let rules = table(r#"{"ABBA": "X"}"#);
        let h = history("AAABA");

        assert!(!engine(MatchMode::Suffix).predict(&h, &rules).is_signal());

        let prediction = engine(MatchMode::TailOverlap).predict(&h, &rules);
        assert_eq!(prediction.label, "X");
        assert_eq!(prediction.matched_length, 2);
        assert_eq!(prediction.pattern.as_deref(), Some("ABBA"));
    }

    #[test]
    fn test_tail_overlap_tie_break_is_lexicographic() {
        let rules = table(r#"{"BBA": "second", "ABA": "first"}"#);
        let prediction = engine(MatchMode::TailOverlap).predict(&history("BBBA"), &rules);
        // Longest probe is 3 ("BBA"), only the second rule ends with it
        assert_eq!(prediction.label, "second");
        assert_eq!(prediction.matched_length, 3);

        let prediction = engine(MatchMode::TailOverlap).predict(&history("AABA"), &rules);
        assert_eq!(prediction.label, "first");

        let prediction = engine(MatchMode::TailOverlap).predict(&history("A"), &rules);
        assert_eq!(prediction.label, "first");
        assert_eq!(prediction.matched_length, 1);
    }

    #[test]
    fn test_max_pattern_len_caps_probe() {
        let e = PredictionEngine::new(
            EngineConfig {
                max_pattern_len: Some(2),
                ..EngineConfig::default()
            },
            ab(),
        );
        let rules = table(r#"{"BAB": "long", "AB": "short"}"#);
        assert_eq!(e.predict(&history("BAB"), &rules).label, "short");
    }

    #[test]
    fn test_proportional_confidence_is_monotonic_and_bounded() {
        let mut rng = StdRng::seed_from_u64(7);
        let policy = ConfidencePolicy::default();
        let scores: Vec<u8> = (1..=12).map(|len| policy.score(len, &mut rng)).collect();
        assert!(scores.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(policy.score(9, &mut rng), 100);
        assert_eq!(policy.score(12, &mut rng), 100);
    }

    #[test]
    fn test_ceiling_confidence() {
        let mut rng = StdRng::seed_from_u64(7);
        let policy = ConfidencePolicy::Ceiling { min_len: 4, ceiling: 90 };
        assert_eq!(policy.score(2, &mut rng), 45);
        assert_eq!(policy.score(4, &mut rng), 90);
        assert_eq!(policy.score(7, &mut rng), 90);
    }

    #[test]
    fn test_randomized_confidence_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(42);
        let policy = ConfidencePolicy::Randomized { min: 60, max: 85 };
        for len in 1..20 {
            let score = policy.score(len, &mut rng);
            assert!((60..=85).contains(&score));
        }
    }

    #[test]
    fn test_confidence_policy_from_yaml() {
        let policy: ConfidencePolicy = serde_yaml::from_str("policy: ceiling\nmin_len: 3\nceiling: 80\n").unwrap();
        assert_eq!(policy, ConfidencePolicy::Ceiling { min_len: 3, ceiling: 80 });
    }
}
