use crate::classifier::DEFAULT_SMALL_KEYWORDS;
use crate::engine::{ConfidencePolicy, EngineConfig};
use crate::models::SymbolAlphabet;
use crate::positions::{OutcomeLabels, PositionConfig, Side};
use crate::store::DEFAULT_RETENTION;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Service configuration loaded from YAML file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub server: ServerConfig,
    pub polling: PollingConfig,
    pub storage: StorageConfig,
    pub classifier: ClassifierConfig,
    pub alphabet: SymbolAlphabet,
    pub labels: OutcomeLabels,
    pub prediction: EngineConfig,
    pub positions: PositionConfig,
    pub games: Vec<GameConfig>,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// How often each upstream is fetched (ms)
    pub interval_ms: u64,
    /// Upstream request timeout (ms)
    pub request_timeout_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 3000,
            request_timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding one JSON record per game
    pub state_dir: PathBuf,
    /// Symbols kept per game; `null` keeps everything
    pub retention: Option<usize>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from("data/state"),
            retention: Some(DEFAULT_RETENTION),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Lowercase substrings that mark the small side
    pub small_keywords: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            small_keywords: DEFAULT_SMALL_KEYWORDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// One upstream game
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    pub id: String,
    pub source_url: String,
    /// Pattern table file
    pub patterns: PathBuf,
    /// Emits dice-sum positions alongside the prediction
    #[serde(default)]
    pub positions: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Used when RUST_LOG is not set
    pub level: String,
    /// One JSON object per line instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

fn default_games() -> Vec<GameConfig> {
    vec![
        GameConfig {
            id: "sicbo".to_string(),
            source_url: "https://sicsun-9wes.onrender.com/predict".to_string(),
            patterns: PathBuf::from("patterns/ttoansicbo.txt"),
            positions: true,
        },
        GameConfig {
            id: "luck".to_string(),
            source_url: "https://luckywingugu.onrender.com/luck/md5".to_string(),
            patterns: PathBuf::from("patterns/ttoanluck.txt"),
            positions: false,
        },
        GameConfig {
            id: "lc".to_string(),
            source_url: "https://lc79md5-lun8.onrender.com/lc79/md5".to_string(),
            patterns: PathBuf::from("patterns/ttoanlc.txt"),
            positions: false,
        },
    ]
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            polling: PollingConfig::default(),
            storage: StorageConfig::default(),
            classifier: ClassifierConfig::default(),
            alphabet: SymbolAlphabet::default(),
            labels: OutcomeLabels::default(),
            prediction: EngineConfig::default(),
            positions: PositionConfig::default(),
            games: default_games(),
            logging: LoggingConfig::default(),
        }
    }
}

impl OracleConfig {
    /// Load configuration from YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: OracleConfig = serde_yaml::from_str(&contents)
            .with_context(|| "Failed to parse YAML configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Load with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Load the file if it exists, otherwise fall back to defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_with_env(path)
        } else {
            let mut config = Self::default();
            config.apply_env();
            config.validate()?;
            Ok(config)
        }
    }

    fn apply_env(&mut self) {
        if let Ok(val) = std::env::var("PORT") {
            self.server.port = val.parse().unwrap_or(self.server.port);
        }
        if let Ok(val) = std::env::var("ORACLE_STATE_DIR") {
            self.storage.state_dir = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("ORACLE_POLL_INTERVAL_MS") {
            self.polling.interval_ms = val.parse().unwrap_or(self.polling.interval_ms);
        }
        if let Ok(val) = std::env::var("ORACLE_RETENTION") {
            self.storage.retention = parse_retention(&val).unwrap_or(self.storage.retention);
        }
    }

    /// Reject configurations the core cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.games.is_empty() {
            bail!("No games configured");
        }

        let mut seen = HashSet::new();
        for game in &self.games {
            let valid_id = !game.id.is_empty()
                && game
                    .id
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
            if !valid_id {
                bail!("Invalid game id {:?}: use ASCII letters, digits, '_' or '-'", game.id);
            }
            if !seen.insert(game.id.as_str()) {
                bail!("Duplicate game id: {}", game.id);
            }
        }

        if self.alphabet.a.to_ascii_lowercase() == self.alphabet.b.to_ascii_lowercase() {
            bail!("Alphabet characters must differ (got {:?} twice)", self.alphabet.a);
        }
        if self.labels.a.trim() == self.labels.b.trim() {
            bail!("Outcome labels must differ (got {:?} twice)", self.labels.a);
        }
        if self.storage.retention == Some(0) {
            bail!("storage.retention must be positive or null for unbounded");
        }
        if self.positions.picks == 0 {
            bail!("positions.picks must be positive");
        }
        if self.positions.a_min > self.positions.a_max || self.positions.b_min > self.positions.b_max {
            bail!("Position ranges must have min <= max");
        }
        for side in [Side::A, Side::B] {
            let size = self.positions.domain(side).count();
            if self.positions.picks >= size {
                bail!(
                    "positions.picks ({}) must be smaller than the {:?} range ({} values)",
                    self.positions.picks,
                    side,
                    size
                );
            }
        }

        // A one-symbol match has the lowest score, and it must still stand
        // out from the no-signal baseline
        let policy = self.prediction.confidence;
        if !matches!(policy, ConfidencePolicy::Randomized { .. }) {
            let weakest = policy.score(1, &mut rand::thread_rng());
            if weakest <= self.prediction.baseline_confidence {
                bail!(
                    "prediction.baseline_confidence ({}) must be below the score of a one-symbol match ({})",
                    self.prediction.baseline_confidence,
                    weakest
                );
            }
        }
        Ok(())
    }

    pub fn game(&self, id: &str) -> Option<&GameConfig> {
        self.games.iter().find(|g| g.id == id)
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.polling.interval_ms.max(100))
    }
}

/// `"unbounded"`/`"none"` → unbounded, a positive number → cap
fn parse_retention(val: &str) -> Option<Option<usize>> {
    match val.trim().to_lowercase().as_str() {
        "unbounded" | "none" | "null" => Some(None),
        other => other.parse::<usize>().ok().filter(|n| *n > 0).map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ConfidencePolicy, MatchMode};

    #[test]
    fn test_default_config_is_valid() {
        let config = OracleConfig::default();
        config.validate().unwrap();
        assert_eq!(config.games.len(), 3);
        assert!(config.game("sicbo").unwrap().positions);
        assert_eq!(config.storage.retention, Some(9));
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = r#"
storage:
  state_dir: /tmp/oracle
  retention: null
prediction:
  match_mode: tail_overlap
  confidence:
    policy: ceiling
    min_len: 4
    ceiling: 85
games:
  - id: sicbo
    source_url: http://localhost:9000/predict
    patterns: patterns/sicbo.json
    positions: true
"#;
        let config: OracleConfig = serde_yaml::from_str(yaml).unwrap();
        config.validate().unwrap();

        assert_eq!(config.storage.retention, None);
        assert_eq!(config.prediction.match_mode, MatchMode::TailOverlap);
        assert_eq!(
            config.prediction.confidence,
            ConfidencePolicy::Ceiling { min_len: 4, ceiling: 85 }
        );
        assert_eq!(config.prediction.no_signal_label, "Chờ cầu");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.positions.picks, 4);
        assert_eq!(config.games.len(), 1);
    }

    #[test]
    fn test_validate_rejects_bad_games() {
        let mut config = OracleConfig::default();
        config.games[1].id = "sicbo".to_string();
        assert!(config.validate().is_err());

        let mut config = OracleConfig::default();
        config.games[0].id = "../etc".to_string();
        assert!(config.validate().is_err());

        let mut config = OracleConfig::default();
        config.games.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_baseline_at_or_above_match_score() {
        let mut config = OracleConfig::default();
        config.prediction.baseline_confidence = 50;
        assert!(config.validate().is_err());

        // round(100 / 9) = 11 is the weakest proportional score
        let mut config = OracleConfig::default();
        config.prediction.baseline_confidence = 11;
        assert!(config.validate().is_err());
        config.prediction.baseline_confidence = 10;
        config.validate().unwrap();

        let mut config = OracleConfig::default();
        config.prediction.confidence = ConfidencePolicy::Proportional { scale: 1000 };
        assert!(config.validate().is_err());

        let mut config = OracleConfig::default();
        config.prediction.confidence = ConfidencePolicy::Ceiling { min_len: 3, ceiling: 0 };
        assert!(config.validate().is_err());
        config.prediction.confidence = ConfidencePolicy::Ceiling { min_len: 3, ceiling: 90 };
        config.validate().unwrap();

        // Randomized scores are unrelated to match quality
        let mut config = OracleConfig::default();
        config.prediction.confidence = ConfidencePolicy::Randomized { min: 0, max: 10 };
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_requires_room_for_a_different_pick() {
        let mut config = OracleConfig::default();
        config.positions.picks = 9;
        assert!(config.validate().is_err());

        // Xỉu range 4..=10 has 7 values
        let mut config = OracleConfig::default();
        config.positions.picks = 7;
        assert!(config.validate().is_err());
        config.positions.picks = 6;
        config.validate().unwrap();

        let mut config = OracleConfig::default();
        config.positions.a_min = 11;
        config.positions.a_max = 14;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_retention() {
        assert_eq!(parse_retention("unbounded"), Some(None));
        assert_eq!(parse_retention("12"), Some(Some(12)));
        assert_eq!(parse_retention("0"), None);
        assert_eq!(parse_retention("abc"), None);
    }
}
