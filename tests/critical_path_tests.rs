//! Critical Path Tests for the streak oracle
//!
//! These tests drive the public API end to end:
//! 1. Exactly-once round application and restart recovery
//! 2. Retention (unbounded and capped)
//! 3. Suffix / tail-overlap matching and the no-signal fallback
//! 4. Round-stable, anti-repeat sicbo positions
//! 5. Unknown-game rejection
//!
//! Run with: cargo test --test critical_path_tests

use std::collections::BTreeMap;
use std::path::Path;

use rand::rngs::StdRng;
use rand::SeedableRng;
use streak_oracle::classifier::RoundClassifier;
use streak_oracle::config::{GameConfig, OracleConfig};
use streak_oracle::engine::{EngineConfig, MatchMode, PredictionEngine};
use streak_oracle::models::{Observation, RoundId, Symbol, SymbolAlphabet};
use streak_oracle::patterns::PatternTable;
use streak_oracle::positions::{OutcomeLabels, PositionConfig, PositionSelector};
use streak_oracle::{Oracle, OracleError};

fn ab() -> SymbolAlphabet {
    SymbolAlphabet { a: 'A', b: 'B' }
}

/// Config with A/B symbols, small = "small", one plain game and one sicbo game
fn test_config(state_dir: &Path, retention: Option<usize>) -> OracleConfig {
    let mut config = OracleConfig::default();
    config.storage.state_dir = state_dir.to_path_buf();
    config.storage.retention = retention;
    config.alphabet = ab();
    config.classifier.small_keywords = vec!["small".to_string()];
    config.labels = OutcomeLabels {
        a: "big".to_string(),
        b: "small".to_string(),
    };
    config.games = vec![
        GameConfig {
            id: "dice".to_string(),
            source_url: "http://localhost/dice".to_string(),
            patterns: "unused".into(),
            positions: false,
        },
        GameConfig {
            id: "sicbo".to_string(),
            source_url: "http://localhost/sicbo".to_string(),
            patterns: "unused".into(),
            positions: true,
        },
    ];
    config
}

fn tables(raw: &str) -> BTreeMap<String, PatternTable> {
    let table = PatternTable::parse(raw, &ab());
    BTreeMap::from([("dice".to_string(), table.clone()), ("sicbo".to_string(), table)])
}

fn label(symbol: char) -> &'static str {
    if symbol == 'B' { "small" } else { "big" }
}

/// Apply a sequence of rounds, one per character, with round ids start..
fn feed(oracle: &Oracle, game: &str, symbols: &str, start: u64) {
    for (i, c) in symbols.chars().enumerate() {
        let round = RoundId::from(start + i as u64);
        let outcome = oracle.apply_round(game, Some(label(c)), Some(&round)).unwrap();
        assert!(outcome.changed, "round {} should apply", round);
    }
}

// ============================================================================
// DEDUPLICATION AND PERSISTENCE
// ============================================================================

#[test]
fn test_same_round_applied_twice_is_noop() {
    let dir = tempfile::tempdir().unwrap();
    let oracle = Oracle::new(&test_config(dir.path(), None), tables("{}")).unwrap();
    let round = RoundId::from("r-1");

    let first = oracle.apply_round("dice", Some("big"), Some(&round)).unwrap();
    let second = oracle.apply_round("dice", Some("big"), Some(&round)).unwrap();

    assert!(first.changed);
    assert!(!second.changed);
    assert_eq!(first.stream.history, second.stream.history);
    assert_eq!(oracle.store().history_string("dice").unwrap(), "A");
}

#[test]
fn test_numeric_and_string_round_ids_dedupe_together() {
    let dir = tempfile::tempdir().unwrap();
    let oracle = Oracle::new(&test_config(dir.path(), None), tables("{}")).unwrap();

    let numeric = RoundId::from_json(&serde_json::json!(5001)).unwrap();
    let string = RoundId::from_json(&serde_json::json!("5001")).unwrap();

    assert!(oracle.apply_round("dice", Some("small"), Some(&numeric)).unwrap().changed);
    assert!(!oracle.apply_round("dice", Some("small"), Some(&string)).unwrap().changed);
}

#[test]
fn test_unbounded_history_grows_by_one_per_round() {
    let dir = tempfile::tempdir().unwrap();
    let oracle = Oracle::new(&test_config(dir.path(), None), tables("{}")).unwrap();

    for n in 1..=40u64 {
        // Each round is polled three times before the next one shows up
        for _ in 0..3 {
            oracle
                .apply_round("dice", Some(if n % 2 == 0 { "small" } else { "big" }), Some(&RoundId::from(n)))
                .unwrap();
        }
        assert_eq!(oracle.store().stream("dice").unwrap().history.len(), n as usize);
    }
}

#[test]
fn test_capped_history_keeps_last_symbols_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let oracle = Oracle::new(&test_config(dir.path(), Some(9)), tables("{}")).unwrap();
    let applied = "ABBABAAABBBABA";

    feed(&oracle, "dice", applied, 1);

    let history = oracle.store().history_string("dice").unwrap();
    assert_eq!(history.len(), 9);
    assert_eq!(history, &applied[applied.len() - 9..]);
}

#[test]
fn test_restart_resumes_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), Some(9));
    {
        let oracle = Oracle::new(&config, tables("{}")).unwrap();
        feed(&oracle, "sicbo", "ABAB", 100);
    }

    let oracle = Oracle::new(&config, tables("{}")).unwrap();
    let stream = oracle.store().stream("sicbo").unwrap();
    assert_eq!(oracle.store().alphabet().render(&stream.history), "ABAB");
    assert_eq!(stream.last_round_id, Some(RoundId::from(103)));

    // The last round seen before the restart is not re-applied
    let outcome = oracle.apply_round("sicbo", Some("big"), Some(&RoundId::from(103))).unwrap();
    assert!(!outcome.changed);

    // Other games were never written
    assert!(!oracle.store().state_path("dice").exists());
}

#[test]
fn test_observation_without_round_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let oracle = Oracle::new(&test_config(dir.path(), None), tables("{}")).unwrap();

    let outcome = oracle
        .observe(
            "dice",
            Observation {
                raw_label: Some("small".to_string()),
                ..Observation::default()
            },
        )
        .unwrap();

    assert!(!outcome.changed);
    assert!(outcome.stream.history.is_empty());
}

// ============================================================================
// CLASSIFIER
// ============================================================================

#[test]
fn test_classifier_is_pure() {
    let classifier = RoundClassifier::default();
    let inputs = ["Tài", "Xỉu", "", "xiu ", "TAI", "unknown"];
    let first: Vec<Symbol> = inputs.iter().map(|l| classifier.classify(l)).collect();
    let second: Vec<Symbol> = inputs.iter().map(|l| classifier.classify(l)).collect();
    assert_eq!(first, second);
    assert_eq!(first, vec![Symbol::A, Symbol::B, Symbol::A, Symbol::B, Symbol::A, Symbol::A]);
}

// ============================================================================
// PREDICTION
// ============================================================================

#[test]
fn test_suffix_match_through_oracle() {
    let dir = tempfile::tempdir().unwrap();
    let oracle = Oracle::new(&test_config(dir.path(), None), tables(r#"{"BAB": "X"}"#)).unwrap();
    feed(&oracle, "dice", "AABAB", 1);

    let prediction = oracle.predict("dice").unwrap();
    let baseline = EngineConfig::default().baseline_confidence;

    assert_eq!(prediction.label, "X");
    assert!(prediction.confidence > baseline);
    assert_eq!(prediction.matched_length, 3);
}

#[test]
fn test_empty_table_falls_back_to_no_signal() {
    let dir = tempfile::tempdir().unwrap();
    let oracle = Oracle::new(&test_config(dir.path(), None), tables("{}")).unwrap();
    feed(&oracle, "dice", "ABBA", 1);

    let prediction = oracle.predict("dice").unwrap();
    assert_eq!(prediction.label, EngineConfig::default().no_signal_label);
    assert_eq!(prediction.confidence, EngineConfig::default().baseline_confidence);
}

#[test]
fn test_tail_overlap_rewards_longer_agreement() {
    let table = PatternTable::parse(r#"{"AABB": "long", "BB": "short", "ABB": "mid"}"#, &ab());
    let engine = PredictionEngine::new(
        EngineConfig {
            match_mode: MatchMode::TailOverlap,
            ..EngineConfig::default()
        },
        ab(),
    );
    let history = ab().parse("BAABB").unwrap();

    let prediction = engine.predict(&history, &table);
    // Tail "AABB" (len 4) is the longest tail any pattern ends with
    assert_eq!(prediction.label, "long");
    assert_eq!(prediction.matched_length, 4);
    assert_eq!(prediction.confidence, 44);
}

// ============================================================================
// POSITIONS
// ============================================================================

#[test]
fn test_positions_stable_within_round() {
    let dir = tempfile::tempdir().unwrap();
    let oracle = Oracle::new(&test_config(dir.path(), None), tables(r#"{"A": "big"}"#)).unwrap();
    feed(&oracle, "sicbo", "A", 1);

    let round = RoundId::from(2);
    let first = oracle.select_positions("sicbo", "big", Some(&round)).unwrap().unwrap();
    let second = oracle.select_positions("sicbo", "big", Some(&round)).unwrap().unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 4);
}

#[test]
fn test_positions_differ_across_committed_rounds() {
    let mut selector = PositionSelector::with_rng(
        PositionConfig::default(),
        OutcomeLabels {
            a: "big".to_string(),
            b: "small".to_string(),
        },
        StdRng::seed_from_u64(2024),
    );

    let mut previous = selector.select("small", Some(&RoundId::from(1)));
    for round in 2..100u64 {
        let next = selector.select("small", Some(&RoundId::from(round)));
        assert_ne!(next, previous);
        assert!(next.iter().all(|v| (4..=10).contains(v)));
        previous = next;
    }
}

#[test]
fn test_snapshot_positions_follow_sicbo_only() {
    let dir = tempfile::tempdir().unwrap();
    let oracle = Oracle::new(&test_config(dir.path(), None), tables(r#"{"B": "small"}"#)).unwrap();
    feed(&oracle, "sicbo", "B", 1);
    feed(&oracle, "dice", "B", 1);

    let sicbo = oracle.snapshot("sicbo").unwrap();
    assert_eq!(sicbo.predicted_label, "small");
    assert!(sicbo.positions.unwrap().iter().all(|v| (4..=10).contains(v)));

    assert!(oracle.snapshot("dice").unwrap().positions.is_none());
}

// ============================================================================
// UNKNOWN GAME
// ============================================================================

#[test]
fn test_unknown_game_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let oracle = Oracle::new(&test_config(dir.path(), None), tables("{}")).unwrap();

    let err = oracle.apply_round("poker", Some("big"), Some(&RoundId::from(1))).unwrap_err();
    assert!(matches!(err, OracleError::UnknownGame(ref g) if g == "poker"));

    let err = oracle.predict("poker").unwrap_err();
    assert!(err.is_unknown_game());

    // Nothing was fabricated on disk for the unknown game
    assert!(!oracle.store().state_path("poker").exists());
}
