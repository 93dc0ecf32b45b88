//! The oracle hub: one store, one engine, per-game tables and selectors
//!
//! Built once at startup and shared by the poller and the HTTP layer.

use crate::classifier::RoundClassifier;
use crate::config::OracleConfig;
use crate::engine::PredictionEngine;
use crate::error::{OracleError, Result};
use crate::models::{Observation, Prediction, RoundId, Snapshot};
use crate::patterns::PatternTable;
use crate::positions::PositionSelector;
use crate::store::{ApplyOutcome, StoreOptions, StreamStore};
use std::collections::BTreeMap;
use std::sync::{Mutex, RwLock};
use tracing::info;

pub struct Oracle {
    store: StreamStore,
    engine: PredictionEngine,
    tables: BTreeMap<String, PatternTable>,
    selectors: BTreeMap<String, Mutex<PositionSelector>>,
    observations: BTreeMap<String, RwLock<Observation>>,
}

impl Oracle {
    /// Build from config, loading each game's pattern table from disk
    pub fn from_config(config: &OracleConfig) -> Result<Self> {
        let tables = config
            .games
            .iter()
            .map(|g| (g.id.clone(), PatternTable::load(&g.patterns, &config.alphabet)))
            .collect();
        Self::new(config, tables)
    }

    /// Build from config with already-loaded tables; games without a table
    /// get an empty one
    pub fn new(config: &OracleConfig, mut tables: BTreeMap<String, PatternTable>) -> Result<Self> {
        let options = StoreOptions {
            retention: config.storage.retention,
            classifier: RoundClassifier::new(config.classifier.small_keywords.iter().cloned()),
            alphabet: config.alphabet,
        };
        let store = StreamStore::open(
            &config.storage.state_dir,
            config.games.iter().map(|g| g.id.clone()),
            options,
        )?;

        let tables = config
            .games
            .iter()
            .map(|g| (g.id.clone(), tables.remove(&g.id).unwrap_or_default()))
            .collect();

        let selectors = config
            .games
            .iter()
            .filter(|g| g.positions)
            .map(|g| {
                let selector = PositionSelector::new(config.positions.clone(), config.labels.clone());
                (g.id.clone(), Mutex::new(selector))
            })
            .collect();

        let observations = config
            .games
            .iter()
            .map(|g| (g.id.clone(), RwLock::new(Observation::default())))
            .collect();

        info!(
            "Oracle ready: {} games, state in {}",
            config.games.len(),
            config.storage.state_dir.display()
        );

        Ok(Self {
            store,
            engine: PredictionEngine::new(config.prediction.clone(), config.alphabet),
            tables,
            selectors,
            observations,
        })
    }

    pub fn games(&self) -> impl Iterator<Item = &str> {
        self.store.games()
    }

    pub fn store(&self) -> &StreamStore {
        &self.store
    }

    pub fn table(&self, game: &str) -> Result<&PatternTable> {
        self.tables
            .get(game)
            .ok_or_else(|| OracleError::UnknownGame(game.to_string()))
    }

    pub fn is_position_bearing(&self, game: &str) -> bool {
        self.selectors.contains_key(game)
    }

    pub fn apply_round(
        &self,
        game: &str,
        raw_label: Option<&str>,
        round_id: Option<&RoundId>,
    ) -> Result<ApplyOutcome> {
        self.store.apply_round(game, raw_label, round_id)
    }

    /// Record the latest upstream tuple and apply its round
    pub fn observe(&self, game: &str, observation: Observation) -> Result<ApplyOutcome> {
        let slot = self
            .observations
            .get(game)
            .ok_or_else(|| OracleError::UnknownGame(game.to_string()))?;

        let outcome = self.store.apply_round(
            game,
            observation.raw_label.as_deref(),
            observation.round_id.as_ref(),
        );

        let mut guard = slot.write().unwrap_or_else(|e| e.into_inner());
        *guard = observation;
        outcome
    }

    pub fn observation(&self, game: &str) -> Result<Observation> {
        let slot = self
            .observations
            .get(game)
            .ok_or_else(|| OracleError::UnknownGame(game.to_string()))?;
        let guard = slot.read().unwrap_or_else(|e| e.into_inner());
        Ok(guard.clone())
    }

    pub fn predict(&self, game: &str) -> Result<Prediction> {
        let table = self.table(game)?;
        let stream = self.store.stream(game)?;
        Ok(self.engine.predict(&stream.history, table))
    }

    /// Positions for a position-bearing game; `None` for other games
    pub fn select_positions(
        &self,
        game: &str,
        predicted_label: &str,
        round_id: Option<&RoundId>,
    ) -> Result<Option<Vec<u8>>> {
        if !self.store.contains(game) {
            return Err(OracleError::UnknownGame(game.to_string()));
        }
        Ok(self.selectors.get(game).map(|selector| {
            let mut guard = selector.lock().unwrap_or_else(|e| e.into_inner());
            guard.select(predicted_label, round_id)
        }))
    }

    /// Combined view of history, prediction and (for sicbo) positions
    pub fn snapshot(&self, game: &str) -> Result<Snapshot> {
        let stream = self.store.stream(game)?;
        let table = self.table(game)?;
        let observation = self.observation(game)?;
        let prediction = self.engine.predict(&stream.history, table);

        let round_id = observation
            .round_id
            .clone()
            .or_else(|| stream.last_round_id.clone());
        let position_bearing = self.is_position_bearing(game);
        let positions = self.select_positions(game, &prediction.label, round_id.as_ref())?;

        Ok(Snapshot {
            game: game.to_string(),
            round_id,
            history: self.store.alphabet().render(&stream.history),
            predicted_label: prediction.label,
            confidence: prediction.confidence,
            matched_length: prediction.matched_length,
            positions,
            previous_total: observation.total.filter(|_| position_bearing),
            dice: observation.dice.filter(|_| position_bearing),
        })
    }

    pub fn snapshots(&self) -> Result<Vec<Snapshot>> {
        self.games().map(|g| self.snapshot(g)).collect()
    }
}
