//! Durable per-game symbol streams
//!
//! This module handles:
//! - Exactly-once application of each distinct round id
//! - Retention of the most recent N symbols
//! - Atomic persistence of one JSON record per game (write temp, rename)
//!
//! Writers for the same game are serialized by a per-game mutex. Readers get
//! an `Arc` snapshot, so they see either the old or the new stream, never a
//! half-written one.

use crate::classifier::RoundClassifier;
use crate::error::{OracleError, Result};
use crate::models::{GameStream, RoundId, SymbolAlphabet};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info, warn};

/// Default number of symbols kept per game
pub const DEFAULT_RETENTION: usize = 9;

/// Record stored on disk, one file per game
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StreamRecord {
    game: String,
    /// Symbols rendered with the configured alphabet, oldest first
    history: String,
    last_round_id: Option<RoundId>,
    updated_at: Option<DateTime<Utc>>,
}

/// Result of `apply_round`
#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    pub changed: bool,
    pub stream: Arc<GameStream>,
}

/// Store settings
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    /// `None` keeps the full history
    pub retention: Option<usize>,
    pub classifier: RoundClassifier,
    pub alphabet: SymbolAlphabet,
}

struct GameSlot {
    writer: Mutex<()>,
    current: RwLock<Arc<GameStream>>,
}

impl GameSlot {
    fn new(stream: GameStream) -> Self {
        Self {
            writer: Mutex::new(()),
            current: RwLock::new(Arc::new(stream)),
        }
    }

    fn snapshot(&self) -> Arc<GameStream> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&*guard)
    }

    fn replace(&self, stream: Arc<GameStream>) {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = stream;
    }
}

/// Per-game symbol history with durable state
pub struct StreamStore {
    state_dir: PathBuf,
    options: StoreOptions,
    slots: BTreeMap<String, GameSlot>,
}

impl StreamStore {
    /// Open the store for a fixed set of games, loading any persisted state
    pub fn open<I, S>(state_dir: impl Into<PathBuf>, games: I, options: StoreOptions) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let state_dir = state_dir.into();
        let mut slots = BTreeMap::new();

        for game in games {
            let game = game.into();
            let stream = load_stream(&state_dir, &game, &options)?;
            info!(
                "Loaded stream for {}: {} symbols, last round {}",
                game,
                stream.history.len(),
                stream
                    .last_round_id
                    .as_ref()
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| "-".to_string())
            );
            slots.insert(game, GameSlot::new(stream));
        }

        Ok(Self {
            state_dir,
            options,
            slots,
        })
    }

    fn slot(&self, game: &str) -> Result<&GameSlot> {
        self.slots
            .get(game)
            .ok_or_else(|| OracleError::UnknownGame(game.to_string()))
    }

    pub fn games(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(|g| g.as_str())
    }

    pub fn contains(&self, game: &str) -> bool {
        self.slots.contains_key(game)
    }

    pub fn alphabet(&self) -> &SymbolAlphabet {
        &self.options.alphabet
    }

    /// Current stream for a game
    pub fn stream(&self, game: &str) -> Result<Arc<GameStream>> {
        Ok(self.slot(game)?.snapshot())
    }

    /// History rendered with the configured alphabet
    pub fn history_string(&self, game: &str) -> Result<String> {
        let stream = self.stream(game)?;
        Ok(self.options.alphabet.render(&stream.history))
    }

    pub fn state_path(&self, game: &str) -> PathBuf {
        record_path(&self.state_dir, game)
    }

    /// Classify and append one round, at most once per distinct round id
    ///
    /// An absent round id, a round id equal to the last applied one, or an
    /// absent/blank label leaves the stream untouched. If the durable write
    /// fails the in-memory stream still advances and `OracleError::Storage`
    /// is returned.
    pub fn apply_round(
        &self,
        game: &str,
        raw_label: Option<&str>,
        round_id: Option<&RoundId>,
    ) -> Result<ApplyOutcome> {
        let slot = self.slot(game)?;
        let _writer = slot.writer.lock().unwrap_or_else(|e| e.into_inner());
        let current = slot.snapshot();

        let unchanged = |stream: Arc<GameStream>| ApplyOutcome {
            changed: false,
            stream,
        };

        let Some(round_id) = round_id else {
            debug!("{}: no round id, nothing to apply", game);
            return Ok(unchanged(current));
        };

        if current.last_round_id.as_ref() == Some(round_id) {
            debug!("{}: round {} already applied", game, round_id);
            return Ok(unchanged(current));
        }

        let Some(label) = raw_label.map(str::trim).filter(|l| !l.is_empty()) else {
            debug!("{}: round {} has no result label yet", game, round_id);
            return Ok(unchanged(current));
        };

        let symbol = self.options.classifier.classify(label);

        let mut next = (*current).clone();
        next.history.push(symbol);
        if let Some(cap) = self.options.retention {
            let excess = next.history.len().saturating_sub(cap);
            next.history.drain(..excess);
        }
        next.last_round_id = Some(round_id.clone());
        next.updated_at = Some(Utc::now());
        let next = Arc::new(next);

        let persisted = self.persist(game, &next);
        slot.replace(Arc::clone(&next));

        info!(
            "{}: round {} -> {} (history {})",
            game,
            round_id,
            self.options.alphabet.encode(symbol),
            self.options.alphabet.render(&next.history)
        );

        if let Err(e) = persisted {
            warn!("{}: durable write failed, round {} is only held in memory", game, round_id);
            return Err(e);
        }

        Ok(ApplyOutcome {
            changed: true,
            stream: next,
        })
    }

    fn persist(&self, game: &str, stream: &GameStream) -> Result<()> {
        let path = self.state_path(game);
        let record = StreamRecord {
            game: game.to_string(),
            history: self.options.alphabet.render(&stream.history),
            last_round_id: stream.last_round_id.clone(),
            updated_at: stream.updated_at,
        };
        let body = serde_json::to_string_pretty(&record)?;

        write_atomic(&path, body.as_bytes()).map_err(|source| OracleError::Storage {
            game: game.to_string(),
            path: path.clone(),
            source,
        })
    }
}

fn record_path(state_dir: &Path, game: &str) -> PathBuf {
    state_dir.join(format!("{}.json", game))
}

fn temp_path(path: &Path) -> PathBuf {
    path.with_extension("json.tmp")
}

/// Write to a sibling temp file, fsync, then rename over the target
fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = temp_path(path);
    {
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp, path)?;
    sync_parent(path)
}

/// Flush the directory entry so the rename itself is durable
#[cfg(unix)]
fn sync_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::File::open(parent)?.sync_all(),
        _ => Ok(()),
    }
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

fn load_stream(state_dir: &Path, game: &str, options: &StoreOptions) -> Result<GameStream> {
    let path = record_path(state_dir, game);

    let tmp = temp_path(&path);
    if tmp.exists() {
        debug!("{}: removing unfinished write {}", game, tmp.display());
        if let Err(e) = std::fs::remove_file(&tmp) {
            warn!("{}: could not remove {}: {}", game, tmp.display(), e);
        }
    }

    let raw = match std::fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(GameStream::default()),
        Err(source) => {
            return Err(OracleError::Storage {
                game: game.to_string(),
                path,
                source,
            })
        }
    };

    let corrupt = |source: serde_json::Error| OracleError::CorruptState {
        game: game.to_string(),
        path: path.clone(),
        source,
    };

    let record: StreamRecord = serde_json::from_str(&raw).map_err(corrupt)?;
    let mut history = options.alphabet.parse(&record.history).ok_or_else(|| {
        corrupt(<serde_json::Error as serde::de::Error>::custom(format!(
            "history {:?} contains symbols outside the alphabet",
            record.history
        )))
    })?;

    if let Some(cap) = options.retention {
        if history.len() > cap {
            warn!("{}: trimming persisted history from {} to {} symbols", game, history.len(), cap);
            let excess = history.len() - cap;
            history.drain(..excess);
        }
    }

    Ok(GameStream {
        history,
        last_round_id: record.last_round_id,
        updated_at: record.updated_at,
    })
}
