use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the core (store, hub)
#[derive(Error, Debug)]
pub enum OracleError {
    #[error("Unknown game: {0}")]
    UnknownGame(String),

    /// The round was applied in memory but the durable write failed
    #[error("Failed to persist state for {game} to {}: {source}", path.display())]
    Storage {
        game: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt state record for {game} at {}: {source}", path.display())]
    CorruptState {
        game: String,
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl OracleError {
    pub fn is_unknown_game(&self) -> bool {
        matches!(self, OracleError::UnknownGame(_))
    }
}

pub type Result<T> = std::result::Result<T, OracleError>;
