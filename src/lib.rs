//! Round-streak tracking and pattern-table prediction for dice games
//!
//! Rounds from upstream sources are classified into two symbols, appended
//! once per round id to a durable per-game history, and matched against a
//! pattern table to predict the next outcome. The sicbo game additionally
//! gets a round-stable set of dice-sum positions.

pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod hub;
pub mod models;
pub mod output;
pub mod patterns;
pub mod poller;
pub mod positions;
pub mod server;
pub mod store;
pub mod upstream;

pub use error::{OracleError, Result};
pub use hub::Oracle;
