//! Background polling of the upstream sources
//!
//! One task per game on a fixed interval. Failures are logged and the next
//! tick simply tries again.

use crate::config::{GameConfig, OracleConfig};
use crate::error::OracleError;
use crate::hub::Oracle;
use crate::upstream::UpstreamClient;
use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Spawn one polling task per configured game
pub fn spawn_all(
    config: &OracleConfig,
    oracle: Arc<Oracle>,
    running: Arc<AtomicBool>,
) -> Result<Vec<JoinHandle<()>>> {
    let client = Arc::new(UpstreamClient::new(config.polling.request_timeout_ms)?);
    let interval = config.poll_interval();

    Ok(config
        .games
        .iter()
        .cloned()
        .map(|game| {
            let client = Arc::clone(&client);
            let oracle = Arc::clone(&oracle);
            let running = Arc::clone(&running);
            tokio::spawn(poll_game(game, client, oracle, interval, running))
        })
        .collect())
}

async fn poll_game(
    game: GameConfig,
    client: Arc<UpstreamClient>,
    oracle: Arc<Oracle>,
    interval: Duration,
    running: Arc<AtomicBool>,
) {
    info!("Polling {} every {}ms from {}", game.id, interval.as_millis(), game.source_url);

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    while running.load(Ordering::SeqCst) {
        ticker.tick().await;
        poll_once(&game, &client, &oracle).await;
    }

    info!("Stopped polling {}", game.id);
}

/// Fetch one round and feed it into the oracle
pub async fn poll_once(game: &GameConfig, client: &UpstreamClient, oracle: &Oracle) {
    let observation = match client.fetch(&game.source_url).await {
        Ok(obs) => obs,
        Err(e) => {
            warn!("{}: upstream fetch failed: {:#}", game.id, e);
            return;
        }
    };

    match oracle.observe(&game.id, observation) {
        Ok(outcome) if outcome.changed => {
            debug!("{}: history now {} symbols", game.id, outcome.stream.history.len());
        }
        Ok(_) => {}
        Err(e @ OracleError::Storage { .. }) => {
            error!("{}: {} - round is not durable yet", game.id, e);
        }
        Err(e) => {
            error!("{}: failed to apply round: {}", game.id, e);
        }
    }
}
