//! HTTP endpoint exposing per-game snapshots

use crate::error::OracleError;
use crate::hub::Oracle;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

/// Build the router
pub fn router(oracle: Arc<Oracle>) -> Router {
    Router::new()
        .route("/api/games", get(games_handler))
        .route("/api/:game", get(snapshot_handler))
        .route("/healthz", get(liveness_handler))
        .with_state(oracle)
}

/// Serve until `shutdown` resolves
pub async fn run(
    oracle: Arc<Oracle>,
    host: &str,
    port: u16,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("API running on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(oracle))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn snapshot_handler(State(oracle): State<Arc<Oracle>>, Path(game): Path<String>) -> Response {
    match oracle.snapshot(&game) {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => error_response(e),
    }
}

async fn games_handler(State(oracle): State<Arc<Oracle>>) -> impl IntoResponse {
    let games: Vec<&str> = oracle.games().collect();
    Json(json!({ "games": games }))
}

async fn liveness_handler() -> impl IntoResponse {
    StatusCode::OK
}

fn error_response(err: OracleError) -> Response {
    let status = match err {
        OracleError::UnknownGame(_) => StatusCode::NOT_FOUND,
        _ => {
            error!("Snapshot failed: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}
