//! Liveness endpoint for the ingester process.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use jobsync_sync::SyncSession;
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::info;

pub const CRATE_NAME: &str = "jobsync-web";

#[derive(Clone)]
pub struct AppState {
    pub session: Arc<SyncSession>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(session: Arc<SyncSession>) -> Self {
        Self {
            session,
            started_at: Utc::now(),
        }
    }
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    started_at: DateTime<Utc>,
    cycles: u64,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(health_handler))
        .route("/healthz", get(health_handler))
        .with_state(Arc::new(state))
}

/// Serves until Ctrl-C.
pub async fn serve(port: u16, state: AppState) -> anyhow::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "listening");
    axum::serve(listener, app(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Health> {
    Json(Health {
        status: "ok",
        started_at: state.started_at,
        cycles: state.session.cycles_started(),
    })
}
