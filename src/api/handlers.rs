//! HTTP API handlers.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::poll::ScanStats;

/// Application state shared with handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Whether the poll loop is up and scanning.
    pub ready: Arc<std::sync::atomic::AtomicBool>,
    /// Running scan totals.
    pub stats: Arc<tokio::sync::RwLock<ScanStats>>,
}

impl AppState {
    /// Create new app state.
    pub fn new() -> Self {
        Self {
            ready: Arc::new(std::sync::atomic::AtomicBool::new(false)),
            stats: Arc::new(tokio::sync::RwLock::new(ScanStats::default())),
        }
    }

    /// Set ready state.
    pub fn set_ready(&self, ready: bool) {
        self.ready
            .store(ready, std::sync::atomic::Ordering::SeqCst);
    }

    /// Check if ready.
    pub fn is_ready(&self) -> bool {
        self.ready.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Status: "ok".
    pub status: &'static str,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    /// Whether the scanner is ready.
    pub ready: bool,
}

/// Status response.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Service status.
    pub status: &'static str,
    /// Statistics.
    pub stats: StatsResponse,
}

/// Statistics in status response.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    /// Poll cycles completed.
    pub cycles_completed: u64,
    /// Opportunities reported since startup.
    pub opportunities_found: u64,
    /// Races fetched in the most recent cycle.
    pub races_last_cycle: usize,
    /// Duration of the most recent cycle in milliseconds.
    pub last_cycle_ms: u64,
}

/// Health check handler - always returns 200.
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

/// Readiness check handler - returns 200 if ready, 503 otherwise.
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let is_ready = state.is_ready();
    let response = ReadyResponse { ready: is_ready };

    if is_ready {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

/// Status handler - returns scanner status and statistics.
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.stats.read().await;
    let status = if state.is_ready() { "running" } else { "starting" };

    Json(StatusResponse {
        status,
        stats: StatsResponse {
            cycles_completed: stats.cycles_completed,
            opportunities_found: stats.opportunities_found,
            races_last_cycle: stats.races_last_cycle,
            last_cycle_ms: stats.last_cycle_ms,
        },
    })
}
