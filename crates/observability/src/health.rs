//! Health-Check-Endpunkt fuer Observer
//!
//! Endpoint: `GET /health`
//! Response: JSON mit Status, Version, Uptime und den Servern, deren
//! Whitelist nicht geladen werden konnte.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Status des Health-Checks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Antwort des Health-Check-Endpunkts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub started_at: DateTime<Utc>,
    /// Server mit nur lesbarer (nicht geladener) Whitelist
    #[serde(default)]
    pub degraded_whitelists: Vec<String>,
}

type Pruefung = Arc<dyn Fn() -> Vec<String> + Send + Sync>;

/// Geteilter Zustand fuer den Health-Check-Handler
#[derive(Clone)]
pub struct HealthState {
    pub start_time: Arc<Instant>,
    pub started_at: DateTime<Utc>,
    degradiert: Pruefung,
}

impl HealthState {
    /// `degradiert` liefert die Namen beeintraechtigter Server
    pub fn neu(degradiert: impl Fn() -> Vec<String> + Send + Sync + 'static) -> Self {
        Self {
            start_time: Arc::new(Instant::now()),
            started_at: Utc::now(),
            degradiert: Arc::new(degradiert),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn bericht(&self) -> HealthResponse {
        let degraded_whitelists = (self.degradiert)();
        let status = if degraded_whitelists.is_empty() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };
        HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.uptime_seconds(),
            started_at: self.started_at,
            degraded_whitelists,
        }
    }
}

/// Axum-Router fuer den `/health`-Endpunkt
pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(state)
}

/// `GET /health` – gibt den Dienststatus zurueck
async fn health_handler(State(state): State<HealthState>) -> impl IntoResponse {
    let response = state.bericht();
    let http_status = match response.status {
        // degraded bleibt 200, nur unhealthy ist 503
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (http_status, Json(response))
}
