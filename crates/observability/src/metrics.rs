//! Prometheus-kompatible Metriken fuer Observer
//!
//! Registrierte Metriken:
//! - `observer_connected_clients` – Gauge: Offene Control-Verbindungen
//! - `observer_authorized_sessions` – Gauge: Authentifizierte Sitzungen
//! - `observer_servers_online` – Gauge: Server im Status Online
//! - `observer_players_online` – Gauge: Spieler ueber alle Server
//! - `observer_events_total` – Counter: Weitergeleitete Ereignisse (event)
//! - `observer_commands_total` – Counter: Befehle (command, result)

use anyhow::Result;
use axum::{extract::State, response::IntoResponse, routing::get, Router};
use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Alle Observer-Prometheus-Metriken
#[derive(Clone)]
pub struct ObserverMetrics {
    pub registry: Arc<Registry>,

    // Control-Plane
    pub connected_clients: IntGauge,
    pub authorized_sessions: IntGauge,
    pub commands_total: IntCounterVec,

    // Spielserver
    pub servers_online: IntGauge,
    pub players_online: IntGauge,
    pub events_total: IntCounterVec,
}

impl ObserverMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        let connected_clients = IntGauge::with_opts(Opts::new(
            "observer_connected_clients",
            "Anzahl offener Control-Verbindungen",
        ))?;
        registry.register(Box::new(connected_clients.clone()))?;

        let authorized_sessions = IntGauge::with_opts(Opts::new(
            "observer_authorized_sessions",
            "Anzahl authentifizierter Sitzungen",
        ))?;
        registry.register(Box::new(authorized_sessions.clone()))?;

        let commands_total = IntCounterVec::new(
            Opts::new("observer_commands_total", "Verarbeitete Control-Befehle"),
            &["command", "result"],
        )?;
        registry.register(Box::new(commands_total.clone()))?;

        let servers_online = IntGauge::with_opts(Opts::new(
            "observer_servers_online",
            "Anzahl Server im Status Online",
        ))?;
        registry.register(Box::new(servers_online.clone()))?;

        let players_online = IntGauge::with_opts(Opts::new(
            "observer_players_online",
            "Anzahl verbundener Spieler ueber alle Server",
        ))?;
        registry.register(Box::new(players_online.clone()))?;

        let events_total = IntCounterVec::new(
            Opts::new("observer_events_total", "Weitergeleitete Server-Ereignisse"),
            &["event"],
        )?;
        registry.register(Box::new(events_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            connected_clients,
            authorized_sessions,
            commands_total,
            servers_online,
            players_online,
            events_total,
        })
    }

    /// Zaehlt einen Befehl mit Ergebnis (`ok` oder Fehlercode)
    pub fn befehl_zaehlen(&self, befehl: &str, ergebnis: &str) {
        self.commands_total
            .with_label_values(&[befehl, ergebnis])
            .inc();
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: ObserverMetrics) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(State(metriken): State<ObserverMetrics>) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            axum::http::StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4",
            )],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
