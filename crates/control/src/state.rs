//! Gemeinsamer Zustand der Control-Plane
//!
//! Haelt Registry, Broadcaster und Metriken als Arc-Referenzen, die sicher
//! zwischen tokio-Tasks geteilt werden koennen.

use observer_instance::ServerRegistry;
use observer_observability::ObserverMetrics;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::broadcast::EventBroadcaster;
use crate::error::{ControlError, ControlResult};

/// Konfiguration der Control-Plane
#[derive(Debug, Clone)]
pub struct ControlConfig {
    /// Gemeinsamer API-Schluessel fuer `authenticate`
    pub api_key: String,
    /// Frist fuer die Authentifizierung nach dem Verbindungsaufbau
    pub auth_timeout_sek: u64,
    /// Keepalive-Intervall in Sekunden
    pub keepalive_sek: u64,
    /// Timeout fuer inaktive Verbindungen in Sekunden
    pub verbindungs_timeout_sek: u64,
    /// Maximale gleichzeitige Verbindungen
    pub max_verbindungen: usize,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            auth_timeout_sek: 10,
            keepalive_sek: 30,
            verbindungs_timeout_sek: 90,
            max_verbindungen: 64,
        }
    }
}

impl ControlConfig {
    pub fn pruefen(&self) -> ControlResult<()> {
        if self.api_key.is_empty() {
            return Err(ControlError::Konfiguration("api_key darf nicht leer sein".into()));
        }
        if self.keepalive_sek == 0 || self.verbindungs_timeout_sek == 0 {
            return Err(ControlError::Konfiguration(
                "keepalive_sek und verbindungs_timeout_sek muessen > 0 sein".into(),
            ));
        }
        Ok(())
    }

    pub fn auth_frist(&self) -> Duration {
        Duration::from_secs(self.auth_timeout_sek)
    }
}

/// Gemeinsamer Zustand (thread-safe, Arc-geteilt)
pub struct ControlState {
    pub config: Arc<ControlConfig>,
    /// Alle verwalteten Server
    pub registry: Arc<ServerRegistry>,
    /// Send-Queues der autorisierten Sitzungen
    pub broadcaster: EventBroadcaster,
    pub metriken: ObserverMetrics,
    /// Startzeitpunkt (fuer Uptime-Berechnung)
    pub start_time: Instant,
}

impl ControlState {
    pub fn neu(
        config: ControlConfig,
        registry: Arc<ServerRegistry>,
        metriken: ObserverMetrics,
    ) -> Arc<Self> {
        Arc::new(Self {
            config: Arc::new(config),
            registry,
            broadcaster: EventBroadcaster::neu(),
            metriken,
            start_time: Instant::now(),
        })
    }

    /// Gibt die Uptime in Sekunden zurueck
    pub fn uptime_sek(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
