//! observer-server – Bibliotheks-Root
//!
//! Verdrahtet Registry, Control-Plane und Observability zu einem laufenden
//! Daemon und stellt den Einstiegspunkt fuer Integrationstests bereit.

pub mod config;

use anyhow::{Context, Result};
use config::ObserverConfig;
use observer_control::{ControlServer, ControlState, EventRelay};
use observer_instance::{HttpIdentityResolver, ServerRegistry};
use observer_observability::{observability_server_starten, HealthState, ObserverMetrics};
use std::future::Future;
use std::sync::Arc;

/// Haelt den laufenden Daemon-Zustand zusammen
pub struct Observer {
    pub config: ObserverConfig,
}

impl Observer {
    pub fn neu(config: ObserverConfig) -> Self {
        Self { config }
    }

    /// Startet alle Subsysteme und laeuft bis Ctrl-C
    pub async fn starten(self) -> Result<()> {
        self.laufen(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(fehler = %e, "Signal-Handler konnte nicht installiert werden");
            }
        })
        .await
    }

    /// Startet alle Subsysteme und laeuft bis `stopp` fertig ist
    ///
    /// Reihenfolge:
    /// 1. Identitaets-Dienst und Registry aufbauen
    /// 2. Event-Relay starten (abonniert alle Server)
    /// 3. Observability-Server starten (falls aktiviert)
    /// 4. TCP-Control-Server starten
    /// 5. Auf `stopp` warten, dann alle Server herunterfahren
    pub async fn laufen(self, stopp: impl Future<Output = ()>) -> Result<()> {
        let config = self.config;

        let resolver = HttpIdentityResolver::neu(
            config.identitaet.online_url.clone(),
            config.identitaet.offline_url.clone(),
            config.identitaet.timeout(),
        )
        .context("UUID-Dienst konnte nicht eingerichtet werden")?;

        let registry = Arc::new(
            ServerRegistry::aufbauen(config.servers.clone(), Arc::new(resolver))
                .await
                .context("Server konnten nicht eingerichtet werden")?,
        );
        tracing::info!(anzahl = registry.len(), server = ?registry.namen().collect::<Vec<_>>(), "Server registriert");

        let metriken = ObserverMetrics::neu()?;
        let state = ControlState::neu(config.control_config(), Arc::clone(&registry), metriken.clone());
        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

        let relay_tasks = EventRelay::neu(Arc::clone(&state)).starten(shutdown_rx.clone());

        let observability_task = if config.observability.aktiviert {
            let addr = config.observability_bind_adresse()?;
            let registry_health = Arc::clone(&registry);
            let health = HealthState::neu(move || registry_health.degradierte_whitelists());
            let rx = shutdown_rx.clone();
            Some(tokio::spawn(async move {
                if let Err(e) = observability_server_starten(addr, metriken, health, rx).await {
                    tracing::error!(fehler = %e, "Observability-Server beendet");
                }
            }))
        } else {
            None
        };

        let api_addr = config.api_bind_adresse()?;
        let control = ControlServer::neu(state, api_addr);
        let mut control_task = tokio::spawn(control.starten(shutdown_rx));

        tracing::info!(adresse = %api_addr, "Observer laeuft. Warte auf Shutdown-Signal (Ctrl-C)...");

        let ergebnis = tokio::select! {
            _ = stopp => {
                tracing::info!("Shutdown-Signal empfangen, Observer wird beendet");
                Ok(())
            }
            beendet = &mut control_task => {
                match beendet {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(anyhow::Error::new(e).context("Control-Server beendet")),
                    Err(e) => Err(anyhow::anyhow!("Control-Server-Task abgebrochen: {e}")),
                }
            }
        };

        let _ = shutdown_tx.send(true);
        registry.herunterfahren().await;

        if !control_task.is_finished() {
            let _ = control_task.await;
        }
        for task in relay_tasks {
            let _ = task.await;
        }
        if let Some(task) = observability_task {
            let _ = task.await;
        }

        tracing::info!("Observer gestoppt");
        ergebnis
    }
}
