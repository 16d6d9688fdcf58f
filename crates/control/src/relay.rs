//! Event-Relay – leitet Server-Ereignisse an alle Sitzungen weiter
//!
//! Pro Server laeuft ein Task, der dessen `LifecycleEvent`s abonniert und
//! daraus `event:<name>`-Benachrichtigungen formt. Jedes Ereignis ausser
//! rohen Zeilen und den abgeleiteten `joined`/`left` wird zusaetzlich als
//! `event:any` mit `{name, data}` verschickt.
//!
//! Die Reihenfolge bleibt pro Server erhalten; zwischen verschiedenen
//! Servern gibt es keine Ordnung.

use observer_core::event::LifecycleEvent;
use observer_protocol::control::ControlMessage;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::state::ControlState;

/// Name der `event:any`-Benachrichtigung ohne Praefix
const ANY: &str = "any";

pub struct EventRelay {
    state: Arc<ControlState>,
}

impl EventRelay {
    pub fn neu(state: Arc<ControlState>) -> Self {
        Self { state }
    }

    /// Abonniert alle Server und startet die Weiterleitungs-Tasks
    ///
    /// Die Abonnements entstehen synchron, bevor die Funktion zurueckkehrt.
    /// Ereignisse danach gehen nicht verloren.
    pub fn starten(&self, shutdown_rx: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        self.state
            .registry
            .abonnieren()
            .into_iter()
            .map(|(server, rx)| {
                let state = Arc::clone(&self.state);
                let shutdown_rx = shutdown_rx.clone();
                tokio::spawn(weiterleiten(state, server, rx, shutdown_rx))
            })
            .collect()
    }
}

async fn weiterleiten(
    state: Arc<ControlState>,
    server: String,
    mut rx: broadcast::Receiver<LifecycleEvent>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    tracing::debug!(server = %server, "Event-Relay gestartet");
    loop {
        tokio::select! {
            ergebnis = rx.recv() => match ergebnis {
                Ok(ereignis) => verteilen(&state, &server, &ereignis),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(server = %server, verpasst = n, "Event-Relay hinkt hinterher");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },

            Ok(()) = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }
    tracing::debug!(server = %server, "Event-Relay beendet");
}

fn verteilen(state: &ControlState, server: &str, ereignis: &LifecycleEvent) {
    let name = ereignis.name();
    state
        .metriken
        .events_total
        .with_label_values(&[name])
        .inc();

    let empfaenger = state
        .broadcaster
        .an_alle_senden(&ControlMessage::event(server, name, ereignis.daten()));
    tracing::trace!(server, ereignis = name, empfaenger, "Ereignis verteilt");

    if let Some(any) = ereignis.als_any() {
        let daten = serde_json::json!({ "name": any.name, "data": any.data });
        state
            .broadcaster
            .an_alle_senden(&ControlMessage::event(server, ANY, daten));
    }

    match ereignis {
        LifecycleEvent::StatusGeaendert(_) => {
            let metriken = &state.metriken;
            metriken.servers_online.set(state.registry.online_anzahl() as i64);
            metriken.players_online.set(state.registry.spieler_anzahl() as i64);
        }
        LifecycleEvent::SpielerBeigetreten(_) | LifecycleEvent::SpielerVerlassen(_) => {
            state
                .metriken
                .players_online
                .set(state.registry.spieler_anzahl() as i64);
        }
        LifecycleEvent::Konsole(_) => {}
    }
}
