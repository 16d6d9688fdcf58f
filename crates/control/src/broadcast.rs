//! Ereignis-Verteilung an autorisierte Sitzungen
//!
//! Eine Sitzung wird nach erfolgreichem `authenticate` mit der Send-Queue
//! ihrer Verbindung eingetragen und beim Trennen ausgetragen. Zustellung ist
//! hoechstens einmal: volle oder geschlossene Queues werden uebersprungen,
//! nichts wird fuer spaeter gepuffert.

use dashmap::DashMap;
use observer_core::types::ConnectionId;
use observer_protocol::control::ControlMessage;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Groesse der Send-Queue pro Verbindung
pub const SEND_QUEUE_GROESSE: usize = 64;

/// Ausgang eines einzelnen Zustellversuchs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Zustellung {
    Angenommen,
    QueueVoll,
    Getrennt,
}

/// Eingetragene Sitzung
struct Sitzung {
    anzeigename: String,
    queue: mpsc::Sender<ControlMessage>,
}

impl Sitzung {
    fn zustellen(&self, nachricht: ControlMessage) -> Zustellung {
        match self.queue.try_send(nachricht) {
            Ok(()) => Zustellung::Angenommen,
            Err(TrySendError::Full(_)) => Zustellung::QueueVoll,
            Err(TrySendError::Closed(_)) => Zustellung::Getrennt,
        }
    }
}

/// Verteilt Ereignisse an alle autorisierten Sitzungen
///
/// Klone teilen dasselbe Register.
#[derive(Clone, Default)]
pub struct EventBroadcaster {
    sitzungen: Arc<DashMap<ConnectionId, Sitzung>>,
}

impl EventBroadcaster {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Traegt eine Sitzung ein; eine erneute Eintragung ersetzt die Queue
    pub fn sitzung_registrieren(
        &self,
        connection_id: ConnectionId,
        anzeigename: impl Into<String>,
        queue: mpsc::Sender<ControlMessage>,
    ) {
        let anzeigename = anzeigename.into();
        tracing::debug!(verbindung = %connection_id, name = %anzeigename, "Sitzung eingetragen");
        self.sitzungen.insert(connection_id, Sitzung { anzeigename, queue });
    }

    /// `true` wenn die Sitzung eingetragen war
    pub fn sitzung_entfernen(&self, connection_id: &ConnectionId) -> bool {
        let Some((_, sitzung)) = self.sitzungen.remove(connection_id) else {
            return false;
        };
        tracing::debug!(verbindung = %connection_id, name = %sitzung.anzeigename, "Sitzung ausgetragen");
        true
    }

    /// Stellt eine Nachricht jeder Sitzung zu, ohne zu warten
    ///
    /// Liefert die Zahl der Queues, die die Nachricht angenommen haben.
    pub fn an_alle_senden(&self, nachricht: &ControlMessage) -> usize {
        let mut angenommen = 0;
        for eintrag in self.sitzungen.iter() {
            match eintrag.value().zustellen(nachricht.clone()) {
                Zustellung::Angenommen => angenommen += 1,
                Zustellung::QueueVoll => tracing::warn!(
                    verbindung = %eintrag.key(),
                    name = %eintrag.value().anzeigename,
                    "Send-Queue voll, Ereignis fuer diese Sitzung verworfen"
                ),
                Zustellung::Getrennt => {
                    tracing::trace!(verbindung = %eintrag.key(), "Queue bereits geschlossen")
                }
            }
        }
        angenommen
    }

    pub fn sitzungs_anzahl(&self) -> usize {
        self.sitzungen.len()
    }

    pub fn ist_registriert(&self, connection_id: &ConnectionId) -> bool {
        self.sitzungen.contains_key(connection_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn login_ereignis() -> ControlMessage {
        ControlMessage::event("alpha", "login", json!({"user": "bob"}))
    }

    #[tokio::test]
    async fn jede_sitzung_bekommt_das_ereignis() {
        let broadcaster = EventBroadcaster::neu();
        let mut queues: Vec<_> = ["panel", "bot", "log"]
            .into_iter()
            .map(|name| {
                let (tx, rx) = mpsc::channel(SEND_QUEUE_GROESSE);
                broadcaster.sitzung_registrieren(ConnectionId::new(), name, tx);
                rx
            })
            .collect();

        assert_eq!(broadcaster.an_alle_senden(&login_ereignis()), 3);
        for rx in &mut queues {
            let nachricht = rx.try_recv().unwrap();
            assert_eq!(nachricht.payload.befehl(), login_ereignis().payload.befehl());
        }
    }

    #[tokio::test]
    async fn getrennte_sitzung_wird_uebersprungen() {
        let broadcaster = EventBroadcaster::neu();
        let (tx_weg, rx_weg) = mpsc::channel(SEND_QUEUE_GROESSE);
        let (tx_da, mut rx_da) = mpsc::channel(SEND_QUEUE_GROESSE);
        broadcaster.sitzung_registrieren(ConnectionId::new(), "weg", tx_weg);
        broadcaster.sitzung_registrieren(ConnectionId::new(), "da", tx_da);
        drop(rx_weg);

        assert_eq!(broadcaster.an_alle_senden(&login_ereignis()), 1);
        assert!(rx_da.try_recv().is_ok());
    }

    #[tokio::test]
    async fn volle_queue_verliert_nur_ihr_ereignis() {
        let broadcaster = EventBroadcaster::neu();
        let (tx_langsam, mut rx_langsam) = mpsc::channel(1);
        let (tx_schnell, mut rx_schnell) = mpsc::channel(SEND_QUEUE_GROESSE);
        broadcaster.sitzung_registrieren(ConnectionId::new(), "langsam", tx_langsam);
        broadcaster.sitzung_registrieren(ConnectionId::new(), "schnell", tx_schnell);

        assert_eq!(broadcaster.an_alle_senden(&login_ereignis()), 2);
        assert_eq!(broadcaster.an_alle_senden(&login_ereignis()), 1);

        assert!(rx_langsam.try_recv().is_ok());
        assert!(rx_langsam.try_recv().is_err(), "zweites Ereignis darf nicht nachgereicht werden");
        assert!(rx_schnell.try_recv().is_ok());
        assert!(rx_schnell.try_recv().is_ok());
    }

    #[test]
    fn austragen() {
        let broadcaster = EventBroadcaster::neu();
        let id = ConnectionId::new();
        let (tx, _rx) = mpsc::channel(SEND_QUEUE_GROESSE);
        broadcaster.sitzung_registrieren(id, "panel", tx);
        assert!(broadcaster.ist_registriert(&id));

        assert!(broadcaster.sitzung_entfernen(&id));
        assert!(!broadcaster.sitzung_entfernen(&id));
        assert_eq!(broadcaster.sitzungs_anzahl(), 0);
    }
}
