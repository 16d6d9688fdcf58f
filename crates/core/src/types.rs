//! Gemeinsame Identifikations- und Zustandstypen fuer Observer
//!
//! IDs verwenden das Newtype-Pattern um Verwechslungen zur Compilezeit
//! auszuschliessen. Zustaende werden als snake_case serialisiert, so wie
//! sie auch ueber das Control-Protokoll verschickt werden.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Eindeutige Verbindungs-ID (eine pro TCP-Verbindung)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Erstellt eine neue zufaellige ConnectionId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn:{}", self.0)
    }
}

/// Lebenszyklus-Zustand eines verwalteten Servers
///
/// Wird ausschliesslich vom `LifecycleController` veraendert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Kein Prozess laeuft
    #[default]
    Offline,
    /// Prozess gestartet, Welt wird geladen
    Starting,
    /// Bereit, Spieler koennen sich verbinden
    Online,
    /// Server faehrt herunter
    Stopping,
}

impl LifecycleState {
    /// Name des Zustands wie er auf dem Draht erscheint
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Starting => "starting",
            Self::Online => "online",
            Self::Stopping => "stopping",
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.als_str())
    }
}

/// Eintrag der Whitelist eines Servers
///
/// `uuid` ist die stabile, aufgeloeste Identitaet (unveraenderlich nach dem
/// Eintragen), `name` der Anzeigename zum Zeitpunkt des Hinzufuegens.
/// Das Format entspricht der `whitelist.json` des Spielservers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WhitelistEntry {
    pub uuid: String,
    pub name: String,
}
