//! Server-Beschreibung aus der Konfiguration
//!
//! Ein `ServerDescriptor` entspricht einem `[[servers]]`-Eintrag und wird
//! beim Aufbau der Registry einmal gelesen, danach nie veraendert.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::classifier::PatternDefinition;

/// Zugangsdaten der Remote-Konsole
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RconZugang {
    #[serde(default = "standard_rcon_host")]
    pub host: String,
    #[serde(default = "standard_rcon_port")]
    pub port: u16,
    pub password: String,
}

/// Identitaet und Startkonfiguration eines verwalteten Servers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerDescriptor {
    /// Eindeutiger Name (Schluessel in der Registry)
    pub name: String,
    /// Server-Art, bestimmt die eingebaute Muster-Tabelle
    #[serde(default = "standard_art")]
    pub art: String,
    /// Arbeitsverzeichnis des Servers
    pub pfad: PathBuf,
    #[serde(default = "standard_java")]
    pub java: String,
    #[serde(default = "standard_jar")]
    pub jar: String,
    /// Zusaetzliche Argumente vor `-jar` (z.B. `-Xmx4G`)
    #[serde(default)]
    pub args: Vec<String>,
    /// Idle-Timeout in Sekunden, 0 = deaktiviert
    #[serde(default)]
    pub autostop_sek: u64,
    /// Wartezeit auf `online` nach dem Start
    #[serde(default = "standard_start_timeout")]
    pub start_timeout_sek: u64,
    /// Ueberschreibt `online-mode` aus `server.properties`
    #[serde(default)]
    pub online_mode: Option<bool>,
    #[serde(default)]
    pub rcon: Option<RconZugang>,
    /// Eigene Muster-Tabelle, ersetzt die eingebaute
    #[serde(default)]
    pub events: Vec<PatternDefinition>,
}

fn standard_art() -> String {
    "paper".to_string()
}

fn standard_java() -> String {
    "java".to_string()
}

fn standard_jar() -> String {
    "server.jar".to_string()
}

fn standard_start_timeout() -> u64 {
    300
}

fn standard_rcon_host() -> String {
    "127.0.0.1".to_string()
}

fn standard_rcon_port() -> u16 {
    25575
}

impl ServerDescriptor {
    /// Minimale Beschreibung mit Standardwerten
    pub fn neu(name: impl Into<String>, pfad: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            art: standard_art(),
            pfad: pfad.into(),
            java: standard_java(),
            jar: standard_jar(),
            args: Vec::new(),
            autostop_sek: 0,
            start_timeout_sek: standard_start_timeout(),
            online_mode: None,
            rcon: None,
            events: Vec::new(),
        }
    }

    /// `None` wenn der Idle-Timeout deaktiviert ist
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.autostop_sek > 0).then(|| Duration::from_secs(self.autostop_sek))
    }

    pub fn start_timeout(&self) -> Duration {
        Duration::from_secs(self.start_timeout_sek)
    }

    /// Eigene Muster, falls konfiguriert
    pub fn eigene_muster(&self) -> Option<&[PatternDefinition]> {
        (!self.events.is_empty()).then_some(self.events.as_slice())
    }
}
