//! Observer-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! Standardwerte. Fehlt die Datei, wird eine mit frisch erzeugtem
//! API-Schluessel angelegt.

use base64::Engine;
use observer_control::ControlConfig;
use observer_core::{ObserverError, Result};
use observer_instance::ServerDescriptor;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Standard-Pfad der Konfigurationsdatei
pub const STANDARD_PFAD: &str = "observer.toml";

/// Umgebungsvariable fuer einen abweichenden Pfad
pub const CONFIG_ENV: &str = "OBSERVER_CONFIG";

/// Laenge des erzeugten API-Schluessels in Bytes (vor base64)
const SCHLUESSEL_BYTES: usize = 32;

/// Vollstaendige Observer-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserverConfig {
    /// Control-Plane (TCP)
    pub api: ApiEinstellungen,
    pub logging: LoggingEinstellungen,
    /// Metriken und Health
    pub observability: ObservabilityEinstellungen,
    /// UUID-Dienste fuer die Whitelist
    pub identitaet: IdentitaetEinstellungen,
    /// Verwaltete Spielserver
    pub servers: Vec<ServerDescriptor>,
}

/// Einstellungen der Control-Plane
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiEinstellungen {
    pub bind_adresse: String,
    pub port: u16,
    /// Gemeinsamer Schluessel aller Fernsteuerungs-Clients
    pub api_key: String,
    /// Frist fuer `authenticate` nach dem Verbindungsaufbau
    pub auth_timeout_sek: u64,
    pub keepalive_sek: u64,
    pub verbindungs_timeout_sek: u64,
    pub max_verbindungen: usize,
}

impl Default for ApiEinstellungen {
    fn default() -> Self {
        let control = ControlConfig::default();
        Self {
            bind_adresse: "0.0.0.0".into(),
            port: 3000,
            api_key: String::new(),
            auth_timeout_sek: control.auth_timeout_sek,
            keepalive_sek: control.keepalive_sek,
            verbindungs_timeout_sek: control.verbindungs_timeout_sek,
            max_verbindungen: control.max_verbindungen,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Observability-Einstellungen (Metriken + Health-Check)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityEinstellungen {
    pub aktiviert: bool,
    pub bind_adresse: String,
    pub port: u16,
}

impl Default for ObservabilityEinstellungen {
    fn default() -> Self {
        Self {
            aktiviert: true,
            bind_adresse: "127.0.0.1".into(),
            port: 9300,
        }
    }
}

/// UUID-Dienste; `{name}` wird durch den Spielernamen ersetzt
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentitaetEinstellungen {
    /// Antwortet mit `{"id": "<hex>"}`
    pub online_url: String,
    /// Antwortet mit `{"offlinesplitteduuid": "<uuid>"}`
    pub offline_url: String,
    pub timeout_sek: u64,
}

impl Default for IdentitaetEinstellungen {
    fn default() -> Self {
        Self {
            online_url: "https://api.minetools.eu/uuid/{name}".into(),
            offline_url: "http://tools.glowingmines.eu/convertor/nick/{name}".into(),
            timeout_sek: 10,
        }
    }
}

impl IdentitaetEinstellungen {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_sek)
    }
}

/// Woher die geladene Konfiguration stammt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Herkunft {
    Datei,
    /// Datei fehlte und wurde mit neuem API-Schluessel angelegt
    Erzeugt,
}

impl ObserverConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei
    ///
    /// Fehlt die Datei, wird eine Standardkonfiguration mit frischem
    /// API-Schluessel geschrieben und zurueckgegeben.
    pub fn laden(pfad: &Path) -> Result<(Self, Herkunft)> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt).map_err(|e| {
                    ObserverError::konfiguration(format!("{}: {e}", pfad.display()))
                })?;
                config.pruefen()?;
                Ok((config, Herkunft::Datei))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::erzeugen();
                config.speichern(pfad)?;
                Ok((config, Herkunft::Erzeugt))
            }
            Err(e) => Err(ObserverError::KonfigurationLesen {
                pfad: pfad.display().to_string(),
                grund: e.to_string(),
            }),
        }
    }

    /// Standardkonfiguration mit zufaelligem API-Schluessel
    pub fn erzeugen() -> Self {
        let mut config = Self::default();
        config.api.api_key = schluessel_erzeugen();
        config
    }

    /// Schreibt die Konfiguration als TOML
    pub fn speichern(&self, pfad: &Path) -> Result<()> {
        let inhalt = toml::to_string_pretty(self)
            .map_err(|e| ObserverError::intern(format!("Konfiguration nicht serialisierbar: {e}")))?;
        std::fs::write(pfad, inhalt)?;
        Ok(())
    }

    /// Prueft Werte, die sich nicht per Typ ausdruecken lassen
    pub fn pruefen(&self) -> Result<()> {
        if self.api.api_key.trim().is_empty() {
            return Err(ObserverError::konfiguration("[api].api_key darf nicht leer sein"));
        }
        if !observer_observability::logging::log_format_gueltig(&self.logging.format) {
            return Err(ObserverError::konfiguration(format!(
                "[logging].format '{}' ist ungueltig",
                self.logging.format
            )));
        }
        let mut namen = HashSet::new();
        for server in &self.servers {
            if !namen.insert(server.name.as_str()) {
                return Err(ObserverError::konfiguration(format!(
                    "Servername '{}' ist mehrfach konfiguriert",
                    server.name
                )));
            }
        }
        Ok(())
    }

    /// Konfiguration der Control-Plane
    pub fn control_config(&self) -> ControlConfig {
        ControlConfig {
            api_key: self.api.api_key.clone(),
            auth_timeout_sek: self.api.auth_timeout_sek,
            keepalive_sek: self.api.keepalive_sek,
            verbindungs_timeout_sek: self.api.verbindungs_timeout_sek,
            max_verbindungen: self.api.max_verbindungen,
        }
    }

    /// Bind-Adresse der Control-Plane
    pub fn api_bind_adresse(&self) -> Result<SocketAddr> {
        adresse(&self.api.bind_adresse, self.api.port)
    }

    /// Bind-Adresse des Observability-Servers
    pub fn observability_bind_adresse(&self) -> Result<SocketAddr> {
        adresse(&self.observability.bind_adresse, self.observability.port)
    }
}

fn adresse(host: &str, port: u16) -> Result<SocketAddr> {
    format!("{host}:{port}").parse().map_err(|_| {
        ObserverError::konfiguration(format!("Ungueltige Bind-Adresse '{host}:{port}'"))
    })
}

/// Erzeugt einen zufaelligen API-Schluessel (URL-sicheres base64)
pub fn schluessel_erzeugen() -> String {
    let mut bytes = [0u8; SCHLUESSEL_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standardwerte() {
        let cfg = ObserverConfig::default();
        assert_eq!(cfg.api.port, 3000);
        assert_eq!(cfg.api.auth_timeout_sek, 10);
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.observability.aktiviert);
        assert!(cfg.servers.is_empty());
        assert_eq!(
            cfg.api_bind_adresse().unwrap(),
            "0.0.0.0:3000".parse().unwrap()
        );
    }

    #[test]
    fn config_aus_toml_string() {
        let toml = r#"
            [api]
            port = 4000
            api_key = "abc"

            [[servers]]
            name = "alpha"
            pfad = "/srv/alpha"
            autostop_sek = 300

            [servers.rcon]
            password = "rcon"

            [[servers.events]]
            name = "login"
            pattern = '^(?P<user>\w+) joined$'

            [[servers]]
            name = "beta"
            art = "vanilla"
            pfad = "/srv/beta"
            online_mode = false
        "#;
        let cfg: ObserverConfig = toml::from_str(toml).unwrap();
        cfg.pruefen().unwrap();

        assert_eq!(cfg.api.port, 4000);
        assert_eq!(cfg.api.keepalive_sek, 30);
        assert_eq!(cfg.servers.len(), 2);

        let alpha = &cfg.servers[0];
        assert_eq!(alpha.art, "paper");
        assert_eq!(alpha.idle_timeout(), Some(Duration::from_secs(300)));
        assert_eq!(alpha.rcon.as_ref().map(|r| r.port), Some(25575));
        assert_eq!(alpha.events.len(), 1);

        let beta = &cfg.servers[1];
        assert_eq!(beta.online_mode, Some(false));
        assert_eq!(beta.idle_timeout(), None);
    }

    #[test]
    fn leerer_schluessel_ist_fehler() {
        let cfg = ObserverConfig::default();
        assert!(cfg.pruefen().is_err());
    }

    #[test]
    fn doppelter_servername_ist_fehler() {
        let toml = r#"
            [api]
            api_key = "abc"

            [[servers]]
            name = "alpha"
            pfad = "/a"

            [[servers]]
            name = "alpha"
            pfad = "/b"
        "#;
        let cfg: ObserverConfig = toml::from_str(toml).unwrap();
        assert!(cfg.pruefen().is_err());
    }

    #[test]
    fn fehlende_datei_wird_erzeugt() {
        let dir = tempfile::tempdir().unwrap();
        let pfad = dir.path().join(STANDARD_PFAD);

        let (erzeugt, herkunft) = ObserverConfig::laden(&pfad).unwrap();
        assert_eq!(herkunft, Herkunft::Erzeugt);
        assert!(!erzeugt.api.api_key.is_empty());
        assert!(pfad.exists());

        // Beim zweiten Start wird derselbe Schluessel gelesen
        let (geladen, herkunft) = ObserverConfig::laden(&pfad).unwrap();
        assert_eq!(herkunft, Herkunft::Datei);
        assert_eq!(geladen.api.api_key, erzeugt.api.api_key);
    }

    #[test]
    fn kaputte_datei_ist_fehler() {
        let dir = tempfile::tempdir().unwrap();
        let pfad = dir.path().join(STANDARD_PFAD);
        std::fs::write(&pfad, "[api\nport = ").unwrap();
        assert!(matches!(
            ObserverConfig::laden(&pfad),
            Err(ObserverError::Konfiguration(_))
        ));
    }

    #[test]
    fn ungueltige_adresse() {
        let mut cfg = ObserverConfig::erzeugen();
        cfg.api.bind_adresse = "nirgendwo".into();
        assert!(cfg.api_bind_adresse().is_err());
    }

    #[test]
    fn schluessel_sind_zufaellig() {
        let a = schluessel_erzeugen();
        let b = schluessel_erzeugen();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
    }
}
