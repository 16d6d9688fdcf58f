//! Ereignis-Typen
//!
//! Zwei Ebenen:
//! - [`ConsoleEvent`] ist das Ergebnis der Klassifizierung einer einzelnen
//!   Konsolenzeile (getaggte Summe mit typisierten Feldern).
//! - [`LifecycleEvent`] ist das, was ein `LifecycleController` an seine
//!   Abonnenten verteilt: klassifizierte Zeilen plus abgeleitete Ereignisse
//!   wie Statuswechsel oder Spieler-Beitritte.
//!
//! [`AnyEvent`] ist die generische Huelle (Name + JSON-Daten), die ueber die
//! Control-Plane als `event:any` verschickt wird.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::LifecycleState;

/// Name des Rueckfall-Ereignisses fuer nicht erkannte Zeilen
pub const LINE_EVENT: &str = "line";

/// Name des Statuswechsel-Ereignisses
pub const STATUS_EVENT: &str = "status";

// ---------------------------------------------------------------------------
// Typisierte Felder der Standard-Ereignisse
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartingData {
    pub time: String,
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OnlineData {
    pub time: String,
    /// Startdauer wie vom Server gemeldet (z.B. "4.213s")
    pub run: String,
}

/// Ereignisse die nur einen Zeitstempel tragen (offline, stopping)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeData {
    pub time: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoginData {
    pub time: String,
    pub user: String,
    pub ip: Option<String>,
    pub port: Option<u16>,
    pub entity: Option<u64>,
    pub world: Option<String>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogoutData {
    pub time: String,
    pub user: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RconData {
    pub time: String,
    pub ip: Option<String>,
    pub port: Option<u16>,
}

// ---------------------------------------------------------------------------
// ConsoleEvent
// ---------------------------------------------------------------------------

/// Ergebnis der Klassifizierung einer Konsolenzeile
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleEvent {
    Starting(StartingData),
    Online(OnlineData),
    Offline(TimeData),
    Stopping(TimeData),
    Login(LoginData),
    Logout(LogoutData),
    RconRunning(RconData),
    /// Ereignis aus einer benutzerdefinierten Tabelle ohne festes Schema
    Custom {
        name: String,
        fields: BTreeMap<String, String>,
    },
    /// Keine Regel hat gegriffen, die Zeile wird unveraendert weitergereicht
    Line(String),
}

impl ConsoleEvent {
    /// Baut ein Ereignis aus einem Namen und den benannten Captures
    ///
    /// Bekannte Namen werden in ihre typisierten Varianten ueberfuehrt,
    /// fehlende Felder bleiben leer. Unbekannte Namen werden zu `Custom`.
    pub fn aus_feldern(name: &str, mut felder: BTreeMap<String, String>) -> Self {
        match name {
            "starting" => Self::Starting(StartingData {
                time: text(&mut felder, "time"),
                version: text(&mut felder, "version"),
            }),
            "online" => Self::Online(OnlineData {
                time: text(&mut felder, "time"),
                run: text(&mut felder, "run"),
            }),
            "offline" => Self::Offline(TimeData { time: text(&mut felder, "time") }),
            "stopping" => Self::Stopping(TimeData { time: text(&mut felder, "time") }),
            "login" => Self::Login(LoginData {
                time: text(&mut felder, "time"),
                user: text(&mut felder, "user"),
                ip: felder.remove("ip").filter(|s| !s.is_empty()),
                port: zahl(felder.remove("port")),
                entity: zahl(felder.remove("entity")),
                world: felder.remove("world").filter(|s| !s.is_empty()),
                x: zahl(felder.remove("x")),
                y: zahl(felder.remove("y")),
                z: zahl(felder.remove("z")),
            }),
            "logout" => Self::Logout(LogoutData {
                time: text(&mut felder, "time"),
                user: text(&mut felder, "user"),
            }),
            "rcon_running" => Self::RconRunning(RconData {
                time: text(&mut felder, "time"),
                ip: felder.remove("ip").filter(|s| !s.is_empty()),
                port: zahl(felder.remove("port")),
            }),
            _ => Self::Custom {
                name: name.to_string(),
                fields: felder,
            },
        }
    }

    /// Ereignisname wie er auf dem Draht erscheint
    pub fn name(&self) -> &str {
        match self {
            Self::Starting(_) => "starting",
            Self::Online(_) => "online",
            Self::Offline(_) => "offline",
            Self::Stopping(_) => "stopping",
            Self::Login(_) => "login",
            Self::Logout(_) => "logout",
            Self::RconRunning(_) => "rcon_running",
            Self::Custom { name, .. } => name,
            Self::Line(_) => LINE_EVENT,
        }
    }

    /// Nutzdaten als JSON (fuer Push-Benachrichtigungen)
    pub fn daten(&self) -> serde_json::Value {
        let ergebnis = match self {
            Self::Starting(d) => serde_json::to_value(d),
            Self::Online(d) => serde_json::to_value(d),
            Self::Offline(d) | Self::Stopping(d) => serde_json::to_value(d),
            Self::Login(d) => serde_json::to_value(d),
            Self::Logout(d) => serde_json::to_value(d),
            Self::RconRunning(d) => serde_json::to_value(d),
            Self::Custom { fields, .. } => serde_json::to_value(fields),
            Self::Line(zeile) => Ok(serde_json::Value::String(zeile.clone())),
        };
        // Reine Daten-Structs ohne Maps mit Nicht-String-Schluesseln
        // koennen nicht fehlschlagen
        ergebnis.unwrap_or(serde_json::Value::Null)
    }

    /// Gibt true zurueck fuer das Rueckfall-Ereignis `line`
    pub fn ist_zeile(&self) -> bool {
        matches!(self, Self::Line(_))
    }
}

fn text(felder: &mut BTreeMap<String, String>, key: &str) -> String {
    felder.remove(key).unwrap_or_default()
}

fn zahl<T: std::str::FromStr>(wert: Option<String>) -> Option<T> {
    wert.and_then(|s| s.trim().parse().ok())
}

// ---------------------------------------------------------------------------
// LifecycleEvent / AnyEvent
// ---------------------------------------------------------------------------

/// Generische Huelle eines Ereignisses (Name + Daten)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnyEvent {
    pub name: String,
    pub data: serde_json::Value,
}

/// Ereignisse, die ein LifecycleController an Abonnenten verteilt
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    /// Klassifizierte Konsolenzeile
    Konsole(ConsoleEvent),
    /// Der Lebenszyklus-Zustand hat sich geaendert
    StatusGeaendert(LifecycleState),
    /// Ein Spieler ist dem Server beigetreten
    SpielerBeigetreten(String),
    /// Ein Spieler hat den Server verlassen
    SpielerVerlassen(String),
}

impl LifecycleEvent {
    /// Ereignisname fuer die `event:<name>`-Benachrichtigung
    pub fn name(&self) -> &str {
        match self {
            Self::Konsole(e) => e.name(),
            Self::StatusGeaendert(_) => STATUS_EVENT,
            Self::SpielerBeigetreten(_) => "joined",
            Self::SpielerVerlassen(_) => "left",
        }
    }

    /// Nutzdaten des Ereignisses
    pub fn daten(&self) -> serde_json::Value {
        match self {
            Self::Konsole(e) => e.daten(),
            Self::StatusGeaendert(s) => serde_json::json!({ "status": s.als_str() }),
            Self::SpielerBeigetreten(name) | Self::SpielerVerlassen(name) => {
                serde_json::json!({ "user": name })
            }
        }
    }

    /// Generische Huelle fuer `event:any`
    ///
    /// `None` fuer rohe Zeilen (`line`) und fuer abgeleitete Spieler-Ereignisse,
    /// die bereits als `login`/`logout` verschickt wurden.
    pub fn als_any(&self) -> Option<AnyEvent> {
        match self {
            Self::Konsole(e) if e.ist_zeile() => None,
            Self::SpielerBeigetreten(_) | Self::SpielerVerlassen(_) => None,
            _ => Some(AnyEvent {
                name: self.name().to_string(),
                data: self.daten(),
            }),
        }
    }
}

/// Ereignis mit Server-Zuordnung (registry-weite Sicht)
#[derive(Debug, Clone, PartialEq)]
pub struct ServerEvent {
    pub server: String,
    pub event: LifecycleEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn felder(paare: &[(&str, &str)]) -> BTreeMap<String, String> {
        paare
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn login_felder_werden_typisiert() {
        let e = ConsoleEvent::aus_feldern(
            "login",
            felder(&[
                ("time", "12:00:01"),
                ("user", "bob"),
                ("ip", "127.0.0.1"),
                ("port", "51234"),
                ("entity", "42"),
                ("world", "world"),
                ("x", "-12.5"),
                ("y", "64.0"),
                ("z", "3.25"),
            ]),
        );
        match e {
            ConsoleEvent::Login(d) => {
                assert_eq!(d.user, "bob");
                assert_eq!(d.port, Some(51234));
                assert_eq!(d.entity, Some(42));
                assert_eq!(d.x, Some(-12.5));
                assert_eq!(d.world.as_deref(), Some("world"));
            }
            anders => panic!("Login erwartet, erhalten: {anders:?}"),
        }
    }

    #[test]
    fn unbekannter_name_wird_custom() {
        let e = ConsoleEvent::aus_feldern("backup", felder(&[("file", "a.zip")]));
        assert_eq!(e.name(), "backup");
        assert_eq!(e.daten()["file"], "a.zip");
    }

    #[test]
    fn zeile_hat_kein_any() {
        let e = LifecycleEvent::Konsole(ConsoleEvent::Line("hallo".into()));
        assert_eq!(e.name(), LINE_EVENT);
        assert!(e.als_any().is_none());
    }

    #[test]
    fn status_wird_als_any_verschickt() {
        let e = LifecycleEvent::StatusGeaendert(LifecycleState::Online);
        let any = e.als_any().unwrap();
        assert_eq!(any.name, "status");
        assert_eq!(any.data["status"], "online");
    }

    #[test]
    fn spieler_ereignisse_ohne_any() {
        assert!(LifecycleEvent::SpielerBeigetreten("bob".into())
            .als_any()
            .is_none());
        assert!(LifecycleEvent::SpielerVerlassen("bob".into())
            .als_any()
            .is_none());
    }
}
