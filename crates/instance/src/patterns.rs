//! Eingebaute Muster-Tabellen pro Server-Art
//!
//! Die Reihenfolge der Eintraege ist die Vorrangreihenfolge: das erste
//! passende Muster gewinnt. Neue Ereignisse werden hinten angehaengt.

use once_cell::sync::Lazy;

/// Uhrzeit im Log-Praefix (HH:MM:SS)
const ZEIT: &str = r"(?P<time>(?:[01]\d|2[0-3]):[0-5]\d:[0-5]\d)";

/// IPv4-Adresse (ohne fuehrende Nullen)
const IPV4: &str = r"(?:(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)\.){3}(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)";

/// Koordinate wie `-12.5` oder `1.0E2`
const KOORDINATE: &str = r"-?\d+\.[\dE-]+";

/// Eingebaute Server-Arten
pub const ARTEN: &[&str] = &["paper", "vanilla"];

/// Muster-Rumpf hinter dem Log-Praefix, in Vorrangreihenfolge
fn ereignis_ruempfe() -> Vec<(&'static str, String)> {
    vec![
        (
            "starting",
            r"Starting minecraft server version (?P<version>\S+)".to_string(),
        ),
        (
            "online",
            r#"Done \((?P<run>\d+[.,]\d+s)\)! For help, type "help""#.to_string(),
        ),
        (
            "offline",
            r"ThreadedAnvilChunkStorage: All dimensions are saved".to_string(),
        ),
        ("stopping", r"Stopping server".to_string()),
        (
            "login",
            format!(
                r"(?P<user>\w+)\[/(?P<ip>{IPV4}):(?P<port>\d+)\] logged in with entity id (?P<entity>\d+) at \((?:\[(?P<world>[^\]]+)\])?(?P<x>{KOORDINATE}), (?P<y>{KOORDINATE}), (?P<z>{KOORDINATE})\)"
            ),
        ),
        ("logout", r"(?P<user>\w+) left the game".to_string()),
        (
            "rcon_running",
            format!(r"RCON running on (?P<ip>{IPV4}):(?P<port>\d+)"),
        ),
    ]
}

fn mit_praefix(praefix: &str) -> Vec<(&'static str, String)> {
    ereignis_ruempfe()
        .into_iter()
        .map(|(name, rumpf)| (name, format!("{praefix}{rumpf}")))
        .collect()
}

/// Paper/Spigot: `[12:00:00 INFO]: ...`
static PAPER: Lazy<Vec<(&'static str, String)>> =
    Lazy::new(|| mit_praefix(&format!(r"\[{ZEIT} INFO\]: ")));

/// Vanilla: `[12:00:00] [Server thread/INFO]: ...`
static VANILLA: Lazy<Vec<(&'static str, String)>> =
    Lazy::new(|| mit_praefix(&format!(r"\[{ZEIT}\] \[Server thread/INFO\]: ")));

/// Gibt die eingebaute Tabelle einer Server-Art zurueck
///
/// `None` wenn die Art nicht eingebaut ist.
pub fn standard_tabelle(art: &str) -> Option<&'static [(&'static str, String)]> {
    match art {
        "paper" => Some(PAPER.as_slice()),
        "vanilla" => Some(VANILLA.as_slice()),
        _ => None,
    }
}
