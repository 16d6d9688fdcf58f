//! Lesezugriff auf `server.properties`
//!
//! Format: `schluessel=wert` pro Zeile, `#` und `!` leiten Kommentare ein.
//! Geschrieben wird die Datei nie.

use std::collections::HashMap;
use std::path::Path;

/// Dateiname im Server-Verzeichnis
pub const PROPERTIES_DATEI: &str = "server.properties";

/// Zerlegt den Inhalt einer Properties-Datei
pub fn parsen(inhalt: &str) -> HashMap<String, String> {
    inhalt
        .lines()
        .map(str::trim)
        .filter(|zeile| !zeile.is_empty() && !zeile.starts_with('#') && !zeile.starts_with('!'))
        .filter_map(|zeile| {
            let (schluessel, wert) = zeile.split_once('=')?;
            Some((schluessel.trim().to_string(), wert.trim().to_string()))
        })
        .collect()
}

/// Liest `online-mode` aus `<verzeichnis>/server.properties`
///
/// `None` wenn die Datei fehlt oder der Schluessel fehlt/ungueltig ist.
pub async fn online_mode(verzeichnis: &Path) -> Option<bool> {
    let pfad = verzeichnis.join(PROPERTIES_DATEI);
    let inhalt = match tokio::fs::read_to_string(&pfad).await {
        Ok(inhalt) => inhalt,
        Err(e) => {
            tracing::debug!(pfad = %pfad.display(), fehler = %e, "server.properties nicht lesbar");
            return None;
        }
    };
    parsen(&inhalt)
        .get("online-mode")
        .and_then(|wert| wert.parse::<bool>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kommentare_und_leerzeilen() {
        let p = parsen("#Minecraft server properties\n\nonline-mode=false\n! alt\nmotd=A = B\n");
        assert_eq!(p.get("online-mode").map(String::as_str), Some("false"));
        assert_eq!(p.get("motd").map(String::as_str), Some("A = B"));
        assert_eq!(p.len(), 2);
    }

    #[tokio::test]
    async fn online_mode_aus_datei() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join(PROPERTIES_DATEI), "online-mode=false\n")
            .await
            .unwrap();
        assert_eq!(online_mode(dir.path()).await, Some(false));
    }

    #[tokio::test]
    async fn fehlende_datei() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(online_mode(dir.path()).await, None);
    }
}
