//! Persistenz der Whitelist
//!
//! Das `WhitelistStore`-Trait abstrahiert den Speicherort. [`JsonFileStore`]
//! schreibt die `whitelist.json` des Spielservers: erst in eine temporaere
//! Datei daneben, dann per `rename` an ihren Platz.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use observer_core::types::WhitelistEntry;

/// Dateiname der Whitelist im Server-Verzeichnis
pub const WHITELIST_DATEI: &str = "whitelist.json";

/// Abstrakter Speicher fuer die Whitelist eines Servers
#[async_trait]
pub trait WhitelistStore: Send + Sync {
    /// Laedt alle Eintraege
    async fn laden(&self) -> std::io::Result<Vec<WhitelistEntry>>;

    /// Ersetzt den gespeicherten Inhalt vollstaendig
    async fn speichern(&self, eintraege: &[WhitelistEntry]) -> std::io::Result<()>;
}

/// JSON-Datei im Format des Spielservers
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    pfad: PathBuf,
}

impl JsonFileStore {
    pub fn neu(pfad: impl Into<PathBuf>) -> Self {
        Self { pfad: pfad.into() }
    }

    /// Store fuer `<verzeichnis>/whitelist.json`
    pub fn im_verzeichnis(verzeichnis: &Path) -> Self {
        Self::neu(verzeichnis.join(WHITELIST_DATEI))
    }

    pub fn pfad(&self) -> &Path {
        &self.pfad
    }

    fn temp_pfad(&self) -> PathBuf {
        let mut name = self.pfad.as_os_str().to_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

#[async_trait]
impl WhitelistStore for JsonFileStore {
    async fn laden(&self) -> std::io::Result<Vec<WhitelistEntry>> {
        let inhalt = tokio::fs::read(&self.pfad).await?;
        let eintraege: Vec<WhitelistEntry> = serde_json::from_slice(&inhalt)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        tracing::debug!(pfad = %self.pfad.display(), anzahl = eintraege.len(), "Whitelist gelesen");
        Ok(eintraege)
    }

    async fn speichern(&self, eintraege: &[WhitelistEntry]) -> std::io::Result<()> {
        let json = serde_json::to_vec_pretty(eintraege)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        let temp = self.temp_pfad();
        tokio::fs::write(&temp, &json).await?;
        tokio::fs::rename(&temp, &self.pfad).await?;

        tracing::debug!(pfad = %self.pfad.display(), anzahl = eintraege.len(), "Whitelist gespeichert");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eintrag(name: &str, uuid: &str) -> WhitelistEntry {
        WhitelistEntry {
            uuid: uuid.into(),
            name: name.into(),
        }
    }

    #[tokio::test]
    async fn speichern_und_laden() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::im_verzeichnis(dir.path());
        let eintraege = vec![eintrag("bob", "u-1"), eintrag("alice", "u-2")];

        store.speichern(&eintraege).await.unwrap();
        assert_eq!(store.laden().await.unwrap(), eintraege);
        // Keine temporaere Datei zurueckgelassen
        assert!(!store.temp_pfad().exists());
    }

    #[tokio::test]
    async fn fehlende_datei_ist_fehler() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::im_verzeichnis(dir.path());
        let err = store.laden().await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn kaputtes_json_ist_fehler() {
        let dir = tempfile::tempdir().unwrap();
        let pfad = dir.path().join(WHITELIST_DATEI);
        tokio::fs::write(&pfad, b"[{\"uuid\": ").await.unwrap();
        let err = JsonFileStore::neu(&pfad).laden().await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn minecraft_format_wird_gelesen() {
        let dir = tempfile::tempdir().unwrap();
        let pfad = dir.path().join(WHITELIST_DATEI);
        tokio::fs::write(
            &pfad,
            br#"[{"uuid":"069a79f4-44e9-4726-a5be-fca90e38aaf5","name":"Notch"}]"#,
        )
        .await
        .unwrap();
        let eintraege = JsonFileStore::neu(&pfad).laden().await.unwrap();
        assert_eq!(eintraege[0].name, "Notch");
    }
}
