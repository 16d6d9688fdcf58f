//! Fehlertypen fuer Observer
//!
//! Globaler Fehler-Enum fuer Konfiguration und Verdrahtung. Die einzelnen
//! Komponenten (Lifecycle, Whitelist, Registry, Control-Plane) definieren
//! eigene, feinere Fehler.

use thiserror::Error;

/// Globaler Result-Alias fuer Observer
pub type Result<T> = std::result::Result<T, ObserverError>;

/// Fehler auf Ebene des Gesamtsystems
#[derive(Debug, Error)]
pub enum ObserverError {
    // --- Konfiguration ---
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    #[error("Konfigurationsdatei '{pfad}' konnte nicht gelesen werden: {grund}")]
    KonfigurationLesen { pfad: String, grund: String },

    // --- Ein-/Ausgabe ---
    #[error("E/A-Fehler: {0}")]
    Io(#[from] std::io::Error),

    // --- Intern ---
    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl ObserverError {
    /// Erstellt einen internen Fehler aus einer beliebigen Nachricht
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Erstellt einen Konfigurationsfehler
    pub fn konfiguration(msg: impl Into<String>) -> Self {
        Self::Konfiguration(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fehler_anzeige() {
        let e = ObserverError::konfiguration("api.port fehlt");
        assert_eq!(e.to_string(), "Konfigurationsfehler: api.port fehlt");
    }

    #[test]
    fn konfiguration_lesen_enthaelt_pfad() {
        let e = ObserverError::KonfigurationLesen {
            pfad: "observer.toml".into(),
            grund: "Zugriff verweigert".into(),
        };
        assert!(e.to_string().contains("observer.toml"));
    }

    #[test]
    fn io_fehler_konvertierung() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "weg");
        let e: ObserverError = io.into();
        assert!(matches!(e, ObserverError::Io(_)));
    }
}
