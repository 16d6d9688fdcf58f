//! Fehlertypen der Server-Verwaltung
//!
//! Jede Komponente hat einen eigenen Fehler-Enum. Die Control-Plane bildet
//! sie auf stabile Draht-Codes ab.

use observer_core::types::LifecycleState;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Klassifizierung
// ---------------------------------------------------------------------------

/// Fehler beim Aufbau einer Muster-Tabelle
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifierError {
    /// Fuer diese Server-Art gibt es weder eingebaute noch eigene Muster
    #[error("Unbekannte Server-Art '{0}' und keine eigenen Muster konfiguriert")]
    UnbekannteArt(String),

    /// Ein eigenes Muster laesst sich nicht kompilieren
    #[error("Ungueltiges Muster fuer Ereignis '{ereignis}': {grund}")]
    UngueltigesMuster { ereignis: String, grund: String },
}

pub type ClassifierResult<T> = Result<T, ClassifierError>;

// ---------------------------------------------------------------------------
// Idle-Timer
// ---------------------------------------------------------------------------

/// Fehlbenutzung des Idle-Timers
///
/// Wird geloggt und an den internen Aufrufer zurueckgegeben, nie an Clients.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimerError {
    #[error("Idle-Timer ist bereits aktiv ({grund})")]
    BereitsAktiv { grund: String },

    #[error("Idle-Timer ist nicht aktiv ({grund})")]
    NichtAktiv { grund: String },

    #[error("Idle-Timeout ist fuer diesen Server deaktiviert")]
    Deaktiviert,
}

// ---------------------------------------------------------------------------
// Prozess
// ---------------------------------------------------------------------------

/// Fehler des Prozess-Supervisors
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Prozess konnte nicht gestartet werden: {0}")]
    Starten(String),

    #[error("Prozess laeuft bereits")]
    LaeuftBereits,

    #[error("Kein laufender Prozess")]
    NichtGestartet,

    #[error("E/A-Fehler: {0}")]
    Io(#[from] std::io::Error),
}

pub type ProcessResult<T> = Result<T, ProcessError>;

// ---------------------------------------------------------------------------
// Lebenszyklus
// ---------------------------------------------------------------------------

/// Abgelehnte oder fehlgeschlagene Lebenszyklus-Befehle
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Start nicht moeglich (Status != Offline oder Start laeuft bereits)
    #[error("Server '{server}' kann nicht gestartet werden (Status: {status})")]
    StartAbgelehnt {
        server: String,
        status: LifecycleState,
    },

    /// Start angenommen, aber Server wurde nicht online
    #[error("Start von '{server}' fehlgeschlagen: {grund}")]
    StartFehlgeschlagen { server: String, grund: String },

    #[error("Server '{server}' ist nicht online, Stopp abgelehnt (Status: {status})")]
    StopAbgelehnt {
        server: String,
        status: LifecycleState,
    },

    #[error("Server '{server}' ist nicht online, Konsolenbefehl abgelehnt (Status: {status})")]
    KonsoleAbgelehnt {
        server: String,
        status: LifecycleState,
    },

    #[error(transparent)]
    Prozess(#[from] ProcessError),
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;

// ---------------------------------------------------------------------------
// Identitaet / Whitelist
// ---------------------------------------------------------------------------

/// Fehler bei der Aufloesung eines Spielernamens
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Ungueltiger Spielername '{0}'")]
    UngueltigerName(String),

    #[error("Anfrage an den UUID-Dienst fehlgeschlagen: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unerwartete Antwort des UUID-Dienstes: {0}")]
    UngueltigeAntwort(String),
}

pub type ResolveResult<T> = Result<T, ResolveError>;

/// Fehler der Whitelist-Verwaltung
#[derive(Debug, Error)]
pub enum WhitelistError {
    /// Laden beim Start fehlgeschlagen, die Whitelist ist nur lesbar und leer
    #[error("Whitelist ist nicht geladen")]
    NichtGeladen,

    #[error("Identitaet von '{name}' konnte nicht aufgeloest werden: {quelle}")]
    Aufloesung {
        name: String,
        #[source]
        quelle: ResolveError,
    },

    #[error("'{name}' steht bereits auf der Whitelist")]
    Doppelt { name: String },

    #[error("'{name}' steht nicht auf der Whitelist")]
    NichtGefunden { name: String },

    /// Speichern fehlgeschlagen; die Aenderung im Speicher bleibt bestehen
    #[error("Whitelist konnte nicht gespeichert werden: {0}")]
    Persistenz(#[source] std::io::Error),
}

pub type WhitelistResult<T> = Result<T, WhitelistError>;

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Fehler beim Aufbau der Registry
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Servername '{0}' ist mehrfach konfiguriert")]
    DoppelterName(String),

    #[error("Server '{server}': {quelle}")]
    Muster {
        server: String,
        #[source]
        quelle: ClassifierError,
    },
}

pub type RegistryResult<T> = Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_abgelehnt_nennt_status() {
        let e = LifecycleError::StartAbgelehnt {
            server: "alpha".into(),
            status: LifecycleState::Starting,
        };
        assert!(e.to_string().contains("starting"));
        assert!(e.to_string().contains("alpha"));
    }

    #[test]
    fn prozess_fehler_wird_durchgereicht() {
        let e: LifecycleError = ProcessError::NichtGestartet.into();
        assert_eq!(e.to_string(), "Kein laufender Prozess");
    }
}
