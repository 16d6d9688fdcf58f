//! Fehlertypen fuer die Control-Plane

use thiserror::Error;

/// Fehlertyp fuer die Control-Plane
#[derive(Debug, Error)]
pub enum ControlError {
    /// IO-Fehler (TCP, Socket)
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Ungueltige Konfiguration (z.B. leerer API-Schluessel)
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),
}

/// Result-Typ fuer die Control-Plane
pub type ControlResult<T> = Result<T, ControlError>;
