//! Handler fuer alle Control-Nachrichten
//!
//! Jeder Handler ist fuer einen bestimmten Nachrichtentyp zustaendig
//! und hat Zugriff auf den gemeinsamen ControlState. Fehler der
//! Server-Verwaltung werden hier auf stabile Draht-Codes abgebildet.

pub mod auth_handler;
pub mod server_handler;
pub mod whitelist_handler;

use observer_instance::{LifecycleError, WhitelistError};
use observer_protocol::control::ErrorCode;

/// Draht-Code fuer einen abgelehnten oder fehlgeschlagenen Lebenszyklus-Befehl
pub fn lifecycle_code(fehler: &LifecycleError) -> ErrorCode {
    match fehler {
        LifecycleError::StartAbgelehnt { .. } => ErrorCode::StartRejected,
        LifecycleError::StartFehlgeschlagen { .. } => ErrorCode::StartFailed,
        LifecycleError::StopAbgelehnt { .. } => ErrorCode::StopRejected,
        LifecycleError::KonsoleAbgelehnt { .. } => ErrorCode::ConsoleRejected,
        LifecycleError::Prozess(_) => ErrorCode::InternalError,
    }
}

/// Draht-Code fuer einen Whitelist-Fehler
pub fn whitelist_code(fehler: &WhitelistError) -> ErrorCode {
    match fehler {
        WhitelistError::NichtGeladen => ErrorCode::WhitelistNotLoaded,
        WhitelistError::Aufloesung { .. } => ErrorCode::WhitelistResolutionFailed,
        WhitelistError::Doppelt { .. } => ErrorCode::WhitelistDuplicate,
        WhitelistError::NichtGefunden { .. } => ErrorCode::WhitelistNotFound,
        WhitelistError::Persistenz(_) => ErrorCode::WhitelistPersistenceFailed,
    }
}
