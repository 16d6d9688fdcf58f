//! observer-core – Gemeinsame Typen, Ereignisse und Fehlertypen
//!
//! Dieses Crate stellt die fundamentalen Bausteine bereit, die von allen
//! anderen Observer-Crates gemeinsam genutzt werden: Verbindungs-IDs,
//! Lebenszyklus-Zustaende, typisierte Konsolen-Ereignisse und den
//! globalen Fehlertyp.

pub mod error;
pub mod event;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{ObserverError, Result};
pub use event::{AnyEvent, ConsoleEvent, LifecycleEvent, ServerEvent};
pub use types::{ConnectionId, LifecycleState, WhitelistEntry};
