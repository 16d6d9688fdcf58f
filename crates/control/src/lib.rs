//! observer-control – TCP-Control-Plane
//!
//! Dieses Crate nimmt Fernsteuerungs-Verbindungen an, authentifiziert sie
//! mit dem konfigurierten API-Schluessel, leitet ihre Befehle an die
//! `ServerRegistry` weiter und verteilt die Ereignisse aller Server an alle
//! authentifizierten Sitzungen.
//!
//! ## Architektur
//!
//! ```text
//! TCP Listener (ControlServer)
//!     |
//!     v
//! ClientConnection (pro Verbindung ein Task)
//!     |  Unauthentifiziert --authenticate--> Autorisiert
//!     |  (Auth-Frist, danach Keepalive)
//!     v
//! MessageDispatcher
//!     |
//!     +-- AuthHandler       (authenticate)
//!     +-- ServerHandler     (start, stop, console, status, online_players, server_list)
//!     +-- WhitelistHandler  (list, add, remove, clear)
//!
//! EventRelay       – abonniert jeden Server, formt Push-Nachrichten
//! EventBroadcaster – Send-Queues aller autorisierten Sitzungen
//! ```

pub mod broadcast;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod relay;
pub mod state;
pub mod tcp;

#[cfg(test)]
mod testhilfen;

// Bequeme Re-Exporte
pub use broadcast::EventBroadcaster;
pub use connection::ClientConnection;
pub use dispatcher::MessageDispatcher;
pub use error::{ControlError, ControlResult};
pub use relay::EventRelay;
pub use state::{ControlConfig, ControlState};
pub use tcp::ControlServer;
