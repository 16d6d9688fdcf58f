//! observer-instance – Verwaltung einzelner Spielserver
//!
//! Dieses Crate enthaelt alles, was einen einzelnen verwalteten Server
//! ausmacht, und die Registry, die mehrere davon buendelt.
//!
//! ## Architektur
//!
//! ```text
//! ProcessSupervisor (JavaProcess)
//!     |  Konsolenzeilen
//!     v
//! EventClassifier  – Zeile -> ConsoleEvent
//!     |
//!     v
//! LifecycleController  – Zustand, Spieler, Idle-Timer, Start-Lock
//!     |  broadcast::Sender<LifecycleEvent>
//!     v
//! Abonnenten (Control-Plane, Metriken)
//!
//! WhitelistManager  – whitelist.json + IdentityResolver
//! ServerRegistry    – Name -> (Controller, Whitelist)
//! ```

pub mod classifier;
pub mod descriptor;
pub mod error;
pub mod identity;
pub mod idle_timer;
pub mod lifecycle;
pub mod patterns;
pub mod process;
pub mod properties;
pub mod registry;
pub mod store;
pub mod whitelist;

// Bequeme Re-Exporte
pub use classifier::{EventClassifier, PatternDefinition};
pub use descriptor::ServerDescriptor;
pub use error::{
    ClassifierError, LifecycleError, ProcessError, RegistryError, ResolveError, TimerError,
    WhitelistError,
};
pub use identity::{AufloesungsModus, HttpIdentityResolver, IdentityResolver};
pub use idle_timer::IdleTimer;
pub use lifecycle::LifecycleController;
pub use process::{JavaProcess, ProcessSupervisor, ProzessAusgabe};
pub use registry::{InstanzTeile, ServerInstanz, ServerRegistry};
pub use store::{JsonFileStore, WhitelistStore};
pub use whitelist::WhitelistManager;
