//! observer-protocol – Control-Protokoll-Definitionen
//!
//! Dieses Crate definiert alle Nachrichtentypen, Fehler-Codes und das
//! Frame-Format, die zwischen Fernsteuerungs-Clients und dem Daemon
//! ausgetauscht werden.

pub mod control;
pub mod wire;

pub use control::{ControlMessage, ControlPayload, ErrorCode};
pub use wire::FrameCodec;
