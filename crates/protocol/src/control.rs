//! Nachrichten der Control-Verbindung
//!
//! Ein Client schickt `{request_id, payload: {type, ...}}` und bekommt genau
//! eine Antwort mit derselben `request_id`. Antworten melden `success` und
//! bei Fehlschlag einen [`ErrorCode`] als `reason`.
//!
//! Ereignisse der Server kommen unaufgefordert als `event:<name>` mit
//! `request_id = 0`.

use serde::{Deserialize, Serialize};

use observer_core::types::{LifecycleState, WhitelistEntry};

// ---------------------------------------------------------------------------
// Fehler-Codes
// ---------------------------------------------------------------------------

/// Stabile Fehler-Codes fuer fehlgeschlagene Befehle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // Allgemein
    InternalError,
    InvalidRequest,
    ServerNotFound,
    // Auth
    AuthenticationFailed,
    // Lebenszyklus
    StartRejected,
    StartFailed,
    StopRejected,
    ConsoleRejected,
    // Whitelist
    WhitelistNotLoaded,
    WhitelistDuplicate,
    WhitelistNotFound,
    WhitelistResolutionFailed,
    WhitelistPersistenceFailed,
}

impl ErrorCode {
    /// Code wie er auf dem Draht erscheint
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::InternalError => "internal_error",
            Self::InvalidRequest => "invalid_request",
            Self::ServerNotFound => "server_not_found",
            Self::AuthenticationFailed => "authentication_failed",
            Self::StartRejected => "start_rejected",
            Self::StartFailed => "start_failed",
            Self::StopRejected => "stop_rejected",
            Self::ConsoleRejected => "console_rejected",
            Self::WhitelistNotLoaded => "whitelist_not_loaded",
            Self::WhitelistDuplicate => "whitelist_duplicate",
            Self::WhitelistNotFound => "whitelist_not_found",
            Self::WhitelistResolutionFailed => "whitelist_resolution_failed",
            Self::WhitelistPersistenceFailed => "whitelist_persistence_failed",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.als_str())
    }
}

// ---------------------------------------------------------------------------
// Auth-Nachrichten
// ---------------------------------------------------------------------------

/// Authentifizierungs-Anfrage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticateRequest {
    /// Anzeigename des Clients (nur fuer Logs und Session-Liste)
    pub display_name: String,
    /// Geteiltes Geheimnis (API-Key aus der Konfiguration)
    pub secret: String,
}

/// Antwort auf eine Authentifizierung
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticateResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<ErrorCode>,
}

// ---------------------------------------------------------------------------
// Server-Befehle
// ---------------------------------------------------------------------------

/// Anfrage die nur einen Servernamen braucht (start, stop, status, ...)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerRequest {
    pub server: String,
}

/// Konsolenbefehl an einen Server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleRequest {
    pub server: String,
    /// Befehlstext wie er in die Serverkonsole getippt wuerde
    pub command: String,
}

/// Ergebnis eines Befehls ohne weitere Nutzdaten (start, stop, console)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<ErrorCode>,
    /// Menschenlesbare Beschreibung des Fehlers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CommandResponse {
    /// Erfolgreiche Antwort
    pub fn ok() -> Self {
        Self {
            success: true,
            reason: None,
            message: None,
        }
    }

    /// Fehlgeschlagene Antwort mit Code und Beschreibung
    pub fn fehler(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            reason: Some(code),
            message: Some(message.into()),
        }
    }
}

/// Liste der online Spieler eines Servers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnlinePlayersResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<ErrorCode>,
    #[serde(default)]
    pub players: Vec<String>,
}

/// Lebenszyklus-Zustand eines Servers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<ErrorCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<LifecycleState>,
}

/// Kurzinfo eines verwalteten Servers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    /// Server-Art (z.B. "paper")
    pub kind: String,
    pub status: LifecycleState,
}

/// Liste aller verwalteten Server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerListResponse {
    pub servers: Vec<ServerInfo>,
}

// ---------------------------------------------------------------------------
// Whitelist
// ---------------------------------------------------------------------------

/// Aktion auf der Whitelist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WhitelistAction {
    List,
    Add,
    Remove,
    Clear,
}

/// Whitelist-Anfrage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhitelistRequest {
    pub server: String,
    pub action: WhitelistAction,
    /// Spielername (nur fuer add/remove)
    #[serde(default)]
    pub username: Option<String>,
}

/// Antwort auf eine Whitelist-Anfrage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhitelistResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<ErrorCode>,
    /// Betroffener Eintrag (add/remove)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<WhitelistEntry>,
    /// Vollstaendige Liste (nur bei list)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entries: Option<Vec<WhitelistEntry>>,
}

impl WhitelistResponse {
    /// Fehlgeschlagene Antwort mit Code
    pub fn fehler(code: ErrorCode) -> Self {
        Self {
            success: false,
            reason: Some(code),
            entry: None,
            entries: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Push-Benachrichtigungen
// ---------------------------------------------------------------------------

/// Ereignis eines Servers, an alle autorisierten Sessions verteilt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventNotification {
    /// `event:<name>` bzw. `event:any`
    pub event: String,
    pub server: String,
    pub data: serde_json::Value,
}

/// Praefix aller Ereignis-Namen auf dem Draht
pub const EVENT_PREFIX: &str = "event:";

/// Name der generischen Benachrichtigung
pub const ANY_EVENT: &str = "event:any";

// ---------------------------------------------------------------------------
// Keepalive
// ---------------------------------------------------------------------------

/// Nutzlast von `ping` und `pong`; das Pong spiegelt `ts` des Pings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keepalive {
    /// Millisekunden seit Unix-Epoche beim Absender des Pings
    pub ts: u64,
}

impl Keepalive {
    pub fn jetzt() -> Self {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self { ts }
    }
}

// ---------------------------------------------------------------------------
// Haupt-Enum: ControlPayload
// ---------------------------------------------------------------------------

/// Inhalt einer Nachricht; `type` auf dem Draht ist der Variantenname
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlPayload {
    // Auth
    Authenticate(AuthenticateRequest),
    AuthenticateResponse(AuthenticateResponse),

    // Lebenszyklus
    Start(ServerRequest),
    StartResponse(CommandResponse),
    Stop(ServerRequest),
    StopResponse(CommandResponse),
    Console(ConsoleRequest),
    ConsoleResponse(CommandResponse),

    // Abfragen
    OnlinePlayers(ServerRequest),
    OnlinePlayersResponse(OnlinePlayersResponse),
    Status(ServerRequest),
    StatusResponse(StatusResponse),
    ServerList,
    ServerListResponse(ServerListResponse),

    // Whitelist
    Whitelist(WhitelistRequest),
    WhitelistResponse(WhitelistResponse),

    // Push
    Event(EventNotification),

    Ping(Keepalive),
    Pong(Keepalive),

    /// Anfrage ohne passende Antwortart (kaputt oder vom falschen Absender)
    Error(ErrorResponse),
}

impl ControlPayload {
    /// Befehlsname fuer Logs und Metriken
    pub fn befehl(&self) -> &'static str {
        match self {
            Self::Authenticate(_) => "authenticate",
            Self::AuthenticateResponse(_) => "authenticate_response",
            Self::Start(_) => "start",
            Self::StartResponse(_) => "start_response",
            Self::Stop(_) => "stop",
            Self::StopResponse(_) => "stop_response",
            Self::Console(_) => "console",
            Self::ConsoleResponse(_) => "console_response",
            Self::OnlinePlayers(_) => "online_players",
            Self::OnlinePlayersResponse(_) => "online_players_response",
            Self::Status(_) => "status",
            Self::StatusResponse(_) => "status_response",
            Self::ServerList => "server_list",
            Self::ServerListResponse(_) => "server_list_response",
            Self::Whitelist(_) => "whitelist",
            Self::WhitelistResponse(_) => "whitelist_response",
            Self::Event(_) => "event",
            Self::Ping(_) => "ping",
            Self::Pong(_) => "pong",
            Self::Error(_) => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Umschlag
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlMessage {
    /// Vom Client vergeben, in der Antwort gespiegelt; 0 bei Pushes
    pub request_id: u32,
    pub payload: ControlPayload,
}

impl ControlMessage {
    pub fn new(request_id: u32, payload: ControlPayload) -> Self {
        Self {
            request_id,
            payload,
        }
    }

    /// Keepalive des Servers mit aktueller Uhrzeit
    pub fn ping(request_id: u32) -> Self {
        Self::new(request_id, ControlPayload::Ping(Keepalive::jetzt()))
    }

    /// Antwort auf einen Ping des Clients
    pub fn pong(request_id: u32, ping: Keepalive) -> Self {
        Self::new(request_id, ControlPayload::Pong(ping))
    }

    pub fn error(request_id: u32, code: ErrorCode, message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(request_id, ControlPayload::Error(ErrorResponse { code, message }))
    }

    /// Erstellt eine Push-Benachrichtigung `event:<name>`
    pub fn event(server: impl Into<String>, name: &str, data: serde_json::Value) -> Self {
        Self::new(
            0,
            ControlPayload::Event(EventNotification {
                event: format!("{EVENT_PREFIX}{name}"),
                server: server.into(),
                data,
            }),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
