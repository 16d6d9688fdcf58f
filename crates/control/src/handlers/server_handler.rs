//! Server-Handler – Start, Stop, Konsole und Abfragen
//!
//! Jeder Befehl nennt den Zielserver per Name. Unbekannte Namen werden mit
//! `server_not_found` beantwortet, ohne den Zustand eines Servers anzufassen.

use observer_instance::ServerInstanz;
use observer_protocol::control::{
    CommandResponse, ConsoleRequest, ControlMessage, ControlPayload, ErrorCode,
    OnlinePlayersResponse, ServerInfo, ServerListResponse, ServerRequest, StatusResponse,
};
use std::sync::Arc;

use crate::handlers::lifecycle_code;
use crate::state::ControlState;

fn nicht_gefunden(server: &str) -> CommandResponse {
    CommandResponse::fehler(
        ErrorCode::ServerNotFound,
        format!("Server '{server}' ist nicht konfiguriert"),
    )
}

fn instanz<'a>(state: &'a ControlState, server: &str) -> Option<&'a ServerInstanz> {
    let instanz = state.registry.holen(server);
    if instanz.is_none() {
        tracing::debug!(server, "Befehl fuer unbekannten Server");
    }
    instanz
}

/// Startet einen Server und wartet, bis er online ist
///
/// Kann lange dauern; der Dispatcher fuehrt den Handler daher in einem
/// eigenen Task aus.
pub async fn handle_start(
    request: ServerRequest,
    request_id: u32,
    state: &Arc<ControlState>,
) -> ControlMessage {
    let antwort = match instanz(state, &request.server) {
        None => nicht_gefunden(&request.server),
        Some(instanz) => match instanz.controller.starten().await {
            Ok(()) => CommandResponse::ok(),
            Err(e) => CommandResponse::fehler(lifecycle_code(&e), e.to_string()),
        },
    };
    ControlMessage::new(request_id, ControlPayload::StartResponse(antwort))
}

/// Schickt den Stop-Befehl an einen laufenden Server
pub async fn handle_stop(
    request: ServerRequest,
    request_id: u32,
    state: &Arc<ControlState>,
) -> ControlMessage {
    let antwort = match instanz(state, &request.server) {
        None => nicht_gefunden(&request.server),
        Some(instanz) => match instanz.controller.stoppen().await {
            Ok(()) => CommandResponse::ok(),
            Err(e) => CommandResponse::fehler(lifecycle_code(&e), e.to_string()),
        },
    };
    ControlMessage::new(request_id, ControlPayload::StopResponse(antwort))
}

/// Leitet einen Konsolenbefehl an einen laufenden Server weiter
pub async fn handle_console(
    request: ConsoleRequest,
    request_id: u32,
    state: &Arc<ControlState>,
) -> ControlMessage {
    let antwort = match instanz(state, &request.server) {
        None => nicht_gefunden(&request.server),
        Some(instanz) => match instanz.controller.konsole(&request.command).await {
            Ok(()) => CommandResponse::ok(),
            Err(e) => CommandResponse::fehler(lifecycle_code(&e), e.to_string()),
        },
    };
    ControlMessage::new(request_id, ControlPayload::ConsoleResponse(antwort))
}

pub fn handle_online_players(
    request: ServerRequest,
    request_id: u32,
    state: &Arc<ControlState>,
) -> ControlMessage {
    let antwort = match instanz(state, &request.server) {
        None => OnlinePlayersResponse {
            success: false,
            reason: Some(ErrorCode::ServerNotFound),
            players: Vec::new(),
        },
        Some(instanz) => OnlinePlayersResponse {
            success: true,
            reason: None,
            players: instanz.controller.online_spieler(),
        },
    };
    ControlMessage::new(request_id, ControlPayload::OnlinePlayersResponse(antwort))
}

pub fn handle_status(
    request: ServerRequest,
    request_id: u32,
    state: &Arc<ControlState>,
) -> ControlMessage {
    let antwort = match instanz(state, &request.server) {
        None => StatusResponse {
            success: false,
            reason: Some(ErrorCode::ServerNotFound),
            status: None,
        },
        Some(instanz) => StatusResponse {
            success: true,
            reason: None,
            status: Some(instanz.controller.status()),
        },
    };
    ControlMessage::new(request_id, ControlPayload::StatusResponse(antwort))
}

/// Liste aller verwalteten Server (sortiert nach Name)
pub fn handle_server_list(request_id: u32, state: &Arc<ControlState>) -> ControlMessage {
    let servers = state
        .registry
        .server_liste()
        .into_iter()
        .map(|(name, kind, status)| ServerInfo { name, kind, status })
        .collect();
    ControlMessage::new(
        request_id,
        ControlPayload::ServerListResponse(ServerListResponse { servers }),
    )
}
