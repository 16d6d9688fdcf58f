//! Whitelist-Handler – list, add, remove, clear

use observer_protocol::control::{
    ControlMessage, ControlPayload, ErrorCode, WhitelistAction, WhitelistRequest,
    WhitelistResponse,
};
use std::sync::Arc;

use crate::handlers::whitelist_code;
use crate::state::ControlState;

/// `true` wenn die Aktion die Mutations-Sperre der Whitelist braucht
///
/// Solche Anfragen laufen im Dispatcher in einem eigenen Task, weil ein
/// laufendes Hinzufuegen die Sperre ueber die UUID-Abfrage haelt.
pub fn ist_langsam(action: WhitelistAction) -> bool {
    !matches!(action, WhitelistAction::List)
}

/// Verarbeitet eine Whitelist-Anfrage
pub async fn handle_whitelist(
    request: WhitelistRequest,
    request_id: u32,
    state: &Arc<ControlState>,
) -> ControlMessage {
    let antwort = whitelist_ausfuehren(request, state).await;
    ControlMessage::new(request_id, ControlPayload::WhitelistResponse(antwort))
}

async fn whitelist_ausfuehren(request: WhitelistRequest, state: &ControlState) -> WhitelistResponse {
    let Some(instanz) = state.registry.holen(&request.server) else {
        return WhitelistResponse::fehler(ErrorCode::ServerNotFound);
    };
    let whitelist = &instanz.whitelist;

    let ergebnis = match request.action {
        WhitelistAction::List => Ok(WhitelistResponse {
            success: true,
            reason: None,
            entry: None,
            entries: Some(whitelist.liste()),
        }),
        WhitelistAction::Clear => whitelist.leeren().await.map(|()| WhitelistResponse {
            success: true,
            reason: None,
            entry: None,
            entries: None,
        }),
        WhitelistAction::Add | WhitelistAction::Remove => {
            let Some(name) = request.username.as_deref().filter(|n| !n.is_empty()) else {
                return WhitelistResponse::fehler(ErrorCode::InvalidRequest);
            };
            let eintrag = if request.action == WhitelistAction::Add {
                whitelist.hinzufuegen(name).await
            } else {
                whitelist.entfernen(name).await
            };
            eintrag.map(|eintrag| WhitelistResponse {
                success: true,
                reason: None,
                entry: Some(eintrag),
                entries: None,
            })
        }
    };

    ergebnis.unwrap_or_else(|e| {
        tracing::warn!(server = %request.server, fehler = %e, "Whitelist-Anfrage fehlgeschlagen");
        WhitelistResponse::fehler(whitelist_code(&e))
    })
}
