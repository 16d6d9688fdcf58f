//! Auth-Handler – Pruefung des API-Schluessels
//!
//! Die Registrierung der Sitzung beim Broadcaster uebernimmt der Dispatcher,
//! weil nur er die Send-Queue der Verbindung kennt.

use observer_protocol::control::{
    AuthenticateRequest, AuthenticateResponse, ControlMessage, ControlPayload, ErrorCode,
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::state::ControlState;

/// Verarbeitet eine Authentifizierungs-Anfrage
pub fn handle_authenticate(
    request: &AuthenticateRequest,
    request_id: u32,
    state: &Arc<ControlState>,
) -> ControlMessage {
    let erfolg = schluessel_gleich(request.secret.as_bytes(), state.config.api_key.as_bytes());

    if erfolg {
        tracing::info!(name = %request.display_name, "Client authentifiziert");
    } else {
        tracing::warn!(name = %request.display_name, "Authentifizierung fehlgeschlagen");
    }

    ControlMessage::new(
        request_id,
        ControlPayload::AuthenticateResponse(AuthenticateResponse {
            success: erfolg,
            reason: (!erfolg).then_some(ErrorCode::AuthenticationFailed),
        }),
    )
}

/// Vergleicht zwei Schluessel in konstanter Zeit
///
/// Unterschiedliche Laengen ergeben sofort `false`.
fn schluessel_gleich(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}
