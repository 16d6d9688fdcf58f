//! Zuordnung eingehender Anfragen zu ihren Handlern
//!
//! ## Anmeldung
//! - `authenticate` ist immer erlaubt (nach Erfolg idempotent)
//! - Alle anderen Nachrichten einer nicht autorisierten Verbindung werden
//!   ohne Antwort verworfen
//!
//! Befehle, die auf einen Server warten (`start`) oder eine Aufloesung
//! brauchen (`whitelist add/remove/clear`), laufen in einem eigenen Task und
//! antworten ueber die Send-Queue der Verbindung. So blockiert ein langer
//! Start weder die Verbindung noch andere Clients.

use observer_core::types::ConnectionId;
use observer_protocol::control::{
    AuthenticateResponse, ControlMessage, ControlPayload, ErrorCode,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::handlers::{auth_handler, server_handler, whitelist_handler};
use crate::state::ControlState;

/// Was der Dispatcher ueber die anfragende Verbindung weiss
pub struct DispatcherContext {
    pub connection_id: ConnectionId,
    pub peer_addr: SocketAddr,
    /// Anzeigename nach erfolgreicher Authentifizierung (None = nicht autorisiert)
    pub display_name: Option<String>,
    /// Send-Queue der Verbindung (fuer Antworten aus Hintergrund-Tasks)
    pub antwort_tx: mpsc::Sender<ControlMessage>,
}

impl DispatcherContext {
    pub fn neu(
        connection_id: ConnectionId,
        peer_addr: SocketAddr,
        antwort_tx: mpsc::Sender<ControlMessage>,
    ) -> Self {
        Self {
            connection_id,
            peer_addr,
            display_name: None,
            antwort_tx,
        }
    }

    pub fn ist_autorisiert(&self) -> bool {
        self.display_name.is_some()
    }
}

/// Verteilt Anfragen einer Verbindung auf die Handler
pub struct MessageDispatcher {
    state: Arc<ControlState>,
}

impl MessageDispatcher {
    pub fn neu(state: Arc<ControlState>) -> Self {
        Self { state }
    }

    /// Verarbeitet eine eingehende ControlMessage und gibt die Antwort zurueck
    ///
    /// Gibt `None` zurueck wenn keine Antwort gesendet werden soll: bei Pong,
    /// bei verworfenen Nachrichten und wenn die Antwort spaeter aus einem
    /// Hintergrund-Task kommt.
    pub async fn dispatch(
        &self,
        message: ControlMessage,
        ctx: &mut DispatcherContext,
    ) -> Option<ControlMessage> {
        let request_id = message.request_id;
        let befehl = message.payload.befehl();

        if let ControlPayload::Authenticate(req) = &message.payload {
            let antwort = if ctx.ist_autorisiert() {
                ControlMessage::new(
                    request_id,
                    ControlPayload::AuthenticateResponse(AuthenticateResponse {
                        success: true,
                        reason: None,
                    }),
                )
            } else {
                let antwort = auth_handler::handle_authenticate(req, request_id, &self.state);
                if matches!(&antwort.payload, ControlPayload::AuthenticateResponse(r) if r.success)
                {
                    self.sitzung_oeffnen(ctx, &req.display_name);
                }
                antwort
            };
            self.zaehlen(befehl, &antwort);
            return Some(antwort);
        }

        if !ctx.ist_autorisiert() {
            tracing::trace!(
                verbindung = %ctx.connection_id,
                befehl,
                "Nachricht vor Authentifizierung verworfen"
            );
            return None;
        }

        let antwort = match message.payload {
            // -------------------------------------------------------------------
            // Keepalive
            // -------------------------------------------------------------------
            ControlPayload::Ping(ping) => return Some(ControlMessage::pong(request_id, ping)),
            ControlPayload::Pong(_) => return None,

            // -------------------------------------------------------------------
            // Lebenszyklus
            // -------------------------------------------------------------------
            ControlPayload::Start(req) => {
                let state = Arc::clone(&self.state);
                let tx = ctx.antwort_tx.clone();
                tokio::spawn(async move {
                    let antwort = server_handler::handle_start(req, request_id, &state).await;
                    befehl_zaehlen(&state, befehl, &antwort);
                    if tx.send(antwort).await.is_err() {
                        tracing::debug!("Verbindung vor Start-Antwort getrennt");
                    }
                });
                return None;
            }
            ControlPayload::Stop(req) => {
                server_handler::handle_stop(req, request_id, &self.state).await
            }
            ControlPayload::Console(req) => {
                server_handler::handle_console(req, request_id, &self.state).await
            }

            // -------------------------------------------------------------------
            // Abfragen
            // -------------------------------------------------------------------
            ControlPayload::OnlinePlayers(req) => {
                server_handler::handle_online_players(req, request_id, &self.state)
            }
            ControlPayload::Status(req) => {
                server_handler::handle_status(req, request_id, &self.state)
            }
            ControlPayload::ServerList => {
                server_handler::handle_server_list(request_id, &self.state)
            }

            // -------------------------------------------------------------------
            // Whitelist
            // -------------------------------------------------------------------
            ControlPayload::Whitelist(req) if whitelist_handler::ist_langsam(req.action) => {
                let state = Arc::clone(&self.state);
                let tx = ctx.antwort_tx.clone();
                tokio::spawn(async move {
                    let antwort = whitelist_handler::handle_whitelist(req, request_id, &state).await;
                    befehl_zaehlen(&state, befehl, &antwort);
                    if tx.send(antwort).await.is_err() {
                        tracing::debug!("Verbindung vor Whitelist-Antwort getrennt");
                    }
                });
                return None;
            }
            ControlPayload::Whitelist(req) => {
                whitelist_handler::handle_whitelist(req, request_id, &self.state).await
            }

            // -------------------------------------------------------------------
            // Antworten und Pushes gehoeren nicht zum Client
            // -------------------------------------------------------------------
            ControlPayload::Authenticate(_)
            | ControlPayload::AuthenticateResponse(_)
            | ControlPayload::StartResponse(_)
            | ControlPayload::StopResponse(_)
            | ControlPayload::ConsoleResponse(_)
            | ControlPayload::OnlinePlayersResponse(_)
            | ControlPayload::StatusResponse(_)
            | ControlPayload::ServerListResponse(_)
            | ControlPayload::WhitelistResponse(_)
            | ControlPayload::Event(_)
            | ControlPayload::Error(_) => {
                tracing::debug!(verbindung = %ctx.connection_id, befehl, "Unerwartete Nachricht vom Client");
                ControlMessage::error(
                    request_id,
                    ErrorCode::InvalidRequest,
                    format!("'{befehl}' kann nicht vom Client gesendet werden"),
                )
            }
        };

        self.zaehlen(befehl, &antwort);
        Some(antwort)
    }

    /// Raeumt die Sitzung einer getrennten Verbindung ab
    pub fn verbindung_beendet(&self, ctx: &DispatcherContext) {
        if self.state.broadcaster.sitzung_entfernen(&ctx.connection_id) {
            self.state.metriken.authorized_sessions.dec();
            tracing::info!(
                verbindung = %ctx.connection_id,
                name = ctx.display_name.as_deref().unwrap_or(""),
                "Sitzung beendet"
            );
        }
    }

    fn sitzung_oeffnen(&self, ctx: &mut DispatcherContext, display_name: &str) {
        ctx.display_name = Some(display_name.to_string());
        self.state.broadcaster.sitzung_registrieren(
            ctx.connection_id,
            display_name,
            ctx.antwort_tx.clone(),
        );
        self.state.metriken.authorized_sessions.inc();
        tracing::debug!(
            verbindung = %ctx.connection_id,
            peer = %ctx.peer_addr,
            "Verbindung autorisiert"
        );
    }

    fn zaehlen(&self, befehl: &str, antwort: &ControlMessage) {
        befehl_zaehlen(&self.state, befehl, antwort);
    }
}

fn befehl_zaehlen(state: &ControlState, befehl: &str, antwort: &ControlMessage) {
    state.metriken.befehl_zaehlen(befehl, ergebnis_label(antwort));
}

/// Ergebnis einer Antwort fuer das Metrik-Label `result`
fn ergebnis_label(antwort: &ControlMessage) -> &'static str {
    let reason = match &antwort.payload {
        ControlPayload::AuthenticateResponse(r) => r.reason,
        ControlPayload::StartResponse(r)
        | ControlPayload::StopResponse(r)
        | ControlPayload::ConsoleResponse(r) => r.reason,
        ControlPayload::OnlinePlayersResponse(r) => r.reason,
        ControlPayload::StatusResponse(r) => r.reason,
        ControlPayload::WhitelistResponse(r) => r.reason,
        ControlPayload::Error(e) => Some(e.code),
        _ => None,
    };
    reason.map_or("ok", |code| code.als_str())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testhilfen;
    use observer_protocol::control::{
        AuthenticateRequest, Keepalive, ServerRequest, WhitelistAction, WhitelistRequest,
    };

    fn kontext() -> (DispatcherContext, mpsc::Receiver<ControlMessage>) {
        let (tx, rx) = mpsc::channel(16);
        let ctx = DispatcherContext::neu(
            ConnectionId::new(),
            "127.0.0.1:50000".parse().unwrap(),
            tx,
        );
        (ctx, rx)
    }

    fn auth(secret: &str) -> ControlMessage {
        ControlMessage::new(
            1,
            ControlPayload::Authenticate(AuthenticateRequest {
                display_name: "panel".into(),
                secret: secret.into(),
            }),
        )
    }

    fn status_anfrage(id: u32) -> ControlMessage {
        ControlMessage::new(
            id,
            ControlPayload::Status(ServerRequest {
                server: "alpha".into(),
            }),
        )
    }

    #[tokio::test]
    async fn vor_authentifizierung_keine_antwort() {
        let state = testhilfen::test_state().await;
        let dispatcher = MessageDispatcher::neu(state.clone());
        let (mut ctx, _rx) = kontext();

        assert!(dispatcher.dispatch(status_anfrage(2), &mut ctx).await.is_none());
        assert!(dispatcher
            .dispatch(ControlMessage::ping(3), &mut ctx)
            .await
            .is_none());
        assert_eq!(state.broadcaster.sitzungs_anzahl(), 0);
    }

    #[tokio::test]
    async fn falscher_schluessel_autorisiert_nicht() {
        let state = testhilfen::test_state().await;
        let dispatcher = MessageDispatcher::neu(state.clone());
        let (mut ctx, _rx) = kontext();

        let antwort = dispatcher.dispatch(auth("falsch"), &mut ctx).await.unwrap();
        assert!(matches!(
            antwort.payload,
            ControlPayload::AuthenticateResponse(AuthenticateResponse { success: false, .. })
        ));
        assert!(!ctx.ist_autorisiert());
        assert!(dispatcher.dispatch(status_anfrage(2), &mut ctx).await.is_none());
    }

    #[tokio::test]
    async fn authentifizierung_registriert_sitzung() {
        let state = testhilfen::test_state().await;
        let dispatcher = MessageDispatcher::neu(state.clone());
        let (mut ctx, _rx) = kontext();

        dispatcher.dispatch(auth(testhilfen::API_KEY), &mut ctx).await.unwrap();
        assert!(ctx.ist_autorisiert());
        assert!(state.broadcaster.ist_registriert(&ctx.connection_id));
        assert_eq!(state.metriken.authorized_sessions.get(), 1);

        // Erneutes authenticate ist idempotent
        let nochmal = dispatcher.dispatch(auth("egal"), &mut ctx).await.unwrap();
        assert!(matches!(
            nochmal.payload,
            ControlPayload::AuthenticateResponse(AuthenticateResponse { success: true, .. })
        ));
        assert_eq!(state.broadcaster.sitzungs_anzahl(), 1);

        let status = dispatcher.dispatch(status_anfrage(5), &mut ctx).await.unwrap();
        assert_eq!(status.request_id, 5);
        assert!(matches!(status.payload, ControlPayload::StatusResponse(_)));

        dispatcher.verbindung_beendet(&ctx);
        assert_eq!(state.broadcaster.sitzungs_anzahl(), 0);
        assert_eq!(state.metriken.authorized_sessions.get(), 0);
    }

    #[tokio::test]
    async fn start_antwortet_ueber_queue() {
        let state = testhilfen::test_state().await;
        let dispatcher = MessageDispatcher::neu(state.clone());
        let (mut ctx, mut rx) = kontext();
        dispatcher.dispatch(auth(testhilfen::API_KEY), &mut ctx).await.unwrap();

        let start = ControlMessage::new(
            7,
            ControlPayload::Start(ServerRequest {
                server: "alpha".into(),
            }),
        );
        assert!(dispatcher.dispatch(start, &mut ctx).await.is_none());

        let antwort = loop {
            let msg = rx.recv().await.expect("Queue darf nicht schliessen");
            if msg.request_id == 7 {
                break msg;
            }
        };
        match antwort.payload {
            ControlPayload::StartResponse(r) => assert!(r.success, "{r:?}"),
            anders => panic!("StartResponse erwartet, erhalten: {anders:?}"),
        }
    }

    #[tokio::test]
    async fn whitelist_add_antwortet_ueber_queue() {
        let state = testhilfen::test_state().await;
        let dispatcher = MessageDispatcher::neu(state.clone());
        let (mut ctx, mut rx) = kontext();
        dispatcher.dispatch(auth(testhilfen::API_KEY), &mut ctx).await.unwrap();

        let add = ControlMessage::new(
            8,
            ControlPayload::Whitelist(WhitelistRequest {
                server: "alpha".into(),
                action: WhitelistAction::Add,
                username: Some("bob".into()),
            }),
        );
        assert!(dispatcher.dispatch(add, &mut ctx).await.is_none());
        let antwort = rx.recv().await.unwrap();
        assert_eq!(antwort.request_id, 8);
        assert!(matches!(
            antwort.payload,
            ControlPayload::WhitelistResponse(ref r) if r.success
        ));
    }

    #[tokio::test]
    async fn whitelist_clear_laeuft_nicht_auf_der_verbindung() {
        let state = testhilfen::test_state().await;
        let dispatcher = MessageDispatcher::neu(state.clone());
        let (mut ctx, mut rx) = kontext();
        dispatcher.dispatch(auth(testhilfen::API_KEY), &mut ctx).await.unwrap();

        let anfrage = |id, action| {
            ControlMessage::new(
                id,
                ControlPayload::Whitelist(WhitelistRequest {
                    server: "alpha".into(),
                    action,
                    username: None,
                }),
            )
        };
        assert!(dispatcher
            .dispatch(anfrage(9, WhitelistAction::Clear), &mut ctx)
            .await
            .is_none());
        let antwort = rx.recv().await.unwrap();
        assert_eq!(antwort.request_id, 9);
        assert!(matches!(
            antwort.payload,
            ControlPayload::WhitelistResponse(ref r) if r.success
        ));

        // list bleibt eine direkte Antwort
        let liste = dispatcher
            .dispatch(anfrage(10, WhitelistAction::List), &mut ctx)
            .await
            .unwrap();
        assert_eq!(liste.request_id, 10);
    }

    #[tokio::test]
    async fn antworten_vom_client_sind_ungueltig() {
        let state = testhilfen::test_state().await;
        let dispatcher = MessageDispatcher::neu(state);
        let (mut ctx, _rx) = kontext();
        dispatcher.dispatch(auth(testhilfen::API_KEY), &mut ctx).await.unwrap();

        let falsch = ControlMessage::error(4, ErrorCode::InternalError, "vom Client");
        let antwort = dispatcher.dispatch(falsch, &mut ctx).await.unwrap();
        match antwort.payload {
            ControlPayload::Error(e) => assert_eq!(e.code, ErrorCode::InvalidRequest),
            anders => panic!("Error erwartet, erhalten: {anders:?}"),
        }
    }

    #[tokio::test]
    async fn ping_nach_authentifizierung() {
        let state = testhilfen::test_state().await;
        let dispatcher = MessageDispatcher::neu(state);
        let (mut ctx, _rx) = kontext();
        dispatcher.dispatch(auth(testhilfen::API_KEY), &mut ctx).await.unwrap();

        let pong = dispatcher
            .dispatch(
                ControlMessage::new(3, ControlPayload::Ping(Keepalive { ts: 111 })),
                &mut ctx,
            )
            .await
            .unwrap();
        match pong.payload {
            ControlPayload::Pong(p) => assert_eq!(p.ts, 111),
            anders => panic!("Pong erwartet, erhalten: {anders:?}"),
        }
    }

    #[test]
    fn ergebnis_label_aus_antwort() {
        let fehler = ControlMessage::error(1, ErrorCode::ServerNotFound, "x");
        assert_eq!(ergebnis_label(&fehler), "server_not_found");
        assert_eq!(ergebnis_label(&ControlMessage::pong(1, Keepalive { ts: 0 })), "ok");
    }
}
