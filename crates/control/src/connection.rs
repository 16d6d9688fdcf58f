//! Eine Control-Verbindung pro Task
//!
//! ## Zustaende
//! ```text
//! Unauthentifiziert --authenticate--> Autorisiert
//!     |  (Auth-Frist abgelaufen)          |
//!     v                                   v
//!     +----------- Getrennt -------------+
//! ```
//!
//! ## Keepalive
//! - Vor der Authentifizierung gilt nur die Auth-Frist
//! - Danach sendet der Server alle `keepalive_sek` einen Ping
//! - Kommt `verbindungs_timeout_sek` lang nichts vom Client, wird getrennt

use futures_util::{SinkExt, StreamExt};
use observer_core::types::ConnectionId;
use observer_protocol::{
    control::{ControlMessage, ErrorCode},
    wire::FrameCodec,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::codec::Framed;

use crate::broadcast::SEND_QUEUE_GROESSE;
use crate::dispatcher::{DispatcherContext, MessageDispatcher};
use crate::state::ControlState;

// ---------------------------------------------------------------------------
// Fristen
// ---------------------------------------------------------------------------

/// Zeitpunkte, an denen die Verbindung ohne Client-Eingabe handeln muss
struct Fristen {
    auth_bis: Instant,
    keepalive: Duration,
    stille_max: Duration,
    letzter_empfang: Instant,
    naechster_ping: Instant,
}

impl Fristen {
    fn neu(state: &ControlState) -> Self {
        let jetzt = Instant::now();
        let keepalive = Duration::from_secs(state.config.keepalive_sek);
        Self {
            auth_bis: jetzt + state.config.auth_frist(),
            keepalive,
            stille_max: Duration::from_secs(state.config.verbindungs_timeout_sek),
            letzter_empfang: jetzt,
            naechster_ping: jetzt + keepalive,
        }
    }

    /// Grund zum Trennen, falls eine Frist verstrichen ist
    fn verstrichen(&self, autorisiert: bool) -> Option<&'static str> {
        let jetzt = Instant::now();
        if !autorisiert && jetzt >= self.auth_bis {
            Some("Keine Authentifizierung innerhalb der Frist")
        } else if autorisiert && jetzt.duration_since(self.letzter_empfang) > self.stille_max {
            Some("Verbindungs-Timeout")
        } else {
            None
        }
    }

    fn weckzeit(&self, autorisiert: bool) -> Instant {
        if autorisiert {
            self.naechster_ping
        } else {
            self.auth_bis
        }
    }

    fn empfangen(&mut self) {
        self.letzter_empfang = Instant::now();
    }

    /// Nach erfolgreicher Anmeldung beginnt der Keepalive-Takt neu
    fn angemeldet(&mut self) {
        self.naechster_ping = Instant::now() + self.keepalive;
    }

    fn ping_faellig(&self) -> bool {
        Instant::now() >= self.naechster_ping
    }

    fn ping_gesendet(&mut self) {
        self.naechster_ping = Instant::now() + self.keepalive;
    }
}

// ---------------------------------------------------------------------------
// ClientConnection
// ---------------------------------------------------------------------------

/// Eine Control-Verbindung, von der Annahme bis zum Trennen
///
/// Antworten auf direkte Anfragen gehen sofort auf den Socket. Antworten aus
/// Hintergrund-Tasks und Ereignis-Pushes kommen ueber die Send-Queue.
pub struct ClientConnection {
    state: Arc<ControlState>,
    peer_addr: SocketAddr,
    connection_id: ConnectionId,
}

impl ClientConnection {
    pub fn neu(state: Arc<ControlState>, peer_addr: SocketAddr) -> Self {
        Self {
            state,
            peer_addr,
            connection_id: ConnectionId::new(),
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Bedient die Verbindung bis Trennung, verstrichener Frist oder Shutdown
    pub async fn verarbeiten<S>(self, stream: S, mut shutdown_rx: tokio::sync::watch::Receiver<bool>)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let peer = self.peer_addr;
        tracing::info!(peer = %peer, verbindung = %self.connection_id, "Neue Verbindung");
        self.state.metriken.connected_clients.inc();

        let mut framed = Framed::new(stream, FrameCodec::new());
        let (queue_tx, mut queue_rx) = mpsc::channel::<ControlMessage>(SEND_QUEUE_GROESSE);
        let mut ctx = DispatcherContext::neu(self.connection_id, peer, queue_tx);
        let dispatcher = MessageDispatcher::neu(Arc::clone(&self.state));
        let mut fristen = Fristen::neu(&self.state);
        let mut ping_id: u32 = 0;

        loop {
            if let Some(grund) = fristen.verstrichen(ctx.ist_autorisiert()) {
                tracing::warn!(peer = %peer, "{grund}");
                break;
            }
            let weckzeit = fristen.weckzeit(ctx.ist_autorisiert());

            let ausgehend = tokio::select! {
                eingang = framed.next() => match eingang {
                    Some(Ok(anfrage)) => {
                        fristen.empfangen();
                        tracing::trace!(peer = %peer, request_id = anfrage.request_id, befehl = anfrage.payload.befehl(), "Anfrage");
                        let vorher = ctx.ist_autorisiert();
                        let antwort = dispatcher.dispatch(anfrage, &mut ctx).await;
                        if !vorher && ctx.ist_autorisiert() {
                            fristen.angemeldet();
                        }
                        antwort
                    }
                    Some(Err(e)) if e.kind() == std::io::ErrorKind::InvalidData => {
                        tracing::warn!(peer = %peer, fehler = %e, "Ungueltiger Frame, Verbindung wird getrennt");
                        let _ = framed
                            .send(ControlMessage::error(0, ErrorCode::InvalidRequest, format!("Ungueltiger Frame: {e}")))
                            .await;
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::warn!(peer = %peer, fehler = %e, "Lesefehler");
                        break;
                    }
                    None => {
                        tracing::info!(peer = %peer, "Client hat die Verbindung getrennt");
                        break;
                    }
                },

                Some(nachricht) = queue_rx.recv() => Some(nachricht),

                _ = tokio::time::sleep_until(weckzeit) => {
                    if ctx.ist_autorisiert() && fristen.ping_faellig() {
                        fristen.ping_gesendet();
                        ping_id = ping_id.wrapping_add(1);
                        Some(ControlMessage::ping(ping_id))
                    } else {
                        None
                    }
                }

                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!(peer = %peer, "Shutdown, Verbindung wird getrennt");
                        break;
                    }
                    None
                }
            };

            if let Some(nachricht) = ausgehend {
                if let Err(e) = framed.send(nachricht).await {
                    tracing::warn!(peer = %peer, fehler = %e, "Senden fehlgeschlagen");
                    break;
                }
            }
        }

        dispatcher.verbindung_beendet(&ctx);
        self.state.metriken.connected_clients.dec();
        tracing::info!(peer = %peer, verbindung = %self.connection_id, "Verbindung beendet");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testhilfen;
    use observer_protocol::control::{AuthenticateRequest, ControlPayload, ServerRequest};
    use tokio::io::{duplex, AsyncWriteExt, DuplexStream};

    fn adresse() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn auth() -> ControlMessage {
        ControlMessage::new(
            1,
            ControlPayload::Authenticate(AuthenticateRequest {
                display_name: "panel".into(),
                secret: testhilfen::API_KEY.into(),
            }),
        )
    }

    fn starten(
        state: Arc<ControlState>,
    ) -> (
        Framed<DuplexStream, FrameCodec>,
        tokio::sync::watch::Sender<bool>,
        tokio::task::JoinHandle<()>,
    ) {
        let (client, server) = duplex(64 * 1024);
        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
        let verbindung = ClientConnection::neu(state, adresse());
        let task = tokio::spawn(verbindung.verarbeiten(server, shutdown_rx));
        (Framed::new(client, FrameCodec::new()), shutdown_tx, task)
    }

    #[tokio::test(start_paused = true)]
    async fn auth_frist_trennt_verbindung() {
        let state = testhilfen::test_state().await;
        let (mut client, _shutdown, task) = starten(state.clone());

        // Befehle vor der Authentifizierung bleiben unbeantwortet
        client
            .send(ControlMessage::new(
                2,
                ControlPayload::Status(ServerRequest {
                    server: "alpha".into(),
                }),
            ))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(client.next().await.is_none(), "Verbindung muss geschlossen sein");
        task.await.unwrap();
        assert_eq!(state.metriken.connected_clients.get(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn keepalive_nach_authentifizierung() {
        let state = testhilfen::test_state().await;
        let (mut client, _shutdown, _task) = starten(state.clone());

        client.send(auth()).await.unwrap();
        let antwort = client.next().await.unwrap().unwrap();
        assert!(matches!(antwort.payload, ControlPayload::AuthenticateResponse(ref r) if r.success));

        // Nach Ablauf der Auth-Frist bleibt die Verbindung bestehen
        tokio::time::sleep(Duration::from_secs(31)).await;
        let ping = client.next().await.unwrap().unwrap();
        assert!(matches!(ping.payload, ControlPayload::Ping(_)));
    }

    #[tokio::test]
    async fn ungueltiger_frame() {
        let state = testhilfen::test_state().await;
        let (client, _shutdown, task) = starten(state);
        let mut roh = client.into_inner();

        let muell = b"kein json";
        roh.write_all(&(muell.len() as u32).to_be_bytes()).await.unwrap();
        roh.write_all(muell).await.unwrap();

        let mut client = Framed::new(roh, FrameCodec::new());
        let antwort = client.next().await.unwrap().unwrap();
        match antwort.payload {
            ControlPayload::Error(e) => assert_eq!(e.code, ErrorCode::InvalidRequest),
            anders => panic!("Error erwartet, erhalten: {anders:?}"),
        }
        assert!(client.next().await.is_none());
        task.await.unwrap();
    }

    #[tokio::test]
    async fn trennen_entfernt_sitzung() {
        let state = testhilfen::test_state().await;
        let (mut client, _shutdown, task) = starten(state.clone());

        client.send(auth()).await.unwrap();
        client.next().await.unwrap().unwrap();
        assert_eq!(state.broadcaster.sitzungs_anzahl(), 1);

        drop(client);
        task.await.unwrap();
        assert_eq!(state.broadcaster.sitzungs_anzahl(), 0);
        assert_eq!(state.metriken.authorized_sessions.get(), 0);
    }

    #[tokio::test]
    async fn shutdown_beendet_verbindung() {
        let state = testhilfen::test_state().await;
        let (mut client, shutdown_tx, task) = starten(state);

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
        assert!(client.next().await.is_none());
    }
}
