//! Annahme von Control-Verbindungen
//!
//! Jede angenommene Verbindung laeuft in einem eigenen Task; alle teilen
//! denselben `ControlState`. Ueber `max_verbindungen` hinaus wird sofort
//! geschlossen.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

use crate::connection::ClientConnection;
use crate::error::ControlResult;
use crate::state::ControlState;

/// Pause nach einem fehlgeschlagenen `accept`
const ACCEPT_PAUSE: Duration = Duration::from_millis(10);

/// Nimmt Control-Verbindungen an
pub struct ControlServer {
    state: Arc<ControlState>,
    bind_addr: SocketAddr,
    aktive: Arc<AtomicUsize>,
}

/// Belegter Verbindungsplatz, wird beim Drop freigegeben
struct VerbindungsPlatz(Arc<AtomicUsize>);

impl Drop for VerbindungsPlatz {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ControlServer {
    pub fn neu(state: Arc<ControlState>, bind_addr: SocketAddr) -> Self {
        Self {
            state,
            bind_addr,
            aktive: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Prueft die Konfiguration, bindet `bind_addr` und nimmt bis zum Shutdown an
    pub async fn starten(self, shutdown_rx: watch::Receiver<bool>) -> ControlResult<()> {
        self.state.config.pruefen()?;
        let listener = TcpListener::bind(self.bind_addr).await?;
        self.mit_listener(listener, shutdown_rx).await
    }

    /// Wie [`starten`](Self::starten), aber auf einem schon gebundenen Listener
    pub async fn mit_listener(
        self,
        listener: TcpListener,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> ControlResult<()> {
        tracing::info!(adresse = %listener.local_addr()?, "Control-Server nimmt Verbindungen an");

        loop {
            tokio::select! {
                angenommen = listener.accept() => match angenommen {
                    Ok((stream, peer)) => self.uebernehmen(stream, peer, &shutdown_rx),
                    Err(e) => {
                        tracing::error!(fehler = %e, "accept fehlgeschlagen");
                        tokio::time::sleep(ACCEPT_PAUSE).await;
                    }
                },
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Control-Server beendet");
        Ok(())
    }

    /// Belegt einen Platz und startet den Verbindungs-Task, oder schliesst
    fn uebernehmen(&self, stream: TcpStream, peer: SocketAddr, shutdown_rx: &watch::Receiver<bool>) {
        let Some(platz) = self.platz_belegen() else {
            tracing::warn!(
                peer = %peer,
                max = self.state.config.max_verbindungen,
                "Verbindungslimit erreicht, Verbindung geschlossen"
            );
            return;
        };
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(peer = %peer, fehler = %e, "TCP_NODELAY nicht gesetzt");
        }

        let verbindung = ClientConnection::neu(Arc::clone(&self.state), peer);
        let shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            let _platz = platz;
            verbindung.verarbeiten(stream, shutdown_rx).await;
        });
    }

    fn platz_belegen(&self) -> Option<VerbindungsPlatz> {
        let max = self.state.config.max_verbindungen;
        self.aktive
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| (n < max).then_some(n + 1))
            .ok()
            .map(|_| VerbindungsPlatz(Arc::clone(&self.aktive)))
    }

    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }

    /// Anzahl der gerade offenen Verbindungen
    pub fn aktive_verbindungen(&self) -> usize {
        self.aktive.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ControlError;
    use crate::state::ControlConfig;
    use crate::testhilfen;
    use futures_util::{SinkExt, StreamExt};
    use observer_observability::ObserverMetrics;
    use observer_protocol::control::{AuthenticateRequest, ControlMessage, ControlPayload};
    use observer_protocol::wire::FrameCodec;
    use tokio_util::codec::Framed;

    #[tokio::test]
    async fn leerer_schluessel_verhindert_start() {
        let state = testhilfen::test_state().await;
        let ohne_schluessel = ControlState::neu(
            ControlConfig::default(),
            Arc::clone(&state.registry),
            ObserverMetrics::neu().unwrap(),
        );
        let (_tx, rx) = tokio::sync::watch::channel(false);
        let err = ControlServer::neu(ohne_schluessel, "127.0.0.1:0".parse().unwrap())
            .starten(rx)
            .await
            .unwrap_err();
        assert!(matches!(err, ControlError::Konfiguration(_)));
    }

    #[tokio::test]
    async fn verbindung_ueber_tcp() {
        let state = testhilfen::test_state().await;
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

        let server = ControlServer::neu(state, addr);
        let task = tokio::spawn(server.mit_listener(listener, shutdown_rx));

        let stream = TcpStream::connect(addr).await.unwrap();
        let mut client = Framed::new(stream, FrameCodec::new());
        client
            .send(ControlMessage::new(
                1,
                ControlPayload::Authenticate(AuthenticateRequest {
                    display_name: "panel".into(),
                    secret: testhilfen::API_KEY.into(),
                }),
            ))
            .await
            .unwrap();
        let antwort = client.next().await.unwrap().unwrap();
        assert!(matches!(antwort.payload, ControlPayload::AuthenticateResponse(ref r) if r.success));

        shutdown_tx.send(true).unwrap();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn plaetze_werden_freigegeben() {
        let state = testhilfen::test_state().await;
        let max = state.config.max_verbindungen;
        let server = ControlServer::neu(state, "127.0.0.1:0".parse().unwrap());

        let belegt: Vec<_> = (0..max).map(|_| server.platz_belegen().unwrap()).collect();
        assert!(server.platz_belegen().is_none());
        assert_eq!(server.aktive_verbindungen(), max);

        drop(belegt);
        assert_eq!(server.aktive_verbindungen(), 0);
        assert!(server.platz_belegen().is_some());
    }
}
