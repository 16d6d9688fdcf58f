//! Gemeinsame Fakes fuer die Unit-Tests der Control-Plane

use async_trait::async_trait;
use observer_core::types::WhitelistEntry;
use observer_instance::error::{ProcessResult, ResolveResult};
use observer_instance::{
    AufloesungsModus, IdentityResolver, InstanzTeile, ProcessSupervisor, ProzessAusgabe,
    ServerDescriptor, ServerRegistry, WhitelistStore,
};
use observer_observability::ObserverMetrics;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::state::{ControlConfig, ControlState};

pub const API_KEY: &str = "geheim";

pub const LOGIN_BOB: &str =
    "[10:00:10 INFO]: bob[/127.0.0.1:54321] logged in with entity id 42 at ([world]1.5, 64.0, -3.5)";
pub const LOGOUT_BOB: &str = "[10:01:00 INFO]: bob left the game";

/// Prozess, der sofort online meldet und weitere Zeilen auf Zuruf liefert
#[derive(Default)]
pub struct FakeServer {
    ausgabe: parking_lot::Mutex<Option<mpsc::Sender<ProzessAusgabe>>>,
    pub gesendet: parking_lot::Mutex<Vec<String>>,
}

impl FakeServer {
    pub async fn zeile(&self, zeile: &str) {
        let tx = self.ausgabe.lock().clone();
        if let Some(tx) = tx {
            let _ = tx.send(ProzessAusgabe::Zeile(zeile.into())).await;
        }
    }
}

#[async_trait]
impl ProcessSupervisor for FakeServer {
    async fn starten(&self, ausgabe: mpsc::Sender<ProzessAusgabe>) -> ProcessResult<()> {
        for zeile in [
            "[10:00:00 INFO]: Starting minecraft server version 1.20.4",
            r#"[10:00:05 INFO]: Done (5.000s)! For help, type "help""#,
        ] {
            let _ = ausgabe.send(ProzessAusgabe::Zeile(zeile.into())).await;
        }
        *self.ausgabe.lock() = Some(ausgabe);
        Ok(())
    }

    async fn senden(&self, befehl: &str) -> ProcessResult<()> {
        self.gesendet.lock().push(befehl.to_string());
        Ok(())
    }

    async fn stoppen(&self) -> ProcessResult<()> {
        Ok(())
    }
}

/// Whitelist im Speicher
#[derive(Default)]
pub struct SpeicherStore {
    pub eintraege: parking_lot::Mutex<Vec<WhitelistEntry>>,
}

#[async_trait]
impl WhitelistStore for SpeicherStore {
    async fn laden(&self) -> std::io::Result<Vec<WhitelistEntry>> {
        Ok(self.eintraege.lock().clone())
    }

    async fn speichern(&self, eintraege: &[WhitelistEntry]) -> std::io::Result<()> {
        *self.eintraege.lock() = eintraege.to_vec();
        Ok(())
    }
}

/// `uuid-<name>`; der Name "niemand" ist unbekannt
pub struct FesterResolver;

#[async_trait]
impl IdentityResolver for FesterResolver {
    async fn aufloesen(&self, name: &str, _modus: AufloesungsModus) -> ResolveResult<String> {
        if name == "niemand" {
            return Err(observer_instance::ResolveError::UngueltigeAntwort(
                "kein Profil".into(),
            ));
        }
        Ok(format!("uuid-{name}"))
    }
}

/// Control-State mit einem Server "alpha" und dessen Fake-Prozess
pub async fn test_umgebung() -> (Arc<ControlState>, Arc<FakeServer>) {
    let prozess = Arc::new(FakeServer::default());
    let mut descriptor = ServerDescriptor::neu("alpha", std::env::temp_dir().join("alpha"));
    descriptor.online_mode = Some(true);
    let teile = InstanzTeile {
        descriptor,
        prozess: prozess.clone(),
        store: Arc::new(SpeicherStore::default()),
    };
    let registry = ServerRegistry::mit_komponenten(vec![teile], Arc::new(FesterResolver))
        .await
        .expect("Registry muss sich aufbauen lassen");

    let config = ControlConfig {
        api_key: API_KEY.into(),
        ..Default::default()
    };
    let metriken = ObserverMetrics::neu().expect("Metriken muessen sich registrieren lassen");
    (
        ControlState::neu(config, Arc::new(registry), metriken),
        prozess,
    )
}

pub async fn test_state() -> Arc<ControlState> {
    test_umgebung().await.0
}
