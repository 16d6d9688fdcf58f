//! ServerRegistry – alle verwalteten Server unter ihrem Namen
//!
//! Die Registry wird einmal aus den Server-Beschreibungen aufgebaut und ist
//! danach unveraenderlich. Sammeloperationen wenden die Einzeloperation auf
//! jeden Server unabhaengig an; ein Fehler bricht die anderen nicht ab.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::future::join_all;
use observer_core::event::LifecycleEvent;
use observer_core::types::LifecycleState;
use tokio::sync::broadcast;

use crate::descriptor::ServerDescriptor;
use crate::error::{LifecycleResult, RegistryError, RegistryResult};
use crate::identity::{AufloesungsModus, IdentityResolver};
use crate::lifecycle::LifecycleController;
use crate::process::{JavaProcess, ProcessSupervisor};
use crate::properties;
use crate::store::{JsonFileStore, WhitelistStore};
use crate::whitelist::WhitelistManager;

/// Ein verwalteter Server: Beschreibung, Controller und Whitelist
#[derive(Debug, Clone)]
pub struct ServerInstanz {
    pub descriptor: Arc<ServerDescriptor>,
    pub controller: LifecycleController,
    pub whitelist: Arc<WhitelistManager>,
}

/// Bausteine einer Instanz (austauschbare Kollaborateure fuer Tests)
pub struct InstanzTeile {
    pub descriptor: ServerDescriptor,
    pub prozess: Arc<dyn ProcessSupervisor>,
    pub store: Arc<dyn WhitelistStore>,
}

impl InstanzTeile {
    /// Standard-Kollaborateure: `java -jar` und `whitelist.json`
    pub fn standard(descriptor: ServerDescriptor) -> Self {
        let prozess = JavaProcess::neu(
            descriptor.name.clone(),
            descriptor.java.clone(),
            descriptor.jar.clone(),
            descriptor.args.clone(),
            descriptor.pfad.clone(),
        );
        let store = JsonFileStore::im_verzeichnis(&descriptor.pfad);
        Self {
            descriptor,
            prozess: Arc::new(prozess),
            store: Arc::new(store),
        }
    }
}

#[derive(Debug, Default)]
pub struct ServerRegistry {
    server: BTreeMap<String, ServerInstanz>,
}

impl ServerRegistry {
    /// Baut die Registry mit den Standard-Kollaborateuren
    pub async fn aufbauen(
        descriptors: Vec<ServerDescriptor>,
        resolver: Arc<dyn IdentityResolver>,
    ) -> RegistryResult<Self> {
        let teile = descriptors.into_iter().map(InstanzTeile::standard).collect();
        Self::mit_komponenten(teile, resolver).await
    }

    /// Baut die Registry aus fertigen Bausteinen
    pub async fn mit_komponenten(
        teile: Vec<InstanzTeile>,
        resolver: Arc<dyn IdentityResolver>,
    ) -> RegistryResult<Self> {
        let mut server = BTreeMap::new();

        for InstanzTeile {
            descriptor,
            prozess,
            store,
        } in teile
        {
            if server.contains_key(&descriptor.name) {
                return Err(RegistryError::DoppelterName(descriptor.name));
            }

            let controller = LifecycleController::aus_descriptor(&descriptor, prozess).map_err(
                |quelle| RegistryError::Muster {
                    server: descriptor.name.clone(),
                    quelle,
                },
            )?;

            let modus = match descriptor.online_mode {
                Some(online) => AufloesungsModus::aus_online_mode(online),
                None => properties::online_mode(&descriptor.pfad)
                    .await
                    .map(AufloesungsModus::aus_online_mode)
                    .unwrap_or_default(),
            };
            let whitelist =
                WhitelistManager::laden(descriptor.name.clone(), modus, store, Arc::clone(&resolver))
                    .await;

            tracing::info!(
                server = %descriptor.name,
                art = %descriptor.art,
                pfad = %descriptor.pfad.display(),
                idle_timeout_sek = descriptor.autostop_sek,
                "Server registriert"
            );

            server.insert(
                descriptor.name.clone(),
                ServerInstanz {
                    descriptor: Arc::new(descriptor),
                    controller,
                    whitelist: Arc::new(whitelist),
                },
            );
        }

        Ok(Self { server })
    }

    // -----------------------------------------------------------------------
    // Abfragen
    // -----------------------------------------------------------------------

    /// Sucht einen Server; `None` muss vom Aufrufer behandelt werden
    pub fn holen(&self, name: &str) -> Option<&ServerInstanz> {
        self.server.get(name)
    }

    pub fn namen(&self) -> impl Iterator<Item = &str> {
        self.server.keys().map(String::as_str)
    }

    pub fn instanzen(&self) -> impl Iterator<Item = &ServerInstanz> {
        self.server.values()
    }

    pub fn len(&self) -> usize {
        self.server.len()
    }

    pub fn is_empty(&self) -> bool {
        self.server.is_empty()
    }

    /// Name, Art und Status aller Server
    pub fn server_liste(&self) -> Vec<(String, String, LifecycleState)> {
        self.server
            .values()
            .map(|i| {
                (
                    i.descriptor.name.clone(),
                    i.descriptor.art.clone(),
                    i.controller.status(),
                )
            })
            .collect()
    }

    pub fn alle_status(&self) -> BTreeMap<String, LifecycleState> {
        self.server
            .iter()
            .map(|(name, i)| (name.clone(), i.controller.status()))
            .collect()
    }

    pub fn alle_spieler(&self) -> BTreeMap<String, Vec<String>> {
        self.server
            .iter()
            .map(|(name, i)| (name.clone(), i.controller.online_spieler()))
            .collect()
    }

    pub fn online_anzahl(&self) -> usize {
        self.server
            .values()
            .filter(|i| i.controller.status() == LifecycleState::Online)
            .count()
    }

    pub fn spieler_anzahl(&self) -> usize {
        self.server
            .values()
            .map(|i| i.controller.online_spieler().len())
            .sum()
    }

    /// Server, deren Whitelist nicht geladen werden konnte
    pub fn degradierte_whitelists(&self) -> Vec<String> {
        self.server
            .values()
            .filter(|i| !i.whitelist.ist_geladen())
            .map(|i| i.descriptor.name.clone())
            .collect()
    }

    /// Ein Ereignis-Empfaenger pro Server
    pub fn abonnieren(&self) -> Vec<(String, broadcast::Receiver<LifecycleEvent>)> {
        self.server
            .iter()
            .map(|(name, i)| (name.clone(), i.controller.abonnieren()))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Sammeloperationen
    // -----------------------------------------------------------------------

    /// Startet alle Server gleichzeitig
    pub async fn alle_starten(&self) -> BTreeMap<String, LifecycleResult<()>> {
        let starts = self.server.iter().map(|(name, i)| async move {
            (name.clone(), i.controller.starten().await)
        });
        join_all(starts).await.into_iter().collect()
    }

    pub async fn alle_stoppen(&self) -> BTreeMap<String, LifecycleResult<()>> {
        let stopps = self.server.iter().map(|(name, i)| async move {
            (name.clone(), i.controller.stoppen().await)
        });
        join_all(stopps).await.into_iter().collect()
    }

    /// Stoppt alle laufenden Server beim Beenden des Dienstes
    pub async fn herunterfahren(&self) {
        for (name, ergebnis) in self.alle_stoppen().await {
            match ergebnis {
                Ok(()) => tracing::info!(server = %name, "Server beim Herunterfahren gestoppt"),
                Err(e) => tracing::debug!(server = %name, grund = %e, "Kein Stopp noetig"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LifecycleError, ProcessError, ProcessResult, ResolveResult};
    use crate::process::ProzessAusgabe;
    use async_trait::async_trait;
    use observer_core::types::WhitelistEntry;
    use tokio::sync::mpsc;

    struct KaputterProzess;

    #[async_trait]
    impl ProcessSupervisor for KaputterProzess {
        async fn starten(&self, _ausgabe: mpsc::Sender<ProzessAusgabe>) -> ProcessResult<()> {
            Err(ProcessError::Starten("kein java".into()))
        }
        async fn senden(&self, _befehl: &str) -> ProcessResult<()> {
            Err(ProcessError::NichtGestartet)
        }
        async fn stoppen(&self) -> ProcessResult<()> {
            Ok(())
        }
    }

    /// Meldet sofort starting + online
    #[derive(Default)]
    struct SofortOnline {
        ausgabe: parking_lot::Mutex<Option<mpsc::Sender<ProzessAusgabe>>>,
    }

    #[async_trait]
    impl ProcessSupervisor for SofortOnline {
        async fn starten(&self, ausgabe: mpsc::Sender<ProzessAusgabe>) -> ProcessResult<()> {
            for zeile in [
                "[10:00:00 INFO]: Starting minecraft server version 1.20.4",
                r#"[10:00:05 INFO]: Done (5.000s)! For help, type "help""#,
            ] {
                let _ = ausgabe.send(ProzessAusgabe::Zeile(zeile.into())).await;
            }
            // Offen halten, sonst gilt der Prozess als beendet
            *self.ausgabe.lock() = Some(ausgabe);
            Ok(())
        }
        async fn senden(&self, _befehl: &str) -> ProcessResult<()> {
            Ok(())
        }
        async fn stoppen(&self) -> ProcessResult<()> {
            Ok(())
        }
    }

    struct LeererStore;

    #[async_trait]
    impl WhitelistStore for LeererStore {
        async fn laden(&self) -> std::io::Result<Vec<WhitelistEntry>> {
            Ok(Vec::new())
        }
        async fn speichern(&self, _eintraege: &[WhitelistEntry]) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct FesterResolver;

    #[async_trait]
    impl IdentityResolver for FesterResolver {
        async fn aufloesen(&self, name: &str, _modus: AufloesungsModus) -> ResolveResult<String> {
            Ok(format!("uuid-{name}"))
        }
    }

    fn teile(name: &str, prozess: Arc<dyn ProcessSupervisor>) -> InstanzTeile {
        let mut descriptor = ServerDescriptor::neu(name, std::env::temp_dir().join(name));
        descriptor.online_mode = Some(true);
        InstanzTeile {
            descriptor,
            prozess,
            store: Arc::new(LeererStore),
        }
    }

    #[tokio::test]
    async fn doppelter_name_ist_fehler() {
        let err = ServerRegistry::mit_komponenten(
            vec![
                teile("alpha", Arc::new(SofortOnline::default())),
                teile("alpha", Arc::new(SofortOnline::default())),
            ],
            Arc::new(FesterResolver),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RegistryError::DoppelterName(n) if n == "alpha"));
    }

    #[tokio::test]
    async fn unbekannte_art_ist_fehler() {
        let mut t = teile("alpha", Arc::new(SofortOnline::default()));
        t.descriptor.art = "bedrock".into();
        let err = ServerRegistry::mit_komponenten(vec![t], Arc::new(FesterResolver))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Muster { .. }));
    }

    #[tokio::test]
    async fn sammelstart_laeuft_trotz_fehlern_weiter() {
        let registry = ServerRegistry::mit_komponenten(
            vec![
                teile("alpha", Arc::new(SofortOnline::default())),
                teile("beta", Arc::new(KaputterProzess)),
                teile("gamma", Arc::new(SofortOnline::default())),
            ],
            Arc::new(FesterResolver),
        )
        .await
        .unwrap();

        let ergebnisse = registry.alle_starten().await;
        assert_eq!(ergebnisse.len(), 3);
        assert!(ergebnisse["alpha"].is_ok());
        assert!(matches!(
            ergebnisse["beta"],
            Err(LifecycleError::StartFehlgeschlagen { .. })
        ));
        assert!(ergebnisse["gamma"].is_ok());
        assert_eq!(registry.online_anzahl(), 2);

        let status = registry.alle_status();
        assert_eq!(status["beta"], LifecycleState::Offline);

        let stopps = registry.alle_stoppen().await;
        assert!(stopps["alpha"].is_ok());
        assert!(matches!(
            stopps["beta"],
            Err(LifecycleError::StopAbgelehnt { .. })
        ));
    }

    #[tokio::test]
    async fn holen_und_liste() {
        let registry = ServerRegistry::mit_komponenten(
            vec![teile("alpha", Arc::new(SofortOnline::default()))],
            Arc::new(FesterResolver),
        )
        .await
        .unwrap();

        assert!(registry.holen("alpha").is_some());
        assert!(registry.holen("omega").is_none());
        assert_eq!(
            registry.server_liste(),
            vec![("alpha".to_string(), "paper".to_string(), LifecycleState::Offline)]
        );
        assert_eq!(registry.alle_spieler()["alpha"], Vec::<String>::new());
        assert!(registry.degradierte_whitelists().is_empty());
        assert_eq!(registry.abonnieren().len(), 1);
    }
}
