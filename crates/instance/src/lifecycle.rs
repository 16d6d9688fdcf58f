//! LifecycleController – Zustandsmaschine eines verwalteten Servers
//!
//! Der Controller leitet den Zustand ausschliesslich aus klassifizierten
//! Konsolenzeilen ab (und aus einem unerwarteten Prozessende). Alle
//! Aenderungen laufen unter einem Mutex, Ereignisse werden noch unter dem
//! Lock verschickt, damit Abonnenten sie in Erzeugungsreihenfolge sehen.
//!
//! ## Zustaende
//!
//! ```text
//! Offline --start--> (Lock) --starting--> Starting --online--> Online
//!    ^                                                          |
//!    +------------- offline / Prozessende <-- Stopping <--stopping
//! ```
//!
//! Der Idle-Timer ist genau dann scharf, wenn ein Idle-Timeout konfiguriert
//! ist, der Server Online ist und kein Spieler verbunden ist.

use std::sync::{Arc, Weak};
use std::time::Duration;

use observer_core::event::{ConsoleEvent, LifecycleEvent};
use observer_core::types::LifecycleState;
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, oneshot, watch};

use crate::classifier::EventClassifier;
use crate::descriptor::ServerDescriptor;
use crate::error::{ClassifierResult, LifecycleError, LifecycleResult};
use crate::idle_timer::IdleTimer;
use crate::process::{ProcessSupervisor, ProzessAusgabe};

/// Kapazitaet des Ereignis-Kanals pro Server
pub const EVENT_KANAL_GROESSE: usize = 256;

/// Puffer zwischen Prozess-Ausgabe und Controller
const AUSGABE_KANAL_GROESSE: usize = 256;

/// Befehl, mit dem der Server sauber heruntergefahren wird
pub const STOP_BEFEHL: &str = "stop";

// ---------------------------------------------------------------------------
// Interner Zustand
// ---------------------------------------------------------------------------

struct ControllerZustand {
    status: LifecycleState,
    /// Online-Spieler in Beitrittsreihenfolge, jeder Name hoechstens einmal
    spieler: Vec<String>,
    start_lock: bool,
    idle_timer: IdleTimer,
    rcon_bereit: bool,
    /// Zaehlt Starts; Ausgabe frueherer Prozesse wird daran erkannt
    lauf: u64,
    /// Wartender `starten()`-Aufruf
    start_ergebnis: Option<oneshot::Sender<Result<(), String>>>,
    /// Der vorige Prozess wird noch abgeraeumt; solange kein neuer Start
    abbau_laeuft: bool,
}

struct ControllerInner {
    name: String,
    start_timeout: Duration,
    classifier: EventClassifier,
    zustand: Mutex<ControllerZustand>,
    ereignisse: broadcast::Sender<LifecycleEvent>,
    status_tx: watch::Sender<LifecycleState>,
    prozess: Arc<dyn ProcessSupervisor>,
}

/// Lebenszyklus eines einzelnen Servers
///
/// Guenstig klonbar, alle Klone teilen denselben Zustand.
#[derive(Clone)]
pub struct LifecycleController {
    inner: Arc<ControllerInner>,
}

impl LifecycleController {
    pub fn neu(
        name: impl Into<String>,
        classifier: EventClassifier,
        idle_timeout: Option<Duration>,
        start_timeout: Duration,
        prozess: Arc<dyn ProcessSupervisor>,
    ) -> Self {
        let name = name.into();
        let (ereignisse, _) = broadcast::channel(EVENT_KANAL_GROESSE);
        let (status_tx, _) = watch::channel(LifecycleState::Offline);

        Self {
            inner: Arc::new(ControllerInner {
                zustand: Mutex::new(ControllerZustand {
                    status: LifecycleState::Offline,
                    spieler: Vec::new(),
                    start_lock: false,
                    idle_timer: IdleTimer::neu(name.clone(), idle_timeout),
                    rcon_bereit: false,
                    lauf: 0,
                    start_ergebnis: None,
                    abbau_laeuft: false,
                }),
                name,
                start_timeout,
                classifier,
                ereignisse,
                status_tx,
                prozess,
            }),
        }
    }

    /// Baut Controller und Classifier aus einer Server-Beschreibung
    pub fn aus_descriptor(
        descriptor: &ServerDescriptor,
        prozess: Arc<dyn ProcessSupervisor>,
    ) -> ClassifierResult<Self> {
        let classifier = EventClassifier::neu(&descriptor.art, descriptor.eigene_muster())?;
        Ok(Self::neu(
            descriptor.name.clone(),
            classifier,
            descriptor.idle_timeout(),
            descriptor.start_timeout(),
            prozess,
        ))
    }

    // -----------------------------------------------------------------------
    // Abfragen
    // -----------------------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Server-Art (bestimmt die Muster-Tabelle)
    pub fn art(&self) -> &str {
        self.inner.classifier.art()
    }

    pub fn status(&self) -> LifecycleState {
        self.inner.zustand.lock().status
    }

    /// Kopie der Online-Spieler
    pub fn online_spieler(&self) -> Vec<String> {
        self.inner.zustand.lock().spieler.clone()
    }

    pub fn idle_timer_aktiv(&self) -> bool {
        self.inner.zustand.lock().idle_timer.ist_aktiv()
    }

    /// Hat der Server `rcon_running` gemeldet?
    pub fn rcon_bereit(&self) -> bool {
        self.inner.zustand.lock().rcon_bereit
    }

    /// Laeuft gerade ein Start (Lock gehalten)?
    pub fn start_laeuft(&self) -> bool {
        self.inner.zustand.lock().start_lock
    }

    /// Wird der vorige Prozess noch abgeraeumt?
    pub fn abbau_laeuft(&self) -> bool {
        self.inner.zustand.lock().abbau_laeuft
    }

    /// Abonniert alle Ereignisse dieses Servers
    pub fn abonnieren(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.inner.ereignisse.subscribe()
    }

    /// Beobachtet den Status (z.B. um auf Offline zu warten)
    pub fn status_beobachten(&self) -> watch::Receiver<LifecycleState> {
        self.inner.status_tx.subscribe()
    }

    // -----------------------------------------------------------------------
    // Befehle
    // -----------------------------------------------------------------------

    /// Startet den Server und wartet bis er Online ist
    ///
    /// Abgelehnt wenn der Status nicht Offline ist oder bereits ein Start
    /// laeuft. Schlaegt fehl wenn der Prozess nicht startet, vor `online`
    /// endet oder der Start-Timeout ablaeuft.
    pub async fn starten(&self) -> LifecycleResult<()> {
        let (lauf, ergebnis_rx) = {
            let mut z = self.inner.zustand.lock();
            if z.status != LifecycleState::Offline || z.start_lock || z.abbau_laeuft {
                tracing::warn!(
                    server = %self.inner.name,
                    status = %z.status,
                    start_lock = z.start_lock,
                    abbau = z.abbau_laeuft,
                    "Start abgelehnt"
                );
                return Err(LifecycleError::StartAbgelehnt {
                    server: self.inner.name.clone(),
                    status: z.status,
                });
            }
            z.start_lock = true;
            z.lauf += 1;
            let (tx, rx) = oneshot::channel();
            z.start_ergebnis = Some(tx);
            (z.lauf, rx)
        };

        tracing::info!(server = %self.inner.name, lauf, "Server wird gestartet");

        let (ausgabe_tx, ausgabe_rx) = mpsc::channel(AUSGABE_KANAL_GROESSE);
        if let Err(e) = self.inner.prozess.starten(ausgabe_tx).await {
            self.start_freigeben(lauf);
            tracing::error!(server = %self.inner.name, fehler = %e, "Prozessstart fehlgeschlagen");
            return Err(LifecycleError::StartFehlgeschlagen {
                server: self.inner.name.clone(),
                grund: e.to_string(),
            });
        }

        tokio::spawn(self.clone().ausgabe_verarbeiten(ausgabe_rx, lauf));

        match tokio::time::timeout(self.inner.start_timeout, ergebnis_rx).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(grund))) => Err(LifecycleError::StartFehlgeschlagen {
                server: self.inner.name.clone(),
                grund,
            }),
            Ok(Err(_)) => Err(LifecycleError::StartFehlgeschlagen {
                server: self.inner.name.clone(),
                grund: "Start wurde abgebrochen".into(),
            }),
            Err(_) => {
                tracing::warn!(
                    server = %self.inner.name,
                    timeout_sek = self.inner.start_timeout.as_secs(),
                    "Server wurde nicht rechtzeitig online, Prozess wird beendet"
                );
                self.start_abbrechen(lauf).await;
                Err(LifecycleError::StartFehlgeschlagen {
                    server: self.inner.name.clone(),
                    grund: format!(
                        "nicht innerhalb von {}s online",
                        self.inner.start_timeout.as_secs()
                    ),
                })
            }
        }
    }

    /// Faehrt den Server herunter (nur im Status Online)
    pub async fn stoppen(&self) -> LifecycleResult<()> {
        {
            let mut z = self.inner.zustand.lock();
            if z.status != LifecycleState::Online {
                tracing::warn!(server = %self.inner.name, status = %z.status, "Stopp abgelehnt");
                return Err(LifecycleError::StopAbgelehnt {
                    server: self.inner.name.clone(),
                    status: z.status,
                });
            }
            z.idle_timer.abbrechen_falls_aktiv("manual stop");
        }
        let ergebnis = self.stopp_senden("manual stop").await;
        if ergebnis.is_err() {
            self.timer_wiederherstellen("stop failed");
        }
        ergebnis
    }

    /// Schickt einen Befehl an die Server-Konsole (nur im Status Online)
    pub async fn konsole(&self, befehl: &str) -> LifecycleResult<()> {
        let status = self.status();
        if status != LifecycleState::Online {
            return Err(LifecycleError::KonsoleAbgelehnt {
                server: self.inner.name.clone(),
                status,
            });
        }
        self.inner.prozess.senden(befehl).await?;
        tracing::debug!(server = %self.inner.name, befehl, "Konsolenbefehl gesendet");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Ereignisverarbeitung
    // -----------------------------------------------------------------------

    /// Klassifiziert eine Konsolenzeile und wendet das Ereignis an
    pub fn zeile_verarbeiten(&self, zeile: &str) {
        let ereignis = self.inner.classifier.klassifizieren(zeile);
        self.ereignis_anwenden(ereignis);
    }

    /// Wendet ein klassifiziertes Ereignis auf den Zustand an
    pub fn ereignis_anwenden(&self, ereignis: ConsoleEvent) {
        let mut z = self.inner.zustand.lock();
        self.senden(LifecycleEvent::Konsole(ereignis.clone()));

        match ereignis {
            ConsoleEvent::Starting(daten) => {
                tracing::info!(server = %self.inner.name, version = %daten.version, "Server startet");
                self.status_setzen(&mut z, LifecycleState::Starting);
            }
            ConsoleEvent::Online(daten) => {
                tracing::info!(server = %self.inner.name, dauer = %daten.run, "Server ist online");
                self.status_setzen(&mut z, LifecycleState::Online);
                z.start_lock = false;
                if let Some(tx) = z.start_ergebnis.take() {
                    let _ = tx.send(Ok(()));
                }
                if z.idle_timer.aktiviert() && z.spieler.is_empty() {
                    self.timer_starten(&mut z, "server started");
                }
            }
            ConsoleEvent::RconRunning(daten) => {
                z.rcon_bereit = true;
                tracing::info!(
                    server = %self.inner.name,
                    ip = ?daten.ip,
                    port = ?daten.port,
                    "Remote-Konsole bereit"
                );
            }
            ConsoleEvent::Login(daten) => {
                if z.spieler.contains(&daten.user) {
                    tracing::debug!(server = %self.inner.name, spieler = %daten.user, "Spieler bereits online");
                    return;
                }
                z.spieler.push(daten.user.clone());
                tracing::info!(
                    server = %self.inner.name,
                    spieler = %daten.user,
                    anzahl = z.spieler.len(),
                    "Spieler beigetreten"
                );
                self.senden(LifecycleEvent::SpielerBeigetreten(daten.user));
                if z.spieler.len() == 1 && z.idle_timer.aktiviert() {
                    // Fehlbenutzung wird vom Timer selbst geloggt
                    let _ = z.idle_timer.abbrechen("player joined");
                }
            }
            ConsoleEvent::Logout(daten) => {
                let Some(pos) = z.spieler.iter().position(|s| *s == daten.user) else {
                    tracing::debug!(
                        server = %self.inner.name,
                        spieler = %daten.user,
                        "Logout eines unbekannten Spielers ignoriert"
                    );
                    return;
                };
                z.spieler.remove(pos);
                tracing::info!(
                    server = %self.inner.name,
                    spieler = %daten.user,
                    anzahl = z.spieler.len(),
                    "Spieler hat den Server verlassen"
                );
                self.senden(LifecycleEvent::SpielerVerlassen(daten.user));
                if z.spieler.is_empty()
                    && z.idle_timer.aktiviert()
                    && z.status == LifecycleState::Online
                {
                    self.timer_starten(&mut z, "last player left");
                }
            }
            ConsoleEvent::Stopping(_) => {
                self.status_setzen(&mut z, LifecycleState::Stopping);
                z.spieler.clear();
                z.idle_timer.abbrechen_falls_aktiv("server stopping");
            }
            ConsoleEvent::Offline(_) => {
                z.idle_timer.abbrechen_falls_aktiv("server offline");
                z.spieler.clear();
                z.rcon_bereit = false;
                z.start_lock = false;
                if let Some(tx) = z.start_ergebnis.take() {
                    let _ = tx.send(Err("Server wurde vor dem Online-Status beendet".into()));
                }
                self.status_setzen(&mut z, LifecycleState::Offline);
                z.abbau_laeuft = true;
                drop(z);
                tokio::spawn(self.clone().abbauen());
            }
            ConsoleEvent::Custom { .. } | ConsoleEvent::Line(_) => {}
        }
    }

    /// Liest die Prozess-Ausgabe eines Laufs bis zum Prozessende
    async fn ausgabe_verarbeiten(self, mut ausgabe: mpsc::Receiver<ProzessAusgabe>, lauf: u64) {
        let mut code = None;
        while let Some(nachricht) = ausgabe.recv().await {
            match nachricht {
                ProzessAusgabe::Zeile(zeile) => {
                    if self.inner.zustand.lock().lauf != lauf {
                        tracing::debug!(server = %self.inner.name, lauf, "Zeile eines alten Laufs verworfen");
                        continue;
                    }
                    self.zeile_verarbeiten(&zeile);
                }
                ProzessAusgabe::Beendet(c) => {
                    code = c;
                    break;
                }
            }
        }
        self.prozess_beendet(lauf, code);
    }

    /// Prozessende ohne vorheriges `offline` gilt als Absturz
    fn prozess_beendet(&self, lauf: u64, code: Option<i32>) {
        let mut z = self.inner.zustand.lock();
        if z.lauf != lauf {
            tracing::debug!(server = %self.inner.name, lauf, "Ende eines alten Laufs ignoriert");
            return;
        }
        if z.status == LifecycleState::Offline && !z.start_lock {
            tracing::debug!(server = %self.inner.name, code = ?code, "Prozess nach Offline beendet");
            return;
        }

        tracing::warn!(
            server = %self.inner.name,
            code = ?code,
            status = %z.status,
            "Prozess unerwartet beendet"
        );
        z.idle_timer.abbrechen_falls_aktiv("process exited");
        z.spieler.clear();
        z.rcon_bereit = false;
        z.start_lock = false;
        if let Some(tx) = z.start_ergebnis.take() {
            let _ = tx.send(Err(format!("Prozess beendet (Code {code:?})")));
        }
        self.status_setzen(&mut z, LifecycleState::Offline);
    }

    // -----------------------------------------------------------------------
    // Hilfsfunktionen
    // -----------------------------------------------------------------------

    fn senden(&self, ereignis: LifecycleEvent) {
        // Ohne Abonnenten schlaegt send fehl, das ist kein Fehler
        let _ = self.inner.ereignisse.send(ereignis);
    }

    fn status_setzen(&self, z: &mut ControllerZustand, neu: LifecycleState) {
        if z.status == neu {
            return;
        }
        let alt = std::mem::replace(&mut z.status, neu);
        tracing::info!(server = %self.inner.name, von = %alt, nach = %neu, "Statuswechsel");
        self.inner.status_tx.send_replace(neu);
        self.senden(LifecycleEvent::StatusGeaendert(neu));
    }

    fn timer_starten(&self, z: &mut ControllerZustand, grund: &str) {
        let weak: Weak<ControllerInner> = Arc::downgrade(&self.inner);
        // Fehlbenutzung wird vom Timer selbst geloggt
        let _ = z.idle_timer.starten(grund, move |generation| async move {
            if let Some(inner) = weak.upgrade() {
                let controller = LifecycleController { inner };
                controller.idle_abgelaufen(generation).await;
            }
        });
    }

    async fn idle_abgelaufen(&self, generation: u64) {
        {
            let mut z = self.inner.zustand.lock();
            if !z.idle_timer.ausgeloest(generation) {
                return;
            }
            if z.status != LifecycleState::Online || !z.spieler.is_empty() {
                tracing::debug!(server = %self.inner.name, status = %z.status, "Idle-Timeout ohne Wirkung");
                return;
            }
        }
        tracing::info!(server = %self.inner.name, "Idle-Timeout abgelaufen");
        if let Err(e) = self.stopp_senden("idle timeout").await {
            tracing::error!(server = %self.inner.name, fehler = %e, "Idle-Stopp fehlgeschlagen");
            self.timer_wiederherstellen("idle stop failed");
        }
    }

    /// Schaltet den Timer nach einem gescheiterten Stopp wieder scharf
    ///
    /// Der Server ist dann weiter Online; ist er leer, muss wieder genau ein
    /// Timer ausstehen.
    fn timer_wiederherstellen(&self, grund: &str) {
        let mut z = self.inner.zustand.lock();
        if z.status == LifecycleState::Online
            && z.spieler.is_empty()
            && z.idle_timer.aktiviert()
            && !z.idle_timer.ist_aktiv()
        {
            self.timer_starten(&mut z, grund);
        }
    }

    async fn stopp_senden(&self, grund: &str) -> LifecycleResult<()> {
        tracing::info!(server = %self.inner.name, grund, "Server wird gestoppt");
        self.inner.prozess.senden(STOP_BEFEHL).await?;
        Ok(())
    }

    fn start_freigeben(&self, lauf: u64) {
        let mut z = self.inner.zustand.lock();
        if z.lauf == lauf {
            z.start_lock = false;
            z.start_ergebnis = None;
        }
    }

    /// Bricht einen Start nach Timeout ab
    ///
    /// Der Start-Lock wird erst freigegeben, wenn der Prozess abgeraeumt ist.
    async fn start_abbrechen(&self, lauf: u64) {
        self.inner.zustand.lock().abbau_laeuft = true;
        self.clone().abbauen().await;

        let mut z = self.inner.zustand.lock();
        if z.lauf != lauf {
            return;
        }
        z.idle_timer.abbrechen_falls_aktiv("start timeout");
        z.spieler.clear();
        z.rcon_bereit = false;
        z.start_lock = false;
        z.start_ergebnis = None;
        self.status_setzen(&mut z, LifecycleState::Offline);
    }

    /// Raeumt den Prozess ab und gibt danach neue Starts frei
    async fn abbauen(self) {
        if let Err(e) = self.inner.prozess.stoppen().await {
            tracing::error!(server = %self.inner.name, fehler = %e, "Prozess konnte nicht abgebaut werden");
        }
        self.inner.zustand.lock().abbau_laeuft = false;
    }
}

impl std::fmt::Debug for LifecycleController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleController")
            .field("name", &self.inner.name)
            .field("status", &self.status())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
