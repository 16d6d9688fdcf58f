//! Idle-Timer – faehrt einen leeren Server nach einer Wartezeit herunter
//!
//! Es gibt hoechstens einen ausstehenden Timer pro Server. Das Handle ist
//! ein `Option`, Scharfschalten und Abbrechen pruefen den Zustand explizit:
//! doppeltes Scharfschalten und Abbrechen ohne aktiven Timer werden geloggt
//! und als [`TimerError`] zurueckgegeben.
//!
//! Jeder Timer traegt eine Generation. Der Ablauf-Pfad muss ueber
//! [`IdleTimer::ausgeloest`] bestaetigen, dass sein Timer noch der aktuelle
//! ist; ein inzwischen abgebrochener oder ersetzter Timer bewirkt nichts.

use std::future::Future;
use std::time::Duration;

use tokio::task::AbortHandle;

use crate::error::TimerError;

#[derive(Debug)]
struct TimerHandle {
    generation: u64,
    task: AbortHandle,
}

/// Idle-Timer eines Servers
#[derive(Debug)]
pub struct IdleTimer {
    server: String,
    /// `None` = Idle-Timeout deaktiviert
    dauer: Option<Duration>,
    handle: Option<TimerHandle>,
    generation: u64,
}

impl IdleTimer {
    /// Erstellt einen Timer; eine Dauer von 0 deaktiviert ihn
    pub fn neu(server: impl Into<String>, dauer: Option<Duration>) -> Self {
        Self {
            server: server.into(),
            dauer: dauer.filter(|d| !d.is_zero()),
            handle: None,
            generation: 0,
        }
    }

    /// Ist ein Idle-Timeout konfiguriert?
    pub fn aktiviert(&self) -> bool {
        self.dauer.is_some()
    }

    /// Ist gerade ein Timer scharf geschaltet?
    pub fn ist_aktiv(&self) -> bool {
        self.handle.is_some()
    }

    pub fn dauer(&self) -> Option<Duration> {
        self.dauer
    }

    /// Schaltet den Timer scharf
    ///
    /// `bei_ablauf` bekommt die Generation des Timers und liefert das Future,
    /// das nach Ablauf der Wartezeit ausgefuehrt wird.
    pub fn starten<F, Fut>(&mut self, grund: &str, bei_ablauf: F) -> Result<(), TimerError>
    where
        F: FnOnce(u64) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let Some(dauer) = self.dauer else {
            return Err(TimerError::Deaktiviert);
        };

        if self.handle.is_some() {
            tracing::warn!(server = %self.server, grund, "Idle-Timer ist bereits aktiv");
            return Err(TimerError::BereitsAktiv {
                grund: grund.to_string(),
            });
        }

        self.generation = self.generation.wrapping_add(1);
        let generation = self.generation;
        let ablauf = bei_ablauf(generation);
        let task = tokio::spawn(async move {
            tokio::time::sleep(dauer).await;
            ablauf.await;
        });

        self.handle = Some(TimerHandle {
            generation,
            task: task.abort_handle(),
        });
        tracing::info!(
            server = %self.server,
            grund,
            sekunden = dauer.as_secs(),
            "Idle-Timer gestartet"
        );
        Ok(())
    }

    /// Bricht den ausstehenden Timer ab
    pub fn abbrechen(&mut self, grund: &str) -> Result<(), TimerError> {
        match self.handle.take() {
            Some(handle) => {
                handle.task.abort();
                tracing::info!(server = %self.server, grund, "Idle-Timer abgebrochen");
                Ok(())
            }
            None => {
                tracing::warn!(server = %self.server, grund, "Idle-Timer ist nicht aktiv");
                Err(TimerError::NichtAktiv {
                    grund: grund.to_string(),
                })
            }
        }
    }

    /// Bricht einen aktiven Timer ab, ohne fehlenden Timer zu melden
    ///
    /// Fuer Zustandswechsel, bei denen ein Timer vorhanden sein kann aber
    /// nicht muss (Stopping, Offline, Prozessende).
    pub fn abbrechen_falls_aktiv(&mut self, grund: &str) {
        if self.handle.is_some() {
            let _ = self.abbrechen(grund);
        }
    }

    /// Bestaetigt den Ablauf eines Timers
    ///
    /// Gibt `true` zurueck wenn `generation` der aktuell scharfe Timer ist;
    /// das Handle wird dann ohne Abbruch entfernt (der Ablauf-Task laeuft
    /// gerade selbst).
    pub fn ausgeloest(&mut self, generation: u64) -> bool {
        match &self.handle {
            Some(handle) if handle.generation == generation => {
                self.handle = None;
                true
            }
            _ => {
                tracing::debug!(
                    server = %self.server,
                    generation,
                    "Veralteter Idle-Timer ignoriert"
                );
                false
            }
        }
    }
}

impl Drop for IdleTimer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.task.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
