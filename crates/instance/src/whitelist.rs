//! WhitelistManager – persistierte Whitelist eines Servers
//!
//! Die Eintraege werden einmal beim Aufbau geladen. Schlaegt das fehl, bleibt
//! der Manager bis zum Neustart im Zustand "nicht geladen": `liste()` ist
//! leer, alle Aenderungen werden mit [`WhitelistError::NichtGeladen`]
//! abgelehnt.
//!
//! Jede Aenderung schreibt die komplette Liste neu. Schlaegt das Schreiben
//! fehl, bleibt die Aenderung im Speicher erhalten und der Aufrufer bekommt
//! [`WhitelistError::Persistenz`] (kein Zurueckrollen).
//!
//! Aenderungen sind pro Manager serialisiert: der Mutations-Lock wird von der
//! Pruefung auf Duplikate bis nach dem Speichern gehalten.

use std::sync::Arc;

use observer_core::types::WhitelistEntry;
use parking_lot::Mutex;

use crate::error::{WhitelistError, WhitelistResult};
use crate::identity::{AufloesungsModus, IdentityResolver};
use crate::store::WhitelistStore;

pub struct WhitelistManager {
    server: String,
    modus: AufloesungsModus,
    geladen: bool,
    eintraege: Mutex<Vec<WhitelistEntry>>,
    mutation: tokio::sync::Mutex<()>,
    store: Arc<dyn WhitelistStore>,
    resolver: Arc<dyn IdentityResolver>,
}

impl WhitelistManager {
    /// Laedt die Whitelist aus dem Store
    ///
    /// Ein Ladefehler (auch eine fehlende Datei) wird geloggt und fuehrt in
    /// den Zustand "nicht geladen", nicht zu einem Fehler.
    pub async fn laden(
        server: impl Into<String>,
        modus: AufloesungsModus,
        store: Arc<dyn WhitelistStore>,
        resolver: Arc<dyn IdentityResolver>,
    ) -> Self {
        let server = server.into();
        let (geladen, eintraege) = match store.laden().await {
            Ok(eintraege) => {
                tracing::info!(
                    server = %server,
                    anzahl = eintraege.len(),
                    modus = ?modus,
                    "Whitelist geladen"
                );
                (true, eintraege)
            }
            Err(e) => {
                tracing::error!(
                    server = %server,
                    fehler = %e,
                    "Whitelist konnte nicht geladen werden, nur lesbar bis zum Neustart"
                );
                (false, Vec::new())
            }
        };

        Self {
            server,
            modus,
            geladen,
            eintraege: Mutex::new(eintraege),
            mutation: tokio::sync::Mutex::new(()),
            store,
            resolver,
        }
    }

    pub fn ist_geladen(&self) -> bool {
        self.geladen
    }

    pub fn modus(&self) -> AufloesungsModus {
        self.modus
    }

    /// Momentaufnahme der Eintraege
    pub fn liste(&self) -> Vec<WhitelistEntry> {
        self.eintraege.lock().clone()
    }

    /// Fuegt einen Spieler hinzu
    pub async fn hinzufuegen(&self, name: &str) -> WhitelistResult<WhitelistEntry> {
        self.geladen_pruefen()?;
        let _mutation = self.mutation.lock().await;

        let uuid = self.aufloesen(name).await?;
        let eintrag = WhitelistEntry {
            uuid,
            name: name.to_string(),
        };

        let snapshot = {
            let mut eintraege = self.eintraege.lock();
            if eintraege.iter().any(|e| e.uuid == eintrag.uuid) {
                tracing::debug!(server = %self.server, name, "Spieler bereits auf der Whitelist");
                return Err(WhitelistError::Doppelt {
                    name: name.to_string(),
                });
            }
            eintraege.push(eintrag.clone());
            eintraege.clone()
        };

        self.persistieren(&snapshot).await?;
        tracing::info!(server = %self.server, name, uuid = %eintrag.uuid, "Spieler zur Whitelist hinzugefuegt");
        Ok(eintrag)
    }

    /// Entfernt einen Spieler
    pub async fn entfernen(&self, name: &str) -> WhitelistResult<WhitelistEntry> {
        self.geladen_pruefen()?;
        let _mutation = self.mutation.lock().await;

        let uuid = self.aufloesen(name).await?;

        let (entfernt, snapshot) = {
            let mut eintraege = self.eintraege.lock();
            let Some(pos) = eintraege.iter().position(|e| e.uuid == uuid) else {
                return Err(WhitelistError::NichtGefunden {
                    name: name.to_string(),
                });
            };
            let entfernt = eintraege.remove(pos);
            (entfernt, eintraege.clone())
        };

        self.persistieren(&snapshot).await?;
        tracing::info!(server = %self.server, name, uuid = %uuid, "Spieler von der Whitelist entfernt");
        Ok(entfernt)
    }

    /// Leert die Whitelist
    pub async fn leeren(&self) -> WhitelistResult<()> {
        self.geladen_pruefen()?;
        let _mutation = self.mutation.lock().await;

        let anzahl = {
            let mut eintraege = self.eintraege.lock();
            let anzahl = eintraege.len();
            eintraege.clear();
            anzahl
        };

        self.persistieren(&[]).await?;
        tracing::info!(server = %self.server, anzahl, "Whitelist geleert");
        Ok(())
    }

    fn geladen_pruefen(&self) -> WhitelistResult<()> {
        if self.geladen {
            Ok(())
        } else {
            Err(WhitelistError::NichtGeladen)
        }
    }

    async fn aufloesen(&self, name: &str) -> WhitelistResult<String> {
        self.resolver
            .aufloesen(name, self.modus)
            .await
            .map_err(|quelle| {
                tracing::warn!(server = %self.server, name, fehler = %quelle, "Aufloesung fehlgeschlagen");
                WhitelistError::Aufloesung {
                    name: name.to_string(),
                    quelle,
                }
            })
    }

    async fn persistieren(&self, eintraege: &[WhitelistEntry]) -> WhitelistResult<()> {
        self.store.speichern(eintraege).await.map_err(|e| {
            tracing::error!(
                server = %self.server,
                fehler = %e,
                "Whitelist konnte nicht gespeichert werden, Aenderung bleibt im Speicher"
            );
            WhitelistError::Persistenz(e)
        })
    }
}

impl std::fmt::Debug for WhitelistManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhitelistManager")
            .field("server", &self.server)
            .field("modus", &self.modus)
            .field("geladen", &self.geladen)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
