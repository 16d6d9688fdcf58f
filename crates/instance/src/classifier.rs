//! Event-Classifier – Konsolenzeile -> typisiertes Ereignis
//!
//! Jeder Server besitzt einen eigenen Classifier mit der Muster-Tabelle
//! seiner Art. Eine eigene Tabelle aus der Konfiguration ersetzt die
//! eingebaute vollstaendig (kein Zusammenfuehren einzelner Ereignisse).
//!
//! Die Klassifizierung ist zeilenweise und ohne Seiteneffekte: das erste
//! passende Muster gewinnt, sonst wird das Rueckfall-Ereignis `line` mit der
//! unveraenderten Zeile geliefert.

use std::collections::BTreeMap;

use observer_core::event::ConsoleEvent;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ClassifierError, ClassifierResult};
use crate::patterns;

/// Ein Eintrag einer eigenen Muster-Tabelle (aus `[[servers.events]]`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternDefinition {
    /// Ereignisname (`login`, `backup_done`, ...)
    pub name: String,
    /// Regulaerer Ausdruck mit benannten Gruppen `(?P<feld>...)`
    pub pattern: String,
}

#[derive(Debug)]
struct EventPattern {
    name: String,
    regex: Regex,
}

/// Klassifiziert Konsolenzeilen eines Servers
#[derive(Debug)]
pub struct EventClassifier {
    art: String,
    muster: Vec<EventPattern>,
}

impl EventClassifier {
    /// Baut den Classifier fuer eine Server-Art
    ///
    /// `eigene` ersetzt die eingebaute Tabelle, wenn gesetzt und nicht leer.
    pub fn neu(art: &str, eigene: Option<&[PatternDefinition]>) -> ClassifierResult<Self> {
        let muster = match eigene.filter(|e| !e.is_empty()) {
            Some(eigene) => eigene
                .iter()
                .map(|d| kompilieren(&d.name, &d.pattern))
                .collect::<ClassifierResult<Vec<_>>>()?,
            None => patterns::standard_tabelle(art)
                .ok_or_else(|| ClassifierError::UnbekannteArt(art.to_string()))?
                .iter()
                .map(|(name, muster)| kompilieren(name, muster))
                .collect::<ClassifierResult<Vec<_>>>()?,
        };

        tracing::debug!(art, anzahl = muster.len(), "Muster-Tabelle geladen");

        Ok(Self {
            art: art.to_string(),
            muster,
        })
    }

    /// Klassifiziert eine einzelne Zeile
    pub fn klassifizieren(&self, zeile: &str) -> ConsoleEvent {
        for muster in &self.muster {
            if let Some(captures) = muster.regex.captures(zeile) {
                let felder: BTreeMap<String, String> = muster
                    .regex
                    .capture_names()
                    .flatten()
                    .filter_map(|feld| {
                        captures
                            .name(feld)
                            .map(|m| (feld.to_string(), m.as_str().to_string()))
                    })
                    .collect();
                return ConsoleEvent::aus_feldern(&muster.name, felder);
            }
        }
        ConsoleEvent::Line(zeile.to_string())
    }

    /// Server-Art dieses Classifiers
    pub fn art(&self) -> &str {
        &self.art
    }

    /// Ereignisnamen in Vorrangreihenfolge
    pub fn ereignis_namen(&self) -> impl Iterator<Item = &str> {
        self.muster.iter().map(|m| m.name.as_str())
    }
}

fn kompilieren(name: &str, muster: &str) -> ClassifierResult<EventPattern> {
    let regex = Regex::new(muster).map_err(|e| ClassifierError::UngueltigesMuster {
        ereignis: name.to_string(),
        grund: e.to_string(),
    })?;
    Ok(EventPattern {
        name: name.to_string(),
        regex,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
