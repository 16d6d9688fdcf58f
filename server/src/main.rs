//! Observer – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und startet den Daemon.

use anyhow::Result;
use observer_observability::logging_initialisieren;
use observer_server::{
    config::{Herkunft, ObserverConfig, CONFIG_ENV, STANDARD_PFAD},
    Observer,
};
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<()> {
    let config_pfad = std::env::var(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(STANDARD_PFAD));

    let (config, herkunft) = ObserverConfig::laden(&config_pfad)?;

    logging_initialisieren(&config.logging.level, &config.logging.format);

    if herkunft == Herkunft::Erzeugt {
        tracing::warn!(
            pfad = %config_pfad.display(),
            "Konfigurationsdatei angelegt. Bearbeiten und neu starten, um Server einzutragen"
        );
        tracing::warn!(api_key = %config.api.api_key, "Neuer API-Schluessel erzeugt");
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad.display(),
        "Observer wird initialisiert"
    );

    Observer::neu(config).starten().await
}
