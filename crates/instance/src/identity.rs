//! Identitaets-Aufloesung – Spielername -> stabile UUID
//!
//! Online-Server identifizieren Spieler ueber ihr Mojang-Konto, Offline-Server
//! ueber eine aus dem Namen abgeleitete UUID. Beides wird ueber externe
//! HTTP-Dienste aufgeloest; die URLs sind konfigurierbar und enthalten den
//! Platzhalter `{name}`.

use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ResolveError, ResolveResult};

/// Standard-URL fuer Online-UUIDs (Antwort: `{"id": "<32 hex>"}`)
pub const STANDARD_ONLINE_URL: &str = "https://api.minetools.eu/uuid/{name}";

/// Standard-URL fuer Offline-UUIDs (Antwort: `{"offlinesplitteduuid": "<uuid>"}`)
pub const STANDARD_OFFLINE_URL: &str = "http://tools.glowingmines.eu/convertor/nick/{name}";

/// Minecraft-Spielernamen: 1-16 Zeichen aus Buchstaben, Ziffern, Unterstrich
static SPIELERNAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]{1,16}$").unwrap_or_else(|_| unreachable!()));

/// Art der Identitaet, festgelegt pro Server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AufloesungsModus {
    /// Mojang-Konto (online-mode=true)
    #[default]
    Online,
    /// Aus dem Namen abgeleitet (online-mode=false)
    Offline,
}

impl AufloesungsModus {
    pub fn aus_online_mode(online_mode: bool) -> Self {
        if online_mode {
            Self::Online
        } else {
            Self::Offline
        }
    }
}

/// Loest Spielernamen zu stabilen Identitaeten auf
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn aufloesen(&self, name: &str, modus: AufloesungsModus) -> ResolveResult<String>;
}

/// Prueft einen Spielernamen, bevor er in eine URL eingesetzt wird
pub fn name_pruefen(name: &str) -> ResolveResult<()> {
    if SPIELERNAME.is_match(name) {
        Ok(())
    } else {
        Err(ResolveError::UngueltigerName(name.to_string()))
    }
}

// ---------------------------------------------------------------------------
// HttpIdentityResolver
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct OnlineAntwort {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OfflineAntwort {
    offlinesplitteduuid: Option<String>,
}

/// Aufloesung ueber konfigurierbare HTTP-Dienste
#[derive(Debug, Clone)]
pub struct HttpIdentityResolver {
    client: reqwest::Client,
    online_url: String,
    offline_url: String,
}

impl HttpIdentityResolver {
    /// Erstellt den Resolver mit Anfrage-Timeout
    pub fn neu(
        online_url: impl Into<String>,
        offline_url: impl Into<String>,
        timeout: Duration,
    ) -> ResolveResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("observer/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            online_url: online_url.into(),
            offline_url: offline_url.into(),
        })
    }

    async fn abfragen<T>(&self, vorlage: &str, name: &str) -> ResolveResult<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let url = vorlage.replace("{name}", name);
        let antwort = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<T>()
            .await?;
        Ok(antwort)
    }
}

#[async_trait]
impl IdentityResolver for HttpIdentityResolver {
    async fn aufloesen(&self, name: &str, modus: AufloesungsModus) -> ResolveResult<String> {
        name_pruefen(name)?;

        let roh = match modus {
            AufloesungsModus::Online => {
                let antwort: OnlineAntwort = self.abfragen(&self.online_url, name).await?;
                antwort.id
            }
            AufloesungsModus::Offline => {
                let antwort: OfflineAntwort = self.abfragen(&self.offline_url, name).await?;
                antwort.offlinesplitteduuid
            }
        };

        let roh = roh.ok_or_else(|| {
            ResolveError::UngueltigeAntwort(format!("keine UUID fuer '{name}' erhalten"))
        })?;
        let uuid = uuid_normalisieren(&roh)?;
        tracing::debug!(name, modus = ?modus, uuid = %uuid, "Spielername aufgeloest");
        Ok(uuid)
    }
}

/// Bringt eine UUID (mit oder ohne Bindestriche) in die Form mit Bindestrichen
pub fn uuid_normalisieren(roh: &str) -> ResolveResult<String> {
    uuid::Uuid::parse_str(roh.trim())
        .map(|u| u.hyphenated().to_string())
        .map_err(|e| ResolveError::UngueltigeAntwort(format!("'{roh}' ist keine UUID: {e}")))
}
