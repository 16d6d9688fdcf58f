//! Prozess-Supervisor – startet den Spielserver und leitet seine Ausgabe weiter
//!
//! Der `LifecycleController` kennt nur das [`ProcessSupervisor`]-Trait.
//! [`JavaProcess`] ist die Implementierung fuer `java -jar <jar> nogui`;
//! Tests verwenden eigene Fakes.
//!
//! Ausgabe-Reihenfolge: alle Zeilen von stdout und stderr, danach genau ein
//! [`ProzessAusgabe::Beendet`].

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, Command};
use tokio::sync::{mpsc, oneshot, watch, Mutex};

use crate::error::{ProcessError, ProcessResult};

/// Standard-Frist zwischen Stop-Anforderung und Kill
pub const STANDARD_STOPP_FRIST: Duration = Duration::from_secs(30);

/// Nachricht vom Prozess an den Controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProzessAusgabe {
    /// Eine Zeile von stdout oder stderr
    Zeile(String),
    /// Der Prozess ist beendet (Exit-Code, falls vorhanden)
    Beendet(Option<i32>),
}

/// Schnittstelle zur Prozessverwaltung eines Servers
#[async_trait]
pub trait ProcessSupervisor: Send + Sync {
    /// Startet den Prozess; Ausgabe und Ende werden in `ausgabe` gemeldet
    async fn starten(&self, ausgabe: mpsc::Sender<ProzessAusgabe>) -> ProcessResult<()>;

    /// Schreibt eine Zeile auf stdin des Prozesses
    async fn senden(&self, befehl: &str) -> ProcessResult<()>;

    /// Raeumt den Prozess ab (wartet die Stopp-Frist, beendet ihn dann hart)
    async fn stoppen(&self) -> ProcessResult<()>;
}

// ---------------------------------------------------------------------------
// JavaProcess
// ---------------------------------------------------------------------------

struct LaufenderProzess {
    stdin: ChildStdin,
    beendet: watch::Receiver<bool>,
    kill: oneshot::Sender<()>,
}

/// Startet `java <args> -jar <jar> nogui` im Server-Verzeichnis
pub struct JavaProcess {
    server: String,
    java: String,
    jar: String,
    args: Vec<String>,
    verzeichnis: PathBuf,
    stopp_frist: Duration,
    laufend: Mutex<Option<LaufenderProzess>>,
}

impl JavaProcess {
    pub fn neu(
        server: impl Into<String>,
        java: impl Into<String>,
        jar: impl Into<String>,
        args: Vec<String>,
        verzeichnis: impl Into<PathBuf>,
    ) -> Self {
        Self {
            server: server.into(),
            java: java.into(),
            jar: jar.into(),
            args,
            verzeichnis: verzeichnis.into(),
            stopp_frist: STANDARD_STOPP_FRIST,
            laufend: Mutex::new(None),
        }
    }

    /// Setzt die Frist vor dem harten Beenden
    pub fn mit_stopp_frist(mut self, frist: Duration) -> Self {
        self.stopp_frist = frist;
        self
    }
}

/// Liest Zeilen aus einem Stream und leitet sie weiter
fn zeilen_weiterleiten<R>(
    quelle: R,
    ausgabe: mpsc::Sender<ProzessAusgabe>,
) -> tokio::task::JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut zeilen = BufReader::new(quelle).lines();
        while let Ok(Some(zeile)) = zeilen.next_line().await {
            if ausgabe.send(ProzessAusgabe::Zeile(zeile)).await.is_err() {
                break;
            }
        }
    })
}

#[async_trait]
impl ProcessSupervisor for JavaProcess {
    async fn starten(&self, ausgabe: mpsc::Sender<ProzessAusgabe>) -> ProcessResult<()> {
        let mut laufend = self.laufend.lock().await;
        if let Some(alt) = laufend.as_ref() {
            if !*alt.beendet.borrow() {
                return Err(ProcessError::LaeuftBereits);
            }
        }

        let mut child = Command::new(&self.java)
            .args(&self.args)
            .arg("-jar")
            .arg(&self.jar)
            .arg("nogui")
            .current_dir(&self.verzeichnis)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ProcessError::Starten(e.to_string()))?;

        let pid = child.id();
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ProcessError::Starten("stdin nicht verfuegbar".into()))?;

        let mut leser = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            leser.push(zeilen_weiterleiten(stdout, ausgabe.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            leser.push(zeilen_weiterleiten(stderr, ausgabe.clone()));
        }

        let (beendet_tx, beendet_rx) = watch::channel(false);
        let (kill_tx, kill_rx) = oneshot::channel::<()>();
        let server = self.server.clone();

        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status,
                _ = kill_rx => {
                    tracing::warn!(server = %server, "Prozess wird hart beendet");
                    if let Err(e) = child.kill().await {
                        tracing::error!(server = %server, fehler = %e, "Kill fehlgeschlagen");
                    }
                    child.wait().await
                }
            };

            // Restliche Zeilen zuerst, dann das Ende melden
            futures_util::future::join_all(leser).await;

            let code = match status {
                Ok(status) => status.code(),
                Err(e) => {
                    tracing::error!(server = %server, fehler = %e, "Warten auf Prozess fehlgeschlagen");
                    None
                }
            };
            tracing::info!(server = %server, code = ?code, "Prozess beendet");
            let _ = beendet_tx.send(true);
            let _ = ausgabe.send(ProzessAusgabe::Beendet(code)).await;
        });

        tracing::info!(
            server = %self.server,
            pid = ?pid,
            verzeichnis = %self.verzeichnis.display(),
            "Prozess gestartet"
        );

        *laufend = Some(LaufenderProzess {
            stdin,
            beendet: beendet_rx,
            kill: kill_tx,
        });
        Ok(())
    }

    async fn senden(&self, befehl: &str) -> ProcessResult<()> {
        let mut laufend = self.laufend.lock().await;
        let prozess = laufend.as_mut().ok_or(ProcessError::NichtGestartet)?;
        prozess.stdin.write_all(befehl.as_bytes()).await?;
        prozess.stdin.write_all(b"\n").await?;
        prozess.stdin.flush().await?;
        tracing::debug!(server = %self.server, befehl, "Befehl an Prozess gesendet");
        Ok(())
    }

    async fn stoppen(&self) -> ProcessResult<()> {
        let Some(prozess) = self.laufend.lock().await.take() else {
            return Ok(());
        };
        let LaufenderProzess {
            stdin,
            mut beendet,
            kill,
        } = prozess;

        // stdin schliessen, der Server sieht EOF
        drop(stdin);

        let warten = async {
            while !*beendet.borrow_and_update() {
                if beendet.changed().await.is_err() {
                    break;
                }
            }
        };

        if tokio::time::timeout(self.stopp_frist, warten).await.is_err() {
            tracing::warn!(
                server = %self.server,
                frist_sek = self.stopp_frist.as_secs(),
                "Prozess hat sich nicht rechtzeitig beendet"
            );
            let _ = kill.send(());
        }
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    /// `sh` statt `java`: `-jar <jar> nogui` werden als Positionsparameter ignoriert
    fn shell_prozess(skript: &str) -> JavaProcess {
        JavaProcess::neu(
            "test",
            "sh",
            "unbenutzt.jar",
            vec!["-c".into(), skript.into(), "sh".into()],
            std::env::temp_dir(),
        )
        .mit_stopp_frist(Duration::from_millis(200))
    }

    #[tokio::test]
    async fn zeilen_und_ende_werden_gemeldet() {
        let prozess = shell_prozess("echo eins; echo zwei; exit 3");
        let (tx, mut rx) = mpsc::channel(16);
        prozess.starten(tx).await.unwrap();

        let mut zeilen = Vec::new();
        let ende = loop {
            match rx.recv().await.expect("Kanal geschlossen") {
                ProzessAusgabe::Zeile(z) => zeilen.push(z),
                ProzessAusgabe::Beendet(code) => break code,
            }
        };
        assert_eq!(zeilen, vec!["eins", "zwei"]);
        assert_eq!(ende, Some(3));
    }

    #[tokio::test]
    async fn senden_schreibt_auf_stdin() {
        let prozess = shell_prozess("read zeile; echo \"erhalten: $zeile\"");
        let (tx, mut rx) = mpsc::channel(16);
        prozess.starten(tx).await.unwrap();
        prozess.senden("stop").await.unwrap();

        assert_eq!(
            rx.recv().await,
            Some(ProzessAusgabe::Zeile("erhalten: stop".into()))
        );
    }

    #[tokio::test]
    async fn senden_ohne_prozess_schlaegt_fehl() {
        let prozess = shell_prozess("true");
        assert!(matches!(
            prozess.senden("stop").await,
            Err(ProcessError::NichtGestartet)
        ));
    }

    #[tokio::test]
    async fn stoppen_beendet_haengenden_prozess() {
        // `exec`, damit kein Kindprozess die Pipes offen haelt
        let prozess = shell_prozess("exec sleep 30");
        let (tx, mut rx) = mpsc::channel(16);
        prozess.starten(tx).await.unwrap();
        prozess.stoppen().await.unwrap();

        let ende = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Some(ProzessAusgabe::Beendet(code)) = rx.recv().await {
                    break code;
                }
            }
        })
        .await
        .expect("Prozess wurde nicht beendet");
        assert_eq!(ende, None, "Per Signal beendet, kein Exit-Code");
    }
}
