//! External speech recognizer.
//!
//! One process per utterance.  The recognizer listens until it decides the
//! utterance is over, or until its stdin is closed (the user pressed the voice
//! key again), then prints the transcript on stdout and exits.

use std::process::Stdio;
use std::time::Duration;

use dugout_proto::config::VoiceConfig;
use dugout_proto::voice::VoiceOutcome;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::CoreEvent;

/// How long a stopped recognizer gets to print what it heard.
const STOP_GRACE: Duration = Duration::from_secs(3);

#[derive(Debug, Clone)]
pub struct Recognizer {
    argv: Vec<String>,
    limit: Duration,
}

/// A running recognition session.
#[derive(Debug)]
pub struct Listening {
    pub id: Uuid,
    stop: CancellationToken,
}

impl Listening {
    pub fn stop(&self) {
        self.stop.cancel();
    }
}

impl Recognizer {
    /// `None` when no command is configured.
    pub fn new(config: &VoiceConfig) -> Option<Self> {
        if !config.is_configured() {
            return None;
        }
        Some(Self {
            argv: config.command.clone(),
            limit: config.timeout(),
        })
    }

    /// Spawn the recognizer.  Outcomes are posted back tagged with `id`;
    /// every session ends with `VoiceOutcome::End`.
    pub fn start(
        &self,
        id: Uuid,
        shutdown: &CancellationToken,
        tx: mpsc::Sender<CoreEvent>,
    ) -> Listening {
        let stop = shutdown.child_token();
        let argv = self.argv.clone();
        let limit = self.limit;
        let session_stop = stop.clone();
        let shutdown = shutdown.clone();

        tokio::spawn(async move {
            info!("recognizer: session {} started", id);
            let run = tokio::time::timeout(limit, recognize(&argv, &session_stop));
            let result = tokio::select! {
                _ = shutdown.cancelled() => return,
                res = run => res,
            };

            let outcome = match result {
                Ok(Ok(Some(text))) => Some(VoiceOutcome::Result(text)),
                Ok(Ok(None)) => None,
                Ok(Err(e)) => {
                    warn!("recognizer: session {} failed: {}", id, e);
                    Some(VoiceOutcome::Error(e.to_string()))
                }
                Err(_) => {
                    warn!("recognizer: session {} timed out after {:?}", id, limit);
                    Some(VoiceOutcome::Error("timed out".to_string()))
                }
            };
            if let Some(outcome) = outcome {
                let _ = tx.send(CoreEvent::Voice { id, outcome }).await;
            }
            let _ = tx
                .send(CoreEvent::Voice {
                    id,
                    outcome: VoiceOutcome::End,
                })
                .await;
            debug!("recognizer: session {} ended", id);
        });

        Listening { id, stop }
    }
}

/// Run the command once.  `Ok(None)` means it exited without hearing anything.
async fn recognize(argv: &[String], stop: &CancellationToken) -> anyhow::Result<Option<String>> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| anyhow::anyhow!("empty recognizer command"))?;

    let mut child = tokio::process::Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()?;

    let mut stdin = child.stdin.take();
    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow::anyhow!("recognizer stdout unavailable"))?;

    let mut out = String::new();
    {
        let read = stdout.read_to_string(&mut out);
        tokio::pin!(read);

        tokio::select! {
            res = &mut read => { res?; }
            _ = stop.cancelled() => {
                debug!("recognizer: stop requested, closing stdin");
                drop(stdin.take());
                match tokio::time::timeout(STOP_GRACE, &mut read).await {
                    Ok(res) => { res?; }
                    Err(_) => {
                        let _ = child.kill().await;
                        return Ok(None);
                    }
                }
            }
        }
    }
    drop(stdin);

    let status = child.wait().await?;
    if !status.success() {
        anyhow::bail!("recognizer exited with {}", status);
    }
    let text = out.trim();
    if text.is_empty() {
        Ok(None)
    } else {
        Ok(Some(text.to_string()))
    }
}
