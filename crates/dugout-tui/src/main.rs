mod action;
mod app;
mod app_state;
mod component;
mod components;
mod core;
mod focus;
mod mpv;
mod recognizer;
mod recorder;
mod theme;
mod widgets;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};

use dugout_proto::config::Config;
use dugout_proto::state::StateManager;

use crate::widgets::toast::Severity;

/// What the SessionCore broadcasts to the TUI.
#[derive(Debug, Clone)]
pub enum BroadcastMessage {
    /// The SessionState snapshot changed; receivers re-read it from StateManager.
    StateUpdated,
    /// Something the viewer should see as a toast.
    Notice(Severity, String),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let data_dir = dugout_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;

    let log_path = data_dir.join("dugout.log");
    let state_path = data_dir.join("state.json");

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // RUST_LOG overrides; HTTP client internals are noisy at debug.
    let log_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "debug,hyper_util=warn,reqwest=warn,hyper=warn".to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    // The TUI owns the screen; print the log path before it does.
    eprintln!("dugout log: {}", log_path.display());
    tracing::info!("dugout starting…");

    // ── Load config ──────────────────────────────────────────────────────────
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("config unreadable, using defaults: {:#}", e);
            Config::default()
        }
    };
    tracing::info!("backend at {}", config.backend.base_url);

    // ── Session state ────────────────────────────────────────────────────────
    let first_run = !state_path.exists();
    let state_manager = Arc::new(StateManager::new(state_path));
    if first_run {
        state_manager.set_volume(config.playback.volume).await?;
    }

    // ── Channels ─────────────────────────────────────────────────────────────
    let (broadcast_tx, broadcast_rx) = broadcast::channel::<BroadcastMessage>(1024);
    let (event_tx, event_rx) = mpsc::channel::<core::CoreEvent>(1024);

    // ── SessionCore ──────────────────────────────────────────────────────────
    let session_core = core::SessionCore::new(
        config,
        Arc::clone(&state_manager),
        broadcast_tx,
        event_tx.clone(),
    )
    .await?;

    let core_task = tokio::spawn(async move {
        if let Err(e) = session_core.run(event_rx).await {
            tracing::error!("SessionCore exited with error: {}", e);
        }
    });

    // ── Run TUI ──────────────────────────────────────────────────────────────
    let app = app::App::new(log_path, event_tx.clone(), state_manager);
    let result = app.run(broadcast_rx).await;

    // Give the core a moment to stop mpv and any recording.
    let _ = event_tx.send(core::CoreEvent::Shutdown).await;
    if tokio::time::timeout(Duration::from_secs(3), core_task)
        .await
        .is_err()
    {
        tracing::warn!("SessionCore did not stop in time");
    }
    tracing::info!("dugout stopped");

    result
}
