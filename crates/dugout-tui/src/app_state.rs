//! AppState: read-only data passed to every component during render and event handling.
//!
//! Components read this for session state, but never mutate it.
//! The App event-loop is the only thing that writes to AppState.

use std::path::PathBuf;

use dugout_proto::state::SessionState;

use crate::widgets::status_bar::InputMode;

pub struct AppState {
    // ── Session ─────────────────────────────────────────────────────────────
    pub session: SessionState,
    pub connected: bool,

    // ── UI mode ─────────────────────────────────────────────────────────────
    pub input_mode: InputMode,

    // ── Logs ────────────────────────────────────────────────────────────────
    /// Notices raised by the core (newest last).
    pub logs: Vec<String>,
    /// Cached lines from dugout.log (refreshed periodically by App).
    pub tui_log_lines: Vec<String>,
    pub tui_log_path: PathBuf,
}

impl AppState {
    pub fn new(tui_log_path: PathBuf) -> Self {
        Self {
            session: SessionState::default(),
            connected: false,
            input_mode: InputMode::Normal,
            logs: Vec::new(),
            tui_log_lines: Vec::new(),
            tui_log_path,
        }
    }

    /// What the player is showing: the requested clip if one is loaded,
    /// otherwise the buffered segment at the current index.
    pub fn now_showing(&self) -> Option<&str> {
        self.session
            .active_segment
            .as_deref()
            .or_else(|| self.session.current_segment().map(String::as_str))
    }
}
