//! App: component-based terminal event loop.
//!
//! - `App` owns the components and `AppState` (read-only for components).
//! - A `tokio::mpsc` channel carries `AppMessage`s in from background tasks
//!   (terminal input, core broadcasts).
//! - Components return `Vec<Action>`; App dispatches each Action.
//! - Commands flow out to `SessionCore` through `cmd_tx`.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ratatui::crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers, MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    widgets::Block,
    Terminal,
};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use dugout_proto::state::{MpvHealth, SessionState, StateManager};

use crate::core::{Command, CoreEvent};
use crate::BroadcastMessage;
use crate::{
    action::{Action, ComponentId},
    app_state::AppState,
    component::Component,
    components::{
        chat_panel::ChatPanel, context_panel::ContextPanel, help_overlay::HelpOverlay,
        log_panel::LogPanel, player_panel::PlayerPanel,
    },
    focus::FocusRing,
    theme::C_BG,
    widgets::{
        chat_input::{ChatInput, ChatInputAction},
        status_bar::{self, InputMode},
        toast::{Severity, ToastManager},
    },
};

const VOLUME_STEP: f32 = 0.05;
const PAGE: usize = 10;
const LOG_TAIL: usize = 500;
const LOG_PANEL_HEIGHT: u16 = 10;

// ── Internal event bus ────────────────────────────────────────────────────────

enum AppMessage {
    Event(Event),
    StateUpdated(SessionState),
    Notice(Severity, String),
}

/// Last-drawn layout rects, for mouse hit-testing.
#[derive(Default, Clone)]
struct PaneAreas {
    player: Rect,
    context: Rect,
    chat: Rect,
    input: Rect,
    log_panel: Rect,
}

pub struct App {
    tui_log_path: PathBuf,

    pub state: AppState,

    // ── Components ────────────────────────────────────────────────────────────
    player_panel: PlayerPanel,
    context_panel: ContextPanel,
    chat_panel: ChatPanel,
    log_panel: LogPanel,
    help_overlay: HelpOverlay,
    chat_input: ChatInput,

    // ── Layout ────────────────────────────────────────────────────────────────
    focus: FocusRing,
    show_keys_bar: bool,
    pane_areas: PaneAreas,

    cmd_tx: mpsc::Sender<CoreEvent>,
    state_manager: Arc<StateManager>,
    should_quit: bool,
    toast: ToastManager,
    /// Previous mpv health, to toast on transitions.
    prev_mpv_health: MpvHealth,
}

impl App {
    pub fn new(
        tui_log_path: PathBuf,
        cmd_tx: mpsc::Sender<CoreEvent>,
        state_manager: Arc<StateManager>,
    ) -> Self {
        Self {
            state: AppState::new(tui_log_path.clone()),
            tui_log_path,
            player_panel: PlayerPanel::new(),
            context_panel: ContextPanel::new(),
            chat_panel: ChatPanel::new(),
            log_panel: LogPanel::new(),
            help_overlay: HelpOverlay::new(),
            chat_input: ChatInput::new(),
            focus: FocusRing::new(vec![
                ComponentId::Player,
                ComponentId::Context,
                ComponentId::Chat,
            ]),
            show_keys_bar: true,
            pane_areas: PaneAreas::default(),
            cmd_tx,
            state_manager,
            should_quit: false,
            toast: ToastManager::new(),
            prev_mpv_health: MpvHealth::Absent,
        }
    }

    pub async fn run(
        mut self,
        mut broadcast_rx: broadcast::Receiver<BroadcastMessage>,
    ) -> anyhow::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        debug!("terminal ready, size={:?}", terminal.size());

        let (tx, mut rx) = mpsc::channel::<AppMessage>(1024);

        // In-process core: connected from the start.
        self.state.connected = true;
        let initial = self.state_manager.get_state().await;
        self.on_state_updated(initial);

        // ── Background task: keyboard/mouse events ────────────────────────────
        let event_tx = tx.clone();
        tokio::task::spawn_blocking(move || loop {
            match event::read() {
                Ok(ev) => {
                    if event_tx.blocking_send(AppMessage::Event(ev)).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        });

        // ── Background task: core broadcasts -> AppMessage ───────────────────
        let bc_tx = tx.clone();
        let bc_state_manager = self.state_manager.clone();
        tokio::spawn(async move {
            loop {
                match broadcast_rx.recv().await {
                    Ok(msg) => {
                        let app_msg = match msg {
                            BroadcastMessage::StateUpdated => {
                                AppMessage::StateUpdated(bc_state_manager.get_state().await)
                            }
                            BroadcastMessage::Notice(severity, text) => {
                                AppMessage::Notice(severity, text)
                            }
                        };
                        if bc_tx.send(app_msg).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        // the next StateUpdated carries the full snapshot
                        warn!("broadcast receiver lagged by {} messages", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        // ── Periodic timers ───────────────────────────────────────────────────
        // Toast expiry and spinner animation.
        let mut toast_tick = tokio::time::interval(Duration::from_millis(100));
        toast_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut ui_tick = tokio::time::interval(Duration::from_millis(100));
        ui_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        // dugout.log tail, only while the log panel is open.
        let mut log_refresh = tokio::time::interval(Duration::from_secs(2));
        log_refresh.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        // ── Main loop ─────────────────────────────────────────────────────────
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal.draw(|f| self.draw(f))?;
            }
            needs_redraw = false;

            if self.should_quit {
                break;
            }

            tokio::select! {
                Some(msg) = rx.recv() => {
                    const MAX_DRAIN: usize = 64;
                    self.handle_message(msg).await;
                    let mut drained = 0usize;
                    while drained < MAX_DRAIN {
                        let Ok(next) = rx.try_recv() else { break };
                        self.handle_message(next).await;
                        drained += 1;
                    }
                    needs_redraw = true;
                }

                _ = ui_tick.tick() => {
                    let tick_actions: Vec<Action> = {
                        let s = &self.state;
                        let mut all = Vec::new();
                        all.extend(self.player_panel.tick(s));
                        all.extend(self.context_panel.tick(s));
                        all.extend(self.chat_panel.tick(s));
                        all.extend(self.log_panel.tick(s));
                        all
                    };
                    for action in tick_actions {
                        self.dispatch(action).await;
                    }
                    needs_redraw = self.state.session.is_typing;
                }

                _ = toast_tick.tick() => {
                    if !self.toast.is_empty() {
                        self.toast.tick();
                        needs_redraw = true;
                    }
                }

                _ = log_refresh.tick() => {
                    if self.log_panel.expanded {
                        self.reload_tui_log();
                        needs_redraw = true;
                    }
                }
            }
        }

        // ── Teardown ──────────────────────────────────────────────────────────
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;
        Ok(())
    }

    async fn handle_message(&mut self, msg: AppMessage) {
        match msg {
            AppMessage::Event(ev) => match ev {
                Event::Key(key) => {
                    if key.kind == KeyEventKind::Release {
                        return;
                    }
                    for a in self.handle_key(key) {
                        self.dispatch(a).await;
                    }
                }
                Event::Mouse(mouse) => {
                    for a in self.handle_mouse(mouse) {
                        self.dispatch(a).await;
                    }
                }
                _ => {}
            },
            AppMessage::StateUpdated(session) => self.on_state_updated(session),
            AppMessage::Notice(severity, text) => {
                self.push_log(text.clone());
                self.toast.push(text, severity);
            }
        }
    }

    fn on_state_updated(&mut self, session: SessionState) {
        let new_health = session.mpv_health.clone();
        if new_health != self.prev_mpv_health {
            match new_health {
                MpvHealth::Dead => self.toast.error("mpv process died"),
                MpvHealth::Running if self.prev_mpv_health == MpvHealth::Dead => {
                    self.toast.success("mpv recovered")
                }
                _ => {}
            }
            self.prev_mpv_health = new_health;
        }

        self.toast
            .set_spinner(session.voice_recording.then_some("listening…"));

        self.state.session = session;
        if self.state.session.input_locked() && self.chat_input.is_active() {
            self.chat_input.deactivate();
        }
        self.sync_input_mode();
    }

    // ── Key handling ──────────────────────────────────────────────────────────

    fn handle_key(&mut self, key: KeyEvent) -> Vec<Action> {
        if key.code == KeyCode::Char('c') && key.modifiers == KeyModifiers::CONTROL {
            return vec![Action::Quit];
        }

        // The question box takes every key while open.
        if self.chat_input.is_active() {
            return match self.chat_input.handle_key(key) {
                ChatInputAction::Submit(text) => vec![Action::SendChat(text)],
                ChatInputAction::Cancelled => vec![Action::CloseInput],
                ChatInputAction::None => vec![],
            };
        }

        if self.help_overlay.visible {
            return self.help_overlay.handle_key(key, &self.state);
        }

        match key.code {
            KeyCode::Char('q') => return vec![Action::Quit],
            KeyCode::Char('?') => return vec![Action::ToggleHelp],
            KeyCode::Char('L') => return vec![Action::ToggleLogs],
            KeyCode::Char('K') => return vec![Action::ToggleKeys],
            KeyCode::Tab => return vec![Action::FocusNext],
            KeyCode::BackTab => return vec![Action::FocusPrev],
            KeyCode::Char('1') => return vec![Action::FocusPane(ComponentId::Player)],
            KeyCode::Char('2') => return vec![Action::FocusPane(ComponentId::Context)],
            KeyCode::Char('3') => return vec![Action::FocusPane(ComponentId::Chat)],
            KeyCode::Char('4') => return vec![Action::FocusPane(ComponentId::LogPanel)],
            KeyCode::Char(' ') => return vec![Action::TogglePlay],
            KeyCode::Char('r') => return vec![Action::Rewind],
            KeyCode::Char('t') => return vec![Action::ToggleTheater],
            KeyCode::Char('v') => return vec![Action::ToggleVoice],
            KeyCode::Char('i') => return vec![Action::OpenInput],
            KeyCode::Char('y') => return vec![Action::CopyLastAnswer],
            KeyCode::Char('+') | KeyCode::Char('=') => {
                return vec![Action::Volume(self.state.session.volume + VOLUME_STEP)]
            }
            KeyCode::Char('-') => {
                return vec![Action::Volume(self.state.session.volume - VOLUME_STEP)]
            }
            KeyCode::PageUp => return vec![Action::ScrollUp(PAGE)],
            KeyCode::PageDown => return vec![Action::ScrollDown(PAGE)],
            _ => {}
        }

        let s = &self.state;
        match self.focus.current() {
            Some(ComponentId::Player) => self.player_panel.handle_key(key, s),
            Some(ComponentId::Context) => self.context_panel.handle_key(key, s),
            Some(ComponentId::Chat) => self.chat_panel.handle_key(key, s),
            Some(ComponentId::LogPanel) => self.log_panel.handle_key(key, s),
            Some(ComponentId::HelpOverlay) | None => vec![],
        }
    }

    // ── Mouse handling ────────────────────────────────────────────────────────

    fn handle_mouse(&mut self, event: MouseEvent) -> Vec<Action> {
        if !matches!(
            event.kind,
            MouseEventKind::Down(_) | MouseEventKind::ScrollUp | MouseEventKind::ScrollDown
        ) || self.help_overlay.visible
        {
            return vec![];
        }

        fn hit(r: Rect, col: u16, row: u16) -> bool {
            r.width > 0
                && r.height > 0
                && col >= r.x
                && col < r.x + r.width
                && row >= r.y
                && row < r.y + r.height
        }

        let areas = self.pane_areas.clone();
        let (col, row) = (event.column, event.row);
        let s = &self.state;

        if hit(areas.input, col, row) {
            return vec![Action::OpenInput];
        }

        let (id, mut actions) = if hit(areas.player, col, row) {
            (
                ComponentId::Player,
                self.player_panel.handle_mouse(event, areas.player, s),
            )
        } else if hit(areas.context, col, row) {
            (
                ComponentId::Context,
                self.context_panel.handle_mouse(event, areas.context, s),
            )
        } else if hit(areas.chat, col, row) {
            (
                ComponentId::Chat,
                self.chat_panel.handle_mouse(event, areas.chat, s),
            )
        } else if hit(areas.log_panel, col, row) {
            (
                ComponentId::LogPanel,
                self.log_panel.handle_mouse(event, areas.log_panel, s),
            )
        } else {
            return vec![];
        };

        // focus follows the pointer so scroll lands on the right pane
        if !self.focus.is_focused(id) {
            actions.insert(0, Action::FocusPane(id));
        }
        actions
    }

    // ── Action dispatcher ─────────────────────────────────────────────────────

    async fn dispatch(&mut self, action: Action) {
        let secondary: Vec<Action> = {
            let s = &self.state;
            match action {
                // scrolling belongs to the focused pane only
                Action::ScrollUp(_) | Action::ScrollDown(_) => match self.focus.current() {
                    Some(ComponentId::Player) => self.player_panel.on_action(&action, s),
                    Some(ComponentId::Context) => self.context_panel.on_action(&action, s),
                    Some(ComponentId::Chat) => self.chat_panel.on_action(&action, s),
                    Some(ComponentId::LogPanel) => self.log_panel.on_action(&action, s),
                    Some(ComponentId::HelpOverlay) | None => vec![],
                },
                _ => {
                    let mut out = Vec::new();
                    out.extend(self.player_panel.on_action(&action, s));
                    out.extend(self.context_panel.on_action(&action, s));
                    out.extend(self.chat_panel.on_action(&action, s));
                    out.extend(self.log_panel.on_action(&action, s));
                    out.extend(self.help_overlay.on_action(&action, s));
                    out
                }
            }
        };

        self.apply_action(action).await;

        // depth-limited to one level
        for a in secondary {
            self.apply_action(a).await;
        }
    }

    async fn apply_action(&mut self, action: Action) {
        debug!("apply_action: {:?}", action);
        match action {
            // ── Playback ──────────────────────────────────────────────────────
            Action::TogglePlay => self.send_cmd(Command::TogglePlay).await,
            Action::Rewind => self.send_cmd(Command::Rewind).await,
            Action::ToggleTheater => self.send_cmd(Command::ToggleTheater).await,
            Action::Volume(value) => {
                self.send_cmd(Command::Volume {
                    value: value.clamp(0.0, 1.0),
                })
                .await
            }

            // ── Chat ──────────────────────────────────────────────────────────
            Action::SendChat(text) => {
                if let Some(lock) = self.state.session.chat_lock() {
                    self.toast
                        .warning(format!("chat is paused while {}", lock.reason()));
                } else {
                    self.send_cmd(Command::SendChat { text }).await;
                }
            }
            Action::ToggleVoice => self.send_cmd(Command::ToggleVoice).await,
            Action::OpenInput => {
                if let Some(lock) = self.state.session.chat_lock() {
                    self.toast
                        .warning(format!("chat is paused while {}", lock.reason()));
                } else {
                    self.chat_input.activate();
                    self.focus.set(ComponentId::Chat);
                }
                self.sync_input_mode();
            }
            Action::CloseInput => {
                self.chat_input.deactivate();
                self.sync_input_mode();
            }
            Action::CopyLastAnswer => match self.state.session.last_answer.clone() {
                Some(text) => self.copy_to_clipboard(text),
                None => self.toast.warning("no answer to copy yet"),
            },

            // ── Layout ────────────────────────────────────────────────────────
            Action::FocusNext => {
                self.focus.next();
            }
            Action::FocusPrev => {
                self.focus.prev();
            }
            Action::FocusPane(id) => self.focus.set(id),
            Action::ToggleLogs => {
                // LogPanel flipped `expanded` in on_action already
                let shown = self.log_panel.expanded;
                self.focus.set_present(ComponentId::LogPanel, shown);
                if shown {
                    self.reload_tui_log();
                }
            }
            Action::ToggleHelp => {}
            Action::ToggleKeys => self.show_keys_bar = !self.show_keys_bar,
            Action::ScrollUp(_) | Action::ScrollDown(_) => {}

            Action::Quit => {
                info!("quit requested");
                self.should_quit = true;
                let _ = self.cmd_tx.send(CoreEvent::Shutdown).await;
            }
        }
    }

    // ── Rendering ─────────────────────────────────────────────────────────────

    fn draw(&mut self, frame: &mut ratatui::Frame) {
        let area = frame.area();
        frame.render_widget(Block::default().style(Style::default().bg(C_BG)), area);

        let log_h = if self.log_panel.expanded {
            LOG_PANEL_HEIGHT
        } else {
            0
        };
        let keys_h = if self.show_keys_bar { 1 } else { 0 };

        let outer = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(0),
                Constraint::Length(log_h),
                Constraint::Length(1),
                Constraint::Length(keys_h),
            ])
            .split(area);
        let (body, log_area, status_area, keys_area) = (outer[0], outer[1], outer[2], outer[3]);

        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(body);

        let left = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(5), Constraint::Min(0)])
            .split(columns[0]);

        let right = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(1)])
            .split(columns[1]);

        self.pane_areas = PaneAreas {
            player: left[0],
            context: left[1],
            chat: right[0],
            input: right[1],
            log_panel: log_area,
        };

        let focus = &self.focus;
        self.player_panel.draw(
            frame,
            left[0],
            focus.is_focused(ComponentId::Player),
            &self.state,
        );
        self.context_panel.draw(
            frame,
            left[1],
            focus.is_focused(ComponentId::Context),
            &self.state,
        );
        self.chat_panel.draw(
            frame,
            right[0],
            focus.is_focused(ComponentId::Chat),
            &self.state,
        );
        self.chat_input
            .draw(frame, right[1], self.state.session.chat_lock());

        if self.log_panel.expanded {
            self.log_panel.draw(
                frame,
                log_area,
                focus.is_focused(ComponentId::LogPanel),
                &self.state,
            );
        }

        status_bar::draw_log_bar(
            frame,
            status_area,
            self.state.logs.last().map(String::as_str),
            self.state.connected,
        );
        if self.show_keys_bar {
            status_bar::draw_keys_bar(frame, keys_area, self.state.input_mode);
        }

        // ── Overlays ──────────────────────────────────────────────────────────
        self.help_overlay.draw(frame, area, false, &self.state);
        self.toast.draw(frame, area);
    }

    // ── Helpers ───────────────────────────────────────────────────────────────

    async fn send_cmd(&self, cmd: Command) {
        let _ = self.cmd_tx.send(CoreEvent::ClientCommand(cmd)).await;
    }

    fn copy_to_clipboard(&mut self, text: String) {
        match arboard::Clipboard::new().and_then(|mut cb| cb.set_text(text.clone())) {
            Ok(()) => {
                let display = if text.chars().count() > 40 {
                    format!("{}…", text.chars().take(40).collect::<String>())
                } else {
                    text
                };
                self.toast.success(format!("copied: {}", display));
            }
            Err(e) => {
                warn!("clipboard error: {}", e);
                self.toast.error(format!("clipboard error: {}", e));
            }
        }
    }

    fn push_log(&mut self, msg: String) {
        self.state.logs.push(msg);
        if self.state.logs.len() > LOG_TAIL {
            self.state.logs.remove(0);
        }
    }

    /// Read the tail of dugout.log into `state.tui_log_lines`.
    fn reload_tui_log(&mut self) {
        if let Ok(content) = std::fs::read_to_string(&self.tui_log_path) {
            let lines: Vec<&str> = content.lines().collect();
            let start = lines.len().saturating_sub(LOG_TAIL);
            self.state.tui_log_lines = lines[start..].iter().map(|l| l.to_string()).collect();
        }
    }

    fn sync_input_mode(&mut self) {
        self.state.input_mode = if self.chat_input.is_active() {
            InputMode::Chat
        } else {
            InputMode::Normal
        };
    }
}
