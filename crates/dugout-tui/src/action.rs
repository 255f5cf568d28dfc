//! Action enum: every intent a key, click or component can raise.

/// Unique identifier for a focusable component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentId {
    Player,
    Context,
    Chat,
    LogPanel,
    HelpOverlay,
}

/// All actions that can flow through the system.
/// Components produce Actions; the App dispatches them.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    // ── Playback ─────────────────────────────────────────────────────────────
    TogglePlay,
    Rewind,
    ToggleTheater,
    Volume(f32),

    // ── Conversation ─────────────────────────────────────────────────────────
    SendChat(String),
    ToggleVoice,
    OpenInput,
    CloseInput,
    CopyLastAnswer,

    // ── Navigation ───────────────────────────────────────────────────────────
    FocusNext,
    FocusPrev,
    FocusPane(ComponentId),
    ScrollUp(usize),
    ScrollDown(usize),

    // ── UI toggles ───────────────────────────────────────────────────────────
    ToggleLogs,
    ToggleHelp,
    ToggleKeys,

    // ── System ───────────────────────────────────────────────────────────────
    Quit,
}
