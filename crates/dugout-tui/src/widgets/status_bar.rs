//! Status bar: bottom lines with connection state, mode, and keybindings.

use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::theme::{C_ACCENT, C_MODE_CHAT, C_MODE_NORMAL, C_MUTED, C_PLAYING, C_SECONDARY};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputMode {
    Normal,
    Chat,
}

impl InputMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Normal => "WATCH",
            Self::Chat => "CHAT",
        }
    }

    pub fn color(self) -> Color {
        match self {
            Self::Normal => C_MODE_NORMAL,
            Self::Chat => C_MODE_CHAT,
        }
    }

    fn keys(self) -> &'static str {
        match self {
            Self::Normal => {
                " Space play/pause  r rewind  t theater  +/- vol  i chat  v voice  y copy answer  Tab panes  PgUp/PgDn scroll  K keys  L logs  ? help  q quit"
            }
            Self::Chat => " type a question  Enter send  Esc close",
        }
    }
}

/// Draw the log bar: connection dot and the last notice.
pub fn draw_log_bar(frame: &mut Frame, area: Rect, last_log: Option<&str>, connected: bool) {
    let conn_span = if connected {
        Span::styled("●", Style::default().fg(C_PLAYING))
    } else {
        Span::styled("○", Style::default().fg(C_ACCENT))
    };

    let log_span = Span::styled(last_log.unwrap_or(""), Style::default().fg(C_SECONDARY));

    let line = Line::from(vec![conn_span, Span::raw(" "), log_span]);
    frame.render_widget(Paragraph::new(line), area);
}

/// Draw the keybindings footer bar (one row).
pub fn draw_keys_bar(frame: &mut Frame, area: Rect, mode: InputMode) {
    let line = Line::from(vec![
        Span::styled(
            format!(" {} ", mode.label()),
            Style::default()
                .fg(mode.color())
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(mode.keys(), Style::default().fg(C_MUTED)),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}
