//! ContextPanel: "previously on" text and the analysis sections of the
//! latest match overview.

use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Wrap},
    Frame,
};

use dugout_proto::protocol::MatchOverview;

use crate::{
    action::{Action, ComponentId},
    app_state::AppState,
    component::Component,
    theme::{style_heading, C_ACCENT, C_BADGE_ERR, C_MUTED, C_SECONDARY},
    widgets::pane_chrome::{pane_chrome, Badge},
};

pub struct ContextPanel {
    scroll: u16,
    /// Overview the scroll offset belongs to; a new one resets it.
    shown: Option<MatchOverview>,
}

impl ContextPanel {
    pub fn new() -> Self {
        Self {
            scroll: 0,
            shown: None,
        }
    }
}

impl Component for ContextPanel {
    fn id(&self) -> ComponentId {
        ComponentId::Context
    }

    fn handle_key(&mut self, key: KeyEvent, _state: &AppState) -> Vec<Action> {
        if key.kind == KeyEventKind::Release {
            return vec![];
        }
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => vec![Action::ScrollUp(1)],
            KeyCode::Down | KeyCode::Char('j') => vec![Action::ScrollDown(1)],
            KeyCode::Home | KeyCode::Char('g') => {
                self.scroll = 0;
                vec![]
            }
            _ => vec![],
        }
    }

    fn on_action(&mut self, action: &Action, _state: &AppState) -> Vec<Action> {
        match action {
            Action::ScrollUp(n) => self.scroll = self.scroll.saturating_sub(*n as u16),
            Action::ScrollDown(n) => self.scroll = self.scroll.saturating_add(*n as u16),
            _ => {}
        }
        vec![]
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool, state: &AppState) {
        if self.shown != state.session.overview {
            self.shown = state.session.overview.clone();
            self.scroll = 0;
        }

        let badge = state.session.catalog_error.as_ref().map(|_| Badge {
            text: "ERR",
            color: C_BADGE_ERR,
        });
        let block = pane_chrome("context", Some('2'), focused, badge);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let lines = context_lines(state);
        // Wrapped height is unknown here; keep at least one line on screen.
        let max_scroll = lines.len().saturating_sub(1) as u16;
        self.scroll = self.scroll.min(max_scroll);

        frame.render_widget(
            Paragraph::new(lines)
                .wrap(Wrap { trim: true })
                .scroll((self.scroll, 0)),
            inner,
        );
    }
}

fn context_lines(state: &AppState) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    if let Some(err) = &state.session.catalog_error {
        lines.push(Line::from(Span::styled(
            err.clone(),
            Style::default().fg(C_ACCENT).add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(""));
    }

    let Some(overview) = &state.session.overview else {
        lines.push(Line::from(Span::styled(
            "no analysis for this segment yet",
            Style::default().fg(C_MUTED),
        )));
        return lines;
    };

    if let Some(err) = overview.error() {
        lines.push(Line::from(Span::styled(
            format!("overview unavailable: {}", err),
            Style::default().fg(C_MUTED),
        )));
        return lines;
    }

    let before = lines.len();
    if let Some(text) = overview.current_context() {
        lines.push(Line::from(Span::styled("Previously on live stream", style_heading())));
        lines.push(Line::from(Span::styled(
            text.to_string(),
            Style::default().fg(C_SECONDARY),
        )));
        lines.push(Line::from(""));
    }

    for section in overview.sections() {
        lines.push(Line::from(Span::styled(section.title, style_heading())));
        for p in section.paragraphs {
            lines.push(Line::from(Span::styled(p, Style::default().fg(C_SECONDARY))));
        }
        lines.push(Line::from(""));
    }

    if lines.len() == before {
        lines.push(Line::from(Span::styled(
            "overview has no readable sections",
            Style::default().fg(C_MUTED),
        )));
    }
    lines
}
