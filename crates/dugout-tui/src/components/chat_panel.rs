//! ChatPanel: the conversation transcript, newest at the bottom.
//!
//! Lines are wrapped here (not by `Paragraph`) so the scroll offset is in
//! screen rows and stays anchored to the bottom while new messages arrive.

use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use unicode_width::UnicodeWidthChar;

use dugout_proto::session::{ChatMessage, Sender};

use crate::{
    action::{Action, ComponentId},
    app_state::AppState,
    component::Component,
    theme::{C_AGENT, C_CLIP, C_MUTED, C_PRIMARY, C_USER},
    widgets::pane_chrome::{pane_chrome, Badge},
};

const TYPING_FRAMES: &[&str] = &["·  ", "·· ", "···"];

pub struct ChatPanel {
    /// Rows scrolled up from the bottom.
    scroll_back: usize,
    frame: usize,
}

impl ChatPanel {
    pub fn new() -> Self {
        Self {
            scroll_back: 0,
            frame: 0,
        }
    }
}

impl Component for ChatPanel {
    fn id(&self) -> ComponentId {
        ComponentId::Chat
    }

    fn handle_key(&mut self, key: KeyEvent, _state: &AppState) -> Vec<Action> {
        if key.kind == KeyEventKind::Release {
            return vec![];
        }
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => vec![Action::ScrollUp(1)],
            KeyCode::Down | KeyCode::Char('j') => vec![Action::ScrollDown(1)],
            KeyCode::End | KeyCode::Char('G') => {
                self.scroll_back = 0;
                vec![]
            }
            KeyCode::Enter => vec![Action::OpenInput],
            _ => vec![],
        }
    }

    fn tick(&mut self, state: &AppState) -> Vec<Action> {
        if state.session.is_typing {
            self.frame = (self.frame + 1) % (TYPING_FRAMES.len() * 3);
        }
        vec![]
    }

    fn on_action(&mut self, action: &Action, _state: &AppState) -> Vec<Action> {
        match action {
            Action::ScrollUp(n) => self.scroll_back = self.scroll_back.saturating_add(*n),
            Action::ScrollDown(n) => self.scroll_back = self.scroll_back.saturating_sub(*n),
            Action::SendChat(_) => self.scroll_back = 0,
            _ => {}
        }
        vec![]
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool, state: &AppState) {
        let s = &state.session;
        let badge = if s.voice_recording {
            Some(Badge {
                text: "MIC",
                color: C_USER,
            })
        } else {
            None
        };
        let block = pane_chrome("chat", Some('3'), focused, badge);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        if inner.height == 0 || inner.width < 4 {
            return;
        }

        let width = inner.width as usize;
        let mut lines: Vec<Line<'static>> = Vec::new();
        for msg in &s.messages {
            render_message(msg, width, &mut lines);
        }
        if s.is_typing {
            lines.push(Line::from(Span::styled(
                format!("agent {}", TYPING_FRAMES[self.frame / 3]),
                Style::default().fg(C_AGENT),
            )));
        }

        let height = inner.height as usize;
        let max_back = lines.len().saturating_sub(height);
        self.scroll_back = self.scroll_back.min(max_back);
        let start = lines.len().saturating_sub(height + self.scroll_back);
        let visible: Vec<Line> = lines.into_iter().skip(start).take(height).collect();

        frame.render_widget(Paragraph::new(visible), inner);
    }
}

fn render_message(msg: &ChatMessage, width: usize, out: &mut Vec<Line<'static>>) {
    let (who, color) = match msg.sender {
        Sender::User => ("you", C_USER),
        Sender::Agent => ("agent", C_AGENT),
    };
    out.push(Line::from(vec![
        Span::styled(who, Style::default().fg(color).add_modifier(Modifier::BOLD)),
        Span::styled(
            format!(" {}", msg.at.format("%H:%M")),
            Style::default().fg(C_MUTED),
        ),
    ]));

    for row in wrap_text(&msg.text, width.saturating_sub(2)) {
        out.push(Line::from(Span::styled(
            format!("  {}", row),
            Style::default().fg(C_PRIMARY),
        )));
    }
    if let Some(url) = &msg.media {
        out.push(Line::from(Span::styled(
            "  ▶ saved clip",
            Style::default().fg(C_CLIP).add_modifier(Modifier::BOLD),
        )));
        for row in wrap_text(url, width.saturating_sub(4)) {
            out.push(Line::from(Span::styled(
                format!("    {}", row),
                Style::default().fg(C_CLIP),
            )));
        }
    }
    out.push(Line::from(""));
}

/// Greedy word wrap by display width.  Words wider than `width` are split.
fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut rows = Vec::new();
    for para in text.lines() {
        let mut row = String::new();
        let mut row_w = 0usize;
        for word in para.split_whitespace() {
            let word_w: usize = word.chars().map(|c| c.width().unwrap_or(0)).sum();
            if row_w > 0 && row_w + 1 + word_w > width {
                rows.push(std::mem::take(&mut row));
                row_w = 0;
            }
            if word_w > width {
                for c in word.chars() {
                    let cw = c.width().unwrap_or(0);
                    if row_w + cw > width {
                        rows.push(std::mem::take(&mut row));
                        row_w = 0;
                    }
                    row.push(c);
                    row_w += cw;
                }
                continue;
            }
            if row_w > 0 {
                row.push(' ');
                row_w += 1;
            }
            row.push_str(word);
            row_w += word_w;
        }
        rows.push(row);
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_by_words() {
        assert_eq!(
            wrap_text("the runner on second stole third", 12),
            vec!["the runner", "on second", "stole third"]
        );
    }

    #[test]
    fn test_wrap_splits_long_words() {
        let rows = wrap_text("https://example.test/segments/segment_012.mp4", 16);
        assert!(rows.iter().all(|r| r.chars().count() <= 16));
        assert_eq!(rows.concat(), "https://example.test/segments/segment_012.mp4");
    }

    #[test]
    fn test_wrap_counts_wide_chars() {
        let rows = wrap_text("野球 野球 野球", 9);
        assert_eq!(rows, vec!["野球 野球", "野球"]);
    }

    #[test]
    fn test_clip_message_lines() {
        let mut out = Vec::new();
        render_message(&ChatMessage::clip("http://h/clip.mp4"), 40, &mut out);
        let text: Vec<String> = out
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect();
        assert!(text.iter().any(|l| l.contains("saved clip")));
        assert!(text.iter().any(|l| l.trim() == "http://h/clip.mp4"));
    }
}
