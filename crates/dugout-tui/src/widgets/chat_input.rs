//! ChatInput wraps tui-input as the one-line question box under the chat.

use ratatui::crossterm::event::{Event, KeyCode, KeyEvent};
use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use tui_input::{backend::crossterm::EventHandler, Input};

use dugout_proto::state::ChatLock;

use crate::theme::{style_input, C_INPUT_BG, C_MUTED};

#[derive(Debug, PartialEq)]
pub enum ChatInputAction {
    /// Enter on non-blank text.  The box is cleared.
    Submit(String),
    Cancelled,
    None,
}

pub struct ChatInput {
    input: Input,
    active: bool,
}

impl ChatInput {
    pub fn new() -> Self {
        Self {
            input: Input::default(),
            active: false,
        }
    }

    pub fn activate(&mut self) {
        self.active = true;
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn text(&self) -> &str {
        self.input.value()
    }

    /// Esc closes the box but keeps the draft.  Enter on blank text is a no-op.
    pub fn handle_key(&mut self, key: KeyEvent) -> ChatInputAction {
        match key.code {
            KeyCode::Esc => {
                self.deactivate();
                ChatInputAction::Cancelled
            }
            KeyCode::Enter => {
                let text = self.input.value().trim().to_string();
                if text.is_empty() {
                    return ChatInputAction::None;
                }
                self.input = Input::default();
                ChatInputAction::Submit(text)
            }
            _ => {
                self.input.handle_event(&Event::Key(key));
                ChatInputAction::None
            }
        }
    }

    /// A `lock` greys the box out and says why.
    pub fn draw(&self, frame: &mut Frame, area: Rect, lock: Option<ChatLock>) {
        let width = area.width.saturating_sub(3) as usize;
        let scroll = self.input.visual_scroll(width);
        let value = self.input.value();

        let span = if let Some(lock) = lock {
            Span::styled(
                format!("  input paused while {}", lock.reason()),
                Style::default().fg(C_MUTED),
            )
        } else if value.is_empty() {
            let hint = if self.active {
                "› "
            } else {
                "› press i to ask about the game"
            };
            Span::styled(hint, Style::default().fg(C_MUTED))
        } else {
            let visible: String = value.chars().skip(scroll).collect();
            Span::styled(format!("› {}", visible), style_input())
        };

        frame.render_widget(
            Paragraph::new(Line::from(span)).style(Style::default().bg(C_INPUT_BG)),
            area,
        );

        if self.active && lock.is_none() {
            let cursor_x = area.x + 2 + (self.input.visual_cursor() - scroll) as u16;
            frame.set_cursor_position((cursor_x.min(area.x + area.width.saturating_sub(1)), area.y));
        }
    }
}

impl Default for ChatInput {
    fn default() -> Self {
        Self::new()
    }
}
