//! Component trait: the interface every UI pane implements.
//!
//! Components own their view state (scroll offsets, cached layout) and read
//! everything else from `AppState`.  They answer input with `Vec<Action>`
//! and leave dispatch to the App event loop.

use ratatui::crossterm::event::{KeyEvent, MouseEvent, MouseEventKind};
use ratatui::{layout::Rect, Frame};

use crate::action::{Action, ComponentId};
use crate::app_state::AppState;

pub trait Component {
    fn id(&self) -> ComponentId;

    /// Only called when this component has focus.
    fn handle_key(&mut self, key: KeyEvent, state: &AppState) -> Vec<Action>;

    /// Wheel scrolling over the pane maps to scroll actions by default.
    fn handle_mouse(&mut self, event: MouseEvent, _area: Rect, _state: &AppState) -> Vec<Action> {
        match event.kind {
            MouseEventKind::ScrollUp => vec![Action::ScrollUp(3)],
            MouseEventKind::ScrollDown => vec![Action::ScrollDown(3)],
            _ => Vec::new(),
        }
    }

    /// Called each UI tick (~100ms).
    fn tick(&mut self, _state: &AppState) -> Vec<Action> {
        Vec::new()
    }

    /// Actions reach every component, focused or not.
    fn on_action(&mut self, action: &Action, state: &AppState) -> Vec<Action>;

    fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool, state: &AppState);
}
