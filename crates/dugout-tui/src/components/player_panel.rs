//! PlayerPanel: what mpv is showing and how far along it is.
//!
//! Row 1: state icon, segment name, badges (CLIP, REC, theater, mpv health).
//! Row 2: buffer position, game clock, catalog size, volume.
//! Row 3: timeline.

use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use dugout_proto::player::PlayerState;
use dugout_proto::state::MpvHealth;

use crate::{
    action::{Action, ComponentId},
    app_state::AppState,
    component::Component,
    theme::{
        C_ACCENT, C_BADGE_ERR, C_BADGE_PENDING, C_BADGE_REC, C_CLIP, C_CONNECTING, C_MUTED,
        C_PLAYING, C_PRIMARY, C_SECONDARY,
    },
    widgets::{
        pane_chrome::{pane_chrome, Badge},
        progress_bar::{draw_progress, fmt_time},
    },
};

pub struct PlayerPanel;

impl PlayerPanel {
    pub fn new() -> Self {
        Self
    }
}

impl Component for PlayerPanel {
    fn id(&self) -> ComponentId {
        ComponentId::Player
    }

    fn handle_key(&mut self, key: KeyEvent, _state: &AppState) -> Vec<Action> {
        if key.kind == KeyEventKind::Release {
            return vec![];
        }
        match key.code {
            KeyCode::Enter => vec![Action::TogglePlay],
            KeyCode::Left => vec![Action::Rewind],
            _ => vec![],
        }
    }

    fn on_action(&mut self, _action: &Action, _state: &AppState) -> Vec<Action> {
        vec![]
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool, state: &AppState) {
        let badge = state.session.mpv_health.badge_label().map(|text| Badge {
            text,
            color: match state.session.mpv_health {
                MpvHealth::Dead => C_BADGE_ERR,
                _ => C_BADGE_PENDING,
            },
        });
        let block = pane_chrome("player", Some('1'), focused, badge);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        if inner.height == 0 {
            return;
        }

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Min(0),
            ])
            .split(inner);

        frame.render_widget(Paragraph::new(now_showing_line(state)), rows[0]);
        frame.render_widget(Paragraph::new(position_line(state)), rows[1]);
        draw_progress(
            frame,
            rows[2],
            state.session.time_pos_secs,
            state.session.duration_secs,
        );
    }
}

fn state_icon(state: &AppState) -> (&'static str, Color) {
    let s = &state.session;
    if s.is_buffering {
        return ("◔", C_CONNECTING);
    }
    match s.player_state {
        PlayerState::Playing => ("▶", C_PLAYING),
        PlayerState::Paused => ("⏸", C_CONNECTING),
        PlayerState::Loading => ("◔", C_CONNECTING),
        PlayerState::Ended => ("■", C_SECONDARY),
        PlayerState::Idle => ("■", C_MUTED),
    }
}

fn now_showing_line(state: &AppState) -> Line<'static> {
    let s = &state.session;
    let (icon, icon_color) = state_icon(state);

    let name = match state.now_showing() {
        Some(seg) => Span::styled(
            seg.to_string(),
            Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD),
        ),
        None if s.catalog_error.is_some() => {
            Span::styled("no segments", Style::default().fg(C_ACCENT))
        }
        None => Span::styled("waiting for segments…", Style::default().fg(C_MUTED)),
    };

    let mut spans = vec![
        Span::raw(" "),
        Span::styled(icon, Style::default().fg(icon_color)),
        Span::raw(" "),
        name,
    ];
    if s.is_buffering {
        spans.push(Span::styled("  buffering", Style::default().fg(C_CONNECTING)));
    }
    if s.clip_active {
        spans.push(Span::styled(
            "  CLIP",
            Style::default().fg(C_CLIP).add_modifier(Modifier::BOLD),
        ));
        if !s.queued.is_empty() {
            spans.push(Span::styled(
                format!(" +{}", s.queued.len()),
                Style::default().fg(C_CLIP),
            ));
        }
    }
    if s.is_capturing {
        spans.push(Span::styled(
            "  ● REC",
            Style::default().fg(C_BADGE_REC).add_modifier(Modifier::BOLD),
        ));
    }
    if s.is_theater {
        spans.push(Span::styled("  theater", Style::default().fg(C_SECONDARY)));
    }
    Line::from(spans)
}

fn position_line(state: &AppState) -> Line<'static> {
    let s = &state.session;
    let position = if s.window.is_empty() {
        "segment -/-".to_string()
    } else {
        format!("segment {}/{}", s.index + 1, s.window.len())
    };
    Line::from(vec![
        Span::raw("   "),
        Span::styled(position, Style::default().fg(C_SECONDARY)),
        Span::styled(
            format!("  game {}", fmt_time(s.elapsed_secs as f64)),
            Style::default().fg(C_SECONDARY),
        ),
        Span::styled(
            format!("  catalog {}", s.catalog_len),
            Style::default().fg(C_MUTED),
        ),
        Span::styled(
            format!("  vol {:.0}%", s.volume * 100.0),
            Style::default().fg(C_MUTED),
        ),
        Span::styled(
            format!("  {}", s.player_state.label()),
            Style::default().fg(C_MUTED),
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_position_line_counts_from_one() {
        let mut state = AppState::new(PathBuf::from("dugout.log"));
        state.session.window = vec!["a.mp4".into(), "b.mp4".into()];
        state.session.index = 1;
        state.session.catalog_len = 9;
        state.session.elapsed_secs = 120;
        let line = text(&position_line(&state));
        assert!(line.contains("segment 2/2"));
        assert!(line.contains("game 2:00"));
        assert!(line.contains("catalog 9"));
    }

    #[test]
    fn test_clip_badges() {
        let mut state = AppState::new(PathBuf::from("dugout.log"));
        state.session.active_segment = Some("segment_012.mp4".into());
        state.session.clip_active = true;
        state.session.is_capturing = true;
        state.session.queued = vec!["segment_013.mp4".into()];
        let line = text(&now_showing_line(&state));
        assert!(line.contains("segment_012.mp4"));
        assert!(line.contains("CLIP +1"));
        assert!(line.contains("REC"));
    }
}
