//! Player state machine.
//!
//! The player owns the buffer window, the current index and the playback
//! flags.  It never talks to mpv itself: every input is a [`PlayerEvent`] and
//! every side effect comes back out as a [`PlayerEffect`] for the event loop
//! to carry out.

use std::collections::VecDeque;

use crate::buffer::{GrowthTicket, SegmentBuffer};
use crate::config::PlaybackConfig;
use crate::protocol::SegmentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerState {
    #[default]
    Idle,
    Loading,
    Playing,
    Paused,
    Ended,
}

impl PlayerState {
    pub fn label(&self) -> &'static str {
        match self {
            PlayerState::Idle => "idle",
            PlayerState::Loading => "loading",
            PlayerState::Playing => "playing",
            PlayerState::Paused => "paused",
            PlayerState::Ended => "ended",
        }
    }
}

/// What is loaded in the player right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// The buffered segment at this index.
    Buffer(usize),
    /// A clip the conversation asked for.  Does not move the index.
    Requested(SegmentId),
}

#[derive(Debug, Clone)]
pub enum PlayerEvent {
    CatalogLoaded(Vec<SegmentId>),
    /// mpv reported `file-loaded` for the last load.
    FileLoaded,
    /// mpv reported `end-file` with reason `eof`.
    EndOfFile,
    WarmupElapsed,
    TogglePlay,
    Rewind,
    ToggleTheater,
    GrowthDue(GrowthTicket),
    PlayRequested(Vec<SegmentId>),
    /// The recorder is done with the current requested clip.
    CaptureFinished,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEffect {
    Load(SegmentId),
    SeekStart,
    SetPause(bool),
    SeekRelative(f64),
    ScheduleGrowth(GrowthTicket),
    /// Current index moved (or was first set).
    IndexChanged(usize),
    StartCapture(SegmentId),
    /// The requested clip ended before the capture window closed.
    StopCapture,
}

#[derive(Debug, Clone)]
pub struct Player {
    buffer: SegmentBuffer,
    index: usize,
    state: PlayerState,
    source: Option<Source>,
    requested: VecDeque<SegmentId>,
    theater: bool,
    warming_up: bool,
    /// The loaded buffered segment was paused by the warm-up, not the viewer.
    held_for_warmup: bool,
    capture_enabled: bool,
    capturing: bool,
    rewind_secs: f64,
}

impl Player {
    pub fn new(config: &PlaybackConfig, capture_enabled: bool) -> Self {
        Self {
            buffer: SegmentBuffer::new(config.window_size),
            index: 0,
            state: PlayerState::Idle,
            source: None,
            requested: VecDeque::new(),
            theater: false,
            warming_up: true,
            held_for_warmup: false,
            capture_enabled,
            capturing: false,
            rewind_secs: config.rewind_secs,
        }
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn buffer(&self) -> &SegmentBuffer {
        &self.buffer
    }

    pub fn source(&self) -> Option<&Source> {
        self.source.as_ref()
    }

    /// Buffered segment at the current index.
    pub fn current_segment(&self) -> Option<&SegmentId> {
        self.buffer.get(self.index)
    }

    /// Whatever is loaded, buffered or requested.
    pub fn active_segment(&self) -> Option<&SegmentId> {
        match &self.source {
            Some(Source::Buffer(idx)) => self.buffer.get(*idx),
            Some(Source::Requested(seg)) => Some(seg),
            None => None,
        }
    }

    pub fn queued(&self) -> impl Iterator<Item = &SegmentId> {
        self.requested.iter()
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlayerState::Playing
    }

    pub fn is_theater(&self) -> bool {
        self.theater
    }

    /// Restore the layout flag from a previous run.
    pub fn set_theater(&mut self, on: bool) {
        self.theater = on;
    }

    pub fn is_warming_up(&self) -> bool {
        self.warming_up
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing
    }

    /// A requested clip is loaded or waiting.
    pub fn clip_active(&self) -> bool {
        matches!(self.source, Some(Source::Requested(_))) || !self.requested.is_empty()
    }

    pub fn handle(&mut self, event: PlayerEvent) -> Vec<PlayerEffect> {
        use PlayerEffect::*;

        match event {
            PlayerEvent::CatalogLoaded(catalog) => {
                self.buffer.load_catalog(catalog);
                self.index = 0;
                let mut effects = vec![IndexChanged(0)];
                if self.clip_active() {
                    return effects;
                }
                effects.extend(self.load_buffered());
                effects
            }

            PlayerEvent::FileLoaded => {
                if self.state != PlayerState::Loading {
                    return vec![];
                }
                let mut effects = vec![SeekStart];
                match &self.source {
                    Some(Source::Requested(seg)) => {
                        self.state = PlayerState::Playing;
                        effects.push(SetPause(false));
                        if self.capture_enabled {
                            self.capturing = true;
                            effects.push(StartCapture(seg.clone()));
                        }
                    }
                    Some(Source::Buffer(_)) if self.warming_up => {
                        self.state = PlayerState::Paused;
                        self.held_for_warmup = true;
                        effects.push(SetPause(true));
                    }
                    Some(Source::Buffer(_)) => {
                        self.state = PlayerState::Playing;
                        effects.push(SetPause(false));
                    }
                    None => return vec![],
                }
                effects
            }

            PlayerEvent::EndOfFile => match self.source {
                Some(Source::Requested(_)) => {
                    self.state = PlayerState::Ended;
                    if self.capturing {
                        vec![StopCapture]
                    } else {
                        self.next_request()
                    }
                }
                Some(Source::Buffer(_)) => {
                    self.state = PlayerState::Ended;
                    self.after_end()
                }
                None => vec![],
            },

            PlayerEvent::WarmupElapsed => {
                self.warming_up = false;
                let held = std::mem::take(&mut self.held_for_warmup);
                let resumable = held
                    && self.state == PlayerState::Paused
                    && matches!(self.source, Some(Source::Buffer(_)));
                if resumable {
                    self.state = PlayerState::Playing;
                    vec![SetPause(false)]
                } else {
                    vec![]
                }
            }

            PlayerEvent::TogglePlay => {
                if self.warming_up {
                    return vec![];
                }
                match self.state {
                    PlayerState::Playing => {
                        self.state = PlayerState::Paused;
                        vec![SetPause(true)]
                    }
                    PlayerState::Paused => {
                        self.state = PlayerState::Playing;
                        vec![SetPause(false)]
                    }
                    _ => vec![],
                }
            }

            PlayerEvent::Rewind => {
                if self.warming_up {
                    return vec![];
                }
                match self.state {
                    PlayerState::Playing | PlayerState::Paused => {
                        vec![SeekRelative(-self.rewind_secs)]
                    }
                    _ => vec![],
                }
            }

            PlayerEvent::ToggleTheater => {
                if !self.warming_up {
                    self.theater = !self.theater;
                }
                vec![]
            }

            PlayerEvent::GrowthDue(ticket) => {
                self.buffer.complete_growth(ticket);
                let waiting = self.state == PlayerState::Ended
                    && matches!(self.source, Some(Source::Buffer(_)));
                if waiting {
                    self.after_end()
                } else {
                    vec![]
                }
            }

            PlayerEvent::PlayRequested(segments) => {
                if segments.is_empty() {
                    return vec![];
                }
                let busy = matches!(self.source, Some(Source::Requested(_)));
                self.requested.extend(segments);
                if busy {
                    vec![]
                } else {
                    self.next_request()
                }
            }

            PlayerEvent::CaptureFinished => {
                if !self.capturing {
                    return vec![];
                }
                self.capturing = false;
                let mut effects = vec![SetPause(true)];
                effects.extend(self.next_request());
                effects
            }
        }
    }

    /// Natural end of a buffered segment, or a growth landing while ended.
    fn after_end(&mut self) -> Vec<PlayerEffect> {
        if self.index + 1 < self.buffer.len() {
            self.index += 1;
            let mut effects = vec![PlayerEffect::IndexChanged(self.index)];
            effects.extend(self.load_buffered());
            return effects;
        }
        if self.buffer.is_exhausted() {
            self.state = PlayerState::Idle;
            return vec![];
        }
        match self.buffer.request_growth() {
            Some(ticket) => vec![PlayerEffect::ScheduleGrowth(ticket)],
            None => vec![],
        }
    }

    /// Load the next requested clip, or go back to the buffer when none remain.
    fn next_request(&mut self) -> Vec<PlayerEffect> {
        if let Some(seg) = self.requested.pop_front() {
            self.source = Some(Source::Requested(seg.clone()));
            self.state = PlayerState::Loading;
            self.held_for_warmup = false;
            return vec![PlayerEffect::Load(seg)];
        }
        self.load_buffered()
    }

    fn load_buffered(&mut self) -> Vec<PlayerEffect> {
        match self.buffer.get(self.index).cloned() {
            Some(seg) => {
                self.source = Some(Source::Buffer(self.index));
                self.state = PlayerState::Loading;
                self.held_for_warmup = false;
                vec![PlayerEffect::Load(seg)]
            }
            None => {
                self.source = None;
                self.state = PlayerState::Idle;
                vec![]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PlayerEffect::*;

    fn catalog(n: usize) -> Vec<SegmentId> {
        (0..n).map(|i| format!("s{}", i)).collect()
    }

    fn ready_player(n: usize) -> Player {
        let mut player = Player::new(&PlaybackConfig::default(), true);
        player.handle(PlayerEvent::CatalogLoaded(catalog(n)));
        player.handle(PlayerEvent::WarmupElapsed);
        player.handle(PlayerEvent::FileLoaded);
        player
    }

    fn take_growth(effects: &[PlayerEffect]) -> Option<GrowthTicket> {
        effects.iter().find_map(|e| match e {
            ScheduleGrowth(t) => Some(t.clone()),
            _ => None,
        })
    }

    #[test]
    fn test_catalog_load_starts_first_segment() {
        let mut player = Player::new(&PlaybackConfig::default(), true);
        let effects = player.handle(PlayerEvent::CatalogLoaded(catalog(10)));
        assert_eq!(effects, vec![IndexChanged(0), Load("s0".into())]);
        assert_eq!(player.state(), PlayerState::Loading);
        assert_eq!(player.buffer().len(), 5);
    }

    #[test]
    fn test_empty_catalog_stays_idle() {
        let mut player = Player::new(&PlaybackConfig::default(), true);
        player.handle(PlayerEvent::CatalogLoaded(Vec::new()));
        assert_eq!(player.state(), PlayerState::Idle);
        assert!(player.current_segment().is_none());
    }

    #[test]
    fn test_warmup_holds_first_segment_paused() {
        let mut player = Player::new(&PlaybackConfig::default(), true);
        player.handle(PlayerEvent::CatalogLoaded(catalog(10)));
        let effects = player.handle(PlayerEvent::FileLoaded);
        assert_eq!(effects, vec![SeekStart, SetPause(true)]);
        assert_eq!(player.state(), PlayerState::Paused);

        assert!(player.handle(PlayerEvent::TogglePlay).is_empty());
        assert!(player.handle(PlayerEvent::Rewind).is_empty());
        player.handle(PlayerEvent::ToggleTheater);
        assert!(!player.is_theater());

        assert_eq!(player.handle(PlayerEvent::WarmupElapsed), vec![SetPause(false)]);
        assert!(player.is_playing());
        assert_eq!(player.handle(PlayerEvent::TogglePlay), vec![SetPause(true)]);
    }

    #[test]
    fn test_warmup_ending_before_load_autoplays_on_load() {
        let mut player = Player::new(&PlaybackConfig::default(), true);
        player.handle(PlayerEvent::CatalogLoaded(catalog(10)));
        assert!(player.handle(PlayerEvent::WarmupElapsed).is_empty());
        assert_eq!(player.state(), PlayerState::Loading);
        let effects = player.handle(PlayerEvent::FileLoaded);
        assert_eq!(effects, vec![SeekStart, SetPause(false)]);
        assert!(player.is_playing());
    }

    #[test]
    fn test_warmup_ending_during_clip_leaves_clip_alone() {
        let mut player = Player::new(&PlaybackConfig::default(), true);
        player.handle(PlayerEvent::CatalogLoaded(catalog(10)));
        player.handle(PlayerEvent::FileLoaded);
        player.handle(PlayerEvent::PlayRequested(vec!["h1.mp4".into()]));
        player.handle(PlayerEvent::FileLoaded);
        assert!(player.handle(PlayerEvent::WarmupElapsed).is_empty());
        assert!(player.is_playing());
        assert!(player.is_capturing());
    }

    #[test]
    fn test_controls_after_warmup() {
        let mut player = ready_player(10);
        assert!(player.is_playing());
        assert_eq!(player.handle(PlayerEvent::Rewind), vec![SeekRelative(-10.0)]);
        assert_eq!(player.index(), 0);
        assert!(player.is_playing());

        assert_eq!(player.handle(PlayerEvent::TogglePlay), vec![SetPause(true)]);
        assert_eq!(player.state(), PlayerState::Paused);

        player.handle(PlayerEvent::ToggleTheater);
        assert!(player.is_theater());
        player.handle(PlayerEvent::ToggleTheater);
        assert!(!player.is_theater());
    }

    #[test]
    fn test_end_advances_then_grows() {
        let mut player = ready_player(10);

        for expected in 1..5 {
            let effects = player.handle(PlayerEvent::EndOfFile);
            assert_eq!(
                effects,
                vec![IndexChanged(expected), Load(format!("s{}", expected))]
            );
            player.handle(PlayerEvent::FileLoaded);
        }
        assert_eq!(player.index(), 4);

        let effects = player.handle(PlayerEvent::EndOfFile);
        assert_eq!(player.state(), PlayerState::Ended);
        let ticket = take_growth(&effects).unwrap();

        // A second trigger while the growth is pending does nothing.
        assert!(player.handle(PlayerEvent::EndOfFile).is_empty());

        let effects = player.handle(PlayerEvent::GrowthDue(ticket));
        assert_eq!(player.buffer().window(), &catalog(10)[..]);
        assert_eq!(effects, vec![IndexChanged(5), Load("s5".into())]);
        assert_eq!(player.state(), PlayerState::Loading);
    }

    #[test]
    fn test_exhausted_goes_idle() {
        let mut player = ready_player(2);
        player.handle(PlayerEvent::EndOfFile);
        player.handle(PlayerEvent::FileLoaded);
        let effects = player.handle(PlayerEvent::EndOfFile);
        assert!(effects.is_empty());
        assert_eq!(player.state(), PlayerState::Idle);
        assert_eq!(player.index(), 1);
    }

    #[test]
    fn test_requested_clips_play_in_order_and_return() {
        let mut player = ready_player(10);
        let effects = player.handle(PlayerEvent::PlayRequested(vec![
            "h1.mp4".into(),
            "h2.mp4".into(),
        ]));
        assert_eq!(effects, vec![Load("h1.mp4".into())]);
        assert!(player.clip_active());

        let effects = player.handle(PlayerEvent::FileLoaded);
        assert_eq!(
            effects,
            vec![SeekStart, SetPause(false), StartCapture("h1.mp4".into())]
        );
        assert!(player.is_capturing());

        let effects = player.handle(PlayerEvent::CaptureFinished);
        assert_eq!(effects, vec![SetPause(true), Load("h2.mp4".into())]);

        player.handle(PlayerEvent::FileLoaded);
        // Clip ends before the capture window closes.
        assert_eq!(player.handle(PlayerEvent::EndOfFile), vec![StopCapture]);
        let effects = player.handle(PlayerEvent::CaptureFinished);
        assert_eq!(effects, vec![SetPause(true), Load("s0".into())]);
        assert_eq!(player.index(), 0);
        assert!(!player.clip_active());
    }

    #[test]
    fn test_requests_queue_behind_active_clip() {
        let mut player = ready_player(10);
        player.handle(PlayerEvent::PlayRequested(vec!["a.mp4".into()]));
        assert!(player
            .handle(PlayerEvent::PlayRequested(vec!["b.mp4".into()]))
            .is_empty());
        assert_eq!(player.queued().cloned().collect::<Vec<_>>(), vec!["b.mp4"]);
        assert!(player.handle(PlayerEvent::PlayRequested(Vec::new())).is_empty());
    }

    #[test]
    fn test_requested_clip_without_recorder() {
        let mut player = Player::new(&PlaybackConfig::default(), false);
        player.handle(PlayerEvent::CatalogLoaded(catalog(3)));
        player.handle(PlayerEvent::PlayRequested(vec!["c.mp4".into()]));
        let effects = player.handle(PlayerEvent::FileLoaded);
        assert_eq!(effects, vec![SeekStart, SetPause(false)]);
        let effects = player.handle(PlayerEvent::EndOfFile);
        assert_eq!(effects, vec![Load("s0".into())]);
    }

    #[test]
    fn test_growth_landing_while_playing_does_not_jump() {
        let mut player = ready_player(10);
        for _ in 0..4 {
            player.handle(PlayerEvent::EndOfFile);
            player.handle(PlayerEvent::FileLoaded);
        }
        let ticket = take_growth(&player.handle(PlayerEvent::EndOfFile)).unwrap();
        player.handle(PlayerEvent::PlayRequested(vec!["x.mp4".into()]));
        assert!(player.handle(PlayerEvent::GrowthDue(ticket)).is_empty());
        assert_eq!(player.buffer().len(), 10);
        assert_eq!(player.index(), 4);
    }
}
