use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::player::{Player, PlayerState};
use crate::protocol::{MatchOverview, SegmentId};
use crate::session::{elapsed_time, ChatMessage, Conversation};
use crate::voice::VoiceInput;

/// Health of the mpv process as observed by the core.
///
/// Transitions:
///   Absent -> Starting -> Running -> Dead -> Starting ...
#[derive(Debug, Clone, PartialEq, Default)]
pub enum MpvHealth {
    #[default]
    Absent,
    Starting,
    Running,
    Dead,
}

impl MpvHealth {
    /// Short label for the status bar.
    pub fn badge_label(&self) -> Option<&str> {
        match self {
            MpvHealth::Absent => None,
            MpvHealth::Starting => Some("INIT"),
            MpvHealth::Running => None,
            MpvHealth::Dead => Some("DEAD"),
        }
    }
}

/// Why typed chat (and starting a voice question) is refused right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatLock {
    WarmingUp,
    Answering,
    Clip,
}

impl ChatLock {
    /// Warm-up wins over a pending answer, which wins over a clip.
    pub fn check(warming_up: bool, typing: bool, clip: bool) -> Option<Self> {
        if warming_up {
            Some(ChatLock::WarmingUp)
        } else if typing {
            Some(ChatLock::Answering)
        } else if clip {
            Some(ChatLock::Clip)
        } else {
            None
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            ChatLock::WarmingUp => "the player warms up",
            ChatLock::Answering => "the agent answers",
            ChatLock::Clip => "the clip plays",
        }
    }
}

/// Everything the UI renders.  `rev` increments on every change.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub rev: u64,
    pub catalog_len: usize,
    pub window: Vec<SegmentId>,
    pub index: usize,
    /// Game clock sent with questions; follows the current index.
    pub elapsed_secs: u64,
    pub active_segment: Option<SegmentId>,
    /// Requested clip loaded or waiting.
    pub clip_active: bool,
    pub queued: Vec<SegmentId>,
    pub player_state: PlayerState,
    pub is_playing: bool,
    pub is_theater: bool,
    pub is_buffering: bool,
    pub is_capturing: bool,
    pub messages: Vec<ChatMessage>,
    /// Most recent agent reply with text.
    pub last_answer: Option<String>,
    pub is_typing: bool,
    pub voice_available: bool,
    pub voice_recording: bool,
    pub overview: Option<MatchOverview>,
    /// Set when the catalog could not be fetched.
    pub catalog_error: Option<String>,
    pub mpv_health: MpvHealth,
    pub time_pos_secs: Option<f64>,
    pub duration_secs: Option<f64>,
    pub volume: f32,
}

impl SessionState {
    pub fn current_segment(&self) -> Option<&SegmentId> {
        self.window.get(self.index)
    }

    pub fn chat_lock(&self) -> Option<ChatLock> {
        ChatLock::check(
            self.is_buffering,
            self.is_typing,
            self.clip_active || self.is_capturing,
        )
    }

    pub fn input_locked(&self) -> bool {
        self.chat_lock().is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistentState {
    pub volume: f32,
    #[serde(default)]
    pub theater: bool,
}

impl Default for PersistentState {
    fn default() -> Self {
        Self {
            volume: 0.8,
            theater: false,
        }
    }
}

pub struct StateManager {
    state: Arc<RwLock<SessionState>>,
    state_file: PathBuf,
}

impl StateManager {
    pub fn new(state_file: PathBuf) -> Self {
        let persistent = Self::load_persistent(&state_file);

        let state = SessionState {
            rev: 1,
            volume: persistent.volume,
            is_theater: persistent.theater,
            is_buffering: true,
            ..SessionState::default()
        };

        Self {
            state: Arc::new(RwLock::new(state)),
            state_file,
        }
    }

    pub fn arc(&self) -> Arc<RwLock<SessionState>> {
        Arc::clone(&self.state)
    }

    pub async fn get_state(&self) -> SessionState {
        self.state.read().await.clone()
    }

    pub async fn set_player(&self, player: &Player) -> anyhow::Result<()> {
        let theater_changed = {
            let mut state = self.state.write().await;
            let theater_changed = state.is_theater != player.is_theater();
            state.catalog_len = player.buffer().catalog_len();
            state.window = player.buffer().window().to_vec();
            state.index = player.index();
            state.elapsed_secs = elapsed_time(player.index());
            state.active_segment = player.active_segment().cloned();
            state.clip_active = player.clip_active();
            state.queued = player.queued().cloned().collect();
            state.player_state = player.state();
            state.is_playing = player.is_playing();
            state.is_theater = player.is_theater();
            state.is_buffering = player.is_warming_up();
            state.is_capturing = player.is_capturing();
            state.rev += 1;
            theater_changed
        };
        if theater_changed {
            self.save().await?;
        }
        Ok(())
    }

    pub async fn set_conversation(&self, conversation: &Conversation) {
        let mut state = self.state.write().await;
        state.messages = conversation.messages().to_vec();
        state.last_answer = conversation.last_answer().map(str::to_string);
        state.is_typing = conversation.is_typing();
        state.rev += 1;
    }

    pub async fn set_voice(&self, voice: &VoiceInput) {
        let mut state = self.state.write().await;
        state.voice_available = voice.is_available();
        state.voice_recording = voice.is_recording();
        state.rev += 1;
    }

    pub async fn set_overview(&self, overview: Option<MatchOverview>) {
        let mut state = self.state.write().await;
        state.overview = overview;
        state.rev += 1;
    }

    pub async fn set_catalog_error(&self, error: Option<String>) {
        let mut state = self.state.write().await;
        state.catalog_error = error;
        state.rev += 1;
    }

    pub async fn set_mpv_health(&self, health: MpvHealth) {
        let mut state = self.state.write().await;
        state.mpv_health = health;
        state.rev += 1;
    }

    pub async fn set_timeline(&self, time_pos_secs: Option<f64>, duration_secs: Option<f64>) {
        let mut state = self.state.write().await;
        state.time_pos_secs = time_pos_secs;
        state.duration_secs = duration_secs;
        state.rev += 1;
    }

    pub async fn set_volume(&self, volume: f32) -> anyhow::Result<()> {
        {
            let mut state = self.state.write().await;
            state.volume = volume.clamp(0.0, 1.0);
            state.rev += 1;
        }
        self.save().await
    }

    async fn save(&self) -> anyhow::Result<()> {
        let state = self.state.read().await;
        let persistent = PersistentState {
            volume: state.volume,
            theater: state.is_theater,
        };

        if let Some(parent) = self.state_file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(&persistent)?;
        tokio::fs::write(&self.state_file, json).await?;
        Ok(())
    }

    fn load_persistent(state_file: &PathBuf) -> PersistentState {
        if let Ok(content) = std::fs::read_to_string(state_file) {
            if let Ok(persistent) = serde_json::from_str::<PersistentState>(&content) {
                return persistent;
            }
        }
        PersistentState::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlaybackConfig;
    use crate::player::PlayerEvent;

    #[tokio::test]
    async fn test_player_snapshot_and_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let manager = StateManager::new(path.clone());
        let rev = manager.get_state().await.rev;

        let mut player = Player::new(&PlaybackConfig::default(), true);
        player.handle(PlayerEvent::CatalogLoaded(
            (0..8).map(|i| format!("s{}", i)).collect(),
        ));
        player.handle(PlayerEvent::WarmupElapsed);
        player.handle(PlayerEvent::ToggleTheater);
        manager.set_player(&player).await.unwrap();

        let state = manager.get_state().await;
        assert!(state.rev > rev);
        assert_eq!(state.catalog_len, 8);
        assert_eq!(state.window.len(), 5);
        assert_eq!(state.current_segment().map(String::as_str), Some("s0"));
        assert!(state.is_theater);
        assert!(!state.is_buffering);

        manager.set_volume(0.4).await.unwrap();
        let reloaded = StateManager::new(path);
        let state = reloaded.get_state().await;
        assert!(state.is_theater);
        assert!((state.volume - 0.4).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_input_lock_follows_clips() {
        let dir = tempfile::tempdir().unwrap();
        let manager = StateManager::new(dir.path().join("state.json"));
        let mut player = Player::new(&PlaybackConfig::default(), true);
        player.handle(PlayerEvent::CatalogLoaded(vec!["s0".into()]));
        player.handle(PlayerEvent::WarmupElapsed);
        manager.set_player(&player).await.unwrap();
        assert!(!manager.get_state().await.input_locked());

        player.handle(PlayerEvent::PlayRequested(vec!["c.mp4".into()]));
        manager.set_player(&player).await.unwrap();
        assert_eq!(manager.get_state().await.chat_lock(), Some(ChatLock::Clip));
    }

    #[tokio::test]
    async fn test_input_lock_during_warmup_and_pending_answer() {
        let dir = tempfile::tempdir().unwrap();
        let manager = StateManager::new(dir.path().join("state.json"));
        let mut player = Player::new(&PlaybackConfig::default(), true);
        player.handle(PlayerEvent::CatalogLoaded(vec!["s0".into()]));
        manager.set_player(&player).await.unwrap();
        assert_eq!(manager.get_state().await.chat_lock(), Some(ChatLock::WarmingUp));

        player.handle(PlayerEvent::WarmupElapsed);
        manager.set_player(&player).await.unwrap();
        let mut conversation = Conversation::new();
        conversation.begin_dispatch("Who is pitching?", 0, Some("s0")).unwrap();
        manager.set_conversation(&conversation).await;
        let state = manager.get_state().await;
        assert!(state.is_typing);
        assert_eq!(state.chat_lock(), Some(ChatLock::Answering));
        assert!(state.input_locked());
    }

    #[tokio::test]
    async fn test_elapsed_time_follows_index() {
        let dir = tempfile::tempdir().unwrap();
        let manager = StateManager::new(dir.path().join("state.json"));
        let mut player = Player::new(&PlaybackConfig::default(), true);
        player.handle(PlayerEvent::CatalogLoaded(
            (0..8).map(|i| format!("s{}", i)).collect(),
        ));
        player.handle(PlayerEvent::WarmupElapsed);
        player.handle(PlayerEvent::FileLoaded);
        manager.set_player(&player).await.unwrap();
        assert_eq!(manager.get_state().await.elapsed_secs, 90);

        player.handle(PlayerEvent::EndOfFile);
        manager.set_player(&player).await.unwrap();
        assert_eq!(manager.get_state().await.elapsed_secs, 120);
    }

    #[test]
    fn test_chat_lock_precedence() {
        assert_eq!(ChatLock::check(true, true, true), Some(ChatLock::WarmingUp));
        assert_eq!(ChatLock::check(false, true, true), Some(ChatLock::Answering));
        assert_eq!(ChatLock::check(false, false, true), Some(ChatLock::Clip));
        assert_eq!(ChatLock::check(false, false, false), None);
    }
}
