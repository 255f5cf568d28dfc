//! SessionCore: single-owner event loop for all mutable session state.
//!
//! The player state machine, the conversation, the voice adapter, the context
//! tracker and the recorder live here and nowhere else.  Everything that
//! happens elsewhere (key presses, HTTP replies, timers, mpv events, the
//! recognizer process) arrives as a `CoreEvent`.  Background work runs in
//! spawned tasks bound to one `CancellationToken` and posts its result back.
//!
//! After each event the core copies its state into the `StateManager` and
//! broadcasts `BroadcastMessage::StateUpdated`; the TUI re-reads the snapshot.
//!
//! mpv integration is property-observation-driven: `file-loaded` and
//! `end-file` drive the player, time-pos/duration feed the timeline, and a
//! pause toggled from the mpv window is folded back into the player.  The
//! 10-second heartbeat only checks process liveness.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;

use dugout_proto::buffer::GrowthTicket;
use dugout_proto::client::{BackendClient, BackendResult};
use dugout_proto::config::Config;
use dugout_proto::context::{ContextTracker, Generation};
use dugout_proto::player::{Player, PlayerEffect, PlayerEvent, PlayerState};
use dugout_proto::protocol::{AnalyzeResponse, MatchOverview, SegmentId};
use dugout_proto::session::{Conversation, Ticket};
use dugout_proto::state::{ChatLock, MpvHealth, StateManager};
use dugout_proto::voice::{VoiceCommand, VoiceInput, VoiceOutcome, VoiceReaction};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::mpv::{MpvDriver, MpvEvent, MpvHandle, OBS_DURATION, OBS_PAUSE, OBS_TIME_POS};
use crate::recognizer::{Listening, Recognizer};
use crate::recorder::{self, Recorder};
use crate::widgets::toast::Severity;
use crate::BroadcastMessage;

pub const CATALOG_FAILED: &str = "Failed to load video segments.";

// ── commands / events ─────────────────────────────────────────────────────────

/// Requests from the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    TogglePlay,
    Rewind,
    ToggleTheater,
    Volume { value: f32 },
    SendChat { text: String },
    ToggleVoice,
}

/// All inputs into the SessionCore loop.
#[derive(Debug)]
pub enum CoreEvent {
    /// A command from the TUI.
    ClientCommand(Command),
    CatalogLoaded(BackendResult<Vec<SegmentId>>),
    /// Raw mpv unsolicited event (forwarded from reader task).
    MpvEvent(MpvEvent),
    WarmupElapsed,
    GrowthDue(GrowthTicket),
    AnalyzeDone {
        ticket: Ticket,
        outcome: BackendResult<AnalyzeResponse>,
    },
    OverviewDone {
        generation: Generation,
        outcome: BackendResult<MatchOverview>,
    },
    /// The capture window of capture `id` ran out.
    CaptureElapsed { id: Uuid },
    /// A capture was stored; the payload is its media URL.
    ClipSaved(String),
    Voice { id: Uuid, outcome: VoiceOutcome },
    /// Heartbeat: check mpv process liveness.
    HeartbeatTick,
    /// Shutdown requested.
    Shutdown,
}

// ── SessionCore ───────────────────────────────────────────────────────────────

pub struct SessionCore {
    config: Config,
    client: BackendClient,
    state_manager: Arc<StateManager>,
    mpv_driver: MpvDriver,
    /// Live handle to the mpv IO tasks.  `None` when mpv is not yet connected.
    mpv_handle: Option<MpvHandle>,
    /// Channel to post results back into our own event loop.
    event_tx: mpsc::Sender<CoreEvent>,
    broadcast_tx: broadcast::Sender<BroadcastMessage>,
    cancel: CancellationToken,
    player: Player,
    conversation: Conversation,
    voice: VoiceInput,
    recognizer: Option<Recognizer>,
    listening: Option<Listening>,
    context: ContextTracker,
    recorder: Recorder,
    mpv_health: MpvHealth,
    obs_pause: Option<bool>,
    obs_time_pos: Option<f64>,
    obs_duration: Option<f64>,
}

impl SessionCore {
    pub async fn new(
        config: Config,
        state_manager: Arc<StateManager>,
        broadcast_tx: broadcast::Sender<BroadcastMessage>,
        event_tx: mpsc::Sender<CoreEvent>,
    ) -> anyhow::Result<Self> {
        let client = BackendClient::new(&config.backend)?;
        let restored = state_manager.get_state().await;

        let mut mpv_driver = MpvDriver::new();
        mpv_driver.last_volume = restored.volume;

        let recorder = Recorder::new(
            &config.recorder,
            dugout_proto::platform::temp_dir().join("dugout"),
        );
        let mut player = Player::new(&config.playback, recorder.is_enabled());
        player.set_theater(restored.is_theater);

        let recognizer = Recognizer::new(&config.voice);
        let voice = VoiceInput::new(recognizer.is_some());

        Ok(Self {
            config,
            client,
            state_manager,
            mpv_driver,
            mpv_handle: None,
            event_tx,
            broadcast_tx,
            cancel: CancellationToken::new(),
            player,
            conversation: Conversation::new(),
            voice,
            recognizer,
            listening: None,
            context: ContextTracker::new(),
            recorder,
            mpv_health: MpvHealth::Absent,
            obs_pause: None,
            obs_time_pos: None,
            obs_duration: None,
        })
    }

    /// Run the core event loop.  Returns when a `Shutdown` event is received
    /// or the event channel is closed (TUI exited).
    pub async fn run(mut self, mut event_rx: mpsc::Receiver<CoreEvent>) -> anyhow::Result<()> {
        info!("SessionCore: starting event loop");

        // heartbeat for mpv liveness checks
        let heartbeat_tx = self.event_tx.clone();
        let heartbeat_cancel = self.cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = heartbeat_cancel.cancelled() => break,
                    _ = tokio::time::sleep(tokio::time::Duration::from_secs(10)) => {}
                }
                if heartbeat_tx.send(CoreEvent::HeartbeatTick).await.is_err() {
                    break;
                }
            }
        });

        let warmup = self.config.playback.warmup();
        self.spawn_bound(async move {
            tokio::time::sleep(warmup).await;
            CoreEvent::WarmupElapsed
        });

        let client = self.client.clone();
        self.spawn_bound(async move { CoreEvent::CatalogLoaded(client.list_segments().await) });

        self.publish().await;

        loop {
            let evt = event_rx.recv().await;
            match evt {
                None => {
                    info!("SessionCore: event channel closed, shutting down");
                    break;
                }
                Some(CoreEvent::Shutdown) => {
                    info!("SessionCore: shutdown requested");
                    break;
                }
                Some(evt) => {
                    if let Err(e) = self.handle_event(evt).await {
                        error!("SessionCore: event error: {}", e);
                    }
                    self.publish().await;
                }
            }
        }

        self.cleanup().await;
        Ok(())
    }

    async fn handle_event(&mut self, evt: CoreEvent) -> anyhow::Result<()> {
        match evt {
            CoreEvent::ClientCommand(cmd) => {
                info!("SessionCore: command {:?}", cmd);
                self.handle_command(cmd).await?;
            }
            CoreEvent::CatalogLoaded(Ok(catalog)) => {
                info!("SessionCore: catalog has {} segments", catalog.len());
                self.notify(Severity::Info, format!("{} segments available", catalog.len()));
                self.state_manager.set_catalog_error(None).await;
                self.drive(PlayerEvent::CatalogLoaded(catalog)).await;
            }
            CoreEvent::CatalogLoaded(Err(e)) => {
                error!("SessionCore: catalog fetch failed: {}", e);
                self.state_manager
                    .set_catalog_error(Some(CATALOG_FAILED.to_string()))
                    .await;
                self.notify(Severity::Error, CATALOG_FAILED);
            }
            CoreEvent::MpvEvent(evt) => self.handle_mpv_event(evt).await,
            CoreEvent::WarmupElapsed => {
                info!("SessionCore: warm-up over, controls enabled");
                self.drive(PlayerEvent::WarmupElapsed).await;
            }
            CoreEvent::GrowthDue(ticket) => {
                self.drive(PlayerEvent::GrowthDue(ticket)).await;
            }
            CoreEvent::AnalyzeDone { ticket, outcome } => {
                if let Err(e) = &outcome {
                    warn!("SessionCore: analyze failed: {}", e);
                }
                let targets = self.conversation.complete(ticket, outcome);
                if !targets.is_empty() {
                    info!("SessionCore: answer references {:?}", targets);
                    self.drive(PlayerEvent::PlayRequested(targets)).await;
                }
            }
            CoreEvent::OverviewDone {
                generation,
                outcome,
            } => {
                if let Err(e) = &outcome {
                    warn!("SessionCore: match overview failed: {}", e);
                }
                if self.context.accept(generation, outcome) {
                    self.state_manager
                        .set_overview(self.context.overview().cloned())
                        .await;
                }
            }
            CoreEvent::CaptureElapsed { id } => {
                if self.end_capture(Some(id)).await {
                    self.drive(PlayerEvent::CaptureFinished).await;
                }
            }
            CoreEvent::ClipSaved(url) => {
                info!("SessionCore: clip available at {}", url);
                self.notify(Severity::Success, "clip saved");
                self.conversation.attach_clip(url);
            }
            CoreEvent::Voice { id, outcome } => self.handle_voice(id, outcome).await,
            CoreEvent::HeartbeatTick => {
                if self.mpv_handle.is_some() && !self.mpv_driver.process_alive() {
                    warn!("SessionCore: heartbeat: mpv process died");
                    self.mpv_handle = None;
                    self.set_mpv_health(MpvHealth::Dead).await;
                    self.reset_observed_state().await;
                }
            }
            CoreEvent::Shutdown => {}
        }
        Ok(())
    }

    // ── commands ──────────────────────────────────────────────────────────────

    async fn handle_command(&mut self, cmd: Command) -> anyhow::Result<()> {
        match cmd {
            Command::TogglePlay => self.drive(PlayerEvent::TogglePlay).await,
            Command::Rewind => self.drive(PlayerEvent::Rewind).await,
            Command::ToggleTheater => {
                let before = self.player.is_theater();
                self.drive(PlayerEvent::ToggleTheater).await;
                let after = self.player.is_theater();
                if before != after {
                    if let Some(handle) = self.mpv_handle.as_ref() {
                        handle.set_fullscreen(after).await?;
                    }
                }
            }
            Command::Volume { value } => self.set_volume(value).await?,
            Command::SendChat { text } => {
                if let Some(lock) = self.chat_lock() {
                    debug!("SessionCore: chat locked ({:?}), dropping {:?}", lock, text);
                    return Ok(());
                }
                self.dispatch_chat(&text);
            }
            Command::ToggleVoice => {
                // Stopping is always allowed; starting asks a new question.
                let starting = self.voice.is_available() && !self.voice.is_recording();
                match self.chat_lock().filter(|_| starting) {
                    Some(lock) => self.notify(
                        Severity::Warning,
                        format!("voice is paused while {}", lock.reason()),
                    ),
                    None => self.toggle_voice(),
                }
            }
        }
        Ok(())
    }

    fn chat_lock(&self) -> Option<ChatLock> {
        ChatLock::check(
            self.player.is_warming_up(),
            self.conversation.is_typing(),
            self.player.clip_active() || self.player.is_capturing(),
        )
    }

    fn toggle_voice(&mut self) {
        match self.voice.toggle() {
            VoiceCommand::Start(id) => {
                if let Some(recognizer) = &self.recognizer {
                    let listening = recognizer.start(id, &self.cancel, self.event_tx.clone());
                    if let Some(prev) = self.listening.replace(listening) {
                        prev.stop();
                    }
                }
            }
            VoiceCommand::Stop(id) => {
                if let Some(listening) = self.listening.as_ref().filter(|l| l.id == id) {
                    listening.stop();
                }
            }
            VoiceCommand::Unavailable(notice) => self.notify(Severity::Warning, notice),
        }
    }

    fn dispatch_chat(&mut self, text: &str) {
        let segment = self.player.current_segment().cloned();
        let index = self.player.index();
        let Some(dispatch) = self
            .conversation
            .begin_dispatch(text, index, segment.as_deref())
        else {
            return;
        };
        debug!(
            "SessionCore: analyze ticket={} video={} t={}",
            dispatch.ticket, dispatch.request.video, dispatch.request.current_time
        );
        let client = self.client.clone();
        self.spawn_bound(async move {
            let outcome = client.analyze(&dispatch.request).await;
            CoreEvent::AnalyzeDone {
                ticket: dispatch.ticket,
                outcome,
            }
        });
    }

    async fn handle_voice(&mut self, id: Uuid, outcome: VoiceOutcome) {
        let Some(reaction) = self.voice.on_outcome(id, outcome) else {
            debug!("SessionCore: dropping outcome of stale voice session {}", id);
            return;
        };
        match reaction {
            VoiceReaction::Dispatch(text) => {
                info!("SessionCore: voice transcript {:?}", text);
                self.dispatch_chat(&text);
            }
            VoiceReaction::Notice(notice) => self.notify(Severity::Error, notice),
            VoiceReaction::Reset => {
                if self.listening.as_ref().is_some_and(|l| l.id == id) {
                    self.listening = None;
                }
            }
        }
    }

    async fn set_volume(&mut self, value: f32) -> anyhow::Result<()> {
        let value = value.clamp(0.0, 1.0);
        self.state_manager.set_volume(value).await?;
        self.mpv_driver.last_volume = value;
        if let Some(handle) = self.mpv_handle.as_ref() {
            handle.set_volume(value).await?;
        }
        Ok(())
    }

    // ── player effects ────────────────────────────────────────────────────────

    /// Feed one event to the player and carry out what it asks for.
    async fn drive(&mut self, event: PlayerEvent) {
        let effects = self.player.handle(event);
        let mut queue: VecDeque<PlayerEffect> = effects.into();
        while let Some(effect) = queue.pop_front() {
            debug!("SessionCore: effect {:?}", effect);
            match effect {
                PlayerEffect::Load(segment) => self.load_segment(&segment).await,
                PlayerEffect::SeekStart => {
                    if let Some(handle) = self.mpv_handle.as_ref() {
                        if let Err(e) = handle.seek_to(0.0).await {
                            debug!("SessionCore: seek to start failed: {}", e);
                        }
                    }
                }
                PlayerEffect::SetPause(paused) => {
                    if let Some(handle) = self.mpv_handle.as_ref() {
                        if let Err(e) = handle.set_pause(paused).await {
                            warn!("SessionCore: set pause={} failed: {}", paused, e);
                        }
                    }
                }
                PlayerEffect::SeekRelative(secs) => {
                    if let Some(handle) = self.mpv_handle.as_ref() {
                        if let Err(e) = handle.seek_relative(secs).await {
                            warn!("SessionCore: seek {}s failed: {}", secs, e);
                        }
                    }
                }
                PlayerEffect::ScheduleGrowth(ticket) => {
                    let delay = self.config.playback.growth_delay();
                    info!(
                        "SessionCore: growing buffer by {} in {:?}",
                        ticket.batch.len(),
                        delay
                    );
                    self.spawn_bound(async move {
                        tokio::time::sleep(delay).await;
                        CoreEvent::GrowthDue(ticket)
                    });
                }
                PlayerEffect::IndexChanged(index) => {
                    debug!("SessionCore: index -> {}", index);
                    self.fetch_overview();
                }
                PlayerEffect::StartCapture(segment) => self.start_capture(&segment).await,
                PlayerEffect::StopCapture => {
                    if self.end_capture(None).await {
                        queue.extend(self.player.handle(PlayerEvent::CaptureFinished));
                    }
                }
            }
        }
    }

    async fn load_segment(&mut self, segment: &str) {
        let url = self.client.stream_url(segment);
        let volume = self.mpv_driver.last_volume;
        info!("SessionCore: loading {}", segment);
        match self.ensure_mpv_handle().await {
            Some(handle) => {
                if let Err(e) = handle.load_stream(&url, volume).await {
                    warn!("SessionCore: failed to load '{}': {}", segment, e);
                    self.notify(Severity::Warning, format!("could not load {}", segment));
                }
            }
            None => {
                warn!("SessionCore: no mpv handle available for '{}'", segment);
            }
        }
    }

    fn fetch_overview(&mut self) {
        let current = self.player.current_segment().cloned();
        let (generation, chunk) = self.context.request(current.as_deref());
        let client = self.client.clone();
        self.spawn_bound(async move {
            let outcome = client.match_overview(&chunk).await;
            CoreEvent::OverviewDone {
                generation,
                outcome,
            }
        });
    }

    // ── capture ───────────────────────────────────────────────────────────────

    async fn start_capture(&mut self, segment: &str) {
        // Without a target file the clip still runs its window.
        let (id, path) = self.recorder.begin(segment);
        if let (Some(path), Some(handle)) = (path, self.mpv_handle.as_ref()) {
            if let Err(e) = handle.start_recording(&path).await {
                warn!("SessionCore: stream-record failed: {}", e);
            }
        }
        self.schedule_capture_end(id);
    }

    fn schedule_capture_end(&self, id: Uuid) {
        let window = self.config.recorder.capture_window();
        self.spawn_bound(async move {
            tokio::time::sleep(window).await;
            CoreEvent::CaptureElapsed { id }
        });
    }

    /// Stop recording and hand the file to an upload task.  Returns false
    /// when no capture matched, in which case the player is left alone.
    async fn end_capture(&mut self, id: Option<Uuid>) -> bool {
        if !self.player.is_capturing() {
            return false;
        }
        let recording = self.recorder.is_recording();
        let finished = match (self.recorder.finish(id), id) {
            (Some(finished), _) => Some(finished),
            // The clip ended on its own and nothing was being captured.
            (None, None) => None,
            (None, Some(_)) => return false,
        };
        if recording {
            if let Some(handle) = self.mpv_handle.as_ref() {
                if let Err(e) = handle.stop_recording().await {
                    warn!("SessionCore: stopping stream-record failed: {}", e);
                }
            }
        }

        if let Some(capture) = finished.filter(|c| c.path().is_some()) {
            let client = self.client.clone();
            let tx = self.event_tx.clone();
            let cancel = self.cancel.clone();
            tokio::spawn(async move {
                let segment = capture.segment.clone();
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    res = recorder::upload(&client, capture) => match res {
                        Ok(url) => {
                            let _ = tx.send(CoreEvent::ClipSaved(url)).await;
                        }
                        Err(e) => warn!("SessionCore: capture of {} not saved: {}", segment, e),
                    }
                }
            });
        }
        true
    }

    // ── mpv event handler ─────────────────────────────────────────────────────

    async fn handle_mpv_event(&mut self, evt: MpvEvent) {
        debug!("mpv event: {:?}", evt.raw);

        if let Some((obs_id, data)) = evt.as_property_change() {
            match obs_id {
                OBS_PAUSE => {
                    let val = data.as_bool();
                    if val != self.obs_pause {
                        debug!("mpv: pause → {:?}", val);
                        self.obs_pause = val;
                        self.follow_window_pause(val).await;
                    }
                }
                OBS_TIME_POS => {
                    self.obs_time_pos = if data.is_null() { None } else { data.as_f64() };
                    self.state_manager
                        .set_timeline(self.obs_time_pos, self.obs_duration)
                        .await;
                }
                OBS_DURATION => {
                    let val = if data.is_null() { None } else { data.as_f64() };
                    if val != self.obs_duration {
                        self.obs_duration = val;
                        self.state_manager
                            .set_timeline(self.obs_time_pos, self.obs_duration)
                            .await;
                    }
                }
                _ => {}
            }
            return;
        }

        match evt.event_name() {
            Some("file-loaded") => {
                info!("mpv: file-loaded");
                self.drive(PlayerEvent::FileLoaded).await;
            }
            Some("end-file") => {
                let reason = evt.end_reason().unwrap_or("unknown");
                info!("mpv: end-file reason={}", reason);
                self.obs_time_pos = None;
                self.obs_duration = None;
                self.state_manager.set_timeline(None, None).await;
                match reason {
                    "eof" => self.drive(PlayerEvent::EndOfFile).await,
                    "error" => {
                        if self.player.state() == PlayerState::Loading {
                            warn!("mpv: segment failed to load, skipping");
                            self.notify(Severity::Warning, "segment failed to load");
                            self.drive(PlayerEvent::EndOfFile).await;
                        }
                    }
                    // "stop" is our own loadfile replacing the previous segment
                    _ => {}
                }
            }
            _ => {}
        }
    }

    /// Pause toggled in the mpv window itself.
    async fn follow_window_pause(&mut self, paused: Option<bool>) {
        let out_of_step = match (paused, self.player.state()) {
            (Some(true), PlayerState::Playing) => true,
            (Some(false), PlayerState::Paused) => !self.player.is_warming_up(),
            _ => false,
        };
        if out_of_step {
            debug!("SessionCore: following pause from the mpv window");
            self.drive(PlayerEvent::TogglePlay).await;
        }
    }

    async fn reset_observed_state(&mut self) {
        self.obs_pause = None;
        self.obs_time_pos = None;
        self.obs_duration = None;
        self.state_manager.set_timeline(None, None).await;
    }

    // ── mpv handle management ─────────────────────────────────────────────────

    async fn set_mpv_health(&mut self, health: MpvHealth) {
        if self.mpv_health != health {
            info!(
                "SessionCore: mpv health {:?} → {:?}",
                self.mpv_health, health
            );
            self.mpv_health = health.clone();
            self.state_manager.set_mpv_health(health).await;
        }
    }

    async fn ensure_mpv_handle(&mut self) -> Option<MpvHandle> {
        if self.mpv_handle.is_some() && !self.mpv_driver.process_alive() {
            warn!("SessionCore: mpv process died, dropping handle");
            self.mpv_handle = None;
            self.set_mpv_health(MpvHealth::Dead).await;
            self.reset_observed_state().await;
        }

        if self.mpv_handle.is_none() {
            // One forwarder per connection.
            let (event_tx, event_rx) = mpsc::channel::<MpvEvent>(64);
            let core_tx = self.event_tx.clone();
            tokio::spawn(async move {
                let mut rx = event_rx;
                while let Some(evt) = rx.recv().await {
                    if core_tx.send(CoreEvent::MpvEvent(evt)).await.is_err() {
                        break;
                    }
                }
            });

            self.set_mpv_health(MpvHealth::Starting).await;
            let handle = match self.mpv_driver.spawn_and_connect(event_tx).await {
                Ok(h) => h,
                Err(e) => {
                    warn!("SessionCore: failed to start mpv: {}", e);
                    self.set_mpv_health(MpvHealth::Dead).await;
                    self.notify(Severity::Error, format!("mpv unavailable: {}", e));
                    return None;
                }
            };

            self.set_mpv_health(MpvHealth::Running).await;

            handle.observe_all_properties().await;
            if self.player.is_theater() {
                if let Err(e) = handle.set_fullscreen(true).await {
                    debug!("SessionCore: fullscreen on connect failed: {}", e);
                }
            }
            self.mpv_handle = Some(handle);
        }

        self.mpv_handle.clone()
    }

    // ── helpers ───────────────────────────────────────────────────────────────

    /// Run `fut` in the background and post its event, unless the core is
    /// shutting down first.
    fn spawn_bound<F>(&self, fut: F)
    where
        F: Future<Output = CoreEvent> + Send + 'static,
    {
        let tx = self.event_tx.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                evt = fut => {
                    let _ = tx.send(evt).await;
                }
            }
        });
    }

    fn notify(&self, severity: Severity, text: impl Into<String>) {
        let _ = self
            .broadcast_tx
            .send(BroadcastMessage::Notice(severity, text.into()));
    }

    /// Copy owned state into the published snapshot.
    async fn publish(&mut self) {
        if let Err(e) = self.state_manager.set_player(&self.player).await {
            warn!("SessionCore: failed to persist state: {}", e);
        }
        self.state_manager.set_conversation(&self.conversation).await;
        self.state_manager.set_voice(&self.voice).await;
        let _ = self.broadcast_tx.send(BroadcastMessage::StateUpdated);
    }

    async fn cleanup(&mut self) {
        info!("SessionCore: cleanup, cancelling tasks and killing mpv");
        self.cancel.cancel();
        if let Some(listening) = self.listening.take() {
            listening.stop();
        }
        if let Some(handle) = self.mpv_handle.take() {
            if self.recorder.is_recording() {
                let _ = handle.stop_recording().await;
            }
            let _ = handle.stop().await;
        }
        self.mpv_driver.kill().await;
    }
}
