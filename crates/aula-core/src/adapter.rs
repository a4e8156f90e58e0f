//! Player adapter - owner of the streaming engine instance
//!
//! Coordinates:
//! - Manifest proxy fetching and blob installation
//! - Engine lifecycle (lazy creation, event wiring, teardown)
//! - Quality selection state machine (manual vs. automatic)
//! - Playback progress and subtitle synchronization
//! - Transient status line with self-clearing timer

use crate::{
    captions::{active_line, derive_lines},
    engine::{EngineEvent, EngineFactory, StreamingEngine},
    error::Error,
    manifest::{HttpManifestApi, ManifestApi, ProxyRequest},
    quality::{build_quality_menu, resolve_auto_label},
    resource::{BlobRegistry, ResourceSlot, TempResource},
    types::*,
    Result,
};
use bytes::Bytes;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex as StdMutex,
};
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

/// Mutable player state, mutated only on discrete callback invocations
struct AdapterState {
    player_state: PlayerState,
    logged_in: bool,
    source_url: Option<String>,
    formats: Vec<FormatItem>,
    qualities: Vec<Quality>,
    selection: QualitySelection,
    progress: PlaybackProgress,
    subtitles: Vec<SubtitleLine>,
    active_subtitle: String,
    status_message: Option<String>,
    last_rendered_index: Option<usize>,
    resources: ResourceSlot,
}

impl Default for AdapterState {
    fn default() -> Self {
        Self {
            player_state: PlayerState::Idle,
            logged_in: false,
            source_url: None,
            formats: Vec::new(),
            qualities: Vec::new(),
            selection: QualitySelection::default(),
            progress: PlaybackProgress::default(),
            subtitles: Vec::new(),
            active_subtitle: String::new(),
            status_message: None,
            last_rendered_index: None,
            resources: ResourceSlot::new(),
        }
    }
}

impl AdapterState {
    /// Apply a state transition; invalid transitions are dropped, engine
    /// events may arrive in any order and must never fault the player.
    fn apply_state(&mut self, next: PlayerState) {
        if self.player_state == next {
            return;
        }
        if self.player_state.can_transition_to(next) {
            debug!(from = %self.player_state, to = %next, "State transition");
            self.player_state = next;
        } else {
            debug!(from = %self.player_state, to = %next, "Ignoring invalid state transition");
        }
    }
}

/// State shared between the adapter handle, the event-wiring task and timers
struct Shared {
    config: PlayerConfig,
    state: RwLock<AdapterState>,
    engine: Mutex<Option<Box<dyn StreamingEngine>>>,
    events: broadcast::Sender<PlayerEvent>,
    /// Stamped per manifest fetch; stale completions are discarded
    fetch_generation: AtomicU64,
    /// Stamped per status message; only the matching timer may clear it
    status_generation: AtomicU64,
}

impl Shared {
    fn emit(&self, event: PlayerEvent) {
        let _ = self.events.send(event);
    }

    fn emit_error(&self, err: &Error) {
        error!(code = err.error_code(), error = %err, "Player error");
        self.emit(PlayerEvent::Error(err.to_string()));
    }

    /// Show a transient status line and arm its self-clear timer
    async fn post_status(self: &Arc<Self>, text: String) {
        let generation = self.status_generation.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut state = self.state.write().await;
            state.status_message = Some(text.clone());
        }
        self.emit(PlayerEvent::StatusMessage(Some(text)));

        let shared = Arc::clone(self);
        let visible_for = Duration::from_millis(self.config.status_message_ms);
        tokio::spawn(async move {
            tokio::time::sleep(visible_for).await;
            // A newer message re-armed the line; leave it alone
            if shared.status_generation.load(Ordering::SeqCst) != generation {
                return;
            }
            let cleared = {
                let mut state = shared.state.write().await;
                state.status_message.take().is_some()
            };
            if cleared {
                shared.emit(PlayerEvent::StatusMessage(None));
            }
        });
    }

    /// Drop the status line and invalidate any pending clear timer
    async fn clear_status(&self) {
        self.status_generation.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.write().await;
        state.status_message = None;
    }

    /// Handle one engine event; mutates local state only
    async fn handle_event(self: &Arc<Self>, event: EngineEvent) {
        match event {
            EngineEvent::Error(message) => {
                error!(error = %message, "Engine error");
                {
                    let mut state = self.state.write().await;
                    state.apply_state(PlayerState::Error);
                }
                self.emit(PlayerEvent::Error(message));
            }

            EngineEvent::PlaybackEnded => {
                {
                    let mut state = self.state.write().await;
                    state.apply_state(PlayerState::Ended);
                }
                self.emit(PlayerEvent::Ended);
            }

            EngineEvent::StreamInitialized => {
                let (representations, current) = {
                    let guard = self.engine.lock().await;
                    match guard.as_ref() {
                        Some(engine) => {
                            (engine.representations(), engine.current_representation())
                        }
                        None => (Vec::new(), None),
                    }
                };

                let autoplay = self.config.autoplay;
                {
                    let mut state = self.state.write().await;
                    let menu = build_quality_menu(
                        &state.formats,
                        &representations,
                        state.logged_in,
                        self.config.login_format_threshold,
                    );
                    state.qualities = menu;
                    if state.selection.is_auto() {
                        let auto_label = resolve_auto_label(&state.formats, current.as_ref());
                        state.selection.auto_label = auto_label;
                    }
                    state.apply_state(PlayerState::Ready);
                    if autoplay {
                        state.apply_state(PlayerState::Playing);
                    }
                    info!(
                        representations = representations.len(),
                        qualities = state.qualities.len(),
                        "Stream initialized"
                    );
                }
                self.emit(PlayerEvent::Loaded);
                self.emit(PlayerEvent::QualityListChanged);
                if autoplay {
                    self.emit(PlayerEvent::Play);
                }
            }

            EngineEvent::QualityChangeRendered { new_index } => {
                let current = {
                    let guard = self.engine.lock().await;
                    guard.as_ref().and_then(|e| e.current_representation())
                };

                let mut switched_to: Option<String> = None;
                {
                    let mut state = self.state.write().await;
                    let previous = state.last_rendered_index.replace(new_index);
                    if state.selection.is_auto() {
                        let auto_label = resolve_auto_label(&state.formats, current.as_ref());
                        state.selection.auto_label = auto_label;
                        if previous.is_some() && previous != Some(new_index) {
                            switched_to = state.selection.auto_label.clone();
                        }
                    }
                }
                if let Some(label) = switched_to {
                    self.post_status(format!("switched to {label}")).await;
                }
            }

            EngineEvent::TimeUpdate { current_time } => {
                let (duration, buffered_end) = {
                    let guard = self.engine.lock().await;
                    match guard.as_ref() {
                        Some(engine) => (engine.duration(), engine.buffered_end()),
                        None => (0.0, 0.0),
                    }
                };

                let mut state = self.state.write().await;
                state.progress =
                    PlaybackProgress::from_engine(current_time, duration, buffered_end);
                state.active_subtitle = active_line(&state.subtitles, current_time).to_string();
            }
        }
    }
}

/// Player adapter owning the engine instance and the outstanding blob.
///
/// The engine handle never leaves this adapter: every interaction goes
/// through a named operation, and the event-wiring task mutates shared state
/// only.
pub struct PlayerAdapter {
    id: PlayerId,
    shared: Arc<Shared>,
    api: Arc<dyn ManifestApi>,
    blobs: Arc<dyn BlobRegistry>,
    engine_factory: EngineFactory,
    wiring: StdMutex<Option<JoinHandle<()>>>,
}

impl PlayerAdapter {
    /// Create an adapter with an explicit manifest API (used by tests and
    /// deployments with a custom proxy client)
    pub fn new(
        config: PlayerConfig,
        api: Arc<dyn ManifestApi>,
        blobs: Arc<dyn BlobRegistry>,
        engine_factory: EngineFactory,
    ) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            id: PlayerId::new(),
            shared: Arc::new(Shared {
                config,
                state: RwLock::new(AdapterState::default()),
                engine: Mutex::new(None),
                events,
                fetch_generation: AtomicU64::new(0),
                status_generation: AtomicU64::new(0),
            }),
            api,
            blobs,
            engine_factory,
            wiring: StdMutex::new(None),
        }
    }

    /// Create an adapter talking to the standard HTTP manifest proxy
    pub fn with_proxy(
        config: PlayerConfig,
        proxy_endpoint: Url,
        blobs: Arc<dyn BlobRegistry>,
        engine_factory: EngineFactory,
    ) -> Self {
        let timeout = Duration::from_millis(config.request_timeout_ms);
        let api = Arc::new(HttpManifestApi::new(proxy_endpoint, timeout));
        Self::new(config, api, blobs, engine_factory)
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    /// Subscribe to lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.shared.events.subscribe()
    }

    // -- Snapshots ------------------------------------------------------------

    pub async fn state(&self) -> PlayerState {
        self.shared.state.read().await.player_state
    }

    pub async fn progress(&self) -> PlaybackProgress {
        self.shared.state.read().await.progress
    }

    pub async fn quality_menu(&self) -> Vec<Quality> {
        self.shared.state.read().await.qualities.clone()
    }

    pub async fn selection(&self) -> QualitySelection {
        self.shared.state.read().await.selection.clone()
    }

    pub async fn active_subtitle(&self) -> String {
        self.shared.state.read().await.active_subtitle.clone()
    }

    pub async fn status_message(&self) -> Option<String> {
        self.shared.state.read().await.status_message.clone()
    }

    // -- Configuration --------------------------------------------------------

    /// Replace the subtitle list; timestamps are resolved once here
    pub async fn set_subtitles(&self, raw: &[RawSubtitle]) {
        let lines = derive_lines(raw);
        let mut state = self.shared.state.write().await;
        debug!(lines = lines.len(), "Subtitles replaced");
        state.subtitles = lines;
        state.active_subtitle.clear();
    }

    /// Record the viewer's authentication state and refresh the manifest;
    /// logging in may unlock formats the proxy previously stripped
    #[instrument(skip(self), fields(player_id = %self.id))]
    pub async fn set_logged_in(&self, logged_in: bool) {
        let source_url = {
            let mut state = self.shared.state.write().await;
            state.logged_in = logged_in;
            state.source_url.clone()
        };

        if let Some(url) = source_url {
            info!(logged_in, "Login state changed, refreshing manifest");
            if let Err(e) = self.update_source(&url).await {
                warn!(code = e.error_code(), error = %e, "Manifest refresh after login failed");
            }
        }
    }

    // -- Engine lifecycle -----------------------------------------------------

    /// Create a fresh engine instance, destroying any prior one first.
    /// Idempotent in effect: calling it twice leaves one instance.
    pub async fn initialize(&self) {
        self.destroy_engine().await;
        self.ensure_engine().await;
    }

    async fn ensure_engine(&self) {
        let mut guard = self.shared.engine.lock().await;
        if guard.is_some() {
            return;
        }
        let instance = (self.engine_factory)();
        let receiver = instance.subscribe();
        *guard = Some(instance);
        drop(guard);

        debug!(player_id = %self.id, "Engine instance created");
        self.spawn_wiring(receiver);
    }

    fn spawn_wiring(&self, mut receiver: broadcast::Receiver<EngineEvent>) {
        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => shared.handle_event(event).await,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        if let Ok(mut slot) = self.wiring.lock() {
            if let Some(previous) = slot.replace(handle) {
                previous.abort();
            }
        }
    }

    async fn destroy_engine(&self) {
        if let Ok(mut slot) = self.wiring.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
        let mut guard = self.shared.engine.lock().await;
        if let Some(mut engine) = guard.take() {
            engine.reset();
            debug!(player_id = %self.id, "Engine instance destroyed");
        }
    }

    /// Fetch the manifest for `source_url` and attach it to the engine.
    ///
    /// Fetch failures are logged and leave the current playback untouched. A
    /// response superseded by a newer call is discarded before any blob is
    /// created. The previous blob is released when the new one installs.
    #[instrument(skip(self), fields(player_id = %self.id))]
    pub async fn update_source(&self, source_url: &str) -> Result<()> {
        if source_url.trim().is_empty() {
            let err = Error::EmptySource;
            self.shared.emit_error(&err);
            return Err(err);
        }

        let generation = self.shared.fetch_generation.fetch_add(1, Ordering::SeqCst) + 1;
        {
            // The configured source is an input, recorded up front so a login
            // change during the fetch can re-issue it.
            let mut state = self.shared.state.write().await;
            state.source_url = Some(source_url.to_string());
        }

        let request = ProxyRequest::derive(source_url);
        info!(content_id = %request.content_id, generation, "Fetching manifest");

        let response = match self.api.fetch(&request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(code = e.error_code(), error = %e, "Manifest fetch failed, keeping current source");
                return Ok(());
            }
        };

        if self.shared.fetch_generation.load(Ordering::SeqCst) != generation {
            debug!(generation, "Discarding stale manifest response");
            return Ok(());
        }

        let resource = TempResource::create(
            Arc::clone(&self.blobs),
            Bytes::from(response.manifest.into_bytes()),
            DASH_MIME,
        );
        let descriptor = SourceDescriptor::dash(resource.uri());

        {
            let mut state = self.shared.state.write().await;
            state.resources.install(resource);
            state.formats = response.formats;
            state.selection = QualitySelection::default();
            state.last_rendered_index = None;
            state.apply_state(PlayerState::Loading);
        }

        self.ensure_engine().await;
        let mut guard = self.shared.engine.lock().await;
        let engine = guard.as_mut().ok_or(Error::EngineUnavailable)?;
        engine.set_auto_switching(
            self.shared.config.auto_switch_audio,
            self.shared.config.auto_switch_video,
        );
        if let Err(e) = engine.attach(&descriptor, self.shared.config.autoplay) {
            self.shared.emit_error(&e);
            return Err(e);
        }

        Ok(())
    }

    /// Reset the engine, release the blob and invalidate pending timers and
    /// in-flight fetches. Safe to call with no engine; never panics.
    #[instrument(skip(self), fields(player_id = %self.id))]
    pub async fn shutdown(&self) {
        self.shared.fetch_generation.fetch_add(1, Ordering::SeqCst);
        self.shared.status_generation.fetch_add(1, Ordering::SeqCst);

        self.destroy_engine().await;

        let mut state = self.shared.state.write().await;
        state.resources.clear();
        state.status_message = None;
        // Teardown bypasses transition validation
        state.player_state = PlayerState::Idle;
        info!("Player shut down");
    }

    // -- Playback controls ----------------------------------------------------

    pub async fn play(&self) -> Result<()> {
        {
            let mut guard = self.shared.engine.lock().await;
            let engine = guard.as_mut().ok_or(Error::EngineUnavailable)?;
            engine.play()?;
        }

        let mut state = self.shared.state.write().await;
        state.apply_state(PlayerState::Playing);
        drop(state);
        self.shared.emit(PlayerEvent::Play);
        Ok(())
    }

    pub async fn pause(&self) -> Result<()> {
        {
            let mut guard = self.shared.engine.lock().await;
            let engine = guard.as_mut().ok_or(Error::EngineUnavailable)?;
            engine.pause();
        }

        let mut state = self.shared.state.write().await;
        state.apply_state(PlayerState::Paused);
        drop(state);
        self.shared.emit(PlayerEvent::Pause);
        Ok(())
    }

    /// Seek to a fraction of the total duration
    pub async fn seek(&self, fraction: f64) -> Result<()> {
        let mut guard = self.shared.engine.lock().await;
        let engine = guard.as_mut().ok_or(Error::EngineUnavailable)?;
        let duration = engine.duration();
        if duration > 0.0 {
            engine.seek(fraction.clamp(0.0, 1.0) * duration);
        }
        Ok(())
    }

    pub async fn set_volume(&self, volume: f64) -> Result<()> {
        let mut guard = self.shared.engine.lock().await;
        let engine = guard.as_mut().ok_or(Error::EngineUnavailable)?;
        engine.set_volume(volume.clamp(0.0, 1.0));
        Ok(())
    }

    pub async fn set_muted(&self, muted: bool) -> Result<()> {
        let mut guard = self.shared.engine.lock().await;
        let engine = guard.as_mut().ok_or(Error::EngineUnavailable)?;
        engine.set_muted(muted);
        Ok(())
    }

    pub async fn set_rate(&self, rate: f64) -> Result<()> {
        let mut guard = self.shared.engine.lock().await;
        let engine = guard.as_mut().ok_or(Error::EngineUnavailable)?;
        engine.set_rate(rate);
        Ok(())
    }

    /// Fullscreen transitions degrade to a logged warning on failure
    pub async fn set_fullscreen(&self, on: bool) {
        let mut guard = self.shared.engine.lock().await;
        if let Some(engine) = guard.as_mut() {
            if let Err(e) = engine.set_fullscreen(on) {
                warn!(code = e.error_code(), error = %e, on, "Fullscreen transition failed");
            }
        }
    }

    /// Picture-in-picture is attempted only when the platform offers it;
    /// failures degrade to a logged warning
    pub async fn set_picture_in_picture(&self, on: bool) {
        let mut guard = self.shared.engine.lock().await;
        let Some(engine) = guard.as_mut() else {
            return;
        };
        if !engine.supports_picture_in_picture() {
            warn!("Picture-in-picture not available on this platform");
            return;
        }
        if let Err(e) = engine.set_picture_in_picture(on) {
            warn!(code = e.error_code(), error = %e, on, "Picture-in-picture transition failed");
        }
    }

    // -- Quality selection ----------------------------------------------------

    /// Switch to an explicit quality from the menu.
    ///
    /// A failed engine switch reverts to automatic mode and clears the status
    /// line; it is never surfaced to the host. After a successful switch,
    /// playback resumes if it was active beforehand.
    #[instrument(skip(self), fields(player_id = %self.id))]
    pub async fn select_quality(&self, index: i32) -> Result<()> {
        if index == AUTO_QUALITY_INDEX {
            return self.enter_auto_quality().await;
        }

        let (quality, was_playing) = {
            let state = self.shared.state.read().await;
            (
                state.qualities.iter().find(|q| q.index == index).cloned(),
                state.player_state == PlayerState::Playing,
            )
        };

        let Some(quality) = quality else {
            warn!(index, "Quality index not in the current menu");
            return Ok(());
        };
        if quality.needs_login {
            warn!(format_id = quality.id, "Quality requires login, ignoring selection");
            return Ok(());
        }

        let mut guard = self.shared.engine.lock().await;
        let engine = guard.as_mut().ok_or(Error::EngineUnavailable)?;
        engine.set_auto_switching(false, false);

        match engine.select_representation(index as usize) {
            Err(e) => {
                warn!(code = e.error_code(), error = %e, "Quality switch failed, reverting to automatic");
                engine.set_auto_switching(
                    self.shared.config.auto_switch_audio,
                    self.shared.config.auto_switch_video,
                );
                let current = engine.current_representation();
                drop(guard);

                {
                    let mut state = self.shared.state.write().await;
                    state.selection.reset_to_auto();
                    let auto_label = resolve_auto_label(&state.formats, current.as_ref());
                    state.selection.auto_label = auto_label;
                }
                self.shared.clear_status().await;
                Ok(())
            }
            Ok(()) => {
                info!(index, label = %quality.label, "Quality switched");
                {
                    let mut state = self.shared.state.write().await;
                    state.selection = QualitySelection {
                        index,
                        label: quality.label.clone(),
                        auto_label: None,
                    };
                }
                self.shared.post_status(quality.label.clone()).await;

                if was_playing {
                    if let Err(e) = engine.play() {
                        warn!(code = e.error_code(), error = %e, "Resume after quality switch rejected");
                    }
                }
                Ok(())
            }
        }
    }

    /// Hand quality selection back to the engine's adaptive algorithm
    pub async fn enter_auto_quality(&self) -> Result<()> {
        let current = {
            let mut guard = self.shared.engine.lock().await;
            let engine = guard.as_mut().ok_or(Error::EngineUnavailable)?;
            engine.set_auto_switching(
                self.shared.config.auto_switch_audio,
                self.shared.config.auto_switch_video,
            );
            engine.current_representation()
        };

        let mut state = self.shared.state.write().await;
        state.selection.reset_to_auto();
        let auto_label = resolve_auto_label(&state.formats, current.as_ref());
        state.selection.auto_label = auto_label;
        debug!(auto_label = ?state.selection.auto_label, "Automatic quality mode");
        Ok(())
    }
}

impl Drop for PlayerAdapter {
    fn drop(&mut self) {
        // Stop the wiring task; the state handle it holds must not outlive
        // the adapter, or the blob slot would linger with it.
        if let Ok(mut slot) = self.wiring.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }
}
