//! Test doubles for exercising the player without a real streaming engine
//! or manifest proxy. Used by this crate's own tests and by hosts that want
//! to drive the adapter in headless test setups.

use crate::{
    engine::{EngineEvent, EngineFactory, Representation, StreamingEngine},
    error::Error,
    manifest::{ManifestApi, ManifestResponse, ProxyRequest},
    types::SourceDescriptor,
    Result,
};
use async_trait::async_trait;
use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};
use tokio::sync::broadcast;

// -- Mock engine --------------------------------------------------------------

#[derive(Debug)]
struct MockEngineInner {
    attached: Vec<SourceDescriptor>,
    last_autoplay: bool,
    representations: Vec<Representation>,
    current_index: Option<usize>,
    auto_switching: (bool, bool),
    playing: bool,
    volume: f64,
    muted: bool,
    rate: f64,
    current_time: f64,
    duration: f64,
    buffered_end: f64,
    seeked_to: Option<f64>,
    fullscreen: bool,
    picture_in_picture: bool,
    pip_supported: bool,
    fail_switch: bool,
    fail_play: bool,
    auto_initialize: bool,
    reset_count: u32,
}

impl Default for MockEngineInner {
    fn default() -> Self {
        Self {
            attached: Vec::new(),
            last_autoplay: false,
            representations: Vec::new(),
            current_index: None,
            auto_switching: (true, true),
            playing: false,
            volume: 1.0,
            muted: false,
            rate: 1.0,
            current_time: 0.0,
            duration: 0.0,
            buffered_end: 0.0,
            seeked_to: None,
            fullscreen: false,
            picture_in_picture: false,
            pip_supported: true,
            fail_switch: false,
            fail_play: false,
            auto_initialize: true,
            reset_count: 0,
        }
    }
}

/// Scriptable in-memory engine.
///
/// Clones share one inner state, so a test can keep a handle while the
/// adapter owns another clone through its factory, emit events and inspect
/// what the adapter did.
#[derive(Clone)]
pub struct MockEngine {
    inner: Arc<Mutex<MockEngineInner>>,
    events: broadcast::Sender<EngineEvent>,
}

impl MockEngine {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Mutex::new(MockEngineInner::default())),
            events,
        }
    }

    /// Pre-seed the representations the engine reports after initialization
    pub fn with_representations(self, representations: Vec<Representation>) -> Self {
        self.inner.lock().unwrap().representations = representations;
        self
    }

    /// Engine factory handing the adapter a clone of this engine
    pub fn factory(&self) -> EngineFactory {
        let engine = self.clone();
        Box::new(move || Box::new(engine.clone()))
    }

    /// Emit an engine event as if the underlying stream produced it
    pub fn emit(&self, event: EngineEvent) {
        let _ = self.events.send(event);
    }

    pub fn set_fail_switch(&self, fail: bool) {
        self.inner.lock().unwrap().fail_switch = fail;
    }

    pub fn set_fail_play(&self, fail: bool) {
        self.inner.lock().unwrap().fail_play = fail;
    }

    pub fn set_pip_supported(&self, supported: bool) {
        self.inner.lock().unwrap().pip_supported = supported;
    }

    /// Disable the StreamInitialized event normally fired on attach
    pub fn set_auto_initialize(&self, auto: bool) {
        self.inner.lock().unwrap().auto_initialize = auto;
    }

    pub fn set_duration(&self, duration: f64) {
        self.inner.lock().unwrap().duration = duration;
    }

    pub fn set_buffered_end(&self, buffered_end: f64) {
        self.inner.lock().unwrap().buffered_end = buffered_end;
    }

    pub fn set_current_index(&self, index: Option<usize>) {
        self.inner.lock().unwrap().current_index = index;
    }

    // Inspection helpers

    pub fn attach_count(&self) -> usize {
        self.inner.lock().unwrap().attached.len()
    }

    pub fn last_source(&self) -> Option<SourceDescriptor> {
        self.inner.lock().unwrap().attached.last().cloned()
    }

    pub fn last_autoplay(&self) -> bool {
        self.inner.lock().unwrap().last_autoplay
    }

    pub fn auto_switching(&self) -> (bool, bool) {
        self.inner.lock().unwrap().auto_switching
    }

    pub fn is_playing(&self) -> bool {
        self.inner.lock().unwrap().playing
    }

    pub fn seeked_to(&self) -> Option<f64> {
        self.inner.lock().unwrap().seeked_to
    }

    pub fn current_representation_id(&self) -> Option<String> {
        let inner = self.inner.lock().unwrap();
        inner
            .current_index
            .and_then(|index| inner.representations.get(index).map(|r| r.id.clone()))
    }

    pub fn volume(&self) -> f64 {
        self.inner.lock().unwrap().volume
    }

    pub fn rate(&self) -> f64 {
        self.inner.lock().unwrap().rate
    }

    pub fn is_fullscreen(&self) -> bool {
        self.inner.lock().unwrap().fullscreen
    }

    pub fn is_picture_in_picture(&self) -> bool {
        self.inner.lock().unwrap().picture_in_picture
    }

    pub fn reset_count(&self) -> u32 {
        self.inner.lock().unwrap().reset_count
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamingEngine for MockEngine {
    fn attach(&mut self, source: &SourceDescriptor, autoplay: bool) -> Result<()> {
        let auto_initialize = {
            let mut inner = self.inner.lock().unwrap();
            inner.attached.push(source.clone());
            inner.last_autoplay = autoplay;
            inner.playing = autoplay;
            inner.auto_initialize
        };
        if auto_initialize {
            let _ = self.events.send(EngineEvent::StreamInitialized);
        }
        Ok(())
    }

    fn representations(&self) -> Vec<Representation> {
        self.inner.lock().unwrap().representations.clone()
    }

    fn current_representation(&self) -> Option<Representation> {
        let inner = self.inner.lock().unwrap();
        inner
            .current_index
            .and_then(|index| inner.representations.get(index).cloned())
    }

    fn set_auto_switching(&mut self, audio: bool, video: bool) {
        self.inner.lock().unwrap().auto_switching = (audio, video);
    }

    fn select_representation(&mut self, index: usize) -> Result<()> {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.fail_switch {
                return Err(Error::QualitySwitch {
                    index: index as i32,
                    reason: "mock switch failure".to_string(),
                });
            }
            if index >= inner.representations.len() {
                return Err(Error::QualitySwitch {
                    index: index as i32,
                    reason: "representation index out of range".to_string(),
                });
            }
            inner.current_index = Some(index);
        }
        let _ = self
            .events
            .send(EngineEvent::QualityChangeRendered { new_index: index });
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_play {
            return Err(Error::PlatformCall("mock play rejected".to_string()));
        }
        inner.playing = true;
        Ok(())
    }

    fn pause(&mut self) {
        self.inner.lock().unwrap().playing = false;
    }

    fn seek(&mut self, seconds: f64) {
        let mut inner = self.inner.lock().unwrap();
        inner.seeked_to = Some(seconds);
        inner.current_time = seconds;
    }

    fn set_volume(&mut self, volume: f64) {
        self.inner.lock().unwrap().volume = volume;
    }

    fn set_muted(&mut self, muted: bool) {
        self.inner.lock().unwrap().muted = muted;
    }

    fn set_rate(&mut self, rate: f64) {
        self.inner.lock().unwrap().rate = rate;
    }

    fn current_time(&self) -> f64 {
        self.inner.lock().unwrap().current_time
    }

    fn duration(&self) -> f64 {
        self.inner.lock().unwrap().duration
    }

    fn buffered_end(&self) -> f64 {
        self.inner.lock().unwrap().buffered_end
    }

    fn set_fullscreen(&mut self, on: bool) -> Result<()> {
        self.inner.lock().unwrap().fullscreen = on;
        Ok(())
    }

    fn supports_picture_in_picture(&self) -> bool {
        self.inner.lock().unwrap().pip_supported
    }

    fn set_picture_in_picture(&mut self, on: bool) -> Result<()> {
        self.inner.lock().unwrap().picture_in_picture = on;
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    fn reset(&mut self) {
        let mut inner = self.inner.lock().unwrap();
        inner.reset_count += 1;
        inner.playing = false;
        inner.current_index = None;
    }
}

// -- Manifest API doubles -----------------------------------------------------

/// Manifest API returning the same response for every fetch
pub struct StaticManifestApi {
    response: ManifestResponse,
    calls: AtomicUsize,
}

impl StaticManifestApi {
    pub fn new(response: ManifestResponse) -> Self {
        Self {
            response,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ManifestApi for StaticManifestApi {
    async fn fetch(&self, _request: &ProxyRequest) -> Result<ManifestResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }
}

/// One scripted fetch outcome; `None` resolves to a fetch error
pub struct ScriptedFetch {
    pub delay: Duration,
    pub response: Option<ManifestResponse>,
}

/// Manifest API replaying a script of delayed outcomes, in call order.
/// Fetches beyond the script fail.
pub struct ScriptedManifestApi {
    script: Mutex<VecDeque<ScriptedFetch>>,
    calls: AtomicUsize,
}

impl ScriptedManifestApi {
    pub fn new(script: Vec<ScriptedFetch>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ManifestApi for ScriptedManifestApi {
    async fn fetch(&self, _request: &ProxyRequest) -> Result<ManifestResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.script.lock().unwrap().pop_front();
        match step {
            Some(step) => {
                tokio::time::sleep(step.delay).await;
                step.response
                    .ok_or_else(|| Error::ManifestFetch("scripted failure".to_string()))
            }
            None => Err(Error::ManifestFetch("script exhausted".to_string())),
        }
    }
}
