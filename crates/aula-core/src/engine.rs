//! Streaming engine seam
//!
//! The adaptive-streaming engine is external to this crate: the player only
//! ever references engine representations by id/index and drives the engine
//! through this trait. Implementations wrap whatever engine the platform
//! ships (a browser MSE engine, a native pipeline) and forward its events
//! through a broadcast channel.

use crate::{types::SourceDescriptor, Result};
use serde::Serialize;
use tokio::sync::broadcast;

/// One selectable encoding of a media track, owned by the engine.
///
/// `id` is the engine-side identifier; for proxied content it is the numeric
/// format id rendered as a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Representation {
    pub index: usize,
    pub id: String,
    pub bandwidth: u64,
    pub height: u32,
}

impl Representation {
    /// Engine ids are numeric strings for proxied content
    pub fn numeric_id(&self) -> Option<u32> {
        self.id.parse().ok()
    }
}

/// Events emitted by the engine for the lifetime of an instance
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Fatal engine error, playback cannot continue
    Error(String),
    /// Current content played to the end
    PlaybackEnded,
    /// A new stream finished initializing; representations are available
    StreamInitialized,
    /// The rendered representation changed (adaptive or manual)
    QualityChangeRendered { new_index: usize },
    /// Playback position advanced
    TimeUpdate { current_time: f64 },
}

/// Adaptive-streaming engine driven by the player adapter.
///
/// The adapter is the exclusive owner of an engine instance; nothing else
/// holds a reference to it. Methods that hit asynchronous platform surfaces
/// (fullscreen, picture-in-picture, play) report failure through `Result`
/// and leave recovery to the caller.
pub trait StreamingEngine: Send + Sync {
    /// Attach a new source, replacing whatever was playing.
    ///
    /// Returns `Error::MissingRenderTarget` when the engine has no render
    /// target bound.
    fn attach(&mut self, source: &SourceDescriptor, autoplay: bool) -> Result<()>;

    /// Representations of the currently initialized stream
    fn representations(&self) -> Vec<Representation>;

    /// Representation currently being rendered, if any
    fn current_representation(&self) -> Option<Representation>;

    /// Enable or disable adaptive bitrate switching per track kind
    fn set_auto_switching(&mut self, audio: bool, video: bool);

    /// Request a switch to the representation at `index`
    fn select_representation(&mut self, index: usize) -> Result<()>;

    /// Start or resume playback; may be rejected by platform policy
    fn play(&mut self) -> Result<()>;

    fn pause(&mut self);

    /// Seek to an absolute position in seconds
    fn seek(&mut self, seconds: f64);

    fn set_volume(&mut self, volume: f64);

    fn set_muted(&mut self, muted: bool);

    fn set_rate(&mut self, rate: f64);

    fn current_time(&self) -> f64;

    /// Total duration in seconds, 0 when unknown
    fn duration(&self) -> f64;

    /// End of the buffered range in seconds
    fn buffered_end(&self) -> f64;

    fn set_fullscreen(&mut self, on: bool) -> Result<()>;

    /// Whether the platform offers picture-in-picture at all
    fn supports_picture_in_picture(&self) -> bool {
        false
    }

    fn set_picture_in_picture(&mut self, on: bool) -> Result<()>;

    /// Subscribe to engine events
    fn subscribe(&self) -> broadcast::Receiver<EngineEvent>;

    /// Dispose internal resources; the instance is unusable afterwards
    fn reset(&mut self);
}

/// Factory producing engine instances bound to the player's render target
pub type EngineFactory = Box<dyn Fn() -> Box<dyn StreamingEngine> + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_id() {
        let rep = Representation {
            index: 2,
            id: "5".to_string(),
            bandwidth: 2_800_000,
            height: 720,
        };
        assert_eq!(rep.numeric_id(), Some(5));

        let rep = Representation {
            index: 0,
            id: "video-main".to_string(),
            bandwidth: 0,
            height: 0,
        };
        assert_eq!(rep.numeric_id(), None);
    }
}
