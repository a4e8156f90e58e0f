//! Core types for the Aula player

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// MIME type handed to the engine for proxied DASH manifests
pub const DASH_MIME: &str = "application/dash+xml";

/// Selection index meaning "let the engine pick"
pub const AUTO_QUALITY_INDEX: i32 = -1;

/// Label shown while no explicit quality is selected
pub const AUTO_QUALITY_LABEL: &str = "automatic";

/// Unique identifier for a player instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Playable source handed to the streaming engine.
///
/// The URI points at a temporary blob resource holding the manifest document;
/// each descriptor is consumed exactly once per source change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub uri: String,
    pub mime_type: String,
}

impl SourceDescriptor {
    pub fn new(uri: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Descriptor for a proxied DASH manifest
    pub fn dash(uri: impl Into<String>) -> Self {
        Self::new(uri, DASH_MIME)
    }
}

/// One encoded format advertised by the manifest proxy.
///
/// `id` correlates with the engine representation id (a numeric string on the
/// engine side).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatItem {
    pub id: u32,
    pub label: String,
    #[serde(default)]
    pub display_label: Option<String>,
    #[serde(default)]
    pub codec: Option<String>,
}

/// One entry of the user-facing quality menu.
///
/// `index` is the engine representation index for resolvable entries, or the
/// raw format id for login-gated placeholders that cannot be resolved yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quality {
    pub index: i32,
    pub label: String,
    pub id: u32,
    pub needs_login: bool,
}

/// Current quality selection of a player.
///
/// `index == AUTO_QUALITY_INDEX` means adaptive switching is in charge;
/// `auto_label` then carries the label of whichever format the engine is
/// currently rendering, shown beneath the generic automatic indicator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualitySelection {
    pub index: i32,
    pub label: String,
    pub auto_label: Option<String>,
}

impl QualitySelection {
    pub fn is_auto(&self) -> bool {
        self.index == AUTO_QUALITY_INDEX
    }

    /// Drop any manual pick and fall back to automatic mode
    pub fn reset_to_auto(&mut self) {
        self.index = AUTO_QUALITY_INDEX;
        self.label = AUTO_QUALITY_LABEL.to_string();
        self.auto_label = None;
    }
}

impl Default for QualitySelection {
    fn default() -> Self {
        Self {
            index: AUTO_QUALITY_INDEX,
            label: AUTO_QUALITY_LABEL.to_string(),
            auto_label: None,
        }
    }
}

/// Subtitle line as delivered by the host, timestamps still unparsed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSubtitle {
    pub start: String,
    pub end: String,
    pub text: String,
}

/// Subtitle line with timestamps resolved to seconds; immutable after derivation
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleLine {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl SubtitleLine {
    /// Check if the line should be displayed at the given time.
    /// Both interval ends are inclusive.
    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && time <= self.end
    }
}

/// Playback progress snapshot, recomputed on every engine time-update tick
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PlaybackProgress {
    pub current_time: f64,
    pub duration: f64,
    pub buffered_fraction: f64,
    pub played_fraction: f64,
}

impl PlaybackProgress {
    /// Build a snapshot from raw engine readings
    pub fn from_engine(current_time: f64, duration: f64, buffered_end: f64) -> Self {
        let (buffered_fraction, played_fraction) = if duration > 0.0 {
            (
                (buffered_end / duration).clamp(0.0, 1.0),
                (current_time / duration).clamp(0.0, 1.0),
            )
        } else {
            (0.0, 0.0)
        };

        Self {
            current_time,
            duration,
            buffered_fraction,
            played_fraction,
        }
    }
}

/// Player state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerState {
    /// Initial state, no source loaded
    Idle,
    /// Manifest fetched, engine attaching
    Loading,
    /// Stream initialized, ready to play
    Ready,
    /// Content is playing
    Playing,
    /// Playback paused
    Paused,
    /// Playback reached the end
    Ended,
    /// Engine reported a fatal error
    Error,
}

impl PlayerState {
    /// Check if transition to target state is valid
    pub fn can_transition_to(&self, target: PlayerState) -> bool {
        use PlayerState::*;
        matches!(
            (self, target),
            // From Idle
            (Idle, Loading) |
            // From Loading
            (Loading, Ready) | (Loading, Error) |
            // From Ready
            (Ready, Playing) | (Ready, Paused) | (Ready, Loading) | (Ready, Error) |
            // From Playing
            (Playing, Paused) | (Playing, Ended) | (Playing, Loading) | (Playing, Error) |
            // From Paused
            (Paused, Playing) | (Paused, Loading) | (Paused, Idle) | (Paused, Error) |
            // From Ended
            (Ended, Playing) | (Ended, Loading) | (Ended, Idle) |
            // From Error
            (Error, Loading) | (Error, Idle)
        )
    }
}

impl std::fmt::Display for PlayerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayerState::Idle => write!(f, "idle"),
            PlayerState::Loading => write!(f, "loading"),
            PlayerState::Ready => write!(f, "ready"),
            PlayerState::Playing => write!(f, "playing"),
            PlayerState::Paused => write!(f, "paused"),
            PlayerState::Ended => write!(f, "ended"),
            PlayerState::Error => write!(f, "error"),
        }
    }
}

/// Lifecycle events broadcast to the host
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// Stream initialized and quality list rebuilt
    Loaded,
    Play,
    Pause,
    Ended,
    Error(String),
    /// The selectable quality menu changed
    QualityListChanged,
    /// Transient status line changed; `None` clears it
    StatusMessage(Option<String>),
}

/// Player configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Start playback as soon as the source attaches
    pub autoplay: bool,
    /// Format ids below this value are login-gated for anonymous viewers
    pub login_format_threshold: u32,
    /// How long a transient status message stays visible (milliseconds)
    pub status_message_ms: u64,
    /// Manifest request timeout in milliseconds
    pub request_timeout_ms: u64,
    /// Adaptive switching default for the audio track
    pub auto_switch_audio: bool,
    /// Adaptive switching default for the video track
    pub auto_switch_video: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            autoplay: false,
            login_format_threshold: 112,
            status_message_ms: 2000,
            request_timeout_ms: 10000,
            auto_switch_audio: true,
            auto_switch_video: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_state_transitions() {
        // Valid transitions
        assert!(PlayerState::Idle.can_transition_to(PlayerState::Loading));
        assert!(PlayerState::Loading.can_transition_to(PlayerState::Ready));
        assert!(PlayerState::Ready.can_transition_to(PlayerState::Playing));
        assert!(PlayerState::Playing.can_transition_to(PlayerState::Paused));
        assert!(PlayerState::Paused.can_transition_to(PlayerState::Playing));
        assert!(PlayerState::Playing.can_transition_to(PlayerState::Loading));

        // Invalid transitions
        assert!(!PlayerState::Idle.can_transition_to(PlayerState::Playing));
        assert!(!PlayerState::Playing.can_transition_to(PlayerState::Idle));
        assert!(!PlayerState::Ended.can_transition_to(PlayerState::Paused));
    }

    #[test]
    fn test_quality_selection_reset() {
        let mut selection = QualitySelection {
            index: 3,
            label: "720p".to_string(),
            auto_label: None,
        };
        assert!(!selection.is_auto());

        selection.reset_to_auto();
        assert!(selection.is_auto());
        assert_eq!(selection.label, AUTO_QUALITY_LABEL);
        assert_eq!(selection.auto_label, None);
    }

    #[test]
    fn test_progress_fractions() {
        let progress = PlaybackProgress::from_engine(30.0, 120.0, 60.0);
        assert_eq!(progress.played_fraction, 0.25);
        assert_eq!(progress.buffered_fraction, 0.5);

        // Unknown duration yields empty fractions
        let progress = PlaybackProgress::from_engine(30.0, 0.0, 60.0);
        assert_eq!(progress.played_fraction, 0.0);
        assert_eq!(progress.buffered_fraction, 0.0);
    }

    #[test]
    fn test_format_item_json() {
        let json = r#"{"id": 112, "label": "720p", "displayLabel": "HD 720p", "codec": "avc1.64001f"}"#;
        let item: FormatItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.id, 112);
        assert_eq!(item.display_label.as_deref(), Some("HD 720p"));

        // Optional fields may be absent entirely
        let json = r#"{"id": 36, "label": "360p"}"#;
        let item: FormatItem = serde_json::from_str(json).unwrap();
        assert!(item.codec.is_none());
        assert!(item.display_label.is_none());
    }
}
