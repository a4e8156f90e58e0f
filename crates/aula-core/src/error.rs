//! Error types for Aula Core

use thiserror::Error;

/// Result type alias for player operations
pub type Result<T> = std::result::Result<T, Error>;

/// Player error types
#[derive(Error, Debug)]
pub enum Error {
    // Initialization errors
    #[error("No render target attached to the player")]
    MissingRenderTarget,

    #[error("Source URL is empty")]
    EmptySource,

    // Manifest errors
    #[error("Failed to fetch manifest: {0}")]
    ManifestFetch(String),

    #[error("Failed to decode manifest response: {0}")]
    ManifestDecode(String),

    // Engine errors
    #[error("No streaming engine instance")]
    EngineUnavailable,

    #[error("Quality switch to representation {index} failed: {reason}")]
    QualitySwitch { index: i32, reason: String },

    // Platform errors
    #[error("Platform call failed: {0}")]
    PlatformCall(String),

    // Network errors
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl Error {
    /// Returns true if the player remains usable after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::ManifestFetch(_)
                | Error::ManifestDecode(_)
                | Error::QualitySwitch { .. }
                | Error::PlatformCall(_)
                | Error::Network(_)
        )
    }

    /// Returns the error code used in structured logs and error events
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::MissingRenderTarget => "MISSING_RENDER_TARGET",
            Error::EmptySource => "EMPTY_SOURCE",
            Error::ManifestFetch(_) => "MANIFEST_FETCH",
            Error::ManifestDecode(_) => "MANIFEST_DECODE",
            Error::EngineUnavailable => "ENGINE_UNAVAILABLE",
            Error::QualitySwitch { .. } => "QUALITY_SWITCH",
            Error::PlatformCall(_) => "PLATFORM_CALL",
            Error::Network(_) => "NETWORK",
        }
    }
}
