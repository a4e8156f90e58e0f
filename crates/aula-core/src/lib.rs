//! Aula Core - playback library for the Aula course player
//!
//! This crate provides the state management around an external
//! adaptive-streaming engine:
//! - Manifest fetching through the platform's proxy endpoint
//! - Quality-list reconciliation against engine representations,
//!   including login-gated formats
//! - Engine lifecycle, event wiring and imperative playback controls
//! - Subtitle timing and active-line synchronization
//! - Temporary blob resource tracking and release
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                       Aula Core                          │
//! ├──────────────────────────────────────────────────────────┤
//! │                                                          │
//! │  ┌───────────┐   ┌────────────┐   ┌────────────────┐     │
//! │  │ Manifest  │   │  Quality   │   │    Captions    │     │
//! │  │  Fetcher  │   │ Reconciler │   │  Synchronizer  │     │
//! │  └─────┬─────┘   └─────┬──────┘   └───────┬────────┘     │
//! │        │               │                  │              │
//! │        └───────────────┼──────────────────┘              │
//! │                        │                                 │
//! │                 ┌──────┴───────┐                         │
//! │                 │    Player    │                         │
//! │                 │    Adapter   │                         │
//! │                 └──────┬───────┘                         │
//! │                        │                                 │
//! │        ┌───────────────┼──────────────────┐              │
//! │  ┌─────┴─────┐   ┌─────┴──────┐   ┌───────┴────────┐     │
//! │  │ Streaming │   │  Resource  │   │     Event      │     │
//! │  │  Engine   │   │    Slot    │   │      Bus       │     │
//! │  └───────────┘   └────────────┘   └────────────────┘     │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod adapter;
pub mod captions;
pub mod engine;
pub mod error;
pub mod manifest;
pub mod quality;
pub mod resource;
pub mod testing;
pub mod types;

pub use adapter::PlayerAdapter;
pub use captions::{active_line, derive_lines, parse_timestamp};
pub use engine::{EngineEvent, EngineFactory, Representation, StreamingEngine};
pub use error::{Error, Result};
pub use manifest::{HttpManifestApi, ManifestApi, ManifestResponse, ProxyRequest};
pub use quality::{build_quality_menu, resolve_auto_label, LOGIN_FORMAT_THRESHOLD};
pub use resource::{BlobRegistry, MemoryBlobRegistry, ResourceSlot, TempResource};
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the player library with default configuration
pub fn init() {
    tracing::info!(version = VERSION, "Aula Core initialized");
}
