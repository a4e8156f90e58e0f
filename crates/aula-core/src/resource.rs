//! Temporary blob resources
//!
//! The manifest document reaches the engine through a URL-addressable
//! in-memory buffer instead of a second network round trip. A player holds at
//! most one such resource at a time; the holder releases the previous blob
//! whenever a new one is installed and on teardown.

use bytes::Bytes;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use tracing::{debug, warn};
use uuid::Uuid;

/// Registry creating and revoking URL-addressable byte buffers
pub trait BlobRegistry: Send + Sync {
    /// Store `data` and return a URI addressing it
    fn create(&self, data: Bytes, mime_type: &str) -> String;

    /// Revoke a previously created URI; unknown URIs are ignored
    fn revoke(&self, uri: &str);
}

struct BlobEntry {
    data: Bytes,
    mime_type: String,
}

/// In-process blob registry keyed by `blob:aula/<uuid>` URIs
#[derive(Default)]
pub struct MemoryBlobRegistry {
    entries: Mutex<HashMap<String, BlobEntry>>,
}

impl MemoryBlobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (not yet revoked) blobs
    pub fn live_count(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    /// Look up the payload behind a URI
    pub fn get(&self, uri: &str) -> Option<Bytes> {
        self.entries
            .lock()
            .ok()
            .and_then(|e| e.get(uri).map(|entry| entry.data.clone()))
    }

    /// Look up the MIME type behind a URI
    pub fn mime_type(&self, uri: &str) -> Option<String> {
        self.entries
            .lock()
            .ok()
            .and_then(|e| e.get(uri).map(|entry| entry.mime_type.clone()))
    }
}

impl BlobRegistry for MemoryBlobRegistry {
    fn create(&self, data: Bytes, mime_type: &str) -> String {
        let uri = format!("blob:aula/{}", Uuid::new_v4());
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(
                uri.clone(),
                BlobEntry {
                    data,
                    mime_type: mime_type.to_string(),
                },
            );
        }
        debug!(uri = %uri, "Blob created");
        uri
    }

    fn revoke(&self, uri: &str) {
        let removed = self
            .entries
            .lock()
            .map(|mut e| e.remove(uri).is_some())
            .unwrap_or(false);
        if removed {
            debug!(uri = %uri, "Blob revoked");
        } else {
            warn!(uri = %uri, "Revoking unknown blob URI");
        }
    }
}

/// Handle to one temporary blob; released at most once
pub struct TempResource {
    uri: String,
    registry: Arc<dyn BlobRegistry>,
    released: bool,
}

impl TempResource {
    /// Create a blob for `data` and wrap its handle
    pub fn create(registry: Arc<dyn BlobRegistry>, data: Bytes, mime_type: &str) -> Self {
        let uri = registry.create(data, mime_type);
        Self {
            uri,
            registry,
            released: false,
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Revoke the blob; safe to call repeatedly
    pub fn release(&mut self) {
        if !self.released {
            self.registry.revoke(&self.uri);
            self.released = true;
        }
    }
}

impl Drop for TempResource {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for TempResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TempResource")
            .field("uri", &self.uri)
            .field("released", &self.released)
            .finish()
    }
}

/// Single-slot holder for the player's outstanding temporary resource
#[derive(Debug, Default)]
pub struct ResourceSlot {
    current: Option<TempResource>,
}

impl ResourceSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a new resource, releasing the previous holder
    pub fn install(&mut self, resource: TempResource) {
        if let Some(mut previous) = self.current.replace(resource) {
            previous.release();
        }
    }

    /// Release whatever is held; no-op when empty
    pub fn clear(&mut self) {
        if let Some(mut resource) = self.current.take() {
            resource.release();
        }
    }

    /// URI of the held resource, if any
    pub fn uri(&self) -> Option<&str> {
        self.current.as_ref().map(|r| r.uri())
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Arc<MemoryBlobRegistry> {
        Arc::new(MemoryBlobRegistry::new())
    }

    #[test]
    fn test_create_and_revoke() {
        let blobs = registry();
        let uri = blobs.create(Bytes::from_static(b"<MPD/>"), "application/dash+xml");

        assert_eq!(blobs.live_count(), 1);
        assert_eq!(blobs.get(&uri), Some(Bytes::from_static(b"<MPD/>")));
        assert_eq!(
            blobs.mime_type(&uri).as_deref(),
            Some("application/dash+xml")
        );

        blobs.revoke(&uri);
        assert_eq!(blobs.live_count(), 0);
        assert_eq!(blobs.get(&uri), None);
    }

    #[test]
    fn test_release_is_idempotent() {
        let blobs = registry();
        let mut resource = TempResource::create(
            blobs.clone(),
            Bytes::from_static(b"<MPD/>"),
            "application/dash+xml",
        );

        resource.release();
        resource.release();
        assert_eq!(blobs.live_count(), 0);
    }

    #[test]
    fn test_drop_releases() {
        let blobs = registry();
        {
            let _resource = TempResource::create(
                blobs.clone(),
                Bytes::from_static(b"<MPD/>"),
                "application/dash+xml",
            );
            assert_eq!(blobs.live_count(), 1);
        }
        assert_eq!(blobs.live_count(), 0);
    }

    #[test]
    fn test_slot_holds_at_most_one() {
        let blobs = registry();
        let mut slot = ResourceSlot::new();

        slot.install(TempResource::create(
            blobs.clone(),
            Bytes::from_static(b"first"),
            "application/dash+xml",
        ));
        assert_eq!(blobs.live_count(), 1);
        let first_uri = slot.uri().unwrap().to_string();

        slot.install(TempResource::create(
            blobs.clone(),
            Bytes::from_static(b"second"),
            "application/dash+xml",
        ));
        assert_eq!(blobs.live_count(), 1);
        assert_ne!(slot.uri().unwrap(), first_uri);

        slot.clear();
        assert_eq!(blobs.live_count(), 0);
        assert!(slot.is_empty());

        // Clearing an empty slot is a no-op
        slot.clear();
    }
}
