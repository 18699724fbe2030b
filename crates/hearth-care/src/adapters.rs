//! In-process implementations of the collaborator ports.
//!
//! Used by tests and by the single-node server. Artifacts are
//! content-addressed: the reference is `sha256:<hex>` of the bytes, so
//! uploading the same signature twice yields the same reference.

use std::collections::HashMap;

use hearth_core::{ArtifactRef, BookingId, ChildId, ParentId};
use parking_lot::{Mutex, RwLock};
use sha2::{Digest, Sha256};

use crate::events::DomainEvent;
use crate::ports::{
    ArtifactKind, ArtifactStore, ChildDirectory, NotificationDispatcher, PortError,
    RecordRepository,
};
use crate::registry::CareFile;

/// Children keyed by id, each owned by one parent.
#[derive(Debug, Default)]
pub struct InMemoryChildDirectory {
    children: RwLock<HashMap<ChildId, ParentId>>,
}

impl InMemoryChildDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new child for `parent` and return its id.
    pub fn register(&self, parent: ParentId) -> ChildId {
        let child = ChildId::new();
        self.children.write().insert(child, parent);
        child
    }
}

impl ChildDirectory for InMemoryChildDirectory {
    fn is_registered(&self, parent: ParentId, child: ChildId) -> Result<bool, PortError> {
        Ok(self.children.read().get(&child) == Some(&parent))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    pub kind: ArtifactKind,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
    blobs: RwLock<HashMap<String, StoredArtifact>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, reference: &ArtifactRef) -> Option<StoredArtifact> {
        self.blobs.read().get(reference.as_str()).cloned()
    }

    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}

fn content_address(bytes: &[u8]) -> String {
    let hash = Sha256::digest(bytes);
    let hex: String = hash.iter().map(|b| format!("{b:02x}")).collect();
    format!("sha256:{hex}")
}

impl ArtifactStore for InMemoryArtifactStore {
    fn put(
        &self,
        kind: ArtifactKind,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<ArtifactRef, PortError> {
        if bytes.is_empty() {
            return Err(PortError::Rejected(format!("empty {} upload", kind.as_str())));
        }
        let key = content_address(bytes);
        let reference = ArtifactRef::new(key.clone()).map_err(|e| PortError::Rejected(e.to_string()))?;
        self.blobs.write().entry(key).or_insert_with(|| StoredArtifact {
            kind,
            content_type: content_type.to_string(),
            bytes: bytes.to_vec(),
        });
        Ok(reference)
    }
}

/// Keeps the highest-versioned snapshot per booking.
#[derive(Debug, Default)]
pub struct InMemoryRecordRepository {
    records: RwLock<HashMap<BookingId, (u64, CareFile)>>,
}

impl InMemoryRecordRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, booking_id: BookingId) -> Option<(u64, CareFile)> {
        self.records.read().get(&booking_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl RecordRepository for InMemoryRecordRepository {
    fn save(&self, version: u64, file: &CareFile) -> Result<(), PortError> {
        let mut records = self.records.write();
        match records.get(&file.booking.id) {
            Some((stored, _)) if *stored >= version => {}
            _ => {
                records.insert(file.booking.id, (version, file.clone()));
            }
        }
        Ok(())
    }
}

/// Captures dispatched events in order.
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    events: Mutex<Vec<DomainEvent>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(DomainEvent::name).collect()
    }
}

impl NotificationDispatcher for RecordingDispatcher {
    fn dispatch(&self, event: &DomainEvent) -> Result<(), PortError> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

/// Emits each event as a structured log line. Stand-in for a push gateway.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDispatcher;

impl NotificationDispatcher for LogDispatcher {
    fn dispatch(&self, event: &DomainEvent) -> Result<(), PortError> {
        tracing::info!(
            event = event.name(),
            event_id = %event.id,
            booking_id = %event.booking_id,
            actor = %event.actor.as_str(),
            "notification dispatched"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifacts_are_content_addressed() {
        let store = InMemoryArtifactStore::new();
        let a = store.put(ArtifactKind::Signature, "image/png", b"sig").unwrap();
        let b = store.put(ArtifactKind::Signature, "image/png", b"sig").unwrap();
        assert_eq!(a, b);
        assert!(a.as_str().starts_with("sha256:"));
        assert_eq!(a.as_str().len(), "sha256:".len() + 64);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&a).unwrap().bytes, b"sig");
    }

    #[test]
    fn empty_upload_rejected() {
        let store = InMemoryArtifactStore::new();
        let err = store.put(ArtifactKind::Photo, "image/jpeg", b"").unwrap_err();
        assert!(!err.is_transient());
    }

    #[test]
    fn child_directory_checks_ownership() {
        let dir = InMemoryChildDirectory::new();
        let parent = ParentId::new();
        let child = dir.register(parent);
        assert!(dir.is_registered(parent, child).unwrap());
        assert!(!dir.is_registered(ParentId::new(), child).unwrap());
        assert!(!dir.is_registered(parent, ChildId::new()).unwrap());
    }
}
