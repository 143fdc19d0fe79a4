use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use billtrack_core::IdentityId;

use super::{ItemKind, TrackOutcome, TrackedItem, TrackingRepository};
use crate::error::{RepositoryError, poisoned};

/// In-memory tracking lists for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryTrackingStore {
    inner: RwLock<HashMap<IdentityId, Vec<TrackedItem>>>,
}

impl InMemoryTrackingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TrackingRepository for InMemoryTrackingStore {
    async fn track(&self, identity: IdentityId, item: TrackedItem) -> Result<TrackOutcome, RepositoryError> {
        let mut items = self.inner.write().map_err(|_| poisoned("tracking"))?;
        let list = items.entry(identity).or_default();
        if let Some(existing) = list.iter().find(|i| i.kind == item.kind && i.item_id == item.item_id) {
            return Ok(TrackOutcome::AlreadyTracking(existing.clone()));
        }
        list.push(item.clone());
        Ok(TrackOutcome::Tracked(item))
    }

    async fn untrack(&self, identity: IdentityId, kind: ItemKind, item_id: &str) -> Result<(), RepositoryError> {
        let mut items = self.inner.write().map_err(|_| poisoned("tracking"))?;
        let list = items.get_mut(&identity).ok_or(RepositoryError::Missing)?;
        let before = list.len();
        list.retain(|i| !(i.kind == kind && i.item_id == item_id));
        if list.len() == before {
            return Err(RepositoryError::Missing);
        }
        Ok(())
    }

    async fn list(&self, identity: IdentityId) -> Result<Vec<TrackedItem>, RepositoryError> {
        let items = self.inner.read().map_err(|_| poisoned("tracking"))?;
        Ok(items.get(&identity).cloned().unwrap_or_default())
    }
}
