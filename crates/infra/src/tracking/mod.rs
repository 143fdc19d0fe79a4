//! Bill and legislator tracking for registered users.

use core::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use billtrack_auth::{Identity, LookupError, PermissionAction};
use billtrack_core::{DomainError, IdentityId};

use crate::Evaluator;
use crate::error::{RepositoryError, ServiceError, ServiceResult};

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryTrackingStore;
pub use postgres::PostgresTrackingStore;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Bill,
    Legislator,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Bill => "bill",
            ItemKind::Legislator => "legislator",
        }
    }
}

impl FromStr for ItemKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bill" => Ok(ItemKind::Bill),
            "legislator" => Ok(ItemKind::Legislator),
            _ => Err(DomainError::validation("item_type must be one of: bill, legislator")),
        }
    }
}

/// Item kind read back from storage; anything else means the row is corrupt.
pub(crate) fn parse_kind(raw: &str) -> Result<ItemKind, LookupError> {
    raw.parse()
        .map_err(|_| LookupError::corrupt(format!("unknown item type '{raw}'")))
}

/// Trimmed item id; blank ids are rejected.
pub(crate) fn normalize_item_id(raw: &str) -> Result<&str, DomainError> {
    let item_id = raw.trim();
    if item_id.is_empty() {
        return Err(DomainError::validation("item_id must not be empty"));
    }
    Ok(item_id)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackedItem {
    pub kind: ItemKind,
    pub item_id: String,
    pub notes: Option<String>,
    pub tracked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackOutcome {
    Tracked(TrackedItem),
    /// The item was already on the caller's list; the existing entry is returned unchanged.
    AlreadyTracking(TrackedItem),
}

impl TrackOutcome {
    pub fn item(&self) -> &TrackedItem {
        match self {
            TrackOutcome::Tracked(item) | TrackOutcome::AlreadyTracking(item) => item,
        }
    }
}

#[async_trait]
pub trait TrackingRepository: Send + Sync {
    /// Add `item` to the identity's list unless an entry for the same
    /// kind and id exists, in which case that entry is returned.
    async fn track(&self, identity: IdentityId, item: TrackedItem) -> Result<TrackOutcome, RepositoryError>;

    async fn untrack(&self, identity: IdentityId, kind: ItemKind, item_id: &str) -> Result<(), RepositoryError>;

    /// The identity's tracked items, oldest first.
    async fn list(&self, identity: IdentityId) -> Result<Vec<TrackedItem>, RepositoryError>;
}

/// Runtime-selected tracking backend.
pub type SharedTracking = Arc<dyn TrackingRepository>;

#[derive(Clone)]
pub struct TrackingService {
    evaluator: Arc<Evaluator>,
    items: SharedTracking,
}

impl TrackingService {
    pub fn new(evaluator: Arc<Evaluator>, items: SharedTracking) -> Self {
        Self { evaluator, items }
    }

    async fn registered<'a>(
        &self,
        actor: Option<&'a Identity>,
        cancel: &CancellationToken,
    ) -> ServiceResult<&'a Identity> {
        let decision = self
            .evaluator
            .evaluate(actor, PermissionAction::TrackItems, None, cancel)
            .await?;
        match actor {
            Some(actor) if decision.allowed => Ok(actor),
            _ => Err(ServiceError::Denied(decision)),
        }
    }

    pub async fn track(
        &self,
        actor: Option<&Identity>,
        kind: ItemKind,
        item_id: &str,
        notes: Option<String>,
        cancel: &CancellationToken,
    ) -> ServiceResult<TrackOutcome> {
        let actor = self.registered(actor, cancel).await?;
        let item_id = normalize_item_id(item_id)?;

        let item = TrackedItem {
            kind,
            item_id: item_id.to_string(),
            notes,
            tracked_at: Utc::now(),
        };
        let outcome = self.items.track(actor.id, item).await?;

        if let TrackOutcome::Tracked(_) = outcome {
            tracing::debug!(identity = %actor.id, ?kind, item_id, "item tracked");
        }
        Ok(outcome)
    }

    pub async fn untrack(
        &self,
        actor: Option<&Identity>,
        kind: ItemKind,
        item_id: &str,
        cancel: &CancellationToken,
    ) -> ServiceResult<()> {
        let actor = self.registered(actor, cancel).await?;
        let item_id = normalize_item_id(item_id)?;

        self.items.untrack(actor.id, kind, item_id).await?;
        Ok(())
    }

    pub async fn list(
        &self,
        actor: Option<&Identity>,
        cancel: &CancellationToken,
    ) -> ServiceResult<Vec<TrackedItem>> {
        let actor = self.registered(actor, cancel).await?;
        Ok(self.items.list(actor.id).await?)
    }
}
