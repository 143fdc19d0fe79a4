//! Campaigns and the bills/legislators attached to them.
//!
//! Creating a campaign needs a paid subscription. Reading it needs any team
//! role on it; changing its item list needs manager or editor.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use billtrack_auth::{Identity, PermissionAction, TeamRole};
use billtrack_core::{DomainError, IdentityId, ResourceId};

use crate::Evaluator;
use crate::error::{RepositoryError, ServiceError, ServiceResult};
use crate::membership::MembershipRepository;
use crate::tracking::{ItemKind, normalize_item_id};

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryCampaignStore;
pub use postgres::PostgresCampaignStore;

/// An advocacy campaign; the resource team roles are scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Campaign {
    pub id: ResourceId,
    pub name: String,
    pub description: Option<String>,
    pub lead_id: IdentityId,
    pub created_at: DateTime<Utc>,
}

/// A bill or legislator attached to a campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CampaignItem {
    pub campaign_id: ResourceId,
    pub kind: ItemKind,
    pub item_id: String,
    pub added_by: IdentityId,
    pub added_at: DateTime<Utc>,
}

#[async_trait]
pub trait CampaignRepository: Send + Sync {
    /// Store a new campaign; `Duplicate` if the id is taken.
    async fn insert(&self, campaign: &Campaign) -> Result<(), RepositoryError>;

    async fn get(&self, id: &ResourceId) -> Result<Option<Campaign>, RepositoryError>;

    /// Attach an item. An item already on the campaign is returned as stored.
    async fn add_item(&self, item: CampaignItem) -> Result<CampaignItem, RepositoryError>;

    async fn remove_item(
        &self,
        campaign: &ResourceId,
        kind: ItemKind,
        item_id: &str,
    ) -> Result<(), RepositoryError>;

    /// Items of `campaign`, oldest first.
    async fn list_items(&self, campaign: &ResourceId) -> Result<Vec<CampaignItem>, RepositoryError>;
}

/// Runtime-selected campaign backend.
pub type SharedCampaigns = Arc<dyn CampaignRepository>;

#[derive(Clone)]
pub struct CampaignService {
    evaluator: Arc<Evaluator>,
    campaigns: SharedCampaigns,
}

impl CampaignService {
    pub fn new(evaluator: Arc<Evaluator>, campaigns: SharedCampaigns) -> Self {
        Self {
            evaluator,
            campaigns,
        }
    }

    /// Any team role may read; `edit` narrows that to managers and editors.
    async fn gate<'a>(
        &self,
        actor: Option<&'a Identity>,
        campaign: &ResourceId,
        edit: bool,
        cancel: &CancellationToken,
    ) -> ServiceResult<&'a Identity> {
        let mut decision = self
            .evaluator
            .evaluate(actor, PermissionAction::ViewReports, Some(campaign), cancel)
            .await?;
        if edit {
            decision = decision.require_editor();
        }
        match actor {
            Some(actor) if decision.allowed => Ok(actor),
            _ => Err(ServiceError::Denied(decision)),
        }
    }

    async fn load(&self, id: &ResourceId) -> ServiceResult<Campaign> {
        self.campaigns
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found().into())
    }

    /// Create a campaign led by `actor`, who becomes its first manager.
    ///
    /// Requires a paid subscription.
    pub async fn create(
        &self,
        actor: Option<&Identity>,
        name: &str,
        description: Option<String>,
        cancel: &CancellationToken,
    ) -> ServiceResult<Campaign> {
        let decision = self
            .evaluator
            .evaluate(actor, PermissionAction::CreateCampaign, None, cancel)
            .await?;
        let Some(actor) = actor.filter(|_| decision.allowed) else {
            return Err(ServiceError::Denied(decision));
        };

        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("campaign name must not be empty").into());
        }

        let campaign = Campaign {
            id: ResourceId::generate(),
            name: name.to_string(),
            description: description.filter(|d| !d.trim().is_empty()),
            lead_id: actor.id,
            created_at: Utc::now(),
        };

        // Membership first: a campaign without a manager could never be administered.
        self.evaluator
            .store()
            .add(&campaign.id, actor.id, TeamRole::Manager, campaign.created_at)
            .await?;
        self.campaigns.insert(&campaign).await?;

        tracing::info!(campaign = %campaign.id, lead = %actor.id, "campaign created");
        Ok(campaign)
    }

    /// Campaign details, for any member of its team.
    pub async fn get(
        &self,
        actor: Option<&Identity>,
        id: &ResourceId,
        cancel: &CancellationToken,
    ) -> ServiceResult<Campaign> {
        self.gate(actor, id, false, cancel).await?;
        self.load(id).await
    }

    /// Attach bills or legislators to a campaign (manager or editor).
    ///
    /// Items already attached are returned unchanged alongside new ones.
    pub async fn add_items(
        &self,
        actor: Option<&Identity>,
        campaign: &ResourceId,
        kind: ItemKind,
        item_ids: &[String],
        cancel: &CancellationToken,
    ) -> ServiceResult<Vec<CampaignItem>> {
        let actor = self.gate(actor, campaign, true, cancel).await?;
        if item_ids.is_empty() {
            return Err(DomainError::validation("item_ids must not be empty").into());
        }
        let item_ids = item_ids
            .iter()
            .map(|id| normalize_item_id(id).map(str::to_owned))
            .collect::<Result<Vec<_>, _>>()?;
        self.load(campaign).await?;

        let now = Utc::now();
        let mut added = Vec::with_capacity(item_ids.len());
        for item_id in item_ids {
            let item = CampaignItem {
                campaign_id: campaign.clone(),
                kind,
                item_id,
                added_by: actor.id,
                added_at: now,
            };
            added.push(self.campaigns.add_item(item).await?);
        }

        tracing::info!(campaign = %campaign, ?kind, count = added.len(), "campaign items added");
        Ok(added)
    }

    /// Detach one item from a campaign (manager or editor).
    pub async fn remove_item(
        &self,
        actor: Option<&Identity>,
        campaign: &ResourceId,
        kind: ItemKind,
        item_id: &str,
        cancel: &CancellationToken,
    ) -> ServiceResult<()> {
        self.gate(actor, campaign, true, cancel).await?;
        let item_id = normalize_item_id(item_id)?;

        self.campaigns.remove_item(campaign, kind, item_id).await?;

        tracing::info!(campaign = %campaign, ?kind, item_id, "campaign item removed");
        Ok(())
    }

    pub async fn list_items(
        &self,
        actor: Option<&Identity>,
        campaign: &ResourceId,
        cancel: &CancellationToken,
    ) -> ServiceResult<Vec<CampaignItem>> {
        self.gate(actor, campaign, false, cancel).await?;
        Ok(self.campaigns.list_items(campaign).await?)
    }
}
