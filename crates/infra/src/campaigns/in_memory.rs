use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use billtrack_core::ResourceId;

use super::{Campaign, CampaignItem, CampaignRepository};
use crate::error::{RepositoryError, poisoned};
use crate::tracking::ItemKind;

#[derive(Debug, Default)]
struct Tables {
    campaigns: HashMap<ResourceId, Campaign>,
    items: Vec<CampaignItem>,
}

/// In-memory campaign tables for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryCampaignStore {
    inner: RwLock<Tables>,
}

impl InMemoryCampaignStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CampaignRepository for InMemoryCampaignStore {
    async fn insert(&self, campaign: &Campaign) -> Result<(), RepositoryError> {
        let mut tables = self.inner.write().map_err(|_| poisoned("campaign"))?;
        if tables.campaigns.contains_key(&campaign.id) {
            return Err(RepositoryError::Duplicate);
        }
        tables.campaigns.insert(campaign.id.clone(), campaign.clone());
        Ok(())
    }

    async fn get(&self, id: &ResourceId) -> Result<Option<Campaign>, RepositoryError> {
        let tables = self.inner.read().map_err(|_| poisoned("campaign"))?;
        Ok(tables.campaigns.get(id).cloned())
    }

    async fn add_item(&self, item: CampaignItem) -> Result<CampaignItem, RepositoryError> {
        let mut tables = self.inner.write().map_err(|_| poisoned("campaign"))?;
        if let Some(existing) = tables.items.iter().find(|i| {
            i.campaign_id == item.campaign_id && i.kind == item.kind && i.item_id == item.item_id
        }) {
            return Ok(existing.clone());
        }
        tables.items.push(item.clone());
        Ok(item)
    }

    async fn remove_item(
        &self,
        campaign: &ResourceId,
        kind: ItemKind,
        item_id: &str,
    ) -> Result<(), RepositoryError> {
        let mut tables = self.inner.write().map_err(|_| poisoned("campaign"))?;
        let before = tables.items.len();
        tables
            .items
            .retain(|i| !(&i.campaign_id == campaign && i.kind == kind && i.item_id == item_id));
        if tables.items.len() == before {
            return Err(RepositoryError::Missing);
        }
        Ok(())
    }

    async fn list_items(&self, campaign: &ResourceId) -> Result<Vec<CampaignItem>, RepositoryError> {
        let tables = self.inner.read().map_err(|_| poisoned("campaign"))?;
        Ok(tables
            .items
            .iter()
            .filter(|i| &i.campaign_id == campaign)
            .cloned()
            .collect())
    }
}
