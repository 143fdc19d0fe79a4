//! Infrastructure layer: membership storage and the gated application services.
//!
//! Every service here routes its authorization through the single
//! `PermissionEvaluator`; none of them re-implements a policy check inline.

pub mod campaigns;
pub mod error;
pub mod membership;
pub mod stores;
pub mod team;
pub mod tracking;

pub use campaigns::{
    Campaign, CampaignItem, CampaignRepository, CampaignService, InMemoryCampaignStore,
    PostgresCampaignStore, SharedCampaigns,
};
pub use error::{RepositoryError, ServiceError, ServiceResult};
pub use membership::{
    InMemoryMembershipStore, Membership, MembershipRepository, PostgresMembershipStore,
    SharedMembership,
};
pub use stores::Stores;
pub use team::TeamService;
pub use tracking::{
    InMemoryTrackingStore, ItemKind, PostgresTrackingStore, SharedTracking, TrackOutcome,
    TrackedItem, TrackingRepository, TrackingService,
};

/// Evaluator type shared by the services and the HTTP layer.
pub type Evaluator = billtrack_auth::PermissionEvaluator<SharedMembership>;
