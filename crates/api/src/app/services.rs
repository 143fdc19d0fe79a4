use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use billtrack_auth::{AuthProvider, Hs256Verifier, LookupError, PermissionEvaluator};
use billtrack_infra::{CampaignService, Evaluator, Stores, TeamService, TrackingService};

use crate::config::ApiConfig;

/// Everything the handlers need, shared behind one `Arc`.
pub struct AppServices {
    pub auth: Arc<dyn AuthProvider>,
    pub evaluator: Arc<Evaluator>,
    pub teams: TeamService,
    pub campaigns: CampaignService,
    pub tracking: TrackingService,
    /// Cancelled on shutdown; every request evaluates under a child token.
    pub shutdown: CancellationToken,
}

impl AppServices {
    pub fn new(auth: Arc<dyn AuthProvider>, stores: Stores, config: &ApiConfig) -> Self {
        let evaluator = Arc::new(
            PermissionEvaluator::new(stores.membership).with_lookup_timeout(config.lookup_timeout),
        );

        Self {
            auth,
            teams: TeamService::new(evaluator.clone()),
            campaigns: CampaignService::new(evaluator.clone(), stores.campaigns),
            tracking: TrackingService::new(evaluator.clone(), stores.tracking),
            evaluator,
            shutdown: CancellationToken::new(),
        }
    }

    /// Cancellation token for one request.
    pub fn request_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }
}

pub async fn build_services(config: &ApiConfig) -> Result<AppServices, LookupError> {
    let auth: Arc<dyn AuthProvider> = Arc::new(Hs256Verifier::new(config.jwt_secret.as_bytes()));

    let stores = match &config.database_url {
        Some(url) => {
            tracing::info!("using postgres stores");
            Stores::postgres(url).await?
        }
        None => {
            tracing::warn!("DATABASE_URL not set; campaigns, teams and tracking are kept in memory");
            Stores::in_memory()
        }
    };

    Ok(AppServices::new(auth, stores, config))
}
