use billtrack_auth::{Identity, SubscriptionTier, resolve_tier};

/// Caller context for a request: the verified identity, or none for an
/// anonymous caller.
///
/// Built once by the auth middleware and passed explicitly to every service
/// call; nothing reads it from ambient state.
#[derive(Debug, Clone, PartialEq)]
pub struct CallerContext {
    identity: Option<Identity>,
}

impl CallerContext {
    pub fn new(identity: Option<Identity>) -> Self {
        Self { identity }
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn tier(&self) -> SubscriptionTier {
        resolve_tier(self.identity())
    }
}
