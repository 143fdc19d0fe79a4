//! Role Resolver: subscription tier derivation.
//!
//! The tier is never stored. It is recomputed from identity metadata every time
//! it is needed, so a subscription change takes effect on the next call.

use serde::{Deserialize, Serialize};

use crate::identity::{Identity, SUBSCRIPTION_TIER_KEY};

/// Coarse plan level of a caller.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTier {
    Anonymous,
    Free,
    Paid,
}

impl SubscriptionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionTier::Anonymous => "anonymous",
            SubscriptionTier::Free => "free",
            SubscriptionTier::Paid => "paid",
        }
    }

    pub fn is_registered(&self) -> bool {
        *self != SubscriptionTier::Anonymous
    }
}

impl core::fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolve the caller's tier.
///
/// - No identity: `Anonymous`.
/// - Metadata `subscription_tier` is exactly `"paid"`: `Paid`.
/// - Anything else, including missing or non-string metadata: `Free`.
///
/// Never fails.
pub fn resolve_tier(identity: Option<&Identity>) -> SubscriptionTier {
    match identity {
        None => SubscriptionTier::Anonymous,
        Some(identity) => match identity.metadata_str(SUBSCRIPTION_TIER_KEY) {
            Some("paid") => SubscriptionTier::Paid,
            _ => SubscriptionTier::Free,
        },
    }
}

/// Display-only capability flags derived from a tier.
///
/// Clients use these to show or hide controls. The backend never consults
/// them; it always goes through the permission evaluator.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionSet {
    pub can_track_items: bool,
    pub can_create_campaigns: bool,
    pub can_generate_reports: bool,
    pub can_manage_teams: bool,
}

pub fn derive_permission_set(tier: SubscriptionTier) -> PermissionSet {
    let paid = tier == SubscriptionTier::Paid;
    PermissionSet {
        can_track_items: tier.is_registered(),
        can_create_campaigns: paid,
        can_generate_reports: paid,
        can_manage_teams: paid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use billtrack_core::IdentityId;
    use proptest::prelude::*;
    use serde_json::json;

    fn identity_with_tier(value: serde_json::Value) -> Identity {
        Identity::new(IdentityId::new()).with_metadata(SUBSCRIPTION_TIER_KEY, value)
    }

    #[test]
    fn absent_identity_is_anonymous() {
        assert_eq!(resolve_tier(None), SubscriptionTier::Anonymous);
    }

    #[test]
    fn missing_metadata_defaults_to_free() {
        let identity = Identity::new(IdentityId::new());
        assert_eq!(resolve_tier(Some(&identity)), SubscriptionTier::Free);
    }

    #[test]
    fn exact_paid_string_resolves_to_paid() {
        let identity = identity_with_tier(json!("paid"));
        assert_eq!(resolve_tier(Some(&identity)), SubscriptionTier::Paid);
    }

    #[test]
    fn malformed_tier_values_fall_back_to_free() {
        for value in [json!("PAID"), json!(" paid"), json!(true), json!(1), json!(null), json!({"tier": "paid"})] {
            let identity = identity_with_tier(value.clone());
            assert_eq!(
                resolve_tier(Some(&identity)),
                SubscriptionTier::Free,
                "value {value} should resolve to free"
            );
        }
    }

    #[test]
    fn permission_set_per_tier() {
        let anon = derive_permission_set(SubscriptionTier::Anonymous);
        assert!(!anon.can_track_items && !anon.can_create_campaigns);

        let free = derive_permission_set(SubscriptionTier::Free);
        assert!(free.can_track_items);
        assert!(!free.can_create_campaigns && !free.can_generate_reports && !free.can_manage_teams);

        let paid = derive_permission_set(SubscriptionTier::Paid);
        assert!(paid.can_track_items && paid.can_create_campaigns);
        assert!(paid.can_generate_reports && paid.can_manage_teams);
    }

    #[test]
    fn permission_set_serializes_in_camel_case() {
        let json = serde_json::to_value(derive_permission_set(SubscriptionTier::Free)).unwrap();
        assert_eq!(json["canTrackItems"], json!(true));
        assert_eq!(json["canManageTeams"], json!(false));
    }

    proptest! {
        /// Any identity whose tier string is not exactly "paid" is free, never anonymous.
        #[test]
        fn non_paid_strings_resolve_to_free(value in "\\PC*") {
            prop_assume!(value != "paid");
            let identity = identity_with_tier(json!(value));
            prop_assert_eq!(resolve_tier(Some(&identity)), SubscriptionTier::Free);
        }
    }
}
