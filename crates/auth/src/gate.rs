//! Advisory route gating for the UI layer.
//!
//! Rendering decisions only. A `Render` outcome is not an authorization grant;
//! mutating calls are re-checked by the permission evaluator.

use serde::Serialize;

use crate::tier::SubscriptionTier;

/// Where a caller is sent when a gate does not admit them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Fallback {
    Login,
    Pricing,
    Custom(String),
}

impl Fallback {
    pub fn path(&self) -> &str {
        match self {
            Fallback::Login => "/login",
            Fallback::Pricing => "/pricing",
            Fallback::Custom(path) => path,
        }
    }

    /// Default fallback for a tier that was turned away: anonymous callers go
    /// to login, registered callers to the pricing page.
    pub fn for_tier(tier: SubscriptionTier) -> Self {
        if tier.is_registered() {
            Fallback::Pricing
        } else {
            Fallback::Login
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    Render,
    Redirect(Fallback),
}

/// Tier requirement attached to a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteGate {
    required_tiers: Vec<SubscriptionTier>,
    fallback: Option<Fallback>,
}

impl Default for RouteGate {
    /// Registered users only.
    fn default() -> Self {
        Self {
            required_tiers: vec![SubscriptionTier::Free, SubscriptionTier::Paid],
            fallback: None,
        }
    }
}

impl RouteGate {
    pub fn requiring(tiers: impl IntoIterator<Item = SubscriptionTier>) -> Self {
        Self {
            required_tiers: tiers.into_iter().collect(),
            fallback: None,
        }
    }

    pub fn paid_only() -> Self {
        Self::requiring([SubscriptionTier::Paid])
    }

    pub fn with_fallback(mut self, fallback: Fallback) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn check(&self, tier: SubscriptionTier) -> GateOutcome {
        if self.required_tiers.contains(&tier) {
            return GateOutcome::Render;
        }

        GateOutcome::Redirect(
            self.fallback
                .clone()
                .unwrap_or_else(|| Fallback::for_tier(tier)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_gate_sends_anonymous_callers_to_login() {
        let gate = RouteGate::default();
        assert_eq!(
            gate.check(SubscriptionTier::Anonymous),
            GateOutcome::Redirect(Fallback::Login)
        );
        assert_eq!(gate.check(SubscriptionTier::Free), GateOutcome::Render);
    }

    #[test]
    fn paid_gate_sends_free_callers_to_pricing() {
        let gate = RouteGate::paid_only();
        assert_eq!(
            gate.check(SubscriptionTier::Free),
            GateOutcome::Redirect(Fallback::Pricing)
        );
        assert_eq!(gate.check(SubscriptionTier::Paid), GateOutcome::Render);
    }

    #[test]
    fn explicit_fallback_wins() {
        let gate = RouteGate::paid_only().with_fallback(Fallback::Custom("/upgrade".into()));
        match gate.check(SubscriptionTier::Anonymous) {
            GateOutcome::Redirect(fallback) => assert_eq!(fallback.path(), "/upgrade"),
            GateOutcome::Render => panic!("anonymous caller must not render a paid page"),
        }
    }
}
