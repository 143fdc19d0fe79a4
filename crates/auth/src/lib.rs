//! `billtrack-auth`: role resolution and permission evaluation.
//!
//! This crate is intentionally decoupled from HTTP and storage: the auth
//! provider and the membership store are reached only through the traits
//! declared here.

pub mod action;
pub mod claims;
pub mod evaluate;
pub mod gate;
pub mod identity;
pub mod policy;
pub mod team;
pub mod tier;

pub use action::{ActionName, PermissionAction};
pub use claims::{AuthProvider, Hs256Verifier, JwtClaims, VerificationError, validate_claims};
pub use evaluate::{AbortCause, EvaluationError, LookupError, MembershipStore, PermissionEvaluator};
pub use gate::{Fallback, GateOutcome, RouteGate};
pub use identity::Identity;
pub use policy::{Decision, DenialReason, decide};
pub use team::{TeamRole, UnknownTeamRole};
pub use tier::{PermissionSet, SubscriptionTier, derive_permission_set, resolve_tier};
