//! `billtrack-core`: identifiers and the domain error model shared by every crate.
//!
//! This crate contains no IO and no policy.

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{IdentityId, ResourceId};
