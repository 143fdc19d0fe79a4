use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use billtrack_core::IdentityId;

/// Metadata key carrying the subscription tier string.
pub const SUBSCRIPTION_TIER_KEY: &str = "subscription_tier";

/// An authenticated principal, as handed back by the auth provider.
///
/// Holding an `Identity` means the credential behind it was already verified;
/// the anonymous caller is modeled as the *absence* of an identity
/// (`Option<&Identity>`), never as a special value of this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: IdentityId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Free-form metadata bag maintained by the auth provider.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Identity {
    pub fn new(id: IdentityId) -> Self {
        Self {
            id,
            email: None,
            metadata: Map::new(),
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// String-valued metadata entry, if present and actually a string.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }
}
