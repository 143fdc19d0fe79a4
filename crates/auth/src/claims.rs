use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use billtrack_core::IdentityId;

use crate::identity::Identity;

/// JWT claims issued by the auth provider.
///
/// Mirrors the access tokens handed to the browser: the subject, an optional
/// email and the provider-managed `user_metadata` bag the tier is read from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject / identity identifier.
    pub sub: IdentityId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default)]
    pub user_metadata: Map<String, Value>,

    /// Issued-at, unix seconds.
    pub iat: i64,

    /// Expiration, unix seconds.
    pub exp: i64,
}

impl JwtClaims {
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.iat, 0).single()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0).single()
    }

    pub fn into_identity(self) -> Identity {
        Identity {
            id: self.sub,
            email: self.email,
            metadata: self.user_metadata,
        }
    }
}

/// Credential could not be turned into a verified identity.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerificationError {
    #[error("malformed credential: {0}")]
    Malformed(String),

    #[error("credential signature is invalid")]
    InvalidSignature,

    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,

    #[error("auth provider unavailable: {0}")]
    Unavailable(String),
}

/// Deterministically validate the claims time window.
///
/// Signature verification happens before this, in the provider.
pub fn validate_claims(claims: &JwtClaims, now: DateTime<Utc>) -> Result<(), VerificationError> {
    let (Some(issued_at), Some(expires_at)) = (claims.issued_at(), claims.expires_at()) else {
        return Err(VerificationError::Malformed("timestamp out of range".to_string()));
    };

    if expires_at <= issued_at {
        return Err(VerificationError::InvalidTimeWindow);
    }
    if now < issued_at {
        return Err(VerificationError::NotYetValid);
    }
    if now >= expires_at {
        return Err(VerificationError::Expired);
    }
    Ok(())
}

/// Boundary to the external auth provider.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Turn a bearer credential into a verified identity.
    async fn verify(&self, credential: &str) -> Result<Identity, VerificationError>;
}

#[async_trait]
impl<P> AuthProvider for std::sync::Arc<P>
where
    P: AuthProvider + ?Sized,
{
    async fn verify(&self, credential: &str) -> Result<Identity, VerificationError> {
        (**self).verify(credential).await
    }
}

/// Verifies HS256-signed access tokens with a shared secret.
pub struct Hs256Verifier {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256Verifier {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Time window is checked by `validate_claims`; audience is not used.
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        Self {
            key: DecodingKey::from_secret(secret.as_ref()),
            validation,
        }
    }

    /// Decode and validate synchronously against an explicit clock.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Identity, VerificationError> {
        let data = jsonwebtoken::decode::<JwtClaims>(token, &self.key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => VerificationError::InvalidSignature,
                ErrorKind::ExpiredSignature => VerificationError::Expired,
                _ => VerificationError::Malformed(e.to_string()),
            })?;

        validate_claims(&data.claims, now)?;
        Ok(data.claims.into_identity())
    }
}

impl core::fmt::Debug for Hs256Verifier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Hs256Verifier").finish_non_exhaustive()
    }
}

#[async_trait]
impl AuthProvider for Hs256Verifier {
    async fn verify(&self, credential: &str) -> Result<Identity, VerificationError> {
        self.verify_at(credential, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use jsonwebtoken::{EncodingKey, Header};

    const SECRET: &str = "unit-test-secret";

    fn claims(iat: DateTime<Utc>, exp: DateTime<Utc>) -> JwtClaims {
        let mut user_metadata = Map::new();
        user_metadata.insert("subscription_tier".into(), Value::String("paid".into()));
        JwtClaims {
            sub: IdentityId::new(),
            email: Some("ada@example.com".into()),
            user_metadata,
            iat: iat.timestamp(),
            exp: exp.timestamp(),
        }
    }

    fn sign(claims: &JwtClaims, secret: &str) -> String {
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn valid_token_yields_identity_with_metadata() {
        let now = Utc::now();
        let c = claims(now - Duration::minutes(1), now + Duration::minutes(10));
        let token = sign(&c, SECRET);

        let identity = Hs256Verifier::new(SECRET).verify_at(&token, now).unwrap();
        assert_eq!(identity.id, c.sub);
        assert_eq!(identity.metadata_str("subscription_tier"), Some("paid"));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let now = Utc::now();
        let token = sign(&claims(now, now + Duration::minutes(10)), "other-secret");
        let err = Hs256Verifier::new(SECRET).verify_at(&token, now).unwrap_err();
        assert_eq!(err, VerificationError::InvalidSignature);
    }

    #[test]
    fn expired_token_is_rejected() {
        let now = Utc::now();
        let token = sign(&claims(now - Duration::hours(2), now - Duration::hours(1)), SECRET);
        let err = Hs256Verifier::new(SECRET).verify_at(&token, now).unwrap_err();
        assert_eq!(err, VerificationError::Expired);
    }

    #[test]
    fn garbage_is_malformed() {
        let err = Hs256Verifier::new(SECRET).verify_at("abc.def", Utc::now()).unwrap_err();
        assert!(matches!(err, VerificationError::Malformed(_)));
    }

    #[test]
    fn claims_time_window_rules() {
        let now = Utc::now();
        let inverted = claims(now, now - Duration::seconds(1));
        assert_eq!(validate_claims(&inverted, now), Err(VerificationError::InvalidTimeWindow));

        let future = claims(now + Duration::minutes(5), now + Duration::minutes(10));
        assert_eq!(validate_claims(&future, now), Err(VerificationError::NotYetValid));
    }
}
