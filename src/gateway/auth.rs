//! Connection token verification
//!
//! Authentication itself (login, token issuance) belongs to an external
//! collaborator; the gateway only verifies that the token presented at
//! upgrade time names a real identity, then trusts it for the connection's
//! lifetime.

use crate::error::{Result, SessionError};
use crate::types::PlayerId;
use async_trait::async_trait;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Trait for resolving a connection token to a verified player identity
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Verify a token and return the identity it was issued for
    async fn verify(&self, token: &str) -> Result<PlayerId>;
}

/// JWT claims carried by connection tokens
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    /// Player identity
    sub: String,
    /// Expiry as a unix timestamp
    exp: usize,
}

/// HS256 JWT verifier sharing a secret with the auth collaborator
pub struct JwtIdentityVerifier {
    decoding_key: DecodingKey,
    encoding_key: EncodingKey,
    validation: Validation,
}

impl JwtIdentityVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
        }
    }

    /// Issue a token for an identity (used by tests and the local demo
    /// tooling; production tokens come from the auth service).
    pub fn issue_token(&self, player_id: &str, ttl_seconds: u64) -> Result<String> {
        let expiry = crate::utils::current_timestamp().timestamp() as usize + ttl_seconds as usize;
        let claims = Claims {
            sub: player_id.to_string(),
            exp: expiry,
        };
        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| {
            SessionError::Internal {
                message: format!("Failed to issue token: {}", e),
            }
            .into()
        })
    }
}

#[async_trait]
impl IdentityVerifier for JwtIdentityVerifier {
    async fn verify(&self, token: &str) -> Result<PlayerId> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            SessionError::Validation {
                reason: format!("Invalid connection token: {}", e),
            }
        })?;

        debug!("Verified connection token for player '{}'", data.claims.sub);
        Ok(data.claims.sub)
    }
}

/// Static token → identity map for tests
#[derive(Debug, Default)]
pub struct StaticIdentityVerifier {
    tokens: HashMap<String, PlayerId>,
}

impl StaticIdentityVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: &str, player_id: &str) -> Self {
        self.tokens.insert(token.to_string(), player_id.to_string());
        self
    }
}

#[async_trait]
impl IdentityVerifier for StaticIdentityVerifier {
    async fn verify(&self, token: &str) -> Result<PlayerId> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| {
                SessionError::Validation {
                    reason: "Invalid connection token".to_string(),
                }
                .into()
            })
    }
}
