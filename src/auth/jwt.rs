/// JWT Token Generation and Validation
///
/// Handles creation and validation of HS256 access tokens.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::auth::claims::Claims;
use crate::clock::{Clock, SystemClock};
use crate::configuration::AuthSettings;
use crate::error::TokenError;

/// Issues and validates signed, expiring access tokens
#[derive(Clone)]
pub struct AccessTokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    ttl: chrono::Duration,
    leeway: chrono::Duration,
    clock: Arc<dyn Clock>,
}

impl AccessTokenCodec {
    pub fn new(settings: &AuthSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(settings.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(settings.jwt_secret.as_bytes()),
            issuer: settings.issuer.clone(),
            ttl: settings.access_token_ttl(),
            leeway: settings.leeway(),
            clock,
        }
    }

    /// Codec reading the wall clock
    pub fn from_settings(settings: &AuthSettings) -> Self {
        Self::new(settings, Arc::new(SystemClock))
    }

    /// Lifetime of issued tokens
    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    /// Generate a new access token for a user
    ///
    /// # Errors
    /// Returns `TokenError::Signing` if encoding fails
    pub fn issue(&self, user_id: Uuid) -> Result<String, TokenError> {
        self.issue_at(user_id, self.clock.now())
    }

    pub fn issue_at(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<String, TokenError> {
        let claims = Claims::new(user_id, &self.issuer, now, self.ttl)?;

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Validate an access token and return the user it identifies
    ///
    /// Checks, in order: signature, issuer, subject, expiry.
    ///
    /// # Errors
    /// - `SignatureInvalid` if the token fails to decode or verify
    /// - `IssuerMismatch` if `iss` is not ours
    /// - `Malformed` if `sub` is not a UUID
    /// - `Expired` if `exp` is at or before now
    pub fn validate(&self, token: &str) -> Result<Uuid, TokenError> {
        self.validate_at(token, self.clock.now())
    }

    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Result<Uuid, TokenError> {
        let claims = self.decode_claims(token)?;

        if claims.iss != self.issuer {
            tracing::warn!(issuer = %claims.iss, "Access token issuer mismatch");
            return Err(TokenError::IssuerMismatch);
        }

        let user_id = claims.user_id()?;

        if claims.is_expired_at(now, self.leeway) {
            tracing::debug!(user_id = %user_id, "Access token expired");
            return Err(TokenError::Expired);
        }

        Ok(user_id)
    }

    fn decode_claims(&self, token: &str) -> Result<Claims, TokenError> {
        // Only the signature is checked here; claims are checked in a fixed
        // order by the caller.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims = HashSet::new();

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::warn!("JWT validation error: {}", e);
                TokenError::SignatureInvalid
            })
    }
}
