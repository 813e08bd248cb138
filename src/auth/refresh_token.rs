/// Refresh Token Management
///
/// Refresh tokens are:
/// - 32 bytes from the OS random source, hex encoded (64 characters)
/// - Long lived (60 days by default) and reusable until expiry or revocation
/// - Persisted through a `CredentialStore`, which enforces uniqueness

use std::sync::Arc;

use rand::rngs::OsRng;
use rand::RngCore;
use uuid::Uuid;

use crate::clock::Clock;
use crate::configuration::AuthSettings;
use crate::error::{RefreshTokenError, StoreError};
use crate::store::{with_deadline, CredentialStore, RefreshTokenRecord, RefreshTokenStatus};

const REFRESH_TOKEN_BYTES: usize = 32;

/// Generate a new cryptographically secure refresh token
pub fn generate_refresh_token() -> String {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Issues, resolves and revokes refresh tokens against a store
pub struct RefreshTokenManager<S> {
    store: Arc<S>,
    ttl: chrono::Duration,
    store_timeout: std::time::Duration,
    clock: Arc<dyn Clock>,
}

impl<S> Clone for RefreshTokenManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            ttl: self.ttl,
            store_timeout: self.store_timeout,
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<S: CredentialStore> RefreshTokenManager<S> {
    pub fn new(store: Arc<S>, settings: &AuthSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            ttl: settings.refresh_token_ttl(),
            store_timeout: settings.store_timeout(),
            clock,
        }
    }

    /// Issue and persist a new refresh token for `user_id`
    ///
    /// # Errors
    /// - `ExpiryOutOfRange` if the lifetime cannot be added to now
    /// - `Collision` if the store already holds the generated value
    /// - `Storage` for any other store failure
    pub async fn issue(&self, user_id: Uuid) -> Result<RefreshTokenRecord, RefreshTokenError> {
        let token = generate_refresh_token();
        let created_at = self.clock.now();
        let expires_at = created_at
            .checked_add_signed(self.ttl)
            .ok_or(RefreshTokenError::ExpiryOutOfRange)?;

        let record = with_deadline(
            self.store_timeout,
            self.store
                .create_refresh_token(&token, user_id, created_at, expires_at),
        )
        .await
        .map_err(|e| match e {
            StoreError::UniqueViolation => {
                tracing::error!(user_id = %user_id, "Refresh token collision");
                RefreshTokenError::Collision
            }
            other => RefreshTokenError::Storage(other),
        })?;

        tracing::debug!(user_id = %user_id, expires_at = %expires_at, "Refresh token issued");
        Ok(record)
    }

    /// Resolve a refresh token to its user
    ///
    /// # Errors
    /// - `NotFound` if no row matches
    /// - `Revoked` if the token was revoked, whatever its expiry
    /// - `Expired` if now is at or past `expires_at`
    pub async fn resolve(&self, token: &str) -> Result<Uuid, RefreshTokenError> {
        let record = with_deadline(self.store_timeout, self.store.get_refresh_token(token))
            .await?
            .ok_or_else(|| {
                tracing::warn!("Refresh token not found");
                RefreshTokenError::NotFound
            })?;

        match record.status_at(self.clock.now()) {
            RefreshTokenStatus::Active => Ok(record.user_id),
            RefreshTokenStatus::Revoked => {
                tracing::warn!(user_id = %record.user_id, "Attempt to use revoked refresh token");
                Err(RefreshTokenError::Revoked)
            }
            RefreshTokenStatus::Expired => {
                tracing::info!(user_id = %record.user_id, "Refresh token expired");
                Err(RefreshTokenError::Expired)
            }
        }
    }

    /// Revoke a single refresh token
    ///
    /// Revoking an already revoked token succeeds and keeps the original
    /// revocation time.
    ///
    /// # Errors
    /// - `NotFound` if no row matches
    /// - `Storage` if the store fails
    pub async fn revoke(&self, token: &str) -> Result<(), RefreshTokenError> {
        let found = with_deadline(
            self.store_timeout,
            self.store.revoke_refresh_token(token, self.clock.now()),
        )
        .await?;

        if !found {
            return Err(RefreshTokenError::NotFound);
        }
        Ok(())
    }

    /// Revoke all refresh tokens for a user
    pub async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, RefreshTokenError> {
        let revoked = with_deadline(
            self.store_timeout,
            self.store.revoke_user_refresh_tokens(user_id, self.clock.now()),
        )
        .await?;

        tracing::info!(user_id = %user_id, revoked = revoked, "All refresh tokens revoked for user");
        Ok(revoked)
    }
}
