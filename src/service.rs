/// Authentication Facade
///
/// Answers "who is this request?" and "start a session for this user" on top
/// of the credential components. Every token or credential failure leaves
/// this module as `Unauthenticated` or `InvalidCredentials`; the specific
/// reason only reaches the logs.

use std::sync::Arc;

use actix_web::http::header::HeaderMap;
use serde::Serialize;
use uuid::Uuid;

use crate::auth::{
    extract_bearer_token, validate_password_strength, AccessTokenCodec, HashedCredential,
    PasswordHasher, RefreshTokenManager,
};
use crate::clock::{Clock, SystemClock};
use crate::configuration::AuthSettings;
use crate::error::{AuthError, CredentialError, RefreshTokenError};
use crate::store::{with_deadline, CredentialStore};

/// Tokens handed out at login
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionTokens {
    pub user_id: Uuid,
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

pub struct AuthService<S> {
    hasher: PasswordHasher,
    access_tokens: AccessTokenCodec,
    refresh_tokens: RefreshTokenManager<S>,
    store: Arc<S>,
    store_timeout: std::time::Duration,
    min_password_length: usize,
}

impl<S: CredentialStore + 'static> AuthService<S> {
    pub fn new(store: Arc<S>, settings: &AuthSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            hasher: PasswordHasher::new(settings.bcrypt_cost),
            access_tokens: AccessTokenCodec::new(settings, Arc::clone(&clock)),
            refresh_tokens: RefreshTokenManager::new(Arc::clone(&store), settings, clock),
            store,
            store_timeout: settings.store_timeout(),
            min_password_length: settings.min_password_length,
        }
    }

    /// Service reading the wall clock
    pub fn from_settings(store: Arc<S>, settings: &AuthSettings) -> Self {
        Self::new(store, settings, Arc::new(SystemClock))
    }

    pub fn hasher(&self) -> &PasswordHasher {
        &self.hasher
    }

    pub fn access_tokens(&self) -> &AccessTokenCodec {
        &self.access_tokens
    }

    pub fn refresh_tokens(&self) -> &RefreshTokenManager<S> {
        &self.refresh_tokens
    }

    /// Identify the user behind a request's Bearer access token
    ///
    /// # Errors
    /// `Unauthenticated` for any header or token problem
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Uuid, AuthError> {
        let token = extract_bearer_token(headers).map_err(|e| {
            tracing::debug!(error = %e, "No usable bearer token");
            AuthError::Unauthenticated
        })?;

        self.access_tokens.validate(&token).map_err(|e| {
            tracing::warn!(error = %e, "Access token rejected");
            AuthError::Unauthenticated
        })
    }

    /// Check a password and start a session
    ///
    /// An unknown email and a wrong password fail identically.
    ///
    /// # Errors
    /// - `InvalidCredentials` if the email is unknown or the password is wrong
    /// - `Storage` if the store fails
    pub async fn login(&self, email: &str, password: &str) -> Result<SessionTokens, AuthError> {
        let user = with_deadline(self.store_timeout, self.store.get_user_by_email(email)).await?;

        let Some(user) = user else {
            self.run_blocking({
                let hasher = self.hasher.clone();
                let password = password.to_string();
                move || hasher.verify_dummy(&password)
            })
            .await?;
            tracing::debug!(reason = "unknown_email", "Login rejected");
            return Err(AuthError::InvalidCredentials);
        };

        let verified = self
            .run_blocking({
                let hasher = self.hasher.clone();
                let password = password.to_string();
                let stored = user.password_hash.clone();
                move || hasher.verify(&password, &stored)
            })
            .await?;

        match verified {
            Ok(()) => {}
            Err(CredentialError::Mismatch) => {
                tracing::debug!(user_id = %user.id, reason = "password_mismatch", "Login rejected");
                return Err(AuthError::InvalidCredentials);
            }
            Err(CredentialError::Hashing(e)) => {
                tracing::error!(user_id = %user.id, error = %e, "Stored password hash unusable");
                return Err(AuthError::InvalidCredentials);
            }
        }

        let access_token = self.access_tokens.issue(user.id)?;
        let refresh_token = self.refresh_tokens.issue(user.id).await?;

        tracing::info!(user_id = %user.id, "User logged in successfully");

        Ok(SessionTokens {
            user_id: user.id,
            access_token,
            refresh_token: refresh_token.token,
            token_type: "Bearer".to_string(),
            expires_in: self.access_tokens.ttl().num_seconds(),
        })
    }

    /// Exchange a refresh token for a new access token
    ///
    /// The refresh token itself is not rotated.
    ///
    /// # Errors
    /// - `Unauthenticated` if the token is unknown, revoked or expired
    /// - `Storage` if the store fails
    pub async fn refresh(&self, refresh_token: &str) -> Result<String, AuthError> {
        let user_id = self
            .refresh_tokens
            .resolve(refresh_token)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Refresh rejected");
                AuthError::from(e)
            })?;

        let access_token = self.access_tokens.issue(user_id)?;
        tracing::info!(user_id = %user_id, "Access token refreshed");
        Ok(access_token)
    }

    /// Revoke a refresh token
    ///
    /// # Errors
    /// - `Unauthenticated` if the token is unknown
    /// - `Storage` if the store fails
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        self.refresh_tokens
            .revoke(refresh_token)
            .await
            .map_err(|e| match e {
                RefreshTokenError::NotFound => {
                    tracing::warn!("Logout with unknown refresh token");
                    AuthError::Unauthenticated
                }
                other => AuthError::from(other),
            })?;

        tracing::info!("Refresh token revoked");
        Ok(())
    }

    /// Revoke every session of a user
    pub async fn logout_everywhere(&self, user_id: Uuid) -> Result<u64, AuthError> {
        Ok(self.refresh_tokens.revoke_all_for_user(user_id).await?)
    }

    /// `refresh` with the refresh token carried as `Authorization: Bearer`
    pub async fn refresh_from_headers(&self, headers: &HeaderMap) -> Result<String, AuthError> {
        let token = extract_bearer_token(headers)?;
        self.refresh(&token).await
    }

    /// `logout` with the refresh token carried as `Authorization: Bearer`
    pub async fn logout_from_headers(&self, headers: &HeaderMap) -> Result<(), AuthError> {
        let token = extract_bearer_token(headers)?;
        self.logout(&token).await
    }

    /// Check the password policy, then hash off the async runtime
    ///
    /// # Errors
    /// - `InvalidInput` if the password is too short or too long
    /// - `Internal` if hashing fails
    pub async fn hash_password(&self, password: &str) -> Result<HashedCredential, AuthError> {
        validate_password_strength(password, self.min_password_length)?;

        self.run_blocking({
            let hasher = self.hasher.clone();
            let password = password.to_string();
            move || hasher.hash(&password)
        })
        .await?
        .map_err(|e| AuthError::Internal(e.to_string()))
    }

    // bcrypt is CPU bound; keep it off the async workers.
    async fn run_blocking<T, F>(&self, work: F) -> Result<T, AuthError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        tokio::task::spawn_blocking(work)
            .await
            .map_err(|e| AuthError::Internal(format!("blocking task failed: {}", e)))
    }
}
