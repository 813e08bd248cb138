/// In-memory credential store
///
/// Backs tests and single-process embeddings. Each method holds the lock for
/// its whole body, so every call is atomic just like a single SQL statement.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::auth::HashedCredential;
use crate::error::StoreError;
use crate::store::{CredentialStore, RefreshTokenRecord, UserRecord};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, UserRecord>,
    refresh_tokens: HashMap<String, RefreshTokenRecord>,
    failure: Option<StoreError>,
}

#[derive(Default)]
pub struct InMemoryCredentialStore {
    tables: Mutex<Tables>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a user row
    ///
    /// # Errors
    /// Returns `StoreError::UniqueViolation` if the email is taken
    pub fn add_user(
        &self,
        email: &str,
        password_hash: HashedCredential,
    ) -> Result<UserRecord, StoreError> {
        let mut tables = self.lock();
        if tables.users.values().any(|u| u.email == email) {
            return Err(StoreError::UniqueViolation);
        }

        let now = Utc::now();
        let user = UserRecord {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    /// Make every following call fail with `failure` until cleared with `None`
    pub fn set_failure(&self, failure: Option<StoreError>) {
        self.lock().failure = failure;
    }

    pub fn refresh_token_count(&self) -> usize {
        self.lock().refresh_tokens.len()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn checked(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        let tables = self.lock();
        match &tables.failure {
            Some(err) => Err(err.clone()),
            None => Ok(tables),
        }
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let tables = self.checked()?;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn create_refresh_token(
        &self,
        token: &str,
        user_id: Uuid,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshTokenRecord, StoreError> {
        let mut tables = self.checked()?;
        if tables.refresh_tokens.contains_key(token) {
            return Err(StoreError::UniqueViolation);
        }

        let record = RefreshTokenRecord {
            token: token.to_string(),
            user_id,
            created_at,
            expires_at,
            revoked_at: None,
        };
        tables
            .refresh_tokens
            .insert(token.to_string(), record.clone());
        Ok(record)
    }

    async fn get_refresh_token(&self, token: &str) -> Result<Option<RefreshTokenRecord>, StoreError> {
        let tables = self.checked()?;
        Ok(tables.refresh_tokens.get(token).cloned())
    }

    async fn revoke_refresh_token(
        &self,
        token: &str,
        revoked_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut tables = self.checked()?;
        match tables.refresh_tokens.get_mut(token) {
            Some(record) => {
                record.revoked_at.get_or_insert(revoked_at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn revoke_user_refresh_tokens(
        &self,
        user_id: Uuid,
        revoked_at: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let mut tables = self.checked()?;
        let mut revoked = 0;
        for record in tables
            .refresh_tokens
            .values_mut()
            .filter(|r| r.user_id == user_id && r.revoked_at.is_none())
        {
            record.revoked_at = Some(revoked_at);
            revoked += 1;
        }
        Ok(revoked)
    }
}
