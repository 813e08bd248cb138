//! Postgres credential store against a real database.
//!
//! Each test creates its own database and runs the migrations. Run with
//! `cargo test -- --ignored` while Postgres is reachable through the
//! `database` settings (defaults: postgres:password@localhost:5432).

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, SubsecRound, Utc};
use sqlx::{Connection, Executor, PgConnection};
use uuid::Uuid;

use chirpy_auth::auth::{generate_refresh_token, RefreshTokenManager};
use chirpy_auth::clock::{Clock, ManualClock};
use chirpy_auth::configuration::{get_configuration, AuthSettings, DatabaseSettings};
use chirpy_auth::error::{RefreshTokenError, StoreError};
use chirpy_auth::store::{CredentialStore, PgCredentialStore, RefreshTokenRecord, UserRecord};

async fn configure_database() -> PgCredentialStore {
    let mut settings: DatabaseSettings = get_configuration()
        .map(|c| c.database)
        .unwrap_or_default();
    settings.database_name = Uuid::new_v4().to_string();

    let mut connection = PgConnection::connect(&settings.connection_string_without_db())
        .await
        .expect("Failed to connect to Postgres");
    connection
        .execute(&*format!(r#"CREATE DATABASE "{}";"#, settings.database_name))
        .await
        .expect("Failed to create database.");

    let store = PgCredentialStore::connect_lazy(&settings).expect("Failed to build pool");
    store.migrate().await.expect("Failed to migrate the database.");
    store
}

async fn insert_user(store: &PgCredentialStore, email: &str) -> Uuid {
    let id = Uuid::new_v4();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO users (id, email, hashed_password, created_at, updated_at) VALUES ($1, $2, $3, $4, $4)",
    )
    .bind(id)
    .bind(email)
    .bind("$2b$04$not.a.real.hash.but.never.verified.here.............")
    .bind(now)
    .execute(store.pool())
    .await
    .expect("Failed to insert user");
    id
}

// Postgres keeps microseconds; whole seconds survive the round trip exactly.
fn now_seconds() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

fn manager<S: CredentialStore>(store: Arc<S>) -> (RefreshTokenManager<S>, ManualClock) {
    let clock = ManualClock::new(now_seconds());
    let settings = AuthSettings::with_secret("postgres-test-secret");
    (RefreshTokenManager::new(store, &settings, Arc::new(clock.clone())), clock)
}

/// Writes every refresh token under one fixed value
struct FixedTokenStore {
    inner: PgCredentialStore,
    token: String,
}

#[async_trait]
impl CredentialStore for FixedTokenStore {
    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        self.inner.get_user_by_email(email).await
    }

    async fn create_refresh_token(
        &self,
        _token: &str,
        user_id: Uuid,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshTokenRecord, StoreError> {
        self.inner
            .create_refresh_token(&self.token, user_id, created_at, expires_at)
            .await
    }

    async fn get_refresh_token(&self, token: &str) -> Result<Option<RefreshTokenRecord>, StoreError> {
        self.inner.get_refresh_token(token).await
    }

    async fn revoke_refresh_token(
        &self,
        token: &str,
        revoked_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.inner.revoke_refresh_token(token, revoked_at).await
    }

    async fn revoke_user_refresh_tokens(
        &self,
        user_id: Uuid,
        revoked_at: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        self.inner.revoke_user_refresh_tokens(user_id, revoked_at).await
    }
}

#[tokio::test]
#[ignore = "requires a running Postgres"]
async fn user_lookup_by_email() {
    let store = configure_database().await;
    let user_id = insert_user(&store, "walt@example.com").await;

    let found = store.get_user_by_email("walt@example.com").await.unwrap();
    assert_eq!(found.map(|u| u.id), Some(user_id));
    assert!(store.get_user_by_email("jesse@example.com").await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires a running Postgres"]
async fn refresh_token_is_stored_as_digest_and_found_by_plaintext() {
    let store = configure_database().await;
    let user_id = insert_user(&store, "walt@example.com").await;
    let token = generate_refresh_token();
    let now = now_seconds();

    store
        .create_refresh_token(&token, user_id, now, now + Duration::days(60))
        .await
        .unwrap();

    let stored: String = sqlx::query_scalar("SELECT token_hash FROM refresh_tokens")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_ne!(stored, token);
    assert_eq!(stored.len(), 64);

    let record = store.get_refresh_token(&token).await.unwrap().unwrap();
    assert_eq!(record.user_id, user_id);
    assert_eq!(record.expires_at, now + Duration::days(60));
    assert_eq!(record.revoked_at, None);
    assert!(store.get_refresh_token(&generate_refresh_token()).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires a running Postgres"]
async fn duplicate_token_is_a_unique_violation() {
    let store = configure_database().await;
    let user_id = insert_user(&store, "walt@example.com").await;
    let token = generate_refresh_token();
    let now = now_seconds();

    store
        .create_refresh_token(&token, user_id, now, now + Duration::days(60))
        .await
        .unwrap();
    let second = store
        .create_refresh_token(&token, user_id, now, now + Duration::days(60))
        .await;

    assert_eq!(second, Err(StoreError::UniqueViolation));
}

#[tokio::test]
#[ignore = "requires a running Postgres"]
async fn colliding_refresh_token_fails_issue() {
    let store = configure_database().await;
    let user_id = insert_user(&store, "walt@example.com").await;
    let fixed = Arc::new(FixedTokenStore {
        inner: store,
        token: generate_refresh_token(),
    });
    let (manager, _) = manager(fixed);

    manager.issue(user_id).await.unwrap();
    assert_eq!(manager.issue(user_id).await, Err(RefreshTokenError::Collision));
}

#[tokio::test]
#[ignore = "requires a running Postgres"]
async fn revoking_twice_keeps_first_timestamp() {
    let store = Arc::new(configure_database().await);
    let user_id = insert_user(&store, "walt@example.com").await;
    let (manager, clock) = manager(store.clone());
    let record = manager.issue(user_id).await.unwrap();
    let first_revocation = clock.now();

    manager.revoke(&record.token).await.unwrap();
    clock.advance(Duration::minutes(5));
    manager.revoke(&record.token).await.unwrap();

    let stored = store.get_refresh_token(&record.token).await.unwrap().unwrap();
    assert_eq!(stored.revoked_at, Some(first_revocation));
}

#[tokio::test]
#[ignore = "requires a running Postgres"]
async fn revoked_token_resolves_as_revoked() {
    let store = Arc::new(configure_database().await);
    let user_id = insert_user(&store, "walt@example.com").await;
    let (manager, _) = manager(store);
    let record = manager.issue(user_id).await.unwrap();

    assert_eq!(manager.resolve(&record.token).await, Ok(user_id));
    manager.revoke(&record.token).await.unwrap();
    assert_eq!(manager.resolve(&record.token).await, Err(RefreshTokenError::Revoked));
    assert_eq!(
        manager.revoke(&generate_refresh_token()).await,
        Err(RefreshTokenError::NotFound)
    );
}

#[tokio::test]
#[ignore = "requires a running Postgres"]
async fn revoke_all_for_user_skips_other_users() {
    let store = Arc::new(configure_database().await);
    let walt = insert_user(&store, "walt@example.com").await;
    let jesse = insert_user(&store, "jesse@example.com").await;
    let (manager, _) = manager(store);

    let a = manager.issue(walt).await.unwrap();
    let b = manager.issue(walt).await.unwrap();
    let other = manager.issue(jesse).await.unwrap();
    manager.revoke(&a.token).await.unwrap();

    assert_eq!(manager.revoke_all_for_user(walt).await, Ok(1));
    assert_eq!(manager.resolve(&b.token).await, Err(RefreshTokenError::Revoked));
    assert_eq!(manager.resolve(&other.token).await, Ok(jesse));
}
