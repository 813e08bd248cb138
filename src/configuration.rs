use config::ConfigError;

use crate::auth::{MAX_BCRYPT_COST, MIN_BCRYPT_COST};

/// Longest lifetime or leeway accepted for any token setting (ten years)
pub const MAX_LIFETIME_SECONDS: i64 = 10 * 365 * 24 * 60 * 60;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    #[serde(default)]
    pub database: DatabaseSettings,
    pub auth: AuthSettings,
}

#[derive(serde::Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            username: "postgres".to_string(),
            password: "password".to_string(),
            port: 5432,
            host: "localhost".to_string(),
            database_name: "chirpy".to_string(),
            max_connections: 5,
        }
    }
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }

    /// Server URL without a database, for creating one
    pub fn connection_string_without_db(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}",
            self.username, self.password, self.host, self.port
        )
    }
}

/// Token and credential settings
#[derive(serde::Deserialize, Clone)]
pub struct AuthSettings {
    pub jwt_secret: String,
    #[serde(default = "default_issuer")]
    pub issuer: String,
    #[serde(default = "default_access_token_expiry")]
    pub access_token_expiry: i64,        // seconds (3600 = 60 minutes)
    #[serde(default = "default_refresh_token_expiry_hours")]
    pub refresh_token_expiry_hours: i64, // hours (1440 = 60 days)
    #[serde(default)]
    pub clock_skew_leeway: i64,          // seconds added to `exp` before comparing
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
    #[serde(default = "default_min_password_length")]
    pub min_password_length: usize,
}

fn default_issuer() -> String {
    "chirpy-issuer".to_string()
}

fn default_access_token_expiry() -> i64 {
    60 * 60
}

fn default_refresh_token_expiry_hours() -> i64 {
    1440
}

fn default_bcrypt_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

fn default_store_timeout_ms() -> u64 {
    3000
}

fn default_min_password_length() -> usize {
    6
}

impl AuthSettings {
    /// Settings with every default applied around the given secret
    pub fn with_secret(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            issuer: default_issuer(),
            access_token_expiry: default_access_token_expiry(),
            refresh_token_expiry_hours: default_refresh_token_expiry_hours(),
            clock_skew_leeway: 0,
            bcrypt_cost: default_bcrypt_cost(),
            store_timeout_ms: default_store_timeout_ms(),
            min_password_length: default_min_password_length(),
        }
    }

    // Accessors clamp to the range `validate` accepts, so unchecked settings
    // can never build an out-of-range duration.
    pub fn access_token_ttl(&self) -> chrono::Duration {
        bounded_seconds(self.access_token_expiry)
    }

    pub fn refresh_token_ttl(&self) -> chrono::Duration {
        bounded_seconds(self.refresh_token_expiry_hours.saturating_mul(60 * 60))
    }

    pub fn leeway(&self) -> chrono::Duration {
        bounded_seconds(self.clock_skew_leeway)
    }

    pub fn store_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.store_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.trim().is_empty() {
            return Err(ConfigError::Message("auth.jwt_secret must be set".to_string()));
        }
        if self.issuer.is_empty() {
            return Err(ConfigError::Message("auth.issuer must not be empty".to_string()));
        }
        if !(1..=MAX_LIFETIME_SECONDS).contains(&self.access_token_expiry) {
            return Err(ConfigError::Message(format!(
                "auth.access_token_expiry must be between 1 and {} seconds",
                MAX_LIFETIME_SECONDS
            )));
        }
        if !(1..=MAX_LIFETIME_SECONDS / 3600).contains(&self.refresh_token_expiry_hours) {
            return Err(ConfigError::Message(format!(
                "auth.refresh_token_expiry_hours must be between 1 and {} hours",
                MAX_LIFETIME_SECONDS / 3600
            )));
        }
        if !(0..=MAX_LIFETIME_SECONDS).contains(&self.clock_skew_leeway) {
            return Err(ConfigError::Message(format!(
                "auth.clock_skew_leeway must be between 0 and {} seconds",
                MAX_LIFETIME_SECONDS
            )));
        }
        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&self.bcrypt_cost) {
            return Err(ConfigError::Message(format!(
                "auth.bcrypt_cost must be between {} and {}",
                MIN_BCRYPT_COST, MAX_BCRYPT_COST
            )));
        }
        Ok(())
    }
}

fn bounded_seconds(seconds: i64) -> chrono::Duration {
    chrono::Duration::try_seconds(seconds.clamp(0, MAX_LIFETIME_SECONDS))
        .unwrap_or_else(chrono::Duration::zero)
}

/// Load settings from `configuration.*` and `APP__SECTION__KEY` variables.
///
/// A `.env` file in the working directory is read first when present.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    dotenvy::dotenv().ok();

    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;
    let settings = settings.try_deserialize::<Settings>()?;
    settings.auth.validate()?;
    Ok(settings)
}
