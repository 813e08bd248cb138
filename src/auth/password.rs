/// Password Hashing and Verification
///
/// bcrypt with a configurable cost. The hash string embeds its own salt and
/// cost, so verification needs nothing but the stored value.

use std::fmt;
use std::sync::Arc;

use crate::error::{CredentialError, ValidationError};

pub const MIN_BCRYPT_COST: u32 = 4;
pub const MAX_BCRYPT_COST: u32 = 31;

// bcrypt ignores input past 72 bytes
const MAX_PASSWORD_BYTES: usize = 72;

/// A stored one-way password hash.
///
/// Never printed: `Debug` is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct HashedCredential(String);

impl HashedCredential {
    /// Wrap a hash loaded from storage
    pub fn from_stored(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for HashedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HashedCredential(<redacted>)")
    }
}

const DUMMY_PASSWORD: &str = "chirpy-dummy-credential";

/// Hashes and verifies user passwords
#[derive(Clone)]
pub struct PasswordHasher {
    cost: u32,
    dummy_hash: Option<Arc<str>>,
}

impl PasswordHasher {
    /// Build a hasher, paying for the dummy hash up front so the first
    /// unknown-email login costs no more than later ones.
    pub fn new(cost: u32) -> Self {
        let dummy_hash = match bcrypt::hash(DUMMY_PASSWORD, cost) {
            Ok(hash) => Some(Arc::from(hash)),
            Err(e) => {
                tracing::error!(error = %e, cost = cost, "Failed to prepare dummy password hash");
                None
            }
        };

        Self { cost, dummy_hash }
    }

    /// Hash a password
    ///
    /// # Errors
    /// Returns `CredentialError::Hashing` for an empty password or if bcrypt fails
    pub fn hash(&self, password: &str) -> Result<HashedCredential, CredentialError> {
        if password.is_empty() {
            return Err(CredentialError::Hashing("password is empty".to_string()));
        }

        bcrypt::hash(password, self.cost)
            .map(HashedCredential)
            .map_err(|e| CredentialError::Hashing(e.to_string()))
    }

    /// Verify a password against its stored hash
    ///
    /// # Errors
    /// - `CredentialError::Mismatch` if the password is wrong
    /// - `CredentialError::Hashing` if the stored hash cannot be parsed
    pub fn verify(&self, password: &str, stored: &HashedCredential) -> Result<(), CredentialError> {
        match bcrypt::verify(password, stored.as_str()) {
            Ok(true) => Ok(()),
            Ok(false) => Err(CredentialError::Mismatch),
            Err(e) => Err(CredentialError::Hashing(e.to_string())),
        }
    }

    /// Spend the same work as `verify` without a real hash.
    ///
    /// Used when no account matches a login so both rejection paths take
    /// comparable time.
    pub fn verify_dummy(&self, password: &str) {
        if let Some(hash) = &self.dummy_hash {
            let _ = bcrypt::verify(password, hash);
        }
    }
}

/// Validate password policy for callers creating or changing credentials
///
/// Requirements:
/// - At least `min_length` characters
/// - At most 72 bytes (bcrypt input limit)
pub fn validate_password_strength(password: &str, min_length: usize) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::EmptyField("password".to_string()));
    }

    if password.chars().count() < min_length {
        return Err(ValidationError::TooShort("password".to_string(), min_length));
    }

    if password.len() > MAX_PASSWORD_BYTES {
        return Err(ValidationError::TooLong("password".to_string(), MAX_PASSWORD_BYTES));
    }

    Ok(())
}
