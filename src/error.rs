/// Error Handling Module
///
/// Each component reports its own failure kinds. Only `AuthError` is meant to
/// reach a client: the facade collapses every token and credential failure
/// into it so responses never reveal which check rejected a request.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use thiserror::Error;

// ============================================================================
// 1. COMPONENT ERROR TYPES
// ============================================================================

/// Validation errors for caller-supplied input
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} is empty")]
    EmptyField(String),
    #[error("{0} is too short (minimum {1} characters)")]
    TooShort(String, usize),
    #[error("{0} is too long (maximum {1} bytes)")]
    TooLong(String, usize),
}

/// Failures while reading a Bearer token out of request headers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BearerError {
    #[error("authorization header not provided")]
    MissingHeader,
    #[error("malformed authorization header")]
    MalformedHeader,
}

/// Access token issuance and validation failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token signature is invalid")]
    SignatureInvalid,
    #[error("token issuer does not match")]
    IssuerMismatch,
    #[error("token subject is not a valid user id")]
    Malformed,
    #[error("token has expired")]
    Expired,
    #[error("token signing failed: {0}")]
    Signing(String),
}

/// Password hashing and verification failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error("password does not match")]
    Mismatch,
}

/// Failures reported by a credential store implementation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("duplicate entry")]
    UniqueViolation,
    #[error("store call exceeded its deadline")]
    Timeout,
    #[error("store error: {0}")]
    Backend(String),
}

/// Refresh token lifecycle failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshTokenError {
    #[error("refresh token not found")]
    NotFound,
    #[error("refresh token has been revoked")]
    Revoked,
    #[error("refresh token has expired")]
    Expired,
    #[error("generated refresh token collided with an existing one")]
    Collision,
    #[error("refresh token expiry is out of range")]
    ExpiryOutOfRange,
    #[error(transparent)]
    Storage(#[from] StoreError),
}

// ============================================================================
// 2. CLIENT-VISIBLE ERROR TYPE
// ============================================================================

/// Outcome of a facade call as seen by the HTTP layer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("unauthenticated")]
    Unauthenticated,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error(transparent)]
    InvalidInput(ValidationError),
    #[error(transparent)]
    Storage(StoreError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ValidationError> for AuthError {
    fn from(err: ValidationError) -> Self {
        AuthError::InvalidInput(err)
    }
}

impl From<BearerError> for AuthError {
    fn from(_: BearerError) -> Self {
        AuthError::Unauthenticated
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Signing(msg) => AuthError::Internal(msg),
            _ => AuthError::Unauthenticated,
        }
    }
}

impl From<RefreshTokenError> for AuthError {
    fn from(err: RefreshTokenError) -> Self {
        match err {
            RefreshTokenError::Storage(e) => AuthError::Storage(e),
            RefreshTokenError::Collision => {
                AuthError::Internal("refresh token collision".to_string())
            }
            RefreshTokenError::ExpiryOutOfRange => {
                AuthError::Internal("refresh token expiry out of range".to_string())
            }
            RefreshTokenError::NotFound
            | RefreshTokenError::Revoked
            | RefreshTokenError::Expired => AuthError::Unauthenticated,
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        AuthError::Storage(err)
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                StoreError::UniqueViolation
            }
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

// ============================================================================
// 3. HTTP RESPONSE MAPPING
// ============================================================================

/// Error response structure for HTTP responses
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    /// Unique error ID for correlating with server logs
    pub error_id: String,
    /// Human-readable error message
    pub message: String,
    /// Error code for client-side handling
    pub code: String,
    /// HTTP status code
    pub status: u16,
    /// Timestamp when error occurred
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_id: String, message: String, code: String, status: u16) -> Self {
        Self {
            error_id,
            message,
            code,
            status,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

impl AuthError {
    fn parts(&self) -> (StatusCode, &'static str, &'static str) {
        match self {
            AuthError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHENTICATED",
                "Missing, invalid or expired credentials",
            ),
            AuthError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "INVALID_CREDENTIALS",
                "Incorrect email or password",
            ),
            AuthError::InvalidInput(_) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                "Invalid input",
            ),
            AuthError::Storage(StoreError::Timeout) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                "Storage temporarily unavailable",
            ),
            AuthError::Storage(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "STORAGE_ERROR",
                "Storage error occurred",
            ),
            AuthError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal server error",
            ),
        }
    }

    pub fn log_error(&self, error_id: &str) {
        match self {
            AuthError::Unauthenticated | AuthError::InvalidCredentials => {
                tracing::warn!(error_id = error_id, error = %self, "Authentication rejected");
            }
            AuthError::InvalidInput(e) => {
                tracing::info!(error_id = error_id, error = %e, "Input rejected");
            }
            AuthError::Storage(e) => {
                tracing::error!(error_id = error_id, error = %e, "Credential store error");
            }
            AuthError::Internal(msg) => {
                tracing::error!(error_id = error_id, error = %msg, "Internal error");
            }
        }
    }
}

impl ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        self.parts().0
    }

    fn error_response(&self) -> HttpResponse {
        let error_id = uuid::Uuid::new_v4().to_string();
        self.log_error(&error_id);

        let (status, code, message) = self.parts();
        let message = match self {
            AuthError::InvalidInput(e) => e.to_string(),
            _ => message.to_string(),
        };
        HttpResponse::build(status).json(ErrorResponse::new(
            error_id,
            message,
            code.to_string(),
            status.as_u16(),
        ))
    }
}
