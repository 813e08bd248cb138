//! Authentication and session credentials for the Chirpy service.
//!
//! Password hashing, HS256 access tokens, and stored refresh tokens, composed
//! behind [`service::AuthService`].

pub mod auth;
pub mod clock;
pub mod configuration;
pub mod error;
pub mod middleware;
pub mod service;
pub mod store;
pub mod telemetry;

pub use error::AuthError;
pub use service::{AuthService, SessionTokens};
