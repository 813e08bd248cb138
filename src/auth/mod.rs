/// Authentication module
///
/// Password hashing, Bearer header parsing, access token issuance and
/// validation, and refresh token lifecycle management.

mod bearer;
mod claims;
mod jwt;
mod password;
mod refresh_token;

pub use bearer::extract_bearer_token;
pub use claims::Claims;
pub use jwt::AccessTokenCodec;
pub use password::validate_password_strength;
pub use password::{HashedCredential, PasswordHasher, MAX_BCRYPT_COST, MIN_BCRYPT_COST};
pub use refresh_token::generate_refresh_token;
pub use refresh_token::RefreshTokenManager;
