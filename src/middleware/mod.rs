/// Middleware module
///
/// actix-web adapters that put the authentication facade in front of routes.

mod jwt_middleware;

pub use jwt_middleware::{AuthenticatedUser, JwtMiddleware};
