/// JWT Authentication Middleware
///
/// Runs `AuthService::authenticate` on every request of a protected scope
/// and injects the resulting `AuthenticatedUser` into request extensions.

use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    Error, FromRequest, HttpMessage, HttpRequest,
};
use futures::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::rc::Rc;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::AuthError;
use crate::service::AuthService;
use crate::store::CredentialStore;

/// Identity established by `JwtMiddleware`
///
/// Usable as a handler argument inside a protected scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
}

impl FromRequest for AuthenticatedUser {
    type Error = AuthError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthenticatedUser>()
                .copied()
                .ok_or(AuthError::Unauthenticated),
        )
    }
}

/// JWT middleware for protecting routes
pub struct JwtMiddleware<S> {
    auth: Arc<AuthService<S>>,
}

impl<S> JwtMiddleware<S> {
    pub fn new(auth: Arc<AuthService<S>>) -> Self {
        Self { auth }
    }
}

impl<St, B, S> Transform<St, ServiceRequest> for JwtMiddleware<S>
where
    St: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    St::Future: 'static,
    B: 'static,
    S: CredentialStore + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = JwtMiddlewareService<St, S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: St) -> Self::Future {
        ready(Ok(JwtMiddlewareService {
            service: Rc::new(service),
            auth: Arc::clone(&self.auth),
        }))
    }
}

pub struct JwtMiddlewareService<St, S> {
    service: Rc<St>,
    auth: Arc<AuthService<S>>,
}

impl<St, B, S> Service<ServiceRequest> for JwtMiddlewareService<St, S>
where
    St: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    St::Future: 'static,
    B: 'static,
    S: CredentialStore + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        match self.auth.authenticate(req.headers()) {
            Ok(user_id) => {
                req.extensions_mut().insert(AuthenticatedUser { user_id });
                tracing::debug!(user_id = %user_id, "JWT validated successfully");

                let service = Rc::clone(&self.service);
                Box::pin(async move { service.call(req).await })
            }
            Err(e) => Box::pin(async move { Err(e.into()) }),
        }
    }
}
