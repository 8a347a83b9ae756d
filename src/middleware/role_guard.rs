//! Role gate middleware.
//!
//! Runs after session authentication and rejects with 403 when the
//! resolved role is not in the operation's allowed set. A missing
//! identity here means the scope was wired without [`super::SessionAuth`],
//! which is treated as unauthenticated rather than allowed through.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;

use crate::auth::{authorize, Role};
use crate::error::{AppError, AuthError};
use crate::middleware::CurrentUser;

pub struct RequireRole {
    allowed: &'static [Role],
}

impl RequireRole {
    pub fn new(allowed: &'static [Role]) -> Self {
        Self { allowed }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequireRole
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequireRoleService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(RequireRoleService {
            service: Rc::new(service),
            allowed: self.allowed,
        }))
    }
}

pub struct RequireRoleService<S> {
    service: Rc<S>,
    allowed: &'static [Role],
}

impl<S, B> Service<ServiceRequest> for RequireRoleService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let allowed = self.allowed;

        let user = req.extensions().get::<CurrentUser>().cloned();

        Box::pin(async move {
            let user = match user {
                Some(user) => user,
                None => return Err(AppError::Auth(AuthError::Unauthenticated).into()),
            };

            if let Err(e) = authorize(user.role, allowed) {
                tracing::warn!(
                    user_id = %user.id,
                    role = %user.role,
                    "Role not permitted for this operation"
                );
                return Err(e.into());
            }

            service.call(req).await
        })
    }
}
