//! CSRF check for cookie-based sessions.
//!
//! Only state-mutating methods are checked, and only while cookie transport
//! is enabled. Requests presenting a bearer Authorization header are exempt:
//! a header the browser never attaches on its own is not subject to
//! ambient-credential forgery.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::Method,
    web, Error,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;

use crate::auth::{client_identity, CsrfStore, CSRF_HEADER};
use crate::error::{AppError, AuthError};

pub struct CsrfProtect {
    store: web::Data<CsrfStore>,
    enabled: bool,
}

impl CsrfProtect {
    pub fn new(store: web::Data<CsrfStore>, enabled: bool) -> Self {
        Self { store, enabled }
    }
}

impl<S, B> Transform<S, ServiceRequest> for CsrfProtect
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = CsrfProtectService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(CsrfProtectService {
            service: Rc::new(service),
            store: self.store.clone(),
            enabled: self.enabled,
        }))
    }
}

pub struct CsrfProtectService<S> {
    service: Rc<S>,
    store: web::Data<CsrfStore>,
    enabled: bool,
}

fn is_mutating(method: &Method) -> bool {
    method == Method::POST
        || method == Method::PUT
        || method == Method::PATCH
        || method == Method::DELETE
}

impl<S, B> Service<ServiceRequest> for CsrfProtectService<S>
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

        let must_check = self.enabled
            && is_mutating(req.method())
            && !req.headers().contains_key("Authorization");

        if must_check {
            let identity = client_identity(req.request());
            let presented = req
                .headers()
                .get(CSRF_HEADER)
                .and_then(|h| h.to_str().ok())
                .unwrap_or("");

            if !self.store.validate(&identity, presented) {
                tracing::warn!(identity = %identity, "CSRF token missing or invalid");
                return Box::pin(async move {
                    Err(AppError::Auth(AuthError::CsrfRejected).into())
                });
            }
        }

        Box::pin(async move { service.call(req).await })
    }
}
