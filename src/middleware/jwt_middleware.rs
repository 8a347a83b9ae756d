//! Session authentication middleware.
//!
//! Locates a bearer access token (Authorization header, or the session
//! cookie when cookie transport is enabled), verifies it, resolves the
//! subject to a live user + role, and attaches [`CurrentUser`] to the
//! request extensions. Stateless: the refresh-token ledger is never
//! consulted here.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web, Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use sqlx::PgPool;
use std::rc::Rc;
use uuid::Uuid;

use crate::auth::{validate_access_token, Role};
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};
use crate::routes::ACCESS_TOKEN_COOKIE;

/// The resolved identity attached to every authenticated request.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

pub struct SessionAuth {
    jwt: JwtSettings,
    use_cookies: bool,
}

impl SessionAuth {
    pub fn new(jwt: JwtSettings, use_cookies: bool) -> Self {
        Self { jwt, use_cookies }
    }
}

impl<S, B> Transform<S, ServiceRequest> for SessionAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = SessionAuthService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(SessionAuthService {
            service: Rc::new(service),
            jwt: self.jwt.clone(),
            use_cookies: self.use_cookies,
        }))
    }
}

pub struct SessionAuthService<S> {
    service: Rc<S>,
    jwt: JwtSettings,
    use_cookies: bool,
}

fn extract_bearer_token(req: &ServiceRequest, use_cookies: bool) -> Option<String> {
    let from_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::to_string);

    if from_header.is_some() {
        return from_header;
    }

    if use_cookies {
        return req
            .request()
            .cookie(ACCESS_TOKEN_COOKIE)
            .map(|c| c.value().to_string());
    }

    None
}

impl<S, B> Service<ServiceRequest> for SessionAuthService<S>
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
        let jwt = self.jwt.clone();
        let use_cookies = self.use_cookies;

        Box::pin(async move {
            let token = match extract_bearer_token(&req, use_cookies) {
                Some(token) => token,
                None => {
                    tracing::debug!("No access token on request");
                    return Err(AppError::Auth(AuthError::Unauthenticated).into());
                }
            };

            let claims = validate_access_token(&token, &jwt)?;
            let user_id = claims.user_id()?;

            let pool = req
                .app_data::<web::Data<PgPool>>()
                .cloned()
                .ok_or_else(|| AppError::Internal("database pool missing".to_string()))?;

            // The subject must still exist; a deleted user's tokens die with it
            let row = sqlx::query_as::<_, (Uuid, String, String)>(
                r#"
                SELECT u.id, u.email, r.name
                FROM users u
                JOIN roles r ON r.id = u.role_id
                WHERE u.id = $1
                "#,
            )
            .bind(user_id)
            .fetch_optional(pool.get_ref())
            .await
            .map_err(AppError::from)?;

            let (id, email, role_name) = match row {
                Some(row) => row,
                None => {
                    tracing::warn!(user_id = %user_id, "Access token for vanished user");
                    return Err(AppError::Auth(AuthError::Unauthenticated).into());
                }
            };

            let role: Role = role_name.parse()?;
            req.extensions_mut().insert(CurrentUser { id, email, role });

            service.call(req).await
        })
    }
}
