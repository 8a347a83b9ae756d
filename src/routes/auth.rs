//! Authentication routes: registration, login, token refresh, logout, and
//! current-user lookup.

use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::{
    generate_access_token, hash_password, issue_session, revoke_refresh_token,
    rotate_refresh_token, verify_password, Role, TokenContext, TokenPair,
};
use crate::configuration::{JwtSettings, SessionSettings};
use crate::error::{AppError, AuthError, ValidationError};
use crate::middleware::CurrentUser;
use crate::routes::{ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use crate::security::LoginRateLimiter;
use crate::validators::{is_valid_email, is_valid_name};

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    /// Defaults to Employee when omitted
    pub role: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Default)]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub refresh_expires_at: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[derive(Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub created_at: String,
}

/// Request context recorded with each refresh-token issuance.
fn token_context(req: &HttpRequest) -> TokenContext {
    TokenContext {
        ip: req
            .connection_info()
            .realip_remote_addr()
            .map(str::to_string),
        user_agent: req
            .headers()
            .get("User-Agent")
            .and_then(|h| h.to_str().ok())
            .map(str::to_string),
        device_id: req
            .headers()
            .get("X-Device-Id")
            .and_then(|h| h.to_str().ok())
            .map(str::to_string),
    }
}

fn session_cookie(name: &'static str, value: String, max_age_seconds: i64, secure: bool) -> Cookie<'static> {
    Cookie::build(name, value)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(secure)
        .max_age(CookieDuration::seconds(max_age_seconds))
        .finish()
}

fn expired_cookie(name: &'static str) -> Cookie<'static> {
    Cookie::build(name, "")
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .max_age(CookieDuration::ZERO)
        .finish()
}

/// Build the token response, attaching session cookies when cookie
/// transport is enabled. Cookie lifetimes track the token lifetimes.
fn token_response(
    status_created: bool,
    pair: TokenPair,
    jwt: &JwtSettings,
    session: &SessionSettings,
) -> HttpResponse {
    let mut builder = if status_created {
        HttpResponse::Created()
    } else {
        HttpResponse::Ok()
    };

    if session.use_cookies {
        builder.cookie(session_cookie(
            ACCESS_TOKEN_COOKIE,
            pair.access_token.clone(),
            jwt.access_token_expiry,
            session.secure_cookies,
        ));
        builder.cookie(session_cookie(
            REFRESH_TOKEN_COOKIE,
            pair.refresh_token.clone(),
            jwt.refresh_token_expiry,
            session.secure_cookies,
        ));
    }

    builder.json(AuthResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        refresh_expires_at: pair.refresh_expires_at.to_rfc3339(),
        token_type: "Bearer".to_string(),
        expires_in: jwt.access_token_expiry,
    })
}

/// POST /auth/register
///
/// Bootstrap registration with email, password, name, and an optional role.
///
/// # Errors
/// - 400: invalid email/password/name/role
/// - 409: email already registered
pub async fn register(
    req: HttpRequest,
    form: web::Json<RegisterRequest>,
    pool: web::Data<PgPool>,
    jwt: web::Data<JwtSettings>,
    session: web::Data<SessionSettings>,
) -> Result<HttpResponse, AppError> {
    let email = is_valid_email(&form.email)?;
    let name = is_valid_name(&form.name)?;
    let password_hash = hash_password(&form.password)?;

    let role: Role = form
        .role
        .as_deref()
        .unwrap_or("Employee")
        .parse()
        .map_err(|_| AppError::Validation(ValidationError::InvalidFormat("role".to_string())))?;

    let user_id = Uuid::new_v4();
    let now = Utc::now();
    sqlx::query(
        r#"
        INSERT INTO users (id, email, name, password_hash, role_id, created_at, updated_at)
        VALUES ($1, $2, $3, $4, (SELECT id FROM roles WHERE name = $5), $6, $6)
        "#,
    )
    .bind(user_id)
    .bind(&email)
    .bind(&name)
    .bind(&password_hash)
    .bind(role.as_str())
    .bind(now)
    .execute(pool.get_ref())
    .await?;

    let pair = issue_session(
        pool.get_ref(),
        user_id,
        &email,
        jwt.get_ref(),
        session.get_ref(),
        &token_context(&req),
    )
    .await?;

    tracing::info!(user_id = %user_id, role = %role, "User registered");

    Ok(token_response(true, pair, jwt.get_ref(), session.get_ref()))
}

/// POST /auth/login
///
/// Authenticates with email and password and returns a token pair.
///
/// "Unknown email" and "wrong password" are deliberately indistinguishable
/// so accounts cannot be enumerated. SSO-provisioned accounts carry no
/// password hash and always fail local login.
///
/// # Errors
/// - 401: invalid credentials
/// - 429: too many attempts from this client
pub async fn login(
    req: HttpRequest,
    form: web::Json<LoginRequest>,
    pool: web::Data<PgPool>,
    jwt: web::Data<JwtSettings>,
    session: web::Data<SessionSettings>,
    limiter: web::Data<LoginRateLimiter>,
) -> Result<HttpResponse, AppError> {
    let client = req
        .connection_info()
        .realip_remote_addr()
        .unwrap_or("unknown")
        .to_string();
    if !limiter.check(&client) {
        return Err(AppError::RateLimited);
    }

    let email = is_valid_email(&form.email)?;

    let user = sqlx::query_as::<_, (Uuid, String, Option<String>)>(
        "SELECT id, email, password_hash FROM users WHERE email = $1",
    )
    .bind(&email)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or(AppError::Auth(AuthError::InvalidCredentials))?;

    let (user_id, user_email, password_hash) = user;

    let stored_hash = password_hash.ok_or(AppError::Auth(AuthError::InvalidCredentials))?;
    if !verify_password(&form.password, &stored_hash) {
        return Err(AppError::Auth(AuthError::InvalidCredentials));
    }

    let pair = issue_session(
        pool.get_ref(),
        user_id,
        &user_email,
        jwt.get_ref(),
        session.get_ref(),
        &token_context(&req),
    )
    .await?;

    tracing::info!(user_id = %user_id, "User logged in");

    Ok(token_response(false, pair, jwt.get_ref(), session.get_ref()))
}

fn presented_refresh_token(
    req: &HttpRequest,
    form: Option<web::Json<RefreshRequest>>,
    session: &SessionSettings,
) -> Option<String> {
    let from_body = form.and_then(|f| f.into_inner().refresh_token);
    if from_body.is_some() {
        return from_body;
    }
    if session.use_cookies {
        return req
            .cookie(REFRESH_TOKEN_COOKIE)
            .map(|c| c.value().to_string());
    }
    None
}

/// POST /auth/refresh
///
/// Rotates the presented refresh token (body field, or cookie when cookie
/// transport is enabled): the old token is consumed and a new pair issued.
/// Reusing a consumed token is always rejected.
///
/// # Errors
/// - 401: malformed, unknown, expired, or revoked refresh token
pub async fn refresh(
    req: HttpRequest,
    form: Option<web::Json<RefreshRequest>>,
    pool: web::Data<PgPool>,
    jwt: web::Data<JwtSettings>,
    session: web::Data<SessionSettings>,
) -> Result<HttpResponse, AppError> {
    let presented = presented_refresh_token(&req, form, session.get_ref())
        .ok_or(AppError::Auth(AuthError::MalformedRefreshToken))?;

    let (user_id, new_refresh) = rotate_refresh_token(
        pool.get_ref(),
        &presented,
        jwt.get_ref(),
        session.get_ref(),
        &token_context(&req),
    )
    .await?;

    // The ledger outlives its principal only until this lookup
    let user_email = sqlx::query_scalar::<_, String>("SELECT email FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool.get_ref())
        .await?
        .ok_or(AppError::Auth(AuthError::UnknownRefreshToken))?;

    let access_token = generate_access_token(&user_id, &user_email, jwt.get_ref())?;

    let pair = TokenPair {
        access_token,
        refresh_token: new_refresh.token,
        refresh_expires_at: new_refresh.expires_at,
    };

    Ok(token_response(false, pair, jwt.get_ref(), session.get_ref()))
}

/// POST /auth/logout
///
/// Revokes the presented refresh token. Safe to retry: revoking an
/// already-revoked or unknown token is a no-op. Clears session cookies
/// when cookie transport is enabled.
pub async fn logout(
    req: HttpRequest,
    form: Option<web::Json<RefreshRequest>>,
    pool: web::Data<PgPool>,
    session: web::Data<SessionSettings>,
) -> Result<HttpResponse, AppError> {
    if let Some(presented) = presented_refresh_token(&req, form, session.get_ref()) {
        match revoke_refresh_token(pool.get_ref(), &presented, "logout").await {
            // Nothing revocable behind a malformed value
            Err(AppError::Auth(AuthError::MalformedRefreshToken)) => {}
            other => other?,
        }
    }

    let mut builder = HttpResponse::NoContent();
    if session.use_cookies {
        builder.cookie(expired_cookie(ACCESS_TOKEN_COOKIE));
        builder.cookie(expired_cookie(REFRESH_TOKEN_COOKIE));
    }
    Ok(builder.finish())
}

/// GET /api/me
///
/// Current authenticated user's information. Identity is resolved by the
/// session middleware.
pub async fn get_current_user(
    user: web::ReqData<CurrentUser>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let (name, created_at) = sqlx::query_as::<_, (String, chrono::DateTime<Utc>)>(
        "SELECT name, created_at FROM users WHERE id = $1",
    )
    .bind(user.id)
    .fetch_one(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(UserResponse {
        id: user.id.to_string(),
        email: user.email.clone(),
        name,
        role: user.role,
        created_at: created_at.to_rfc3339(),
    }))
}
