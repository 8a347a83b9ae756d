//! Session issuance: the single path that mints an access + refresh token
//! pair. Local login, registration, rotation, and SSO provisioning all end
//! up here, so no credential source gets special-cased token behavior.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::jwt::generate_access_token;
use crate::auth::refresh_token::{issue_refresh_token, TokenContext};
use crate::configuration::{JwtSettings, SessionSettings};
use crate::error::AppError;

/// A full token pair as handed to the routing layer.
#[derive(Debug)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub refresh_expires_at: DateTime<Utc>,
}

/// Mint an access token and a ledger-backed refresh token for a principal.
pub async fn issue_session(
    pool: &PgPool,
    user_id: Uuid,
    email: &str,
    jwt: &JwtSettings,
    session: &SessionSettings,
    context: &TokenContext,
) -> Result<TokenPair, AppError> {
    let access_token = generate_access_token(&user_id, email, jwt)?;
    let refresh = issue_refresh_token(pool, user_id, jwt, session, context).await?;

    Ok(TokenPair {
        access_token,
        refresh_token: refresh.token,
        refresh_expires_at: refresh.expires_at,
    })
}
