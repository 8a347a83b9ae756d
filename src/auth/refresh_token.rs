//! Refresh-token rotation ledger.
//!
//! A refresh token travels as `"{jti}.{secret}"`: the jti is a public
//! lookup key stored in clear, the secret is a 64-character random value of
//! which only a peppered SHA-256 hash is at rest. A read-only leak of the
//! ledger therefore authenticates nothing.
//!
//! Rotation consumes the presented token and issues a replacement inside a
//! single transaction, locking the jti row. Concurrent rotations of the same
//! token see at most one winner; the rest observe the row as revoked. An
//! already-rotated token presented again is replay and is rejected the same
//! way.

use chrono::{DateTime, Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use crate::configuration::{JwtSettings, SessionSettings};
use crate::error::{AppError, AuthError};

const SECRET_LENGTH: usize = 64;
const WIRE_SEPARATOR: char = '.';

/// Optional request context recorded with each ledger entry.
#[derive(Debug, Clone, Default)]
pub struct TokenContext {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub device_id: Option<String>,
}

/// A freshly minted refresh token. `token` is the wire value handed to the
/// client; the server keeps only the hash.
#[derive(Debug)]
pub struct IssuedRefreshToken {
    pub token: String,
    pub jti: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Generate the secret half of a refresh token. Alphanumeric only, so the
/// wire separator can never appear inside it.
fn generate_refresh_secret() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SECRET_LENGTH)
        .map(char::from)
        .collect()
}

/// Peppered hash of the secret half. The pepper is server-held
/// configuration, never stored next to the hashes.
fn hash_secret(secret: &str, pepper: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(b"|");
    hasher.update(pepper.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Split a presented wire value into (jti, secret).
pub fn parse_refresh_token(presented: &str) -> Result<(Uuid, &str), AppError> {
    let (jti, secret) = presented
        .split_once(WIRE_SEPARATOR)
        .ok_or(AppError::Auth(AuthError::MalformedRefreshToken))?;

    if secret.is_empty() {
        return Err(AppError::Auth(AuthError::MalformedRefreshToken));
    }

    let jti = Uuid::parse_str(jti).map_err(|_| AppError::Auth(AuthError::MalformedRefreshToken))?;
    Ok((jti, secret))
}

async fn persist_record<'e, E>(
    executor: E,
    jti: Uuid,
    user_id: Uuid,
    secret_hash: &str,
    expires_at: DateTime<Utc>,
    context: &TokenContext,
) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (jti, user_id, secret_hash, issued_at, expires_at, ip, user_agent, device_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(jti)
    .bind(user_id)
    .bind(secret_hash)
    .bind(Utc::now())
    .bind(expires_at)
    .bind(&context.ip)
    .bind(&context.user_agent)
    .bind(&context.device_id)
    .execute(executor)
    .await?;

    Ok(())
}

/// Mint a refresh token for a user and persist its ledger record.
pub async fn issue_refresh_token(
    pool: &PgPool,
    user_id: Uuid,
    jwt: &JwtSettings,
    session: &SessionSettings,
    context: &TokenContext,
) -> Result<IssuedRefreshToken, AppError> {
    let jti = Uuid::new_v4();
    let secret = generate_refresh_secret();
    let secret_hash = hash_secret(&secret, &session.refresh_pepper);
    let expires_at = Utc::now() + Duration::seconds(jwt.refresh_token_expiry);

    persist_record(pool, jti, user_id, &secret_hash, expires_at, context).await?;

    Ok(IssuedRefreshToken {
        token: format!("{}{}{}", jti, WIRE_SEPARATOR, secret),
        jti,
        expires_at,
    })
}

/// Consume a presented refresh token and issue its replacement.
///
/// The lookup, validity checks, and mark-as-rotated run as one atomic unit:
/// the jti row is locked for the duration of the transaction, so concurrent
/// rotations of the same token admit exactly one winner.
///
/// Returns the owning user's id together with the replacement token.
pub async fn rotate_refresh_token(
    pool: &PgPool,
    presented: &str,
    jwt: &JwtSettings,
    session: &SessionSettings,
    context: &TokenContext,
) -> Result<(Uuid, IssuedRefreshToken), AppError> {
    let (jti, secret) = parse_refresh_token(presented)?;

    let mut tx = pool.begin().await.map_err(AppError::from)?;

    let record = sqlx::query_as::<
        _,
        (
            Uuid,
            String,
            DateTime<Utc>,
            Option<DateTime<Utc>>,
            Option<DateTime<Utc>>,
        ),
    >(
        r#"
        SELECT user_id, secret_hash, expires_at, revoked_at, rotated_at
        FROM refresh_tokens
        WHERE jti = $1
        FOR UPDATE
        "#,
    )
    .bind(jti)
    .fetch_optional(&mut tx)
    .await?;

    // Unknown jti covers tokens never issued and tokens already swept
    let (user_id, stored_hash, expires_at, revoked_at, rotated_at) = record.ok_or_else(|| {
        tracing::warn!(jti = %jti, "Refresh token not found in ledger");
        AppError::Auth(AuthError::UnknownRefreshToken)
    })?;

    // The hash check also defends against jti guessing
    if hash_secret(secret, &session.refresh_pepper) != stored_hash {
        tracing::warn!(jti = %jti, user_id = %user_id, "Refresh token secret mismatch");
        return Err(AppError::Auth(AuthError::UnknownRefreshToken));
    }

    let now = Utc::now();
    if now > expires_at {
        tracing::info!(jti = %jti, user_id = %user_id, "Refresh token expired");
        return Err(AppError::Auth(AuthError::ExpiredRefreshToken));
    }

    if revoked_at.is_some() {
        // A revoked record with rotated_at set means this token was already
        // consumed by a rotation: replay, whether malicious or a stale retry.
        if rotated_at.is_some() {
            tracing::warn!(
                jti = %jti,
                user_id = %user_id,
                "Refresh token replay detected: token already rotated"
            );
        } else {
            tracing::info!(jti = %jti, user_id = %user_id, "Revoked refresh token presented");
        }
        return Err(AppError::Auth(AuthError::RevokedRefreshToken));
    }

    let new_jti = Uuid::new_v4();
    let new_secret = generate_refresh_secret();
    let new_hash = hash_secret(&new_secret, &session.refresh_pepper);
    let new_expires_at = now + Duration::seconds(jwt.refresh_token_expiry);

    persist_record(&mut tx, new_jti, user_id, &new_hash, new_expires_at, context).await?;

    // The back-reference supports forensic tracing of a rotation chain
    sqlx::query(
        r#"
        UPDATE refresh_tokens
        SET rotated_at = $1, revoked_at = $1, revocation_reason = 'rotated', replaced_by_jti = $2
        WHERE jti = $3
        "#,
    )
    .bind(now)
    .bind(new_jti)
    .bind(jti)
    .execute(&mut tx)
    .await?;

    tx.commit().await.map_err(AppError::from)?;

    tracing::info!(
        old_jti = %jti,
        new_jti = %new_jti,
        user_id = %user_id,
        "Refresh token rotated"
    );

    Ok((
        user_id,
        IssuedRefreshToken {
            token: format!("{}{}{}", new_jti, WIRE_SEPARATOR, new_secret),
            jti: new_jti,
            expires_at: new_expires_at,
        },
    ))
}

/// Idempotently revoke the token behind a presented wire value. A missing
/// or already-revoked record is a no-op, not an error, so retries are
/// always safe.
pub async fn revoke_refresh_token(
    pool: &PgPool,
    presented: &str,
    reason: &str,
) -> Result<(), AppError> {
    let (jti, _secret) = parse_refresh_token(presented)?;

    let result = sqlx::query(
        r#"
        UPDATE refresh_tokens
        SET revoked_at = $1, revocation_reason = $2
        WHERE jti = $3 AND revoked_at IS NULL
        "#,
    )
    .bind(Utc::now())
    .bind(reason)
    .bind(jti)
    .execute(pool)
    .await?;

    if result.rows_affected() > 0 {
        tracing::info!(jti = %jti, reason = reason, "Refresh token revoked");
    }

    Ok(())
}

/// Revoke every live refresh token a user holds (logout-all-devices).
pub async fn revoke_all_user_tokens(pool: &PgPool, user_id: Uuid) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE refresh_tokens
        SET revoked_at = $1, revocation_reason = 'revoked_all'
        WHERE user_id = $2 AND revoked_at IS NULL
        "#,
    )
    .bind(Utc::now())
    .bind(user_id)
    .execute(pool)
    .await?;

    tracing::info!(user_id = %user_id, "All refresh tokens revoked for user");
    Ok(())
}

/// Retention sweep: delete records that expired or were revoked more than
/// `retention_days` ago. Rotation and revocation only mark rows; this is
/// the one place ledger rows are deleted.
pub async fn purge_stale_tokens(pool: &PgPool, retention_days: i64) -> Result<u64, AppError> {
    let cutoff = Utc::now() - Duration::days(retention_days);

    let result = sqlx::query(
        r#"
        DELETE FROM refresh_tokens
        WHERE expires_at < $1 OR revoked_at < $1
        "#,
    )
    .bind(cutoff)
    .execute(pool)
    .await?;

    let removed = result.rows_affected();
    if removed > 0 {
        tracing::info!(removed = removed, "Purged stale refresh tokens");
    }
    Ok(removed)
}
