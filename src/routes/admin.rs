//! Operator endpoints.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::auth::purge_stale_tokens;
use crate::error::{AppError, ValidationError};

const DEFAULT_RETENTION_DAYS: i64 = 30;

#[derive(Deserialize)]
pub struct PurgeQuery {
    pub retention_days: Option<i64>,
}

#[derive(Serialize)]
struct PurgeResponse {
    removed: u64,
}

/// POST /api/admin/tokens/purge
///
/// Retention sweep over the refresh-token ledger: deletes records that
/// expired or were revoked longer than the retention window ago. Runs only
/// when called; there is no background scheduler in this service.
pub async fn purge_tokens(
    query: web::Query<PurgeQuery>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let retention_days = query.retention_days.unwrap_or(DEFAULT_RETENTION_DAYS);
    if retention_days < 0 {
        return Err(AppError::Validation(ValidationError::InvalidFormat(
            "retention_days".to_string(),
        )));
    }

    let removed = purge_stale_tokens(pool.get_ref(), retention_days).await?;
    Ok(HttpResponse::Ok().json(PurgeResponse { removed }))
}
