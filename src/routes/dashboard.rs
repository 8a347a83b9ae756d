//! Dashboard status endpoint.
//!
//! Fetches the read-side rows (employees, assignments, role
//! recommendations), groups them per employee, and delegates the actual
//! derivation to [`crate::status`].

use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::auth::Role;
use crate::error::{AppError, ValidationError};
use crate::status::{
    evaluate, AssignedPpe, PpeStatus, RecommendedPpe, StatusCounts, DEFAULT_THRESHOLD_DAYS,
};

#[derive(Deserialize)]
pub struct StatusQuery {
    pub threshold_days: Option<i64>,
    /// Restrict to employees with this role
    pub role: Option<String>,
    /// Retain only employees whose role has a recommendation tagged with
    /// this risk
    pub risk: Option<String>,
}

#[derive(Serialize)]
struct EmployeeStatusResult {
    employee_id: Uuid,
    first_name: String,
    last_name: String,
    email: String,
    role: Role,
    status: PpeStatus,
    has_expired: bool,
    has_expiring_soon: bool,
    nearest_expires: Option<DateTime<Utc>>,
    missing: Vec<RecommendedPpe>,
    assigned: Vec<AssignedPpe>,
    recommended: Vec<RecommendedPpe>,
}

#[derive(Serialize)]
struct DashboardResponse {
    counts: StatusCounts,
    threshold_days: i64,
    results: Vec<EmployeeStatusResult>,
}

/// GET /api/dashboard/status
///
/// Recomputed from the store on every call; no status is persisted.
pub async fn dashboard_status(
    query: web::Query<StatusQuery>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let threshold_days = query.threshold_days.unwrap_or(DEFAULT_THRESHOLD_DAYS);
    if threshold_days < 0 {
        return Err(AppError::Validation(ValidationError::InvalidFormat(
            "threshold_days".to_string(),
        )));
    }

    let role_filter: Option<Role> = match query.role.as_deref() {
        Some(name) => Some(name.parse().map_err(|_| {
            AppError::Validation(ValidationError::InvalidFormat("role".to_string()))
        })?),
        None => None,
    };

    let employees = sqlx::query_as::<_, (Uuid, String, String, String, String)>(
        r#"
        SELECT e.id, e.first_name, e.last_name, e.email, r.name
        FROM employees e
        JOIN roles r ON r.id = e.role_id
        ORDER BY e.last_name, e.first_name
        "#,
    )
    .fetch_all(pool.get_ref())
    .await?;

    let assignment_rows = sqlx::query_as::<_, (Uuid, Uuid, Uuid, String, Option<DateTime<Utc>>)>(
        r#"
        SELECT a.id, a.employee_id, a.ppe_id, p.name, a.expires_at
        FROM ppe_assignments a
        JOIN ppe_items p ON p.id = a.ppe_id
        "#,
    )
    .fetch_all(pool.get_ref())
    .await?;

    let recommendation_rows = sqlx::query_as::<_, (String, Uuid, String, Option<String>)>(
        r#"
        SELECT r.name, rp.ppe_id, p.name, rk.name
        FROM recommended_ppe rp
        JOIN roles r ON r.id = rp.role_id
        JOIN ppe_items p ON p.id = rp.ppe_id
        LEFT JOIN risks rk ON rk.id = rp.risk_id
        "#,
    )
    .fetch_all(pool.get_ref())
    .await?;

    let mut assignments_by_employee: HashMap<Uuid, Vec<AssignedPpe>> = HashMap::new();
    for (id, employee_id, ppe_id, name, expires_at) in assignment_rows {
        assignments_by_employee
            .entry(employee_id)
            .or_default()
            .push(AssignedPpe {
                id,
                ppe_id,
                name,
                expires_at,
            });
    }

    let mut recommendations_by_role: HashMap<String, Vec<RecommendedPpe>> = HashMap::new();
    for (role_name, ppe_id, name, risk) in recommendation_rows {
        recommendations_by_role
            .entry(role_name)
            .or_default()
            .push(RecommendedPpe { ppe_id, name, risk });
    }

    let now = Utc::now();
    let mut counts = StatusCounts::default();
    let mut results = Vec::new();

    for (employee_id, first_name, last_name, email, role_name) in employees {
        let role: Role = role_name.parse()?;

        if let Some(wanted) = role_filter {
            if role != wanted {
                continue;
            }
        }

        let recommended = recommendations_by_role
            .get(role.as_str())
            .cloned()
            .unwrap_or_default();

        if let Some(wanted_risk) = query.risk.as_deref() {
            let role_covers_risk = recommended
                .iter()
                .any(|r| r.risk.as_deref() == Some(wanted_risk));
            if !role_covers_risk {
                continue;
            }
        }

        let assigned = assignments_by_employee
            .remove(&employee_id)
            .unwrap_or_default();

        let eval = evaluate(&assigned, &recommended, now, threshold_days);
        counts.record(eval.status);

        results.push(EmployeeStatusResult {
            employee_id,
            first_name,
            last_name,
            email,
            role,
            status: eval.status,
            has_expired: eval.has_expired,
            has_expiring_soon: eval.has_expiring_soon,
            nearest_expires: eval.nearest_expires,
            missing: eval.missing,
            assigned,
            recommended,
        });
    }

    Ok(HttpResponse::Ok().json(DashboardResponse {
        counts,
        threshold_days,
        results,
    }))
}
