//! SSO provisioning seam.
//!
//! The exchange with the external identity provider happens elsewhere; what
//! arrives here is a verified profile. Provisioning maps the email to a role
//! via configured address lists, upserts the user (no local password), and
//! yields a principal id. The caller then issues tokens through the same
//! [`crate::auth::tokens::issue_session`] path as local login.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::roles::Role;
use crate::configuration::SsoSettings;
use crate::error::AppError;

/// Identity claims received from the external provider after a successful
/// exchange.
#[derive(Debug, Clone)]
pub struct SsoProfile {
    pub email: String,
    pub name: Option<String>,
}

/// Role granted to an SSO principal, from the configured email lists.
/// Everyone not listed is an Employee.
pub fn role_for_email(sso: &SsoSettings, email: &str) -> Role {
    if sso.admin_emails.iter().any(|e| e == email) {
        Role::Admin
    } else if sso.supervisor_emails.iter().any(|e| e == email) {
        Role::Supervisor
    } else {
        Role::Employee
    }
}

/// Create or refresh the local user behind an SSO profile and return its
/// principal id. The password hash stays NULL: these accounts can never
/// pass local credential verification.
pub async fn provision_principal(
    pool: &PgPool,
    profile: &SsoProfile,
    sso: &SsoSettings,
) -> Result<Uuid, AppError> {
    let role = role_for_email(sso, &profile.email);
    let name = profile.name.clone().unwrap_or_else(|| profile.email.clone());
    let now = Utc::now();

    let (user_id,) = sqlx::query_as::<_, (Uuid,)>(
        r#"
        INSERT INTO users (id, email, name, password_hash, role_id, created_at, updated_at)
        VALUES ($1, $2, $3, NULL, (SELECT id FROM roles WHERE name = $4), $5, $5)
        ON CONFLICT (email) DO UPDATE SET name = EXCLUDED.name, updated_at = EXCLUDED.updated_at
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&profile.email)
    .bind(&name)
    .bind(role.as_str())
    .bind(now)
    .fetch_one(pool)
    .await?;

    tracing::info!(user_id = %user_id, role = %role, "SSO principal provisioned");
    Ok(user_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> SsoSettings {
        SsoSettings {
            admin_emails: vec!["boss@example.com".to_string()],
            supervisor_emails: vec!["lead@example.com".to_string()],
        }
    }

    #[test]
    fn listed_emails_get_their_roles() {
        let sso = settings();
        assert_eq!(role_for_email(&sso, "boss@example.com"), Role::Admin);
        assert_eq!(role_for_email(&sso, "lead@example.com"), Role::Supervisor);
    }

    #[test]
    fn everyone_else_is_an_employee() {
        let sso = settings();
        assert_eq!(role_for_email(&sso, "worker@example.com"), Role::Employee);
        assert_eq!(role_for_email(&sso, "BOSS@example.com"), Role::Employee);
    }
}
