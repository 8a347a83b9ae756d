//! Role-based access control.
//!
//! Roles are a closed set so every operation's allowed-role table is
//! checked exhaustively at compile time, instead of comparing ad-hoc
//! strings at request time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{AppError, AuthError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Supervisor,
    Employee,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Supervisor => "Supervisor",
            Role::Employee => "Employee",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Admin" => Ok(Role::Admin),
            "Supervisor" => Ok(Role::Supervisor),
            "Employee" => Ok(Role::Employee),
            other => Err(AppError::Internal(format!("unknown role: {}", other))),
        }
    }
}

/// Static operation-to-allowed-roles tables
pub const ADMIN_ONLY: &[Role] = &[Role::Admin];
pub const SUPERVISOR_AND_UP: &[Role] = &[Role::Admin, Role::Supervisor];

/// Allows only if `role` is a member of `required`. A validated principal
/// failing this check is a 403, never a 401.
pub fn authorize(role: Role, required: &[Role]) -> Result<(), AppError> {
    if required.contains(&role) {
        Ok(())
    } else {
        Err(AppError::Auth(AuthError::Forbidden))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_str() {
        for role in [Role::Admin, Role::Supervisor, Role::Employee] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!("Superuser".parse::<Role>().is_err());
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn employee_is_forbidden_from_supervisor_operations() {
        let err = authorize(Role::Employee, SUPERVISOR_AND_UP).unwrap_err();
        match err {
            AppError::Auth(AuthError::Forbidden) => (),
            other => panic!("expected Forbidden, got {:?}", other),
        }
    }

    #[test]
    fn admin_passes_every_table() {
        assert!(authorize(Role::Admin, ADMIN_ONLY).is_ok());
        assert!(authorize(Role::Admin, SUPERVISOR_AND_UP).is_ok());
        assert!(authorize(Role::Supervisor, ADMIN_ONLY).is_err());
    }
}
