//! HTTP route handlers.

mod admin;
mod auth;
mod csrf;
mod dashboard;
mod health_check;

pub use admin::purge_tokens;
pub use auth::{get_current_user, login, logout, refresh, register};
pub use csrf::issue_csrf_token;
pub use dashboard::dashboard_status;
pub use health_check::health_check;

/// Cookie carrying the access token when cookie transport is enabled.
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
/// Cookie carrying the refresh token when cookie transport is enabled.
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";
