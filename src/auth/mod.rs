//! Authentication core: credential verification, token issuance and
//! rotation, roles, CSRF, and SSO provisioning.

mod claims;
mod csrf;
mod jwt;
mod password;
mod refresh_token;
mod roles;
mod sso;
mod tokens;

pub use claims::Claims;
pub use csrf::{client_identity, CsrfStore, CSRF_HEADER};
pub use jwt::{generate_access_token, validate_access_token};
pub use password::{hash_password, verify_password};
pub use refresh_token::{
    issue_refresh_token, parse_refresh_token, purge_stale_tokens, revoke_all_user_tokens,
    revoke_refresh_token, rotate_refresh_token, TokenContext,
};
pub use roles::{authorize, Role, ADMIN_ONLY, SUPERVISOR_AND_UP};
pub use sso::{provision_principal, role_for_email, SsoProfile};
pub use tokens::{issue_session, TokenPair};
