//! Anti-forgery tokens for cookie-based sessions.
//!
//! Single-process, in-memory, one token per client identity: issuing a new
//! token overwrites (and thereby invalidates) the previous one. A
//! multi-instance deployment needs an externally shared store instead.

use actix_web::HttpRequest;
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use std::collections::HashMap;
use std::sync::Mutex;

const CSRF_TOKEN_LENGTH: usize = 32;

/// Header carrying the anti-forgery token on mutating requests.
pub const CSRF_HEADER: &str = "x-csrf-token";

#[derive(Default)]
pub struct CsrfStore {
    tokens: Mutex<HashMap<String, String>>,
}

impl CsrfStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a token for a client identity, invalidating any prior one.
    pub fn issue(&self, identity: &str) -> String {
        let token: String = thread_rng()
            .sample_iter(&Alphanumeric)
            .take(CSRF_TOKEN_LENGTH)
            .map(char::from)
            .collect();

        let mut tokens = self.tokens.lock().expect("csrf store poisoned");
        tokens.insert(identity.to_string(), token.clone());
        token
    }

    /// True only if a token is on record for this identity and it exactly
    /// matches the presented value.
    pub fn validate(&self, identity: &str, presented: &str) -> bool {
        if presented.is_empty() {
            return false;
        }
        let tokens = self.tokens.lock().expect("csrf store poisoned");
        tokens.get(identity).map(String::as_str) == Some(presented)
    }
}

/// Derive the identity a CSRF token is bound to.
///
/// A request that already carries a session cookie is keyed by that cookie
/// value, binding the token to the session itself. Before any session
/// exists (the issuance endpoint is public) the peer address is the best
/// available key; shared-NAT clients are indistinguishable in that window.
pub fn client_identity(req: &HttpRequest) -> String {
    if let Some(cookie) = req.cookie(crate::routes::ACCESS_TOKEN_COOKIE) {
        return format!("session:{}", cookie.value());
    }
    req.connection_info()
        .realip_remote_addr()
        .unwrap_or("unknown")
        .to_string()
}
