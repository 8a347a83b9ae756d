//! Access-token generation and validation.
//!
//! Access tokens are short-lived HS256 JWTs. They are stateless: nothing is
//! persisted, and validation never touches the refresh-token ledger.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::auth::claims::Claims;
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};

/// Generate a signed access token for a user.
pub fn generate_access_token(
    user_id: &Uuid,
    email: &str,
    config: &JwtSettings,
) -> Result<String, AppError> {
    let claims = Claims::new(
        *user_id,
        email.to_string(),
        config.access_token_expiry,
        config.issuer.clone(),
    );

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
}

/// Validate signature, expiry, and issuer of an access token and return
/// its claims. Any failure surfaces as UNAUTHENTICATED; an expired token
/// is logged apart from a tampered one.
pub fn validate_access_token(token: &str, config: &JwtSettings) -> Result<Claims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&config.issuer]);

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                tracing::debug!("Access token expired");
            }
            _ => {
                tracing::warn!("Access token validation failed: {}", e);
            }
        }
        AppError::Auth(AuthError::Unauthenticated)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> JwtSettings {
        JwtSettings {
            secret: "test-secret-key-at-least-32-characters-long".to_string(),
            access_token_expiry: 900,
            refresh_token_expiry: 604800,
            issuer: "test".to_string(),
        }
    }

    #[test]
    fn generated_token_validates() {
        let config = test_config();
        let user_id = Uuid::new_v4();

        let token =
            generate_access_token(&user_id, "test@example.com", &config).expect("generate");
        let claims = validate_access_token(&token, &config).expect("validate");

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.email, "test@example.com");
        assert_eq!(claims.iss, "test");
    }

    #[test]
    fn garbage_token_is_rejected() {
        let config = test_config();
        assert!(validate_access_token("invalid.token.here", &config).is_err());
    }

    #[test]
    fn tampered_token_is_rejected() {
        let config = test_config();
        let token = generate_access_token(&Uuid::new_v4(), "test@example.com", &config)
            .expect("generate");

        let tampered = format!("{}X", token);
        assert!(validate_access_token(&tampered, &config).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let mut config = test_config();
        // Well past the validator's default leeway
        config.access_token_expiry = -3600;

        let token = generate_access_token(&Uuid::new_v4(), "test@example.com", &config)
            .expect("generate");

        assert!(validate_access_token(&token, &config).is_err());
    }

    #[test]
    fn wrong_issuer_is_rejected() {
        let mut config = test_config();
        let token = generate_access_token(&Uuid::new_v4(), "test@example.com", &config)
            .expect("generate");

        config.issuer = "someone-else".to_string();
        assert!(validate_access_token(&token, &config).is_err());
    }
}
