//! Password hashing and verification with bcrypt.

use bcrypt::{hash, verify, DEFAULT_COST};

use crate::error::{AppError, ValidationError};

const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_PASSWORD_LENGTH: usize = 128;

/// Hash a password using bcrypt.
///
/// # Errors
/// Returns error if the password fails the strength policy or hashing fails.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    validate_password_strength(password)?;

    hash(password, DEFAULT_COST)
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a password against its stored hash.
///
/// Fails closed: a malformed or missing hash is a non-match, never an
/// error visible to the caller.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    verify(password, stored_hash).unwrap_or(false)
}

/// Strength policy: 8-128 characters with at least one digit, one
/// lowercase letter and one uppercase letter.
fn validate_password_strength(password: &str) -> Result<(), AppError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AppError::Validation(ValidationError::TooShort(
            "password".to_string(),
            MIN_PASSWORD_LENGTH,
        )));
    }

    // bcrypt limitation and DoS prevention
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(AppError::Validation(ValidationError::TooLong(
            "password".to_string(),
            MAX_PASSWORD_LENGTH,
        )));
    }

    let has_digit = password.chars().any(|c| c.is_numeric());
    let has_lowercase = password.chars().any(|c| c.is_lowercase());
    let has_uppercase = password.chars().any(|c| c.is_uppercase());

    if !has_digit || !has_lowercase || !has_uppercase {
        return Err(AppError::Validation(ValidationError::InvalidFormat(
            "password must contain at least one digit, one lowercase letter, and one uppercase letter"
                .to_string(),
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_not_plaintext() {
        let password = "ValidPassword123";
        let hashed = hash_password(password).expect("Failed to hash password");

        assert_ne!(password, hashed);
        assert!(hashed.starts_with("$2"));
    }

    #[test]
    fn correct_password_verifies() {
        let password = "ValidPassword123";
        let hashed = hash_password(password).expect("Failed to hash password");

        assert!(verify_password(password, &hashed));
    }

    #[test]
    fn wrong_password_does_not_verify() {
        let hashed = hash_password("ValidPassword123").expect("Failed to hash password");

        assert!(!verify_password("WrongPassword123", &hashed));
    }

    #[test]
    fn malformed_hash_fails_closed() {
        assert!(!verify_password("ValidPassword123", "not-a-bcrypt-hash"));
        assert!(!verify_password("ValidPassword123", ""));
    }

    #[test]
    fn weak_passwords_are_rejected() {
        let long_password = "a".repeat(MAX_PASSWORD_LENGTH + 1) + "A1";
        for weak in [
            "Short1",
            "nouppercase1",
            "NOLOWERCASE1",
            "NoDigitsHere",
            long_password.as_str(),
        ] {
            assert!(hash_password(weak).is_err(), "should reject: {}", weak);
        }
    }
}
