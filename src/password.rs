//! Argon2id password hashing for the Credential Store.
//!
//! Hashes are stored as PHC strings, so the salt and parameters travel with the
//! hash. Verification goes through `PasswordVerifier`, which compares in constant time.

use std::sync::OnceLock;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::error::AppError;

pub const MIN_PASSWORD_LEN: usize = 8;
pub const USERNAME_LEN: std::ops::RangeInclusive<usize> = 3..=64;

/// Hash a plaintext password with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))
}

/// Verify a plaintext password against a stored PHC string.
///
/// A malformed stored hash never matches.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "stored password hash is malformed");
            false
        }
    }
}

/// check_credentials
///
/// Login-side comparison. When the username is unknown (`stored_hash` is `None`)
/// a throwaway hash is still verified so both failure paths cost the same.
pub fn check_credentials(password: &str, stored_hash: Option<&str>) -> bool {
    match stored_hash {
        Some(hash) => verify_password(password, hash),
        None => {
            let _ = verify_password(password, dummy_hash());
            false
        }
    }
}

fn dummy_hash() -> &'static str {
    static DUMMY: OnceLock<String> = OnceLock::new();
    DUMMY.get_or_init(|| {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(b"no-such-admin", &salt)
            .map(|hash| hash.to_string())
            .unwrap_or_default()
    })
}

/// Registration input rules. Returns the trimmed username.
pub fn validate_registration(username: &str, password: &str) -> Result<String, AppError> {
    let username = username.trim();
    if !USERNAME_LEN.contains(&username.chars().count()) {
        return Err(AppError::BadRequest(format!(
            "Username must be between {} and {} characters",
            USERNAME_LEN.start(),
            USERNAME_LEN.end()
        )));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }
    Ok(username.to_string())
}
