//! Password hashing and verification using Argon2id.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher, PasswordVerifier};

use crate::errors::ServiceError;

/// Hash a plaintext password into an Argon2id PHC-format string.
pub fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::HashError(format!("hashing failed: {e}")))
}

/// Verify a plaintext password against an Argon2id PHC-format hash.
///
/// Returns `Ok(true)` on match, `Ok(false)` on mismatch, or
/// `Err(ServiceError::HashError)` if the stored hash is malformed.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, ServiceError> {
    let parsed_hash = argon2::PasswordHash::new(hash)
        .map_err(|e| ServiceError::HashError(format!("invalid hash format: {e}")))?;

    let argon2 = Argon2::default();
    match argon2.verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(ServiceError::HashError(format!("verify error: {e}"))),
    }
}
