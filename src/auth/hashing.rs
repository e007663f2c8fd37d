//! Argon2id password hashing for locally stored credentials.

use argon2::{
    password_hash::SaltString, Algorithm, Argon2, Params, PasswordHash, PasswordHasher,
    PasswordVerifier, Version,
};
use rand::rngs::OsRng;

use crate::errors::{AssayGateError, Result};

pub fn password_hasher() -> Argon2<'static> {
    // Argon2id tuned for interactive logins: modest memory and a single
    // iteration keep verification inside the per-request latency budget.
    const MEMORY_COST_KIB: u32 = 768; // 0.75 MiB
    const ITERATIONS: u32 = 1;
    const PARALLELISM: u32 = 1;
    let params = Params::new(MEMORY_COST_KIB, ITERATIONS, PARALLELISM, Some(32))
        .expect("valid Argon2 parameters");
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
}

/// Hash a password with a fresh random salt, returning the PHC string.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = password_hasher()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| AssayGateError::internal(format!("Failed to hash password: {}", err)))?;
    Ok(hash.to_string())
}

/// Verify a candidate password against a stored PHC string.
///
/// Returns `Ok(false)` for a mismatch; an error means the stored hash
/// itself is malformed.
pub fn verify_password(password: &str, stored: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored)
        .map_err(|err| AssayGateError::internal(format!("Invalid password hash: {}", err)))?;
    Ok(password_hasher().verify_password(password.as_bytes(), &parsed).is_ok())
}
