/// Password hashing and verification using Argon2id
use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Algorithm, Argon2, Params, PasswordHash, PasswordVerifier, Version,
};
use once_cell::sync::Lazy;

use crate::error::{AuthError, Result};

const MEMORY_COST_KIB: u32 = 64 * 1024;
const TIME_COST: u32 = 2;
const PARALLELISM: u32 = 4;

/// Hash checked when the email is unknown, so that path costs the same as a
/// wrong password.
static DUMMY_HASH: Lazy<Option<String>> = Lazy::new(|| {
    hash_password("dummy-password-for-timing")
        .map_err(|e| tracing::error!(error = %e, "failed to prepare dummy password hash"))
        .ok()
});

fn hasher() -> Result<Argon2<'static>> {
    let params = Params::new(MEMORY_COST_KIB, TIME_COST, PARALLELISM, None)
        .map_err(|e| AuthError::Internal(format!("Invalid Argon2 parameters: {e}")))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hash a password using Argon2id
/// Returns the PHC string suitable for storage in database
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(rand::thread_rng());

    let password_hash = hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| AuthError::Internal("Failed to hash password".to_string()))?
        .to_string();

    Ok(password_hash)
}

/// Verify a password against a stored hash.
///
/// Parameters come from the PHC string, so hashes created with other costs
/// still verify.
pub fn verify_password(password: &str, hash: &str) -> Result<()> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|_| AuthError::Internal("Invalid password hash format".to_string()))?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

/// Burn one verification against the dummy hash.
pub fn verify_dummy(password: &str) {
    if let Some(hash) = DUMMY_HASH.as_deref() {
        let _ = verify_password(password, hash);
    }
}

/// Check `password` against `stored_hash` on the blocking pool.
///
/// `None` means the account does not exist; the dummy hash is verified instead
/// and the result is always `InvalidCredentials`.
pub async fn verify_credentials_blocking(password: String, stored_hash: Option<String>) -> Result<()> {
    tokio::task::spawn_blocking(move || match stored_hash {
        Some(hash) => verify_password(&password, &hash),
        None => {
            verify_dummy(&password);
            Err(AuthError::InvalidCredentials)
        }
    })
    .await
    .map_err(|e| AuthError::Internal(format!("Password verification task failed: {e}")))?
}
