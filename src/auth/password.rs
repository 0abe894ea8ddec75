use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use tracing::error;

#[cfg(test)]
pub(crate) static DUMMY_VERIFICATIONS: std::sync::atomic::AtomicUsize =
    std::sync::atomic::AtomicUsize::new(0);

lazy_static! {
    // Same Argon2 parameters as real hashes, so verifying against it costs the same.
    static ref DUMMY_HASH: String =
        hash_password("userdesk-no-such-account").unwrap_or_default();
}

/// One-way transform of a plaintext password into a PHC-format Argon2 hash.
pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// Spends one full verification on a hash no password matches. Used when the
/// account does not exist so the response time does not reveal that.
pub fn verify_against_dummy(plain: &str) -> bool {
    #[cfg(test)]
    DUMMY_VERIFICATIONS.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    verify_password(plain, &DUMMY_HASH).unwrap_or(false)
}

/// Computes the dummy hash up front instead of on the first failed login.
pub fn warm_dummy_hash() {
    lazy_static::initialize(&DUMMY_HASH);
}
