//! Password hashing
//!
//! Argon2id hashing with per-password random salts, PHC string output.

use anyhow::Result;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Hash a password using Argon2id with the crate's secure defaults.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?;
    Ok(hash.to_string())
}

/// Verify a password against a stored PHC-format hash.
///
/// A mismatched password returns `Ok(false)`; only a malformed hash is
/// an error.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| anyhow::anyhow!("Invalid password hash format: {}", e))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow::anyhow!("Password verification failed: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_uses_argon2id_and_random_salt() {
        let h1 = hash_password("kopi-susu").unwrap();
        let h2 = hash_password("kopi-susu").unwrap();
        assert!(h1.starts_with("$argon2id$"));
        assert_ne!(h1, h2);
    }

    #[test]
    fn test_verify_roundtrip() {
        let hash = hash_password("kopi-susu").unwrap();
        assert!(verify_password("kopi-susu", &hash).unwrap());
        assert!(!verify_password("es-teh", &hash).unwrap());
    }

    #[test]
    fn test_verify_rejects_malformed_hash() {
        assert!(verify_password("anything", "not-a-phc-string").is_err());
    }
}
