use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::core::shared::error::{CrmError, CrmResult};

pub const MIN_PASSWORD_LENGTH: usize = 6;
pub const MAX_PASSWORD_LENGTH: usize = 128;

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("Failed to hash password: {e}"))?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| anyhow!("Invalid password hash format: {e}"))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow!("Password verification failed: {e}")),
    }
}

pub fn validate_password(password: &str) -> CrmResult<()> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LENGTH {
        return Err(CrmError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if len > MAX_PASSWORD_LENGTH {
        return Err(CrmError::validation(format!(
            "Password must be at most {MAX_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse").expect("Failed to hash");
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash).expect("Failed to verify"));
        assert!(!verify_password("wrong horse", &hash).expect("Failed to verify"));
    }

    #[test]
    fn test_salts_differ() {
        let a = hash_password("secret123").expect("Failed to hash");
        let b = hash_password("secret123").expect("Failed to hash");
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_hash_is_an_error() {
        assert!(verify_password("secret123", "not-a-hash").is_err());
    }

    #[test]
    fn test_validate_password_length() {
        assert!(validate_password("12345").is_err());
        assert!(validate_password("123456").is_ok());
        assert!(validate_password(&"x".repeat(129)).is_err());
    }
}
