//! Self-service password hashing
//!
//! Argon2id for the basic-auth credential. The terminal secret used in
//! request tokens is a separate opaque column; see the authenticator.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::error::{AuthError, AuthResult};

/// Minimum accepted registration password length
pub const MIN_PASSWORD_LEN: usize = 6;

pub fn hash_password(password: &str) -> AuthResult<String> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AuthError::Internal(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| AuthError::HashingFailed)?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> AuthResult<bool> {
    let parsed = PasswordHash::new(hash).map_err(|_| AuthError::HashingFailed)?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(_) => Err(AuthError::HashingFailed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_round_trip() {
        let hash = hash_password("s3cret!").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("s3cret!", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
    }

    #[test]
    fn rejects_short_passwords() {
        assert!(hash_password("abc").is_err());
    }

    #[test]
    fn salts_differ() {
        let a = hash_password("s3cret!").unwrap();
        let b = hash_password("s3cret!").unwrap();
        assert_ne!(a, b);
    }
}
