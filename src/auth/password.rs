//! Argon2 hashing for password-role fields.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

use crate::errors::AppError;

/// Value written to `hashType` next to hashed fields.
pub const HASH_TYPE: &str = "argon2";

/// Field that records which algorithm hashed the password fields.
pub const HASH_TYPE_FIELD: &str = "hashType";

const ARGON2_ALGORITHMS: &[&str] = &["argon2i", "argon2d", "argon2id"];

/// Hash a plaintext password into a PHC string.
pub fn hash_password(plaintext: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(plaintext.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Check `plaintext` against a stored PHC string. Malformed hashes never match.
pub fn verify_password(plaintext: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Whether `value` is a complete Argon2 PHC string (algorithm, salt and output).
pub fn is_argon2_hash(value: &str) -> bool {
    match PasswordHash::new(value) {
        Ok(parsed) => {
            ARGON2_ALGORITHMS.contains(&parsed.algorithm.as_str())
                && parsed.salt.is_some()
                && parsed.hash.is_some()
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("s3cret!").unwrap();
        assert_ne!(hash, "s3cret!");
        assert!(is_argon2_hash(&hash));
        assert!(verify_password("s3cret!", &hash));
        assert!(!verify_password("wrong", &hash));
        assert!(!verify_password("s3cret!", "not-a-hash"));
    }

    #[test]
    fn test_salts_differ() {
        assert_ne!(hash_password("same").unwrap(), hash_password("same").unwrap());
    }

    #[test]
    fn test_plaintext_is_not_a_hash() {
        assert!(!is_argon2_hash("hunter2"));
        assert!(!is_argon2_hash("$argon2id$garbage"));
        assert!(!is_argon2_hash("$argon2id$v=19$m=19456,t=2,p=1"));
        assert!(!is_argon2_hash("$pbkdf2-sha256$i=1000$c2FsdHNhbHQ$aGFzaA"));
    }
}
