//! Password hashing and verification.
//!
//! Stored credentials are Argon2id PHC strings. Older rows may hold bcrypt (`$2a$`,
//! `$2b$`, `$2y$`) hashes, which still verify, or plain text, which `check` compares
//! directly only when the legacy path is enabled.

use crate::error::AppError;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use subtle::ConstantTimeEq;

/// Hash a password using Argon2id with a random salt.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("password hashing failed: {}", e)))
}

/// Verify a password against a PHC hash string. Unparseable hashes never verify.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// True when `stored` is in the hashed format written by `hash_password`.
pub fn is_hashed(stored: &str) -> bool {
    PasswordHash::new(stored).is_ok()
}

/// True for a bcrypt modular-crypt string.
pub fn is_bcrypt(stored: &str) -> bool {
    stored.starts_with("$2")
}

/// Outcome of checking a supplied password against a stored credential.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CredentialMatch {
    Hashed,
    /// Matched a bcrypt hash; the row should be rehashed.
    LegacyBcrypt,
    LegacyPlaintext,
    Mismatch,
}

/// Check `supplied` against `stored`. Non-hashed stored values are compared as plain
/// text (constant time) only when `allow_legacy` is set.
pub fn check(supplied: &str, stored: &str, allow_legacy: bool) -> CredentialMatch {
    if is_hashed(stored) {
        if verify_password(supplied, stored) {
            CredentialMatch::Hashed
        } else {
            CredentialMatch::Mismatch
        }
    } else if is_bcrypt(stored) {
        match bcrypt::verify(supplied, stored) {
            Ok(true) => CredentialMatch::LegacyBcrypt,
            _ => CredentialMatch::Mismatch,
        }
    } else if allow_legacy && !stored.is_empty() && bool::from(supplied.as_bytes().ct_eq(stored.as_bytes())) {
        CredentialMatch::LegacyPlaintext
    } else {
        CredentialMatch::Mismatch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("hunter22").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(is_hashed(&hash));
        assert!(verify_password("hunter22", &hash));
        assert!(!verify_password("hunter23", &hash));
    }

    #[test]
    fn salts_differ_between_hashes() {
        assert_ne!(hash_password("same").unwrap(), hash_password("same").unwrap());
    }

    #[test]
    fn legacy_plaintext_only_when_enabled() {
        assert!(!is_hashed("plain-secret"));
        assert_eq!(check("plain-secret", "plain-secret", true), CredentialMatch::LegacyPlaintext);
        assert_eq!(check("plain-secret", "plain-secret", false), CredentialMatch::Mismatch);
        assert_eq!(check("other", "plain-secret", true), CredentialMatch::Mismatch);
        assert_eq!(check("", "", true), CredentialMatch::Mismatch);
    }

    #[test]
    fn bcrypt_hashes_from_older_rows_verify() {
        // OpenBSD bcrypt test vector, cost 5.
        let stored = "$2a$05$CCCCCCCCCCCCCCCCCCCCC.E5YPO9kmyuRGyh0XouQYb4YMJKvyOeW";
        assert!(is_bcrypt(stored));
        assert!(!is_hashed(stored));
        assert_eq!(check("U*U", stored, true), CredentialMatch::LegacyBcrypt);
        assert_eq!(check("U*U", stored, false), CredentialMatch::LegacyBcrypt);
        assert_eq!(check("U*V", stored, true), CredentialMatch::Mismatch);
        assert_eq!(check(stored, stored, true), CredentialMatch::Mismatch);
    }

    #[test]
    fn bcrypt_round_trip_with_crate_hash() {
        let stored = bcrypt::hash("old-secret", 4).unwrap();
        assert_eq!(check("old-secret", &stored, false), CredentialMatch::LegacyBcrypt);
        assert_eq!(check("new-secret", &stored, false), CredentialMatch::Mismatch);
    }

    #[test]
    fn hashed_credential_never_compared_as_text() {
        let hash = hash_password("pw").unwrap();
        assert_eq!(check(&hash, &hash, true), CredentialMatch::Mismatch);
        assert_eq!(check("pw", &hash, false), CredentialMatch::Hashed);
    }
}
