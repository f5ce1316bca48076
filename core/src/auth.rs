//! Shared-password gate.
//!
//! The first caller to present a non-empty password claims the deployment:
//! its hash is stored and every later request must match it.
//!
//! New hashes are Argon2id. Records written by the older Node service carry
//! bcrypt hashes (`$2a$`, `$2b$`, `$2y$`); those still verify.

use anyhow::anyhow;
use argon2::Argon2;
use argon2::password_hash::{
    PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
};

use crate::error::{LedgerError, Result};
use crate::models::AppRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    /// No hash was stored; the submitted password is now the shared one.
    /// The caller must persist the record.
    Bootstrapped,
    Verified,
}

/// Hash a password into a salted Argon2id PHC string.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("failed to hash password: {e}"))?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, stored_hash: &str) -> anyhow::Result<bool> {
    if is_bcrypt(stored_hash) {
        return bcrypt::verify(password, stored_hash)
            .map_err(|e| anyhow!("failed to verify bcrypt password hash: {e}"));
    }

    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| anyhow!("stored password hash is unreadable: {e}"))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow!("failed to verify password: {e}")),
    }
}

fn is_bcrypt(hash: &str) -> bool {
    ["$2a$", "$2b$", "$2y$"]
        .iter()
        .any(|prefix| hash.starts_with(prefix))
}

/// Check `password` against `record`, setting the hash on first use.
///
/// An empty string counts as no password.
pub fn authenticate(record: &mut AppRecord, password: Option<&str>) -> Result<AuthOutcome> {
    let password = password
        .filter(|p| !p.is_empty())
        .ok_or(LedgerError::AuthRequired)?;

    match record.password_hash.as_deref() {
        None => {
            record.password_hash = Some(hash_password(password)?);
            Ok(AuthOutcome::Bootstrapped)
        }
        Some(hash) => {
            if verify_password(password, hash)? {
                Ok(AuthOutcome::Verified)
            } else {
                Err(LedgerError::AuthInvalid)
            }
        }
    }
}
