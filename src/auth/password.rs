//! Password hashing with Argon2id.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::{rngs::OsRng, RngCore};
use zeroize::Zeroize;

use crate::error::{LoopHubError, Result};
use crate::forum::constants::{MAX_PASSWORD_LEN, MIN_PASSWORD_LEN};

/// Salt size for Argon2 (128 bits)
const SALT_SIZE: usize = 16;

/// Parameters for Argon2id password hashing
const ARGON2_PARAMS: argon2::Params = match argon2::Params::new(
    19 * 1024, // 19 MiB memory cost
    2,         // 2 iterations
    1,         // 1 thread (single-threaded)
    Some(32),  // 32-byte output length
) {
    Ok(params) => params,
    Err(_) => panic!("Invalid Argon2 parameters"),
};

/// A plaintext password, wiped from memory on drop.
#[derive(Clone)]
pub struct Password(String);

impl Password {
    pub fn new(password: impl Into<String>) -> Self {
        Self(password.into())
    }

    fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// The plaintext, for sending to the server.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Length limits for new passwords.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&self.len()) {
            return Err(LoopHubError::validation(format!(
                "Password must be {}-{} bytes",
                MIN_PASSWORD_LEN, MAX_PASSWORD_LEN
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(***)")
    }
}

impl Drop for Password {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

fn argon2() -> Argon2<'static> {
    Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        ARGON2_PARAMS,
    )
}

/// Hashes a password into a PHC string with a fresh random salt.
pub fn hash_password(password: &Password) -> Result<String> {
    if password.is_empty() {
        return Err(LoopHubError::validation("Password cannot be empty"));
    }

    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);
    let salt_string = SaltString::encode_b64(&salt)
        .map_err(|e| LoopHubError::storage(format!("Invalid salt: {}", e)))?;

    let hash = argon2()
        .hash_password(password.as_bytes(), &salt_string)
        .map_err(|e| LoopHubError::storage(format!("Password hashing failed: {}", e)))?;
    Ok(hash.to_string())
}

/// Checks a password against a stored PHC string.
pub fn verify_password(password: &Password, expected_hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(expected_hash)
        .map_err(|e| LoopHubError::storage(format!("Invalid password hash: {}", e)))?;

    match argon2().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(LoopHubError::storage(format!(
            "Password verification failed: {}",
            e
        ))),
    }
}
