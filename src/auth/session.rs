//! Bearer session tokens.
//!
//! Tokens are 32 random bytes, handed to the client hex-encoded. The server
//! only keeps the SHA3-256 of a token, so a leaked database does not leak
//! usable sessions.

use crate::error::{LoopHubError, Result};
use crate::forum::types::UserId;
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use subtle::ConstantTimeEq;

/// Raw token size in bytes.
pub const TOKEN_BYTES: usize = 32;

/// A stored session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token_hash: [u8; 32],
    pub user_id: UserId,
    pub created_at: u64,
    pub expires_at: u64,
}

impl Session {
    pub fn new(token: &str, user_id: UserId, now: u64, ttl_ms: u64) -> Self {
        Self {
            token_hash: hash_token(token),
            user_id,
            created_at: now,
            expires_at: now.saturating_add(ttl_ms),
        }
    }

    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.expires_at
    }

    /// Constant-time check that `token` belongs to this session.
    pub fn matches(&self, token: &str) -> bool {
        self.token_hash.ct_eq(&hash_token(token)).into()
    }
}

/// A fresh random token, hex-encoded.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// SHA3-256 of the token string.
pub fn hash_token(token: &str) -> [u8; 32] {
    let mut hasher = Sha3_256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().into()
}

/// Rejects anything that is not a well-formed token before it reaches storage.
pub fn check_token_format(token: &str) -> Result<()> {
    let well_formed = token.len() == TOKEN_BYTES * 2 && token.bytes().all(|b| b.is_ascii_hexdigit());
    if well_formed {
        Ok(())
    } else {
        Err(LoopHubError::unauthorized("Malformed session token"))
    }
}

/// Strips an optional `Bearer ` prefix from an Authorization header value.
pub fn token_from_header(value: &str) -> Option<&str> {
    let value = value.trim();
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .unwrap_or(value)
        .trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_are_random_hex() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
        assert!(check_token_format(&a).is_ok());
        assert!(check_token_format("zz").is_err());
        assert!(check_token_format(&"g".repeat(64)).is_err());
    }

    #[test]
    fn test_session_matching_and_expiry() {
        let token = generate_token();
        let session = Session::new(&token, UserId::new(), 1_000, 500);
        assert!(session.matches(&token));
        assert!(!session.matches(&generate_token()));
        assert!(!session.is_expired(1_499));
        assert!(session.is_expired(1_500));
        assert_ne!(session.token_hash.to_vec(), token.as_bytes().to_vec());
    }

    #[test]
    fn test_header_parsing() {
        assert_eq!(token_from_header("Bearer abc"), Some("abc"));
        assert_eq!(token_from_header("  abc "), Some("abc"));
        assert_eq!(token_from_header("Bearer  "), None);
    }
}
