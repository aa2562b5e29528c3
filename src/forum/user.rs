//! User accounts and profile views.

use crate::error::{LoopHubError, Result};
use crate::forum::constants::{
    MAX_BIO_SIZE, MAX_DISPLAY_NAME_LEN, MAX_USERNAME_LEN, MIN_USERNAME_LEN,
};
use crate::forum::karma::{level_for_karma, Level};
use crate::forum::types::UserId;
use serde::{Deserialize, Serialize};

/// Public profile of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    /// Username as registered (case preserved).
    pub username: String,
    pub display_name: String,
    pub bio: String,
    pub karma: i64,
    pub is_admin: bool,
    pub created_at: u64,
}

impl UserProfile {
    pub fn level(&self) -> Level {
        level_for_karma(self.karma)
    }

    /// Display name, falling back to the username.
    pub fn shown_name(&self) -> &str {
        if self.display_name.is_empty() {
            &self.username
        } else {
            &self.display_name
        }
    }

    pub fn summary(&self) -> UserSummary {
        let level = self.level();
        UserSummary {
            id: self.id,
            username: self.username.clone(),
            display_name: self.shown_name().to_string(),
            karma: self.karma,
            level: level.number,
            level_name: level.name.to_string(),
        }
    }
}

/// Stored account: the profile plus the password hash, which never leaves the
/// storage layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
    pub profile: UserProfile,
    /// Argon2 PHC string.
    pub password_hash: String,
}

/// Compact author information attached to threads, comments and listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: UserId,
    pub username: String,
    pub display_name: String,
    pub karma: i64,
    pub level: u8,
    pub level_name: String,
}

impl UserSummary {
    /// Placeholder for authors whose account no longer resolves.
    pub fn unknown(id: UserId) -> Self {
        Self {
            id,
            username: "[unknown]".to_string(),
            display_name: "[unknown]".to_string(),
            karma: 0,
            level: 1,
            level_name: level_for_karma(0).name.to_string(),
        }
    }
}

/// Profile fields a user may change about themselves.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub bio: Option<String>,
}

/// Lowercased username used as the uniqueness key.
pub fn normalize_username(username: &str) -> String {
    username.trim().to_ascii_lowercase()
}

/// Checks length and the `[A-Za-z0-9_]` alphabet.
pub fn validate_username(username: &str) -> Result<()> {
    let len = username.chars().count();
    if !(MIN_USERNAME_LEN..=MAX_USERNAME_LEN).contains(&len) {
        return Err(LoopHubError::validation(format!(
            "Username must be {}-{} characters",
            MIN_USERNAME_LEN, MAX_USERNAME_LEN
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(LoopHubError::validation(
            "Username may only contain letters, digits and underscores",
        ));
    }
    Ok(())
}

pub fn validate_display_name(name: &str) -> Result<()> {
    if name.chars().count() > MAX_DISPLAY_NAME_LEN {
        return Err(LoopHubError::validation(format!(
            "Display name too long (max {} characters)",
            MAX_DISPLAY_NAME_LEN
        )));
    }
    if name.chars().any(char::is_control) {
        return Err(LoopHubError::validation(
            "Display name contains control characters",
        ));
    }
    Ok(())
}

pub fn validate_bio(bio: &str) -> Result<()> {
    if bio.len() > MAX_BIO_SIZE {
        return Err(LoopHubError::validation(format!(
            "Bio too large: {} bytes (max {})",
            bio.len(),
            MAX_BIO_SIZE
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(karma: i64) -> UserProfile {
        UserProfile {
            id: UserId::new(),
            username: "Ferris".to_string(),
            display_name: String::new(),
            bio: String::new(),
            karma,
            is_admin: false,
            created_at: 0,
        }
    }

    #[test]
    fn test_username_rules() {
        assert!(validate_username("ferris_42").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username(&"a".repeat(33)).is_err());
        assert!(validate_username("has space").is_err());
        assert!(validate_username("émile").is_err());
        assert_eq!(normalize_username("  FeRRis "), "ferris");
    }

    #[test]
    fn test_summary_falls_back_to_username() {
        let summary = profile(55).summary();
        assert_eq!(summary.display_name, "Ferris");
        assert_eq!(summary.level, 3);
        assert_eq!(summary.level_name, "Regular");
    }

    #[test]
    fn test_display_name_and_bio_limits() {
        assert!(validate_display_name("Ferris the Crab").is_ok());
        assert!(validate_display_name(&"x".repeat(65)).is_err());
        assert!(validate_display_name("bad\u{0007}").is_err());
        assert!(validate_bio(&"b".repeat(1024)).is_ok());
        assert!(validate_bio(&"b".repeat(1025)).is_err());
    }
}
