//! Communities, memberships and bans.

use crate::error::{LoopHubError, Result};
use crate::forum::constants::{
    MAX_COMMUNITY_NAME_LEN, MAX_DESCRIPTION_SIZE, MAX_SLUG_LEN, MIN_SLUG_LEN,
};
use crate::forum::types::{CommunityId, ThreadId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A named container of threads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Community {
    pub id: CommunityId,
    /// Unique `[a-z0-9-]` handle used in URLs and the CLI.
    pub slug: String,
    pub name: String,
    pub description: String,
    pub owner_id: UserId,
    /// Private communities are only visible to members and cannot be joined
    /// directly.
    pub is_private: bool,
    pub created_at: u64,
    pub member_count: u64,
    pub thread_count: u64,
    /// Pinned threads in pin order, at most `MAX_PINNED_THREADS`.
    #[serde(default)]
    pub pinned_thread_ids: Vec<ThreadId>,
}

/// Role of a member inside one community.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommunityRole {
    Member,
    Moderator,
    Owner,
}

impl CommunityRole {
    /// Owners are implicitly moderators.
    pub fn can_moderate(self) -> bool {
        matches!(self, CommunityRole::Moderator | CommunityRole::Owner)
    }
}

impl fmt::Display for CommunityRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommunityRole::Member => write!(f, "member"),
            CommunityRole::Moderator => write!(f, "moderator"),
            CommunityRole::Owner => write!(f, "owner"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub user_id: UserId,
    pub community_id: CommunityId,
    pub role: CommunityRole,
    pub joined_at: u64,
}

/// A ban from one community, optionally temporary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ban {
    pub user_id: UserId,
    pub community_id: CommunityId,
    pub reason: String,
    pub banned_by: UserId,
    pub created_at: u64,
    /// `None` means permanent.
    pub expires_at: Option<u64>,
}

impl Ban {
    pub fn is_active(&self, now: u64) -> bool {
        self.expires_at.map_or(true, |expires| now < expires)
    }
}

/// Input for creating a community.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCommunity {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_private: bool,
}

/// Fields an owner or moderator may change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommunityUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Slugs are matched case-insensitively, so they are stored lowercased.
pub fn normalize_slug(slug: &str) -> String {
    slug.trim().to_ascii_lowercase()
}

pub fn validate_slug(slug: &str) -> Result<()> {
    let len = slug.chars().count();
    if !(MIN_SLUG_LEN..=MAX_SLUG_LEN).contains(&len) {
        return Err(LoopHubError::validation(format!(
            "Community slug must be {}-{} characters",
            MIN_SLUG_LEN, MAX_SLUG_LEN
        )));
    }
    if !slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(LoopHubError::validation(
            "Community slug may only contain a-z, 0-9 and '-'",
        ));
    }
    if slug.starts_with('-') || slug.ends_with('-') {
        return Err(LoopHubError::validation(
            "Community slug cannot start or end with '-'",
        ));
    }
    Ok(())
}

pub fn validate_community_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(LoopHubError::validation("Community name cannot be empty"));
    }
    if name.chars().count() > MAX_COMMUNITY_NAME_LEN {
        return Err(LoopHubError::validation(format!(
            "Community name too long (max {} characters)",
            MAX_COMMUNITY_NAME_LEN
        )));
    }
    Ok(())
}

pub fn validate_description(description: &str) -> Result<()> {
    if description.len() > MAX_DESCRIPTION_SIZE {
        return Err(LoopHubError::validation(format!(
            "Description too large: {} bytes (max {})",
            description.len(),
            MAX_DESCRIPTION_SIZE
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_rules() {
        assert!(validate_slug("rust-lang").is_ok());
        assert!(validate_slug("r2d2").is_ok());
        assert!(validate_slug("ab").is_err());
        assert!(validate_slug("Rust").is_err());
        assert!(validate_slug("-rust").is_err());
        assert!(validate_slug("rust_lang").is_err());
        assert_eq!(normalize_slug(" Rust-Lang "), "rust-lang");
    }

    #[test]
    fn test_name_and_description_limits() {
        assert!(validate_community_name("Rustaceans").is_ok());
        assert!(validate_community_name("   ").is_err());
        assert!(validate_community_name(&"n".repeat(101)).is_err());
        assert!(validate_description(&"d".repeat(10 * 1024 + 1)).is_err());
    }

    #[test]
    fn test_ban_expiry() {
        let mut ban = Ban {
            user_id: UserId::new(),
            community_id: CommunityId::new(),
            reason: "spam".to_string(),
            banned_by: UserId::new(),
            created_at: 0,
            expires_at: Some(1_000),
        };
        assert!(ban.is_active(999));
        assert!(!ban.is_active(1_000));
        ban.expires_at = None;
        assert!(ban.is_active(u64::MAX));
    }

    #[test]
    fn test_role_ordering() {
        assert!(CommunityRole::Owner > CommunityRole::Moderator);
        assert!(CommunityRole::Owner.can_moderate());
        assert!(!CommunityRole::Member.can_moderate());
    }
}
