//! Shared limits for validation, used by the library, server and CLI alike.

// =============================================================================
// Accounts
// =============================================================================

/// Username length bounds (characters).
pub const MIN_USERNAME_LEN: usize = 3;
pub const MAX_USERNAME_LEN: usize = 32;

/// Password length bounds (bytes).
pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 128;

/// Maximum display name length (characters).
pub const MAX_DISPLAY_NAME_LEN: usize = 64;

/// Maximum profile bio size (1KB).
pub const MAX_BIO_SIZE: usize = 1024;

/// Default session lifetime (30 days in milliseconds).
pub const DEFAULT_SESSION_TTL_MS: u64 = 30 * 24 * 60 * 60 * 1000;

// =============================================================================
// Communities
// =============================================================================

/// Community slug length bounds (characters, `[a-z0-9-]`).
pub const MIN_SLUG_LEN: usize = 3;
pub const MAX_SLUG_LEN: usize = 32;

/// Maximum community name length (characters).
pub const MAX_COMMUNITY_NAME_LEN: usize = 100;

/// Maximum community description size (10KB).
pub const MAX_DESCRIPTION_SIZE: usize = 10 * 1024;

/// Maximum pinned threads per community.
pub const MAX_PINNED_THREADS: usize = 3;

// =============================================================================
// Content
// =============================================================================

/// Maximum thread title length (characters).
pub const MAX_THREAD_TITLE_LEN: usize = 300;

/// Maximum thread body size (40KB).
pub const MAX_THREAD_BODY_SIZE: usize = 40 * 1024;

/// Maximum comment body size (10KB).
pub const MAX_COMMENT_BODY_SIZE: usize = 10 * 1024;

/// Maximum tags per thread.
pub const MAX_TAGS_COUNT: usize = 5;

/// Maximum length of a single tag (characters).
pub const MAX_TAG_LEN: usize = 32;

/// Deepest allowed comment nesting; top-level comments have depth 0.
pub const MAX_COMMENT_DEPTH: u32 = 8;

/// Body shown in place of deleted comments.
pub const DELETED_BODY: &str = "[deleted]";

/// Body shown in place of hidden content for non-moderators.
pub const HIDDEN_BODY: &str = "[removed by moderator]";

// =============================================================================
// Polls
// =============================================================================

pub const MIN_POLL_OPTIONS: usize = 2;
pub const MAX_POLL_OPTIONS: usize = 10;

/// Maximum poll option length (characters).
pub const MAX_POLL_OPTION_LEN: usize = 200;

/// Maximum poll question length (characters).
pub const MAX_POLL_QUESTION_LEN: usize = 300;

// =============================================================================
// Moderation
// =============================================================================

/// Maximum report / moderation reason size (1KB).
pub const MAX_REASON_SIZE: usize = 1024;

// =============================================================================
// Listing
// =============================================================================

/// Page size used when the caller does not specify one.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Upper bound on any requested page size.
pub const MAX_PAGE_SIZE: usize = 100;

/// Maximum mention suggestions returned.
pub const MAX_MENTION_SUGGESTIONS: usize = 10;

/// Clamps a requested page size into `1..=MAX_PAGE_SIZE`.
pub fn clamp_page_size(requested: Option<usize>) -> usize {
    requested
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE)
}
