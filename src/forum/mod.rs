//! The LoopHub forum: communities, threads, comments and the karma system
//! around them.
//!
//! ## Hierarchy
//!
//! ```text
//! Community
//!     └── Thread (optional poll)
//!             └── Comment
//!                     └── Comment (reply, up to 8 levels deep)
//! ```
//!
//! Votes and reactions attach to threads and comments. Upvotes and
//! downvotes move the author's karma, and karma unlocks levels, which gate
//! what a user may do (see [`karma`]).
//!
//! ## Layers
//!
//! - Domain types and their validation live in one module per concept.
//! - [`storage::ForumStorage`] persists them in RocksDB column families.
//! - [`ForumService`] implements every operation with its permission checks,
//!   writing each operation's records in a single batch.

pub mod comment;
pub mod community;
pub mod constants;
pub mod feed;
pub mod karma;
pub mod mention;
pub mod moderation;
pub mod notification;
pub mod permissions;
pub mod poll;
pub mod reaction;
pub mod service;
pub mod storage;
pub mod thread;
pub mod types;
pub mod user;
pub mod vote;

pub use comment::{Comment, CommentNode, CommentSort, NewComment};
pub use community::{Ban, Community, CommunityRole, CommunityUpdate, Membership, NewCommunity};
pub use karma::{Level, LevelPermissions, LevelProgress};
pub use mention::MentionCandidate;
pub use moderation::{ModAction, ModLogEntry, ModRequest, Report, ReportStatus};
pub use notification::{Notification, NotificationKind};
pub use permissions::CommunityPermissions;
pub use poll::{NewPoll, Poll, PollResults};
pub use reaction::{ReactionSummary, ReactionToggle};
pub use service::{CommunityView, ForumService, MemberView, ThreadListItem};
pub use storage::{Cursor, ForumStats, ForumStorage, Page};
pub use thread::{NewThread, Thread, ThreadEdit, ThreadSort, ThreadView};
pub use types::{
    Clock, CommentId, CommunityId, EntityId, ManualClock, NotificationId, PollId, ReactionKind,
    ReportId, SystemClock, TargetRef, ThreadId, UserId, VoteDirection,
};
pub use user::{ProfileUpdate, UserProfile, UserSummary};
pub use vote::VoteOutcome;
