//! # LoopHub
//!
//! A community forum: users join communities, start threads (optionally
//! with a poll), comment in nested replies, vote, react and mention each
//! other. Votes earn karma, karma unlocks levels, and levels gate what a
//! user may do. Moderators pin, lock, hide and ban, and every action lands
//! in a per-community mod log.
//!
//! ## Layout
//!
//! - [`forum`]: domain types and [`forum::ForumService`], the RocksDB-backed
//!   implementation of every operation.
//! - [`auth`]: password hashing and session tokens.
//! - [`api`] and [`rpc`]: the JSON-RPC 2.0 wire format shared by the server
//!   (`loophub-server`) and [`client::LoopHubClient`].
//! - [`offline`]: the client-side queue of pending writes and the read cache
//!   used while the server is unreachable.
//! - [`cli`]: the `loophub` command-line client.
//!
//! ## Example
//!
//! ```rust,no_run
//! use loophub::auth::Password;
//! use loophub::forum::{ForumService, ForumStorage, NewCommunity};
//! # fn main() -> loophub::Result<()> {
//! let storage = ForumStorage::new("loophub_data")?;
//! let mut forum = ForumService::with_system_clock(storage);
//! let alice = forum.register("alice", &Password::new("correct horse"), None)?;
//! let (token, _session) = forum.login("alice", &Password::new("correct horse"))?;
//! assert_eq!(forum.authenticate(&token)?, alice.id);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod cli;
pub mod client;
pub mod error;
pub mod forum;
pub mod offline;
pub mod rpc;
pub mod storage;

pub use error::{LoopHubError, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
