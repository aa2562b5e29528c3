//! Offline support for clients.
//!
//! Writes made while the server is unreachable go into a durable
//! [`OfflineQueue`] and are replayed in order once it is back
//! ([`replay`]). Reads are kept in an [`OfflineCache`] so the last fetched
//! listings stay viewable, labelled by how old they are.
//!
//! Both live in one RocksDB under the client's state directory.

pub mod action;
pub mod cache;
pub mod queue;
pub mod replay;

pub use action::{backoff_delay_ms, PendingAction, QueuedAction};
pub use cache::{CacheLookup, OfflineCache};
pub use queue::{Enqueued, FailedAttempt, OfflineQueue};
pub use replay::{flush_before_write, replay, ActionSink, DeliveryError, ReplayReport};

use crate::error::Result;
use crate::storage::{RocksDbConfig, RocksDbHandle};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Pending actions the queue holds at most.
pub const QUEUE_CAPACITY: usize = 100;

/// Failed attempts before an action is moved to the failed list.
pub const MAX_ATTEMPTS: u32 = 5;

/// First retry delay; doubles per attempt.
pub const BASE_BACKOFF_MS: u64 = 2_000;

/// Retry delay ceiling.
pub const MAX_BACKOFF_MS: u64 = 5 * 60 * 1_000;

/// Cached reads younger than this are fresh.
pub const CACHE_FRESH_MS: u64 = 5 * 60 * 1_000;

/// Cached reads younger than this are still served, marked stale.
pub const CACHE_STALE_MS: u64 = 24 * 60 * 60 * 1_000;

/// Cached reads older than this are purged.
pub const CACHE_EXPIRY_MS: u64 = 7 * 24 * 60 * 60 * 1_000;

/// Cache entries kept before the oldest are evicted.
pub const CACHE_CAPACITY: usize = 500;

const DB_DIR: &str = "offline_db";

pub(crate) const CF_PENDING: &str = "queue_pending";
pub(crate) const CF_FAILED: &str = "queue_failed";
pub(crate) const CF_META: &str = "queue_meta";
pub(crate) const CF_CACHE: &str = "cache_entries";
pub(crate) const CF_CACHE_AGE: &str = "cache_by_age";

const ALL_CFS: [&str; 5] = [CF_PENDING, CF_FAILED, CF_META, CF_CACHE, CF_CACHE_AGE];

/// Whether the server was reachable on the last request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    Online,
    Offline,
}

impl Connectivity {
    pub fn is_online(self) -> bool {
        self == Connectivity::Online
    }
}

/// The client-side database holding the queue and the cache.
#[derive(Debug, Clone)]
pub struct OfflineStore {
    db: RocksDbHandle,
}

impl OfflineStore {
    /// Opens (creating if needed) the store under `state_dir`.
    pub fn open(state_dir: impl AsRef<Path>) -> Result<Self> {
        let db_path = state_dir.as_ref().join(DB_DIR);
        let db = RocksDbHandle::open(&db_path, &RocksDbConfig::default(), &ALL_CFS)?;
        info!("Opened offline store at {:?}", db_path);
        Ok(Self { db })
    }

    pub fn queue(&self) -> OfflineQueue {
        OfflineQueue::new(self.db.clone())
    }

    pub fn cache(&self) -> OfflineCache {
        OfflineCache::new(self.db.clone(), CACHE_CAPACITY)
    }
}
