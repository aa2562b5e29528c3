//! RPC server state types.

use loophub::forum::ForumService;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Thread-safe forum service. Mutations take the write lock, so writes are
/// applied one at a time.
pub type SharedForum = Arc<RwLock<ForumService>>;

/// Application state handed to every request.
#[derive(Clone)]
pub struct AppState {
    pub forum: SharedForum,
}

impl AppState {
    pub fn new(service: ForumService) -> Self {
        Self {
            forum: Arc::new(RwLock::new(service)),
        }
    }
}

// =============================================================================
// RwLock Helpers
// =============================================================================

pub fn acquire_read(state: &RwLock<ForumService>) -> RwLockReadGuard<'_, ForumService> {
    state.read().unwrap_or_else(|p| p.into_inner())
}

pub fn acquire_write(state: &RwLock<ForumService>) -> RwLockWriteGuard<'_, ForumService> {
    state.write().unwrap_or_else(|p| p.into_inner())
}
