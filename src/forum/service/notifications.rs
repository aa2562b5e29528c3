//! A user's notification inbox.

use super::ForumService;
use crate::error::Result;
use crate::forum::constants::clamp_page_size;
use crate::forum::notification::Notification;
use crate::forum::storage::{Cursor, ForumStorage, Page};
use crate::forum::types::{NotificationId, UserId};
use std::collections::HashSet;

impl ForumService {
    /// Notifications newest first.
    pub fn list_notifications(
        &self,
        actor: &UserId,
        unread_only: bool,
        cursor: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Page<Notification>> {
        let cursor = Cursor::decode_opt(cursor)?;
        self.storage
            .list_notifications(actor, unread_only, cursor.as_ref(), clamp_page_size(limit))
    }

    /// Marks the given notifications read. IDs that are not the actor's own,
    /// or already read, are skipped. Returns how many changed.
    pub fn mark_read(&mut self, actor: &UserId, ids: &[NotificationId]) -> Result<usize> {
        let wanted: HashSet<&NotificationId> = ids.iter().collect();
        self.mark(actor, |n| wanted.contains(&n.id))
    }

    pub fn mark_all_read(&mut self, actor: &UserId) -> Result<usize> {
        self.mark(actor, |_| true)
    }

    fn mark(&mut self, actor: &UserId, mut select: impl FnMut(&Notification) -> bool) -> Result<usize> {
        let mut ops = Vec::new();
        for mut notification in self.storage.user_notifications(actor)? {
            if notification.read || !select(&notification) {
                continue;
            }
            notification.read = true;
            ops.push(ForumStorage::notification_op(&notification)?);
        }
        let changed = ops.len();
        if changed > 0 {
            self.storage.commit(ops)?;
        }
        Ok(changed)
    }

    pub fn unread_count(&self, actor: &UserId) -> Result<usize> {
        Ok(self
            .storage
            .user_notifications(actor)?
            .iter()
            .filter(|n| !n.read)
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::harness;
    use crate::forum::comment::NewComment;
    use crate::forum::thread::NewThread;

    #[test]
    fn test_mark_read() {
        let mut h = harness();
        let owner = h.user("owner");
        let bob = h.user("bob");
        let community = h.community(&owner, "rust");
        let thread = h
            .service
            .create_thread(&owner, NewThread::new(community, "Inbox", ""))
            .unwrap();
        for i in 0..3 {
            h.tick();
            h.service
                .create_comment(
                    &bob,
                    NewComment {
                        thread_id: thread.id,
                        parent_id: None,
                        body: format!("comment {}", i),
                    },
                )
                .unwrap();
        }
        assert_eq!(h.service.unread_count(&owner).unwrap(), 3);

        let page = h.service.list_notifications(&owner, false, None, Some(2)).unwrap();
        assert_eq!(page.items.len(), 2);
        assert!(page.has_more());
        assert!(page.items[0].created_at > page.items[1].created_at);

        // Someone else's IDs are ignored.
        let first = page.items[0].id;
        assert_eq!(h.service.mark_read(&bob, &[first]).unwrap(), 0);
        assert_eq!(h.service.mark_read(&owner, &[first]).unwrap(), 1);
        assert_eq!(h.service.unread_count(&owner).unwrap(), 2);

        let unread = h.service.list_notifications(&owner, true, None, None).unwrap();
        assert_eq!(unread.items.len(), 2);

        assert_eq!(h.service.mark_all_read(&owner).unwrap(), 2);
        assert_eq!(h.service.unread_count(&owner).unwrap(), 0);
    }
}
