//! Community lifecycle and membership.

use super::ForumService;
use crate::error::{LoopHubError, Result};
use crate::forum::community::{
    normalize_slug, validate_community_name, validate_description, validate_slug, Community,
    CommunityRole, CommunityUpdate, Membership, NewCommunity,
};
use crate::forum::constants::clamp_page_size;
use crate::forum::storage::{Cursor, ForumStorage, Page};
use crate::forum::types::{CommunityId, UserId};
use crate::forum::user::UserSummary;
use serde::{Deserialize, Serialize};
use tracing::info;

/// A community as seen by one viewer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunityView {
    pub community: Community,
    /// `None` when the viewer is anonymous or not a member.
    pub your_role: Option<CommunityRole>,
    pub banned: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberView {
    pub user: UserSummary,
    pub role: CommunityRole,
    pub joined_at: u64,
}

impl ForumService {
    /// Creates a community owned by `actor`, who also becomes its first
    /// member.
    pub fn create_community(&mut self, actor: &UserId, input: NewCommunity) -> Result<Community> {
        let account = self.load_user(actor)?;
        Self::require_level(&account, |p| p.create_community, "create communities")?;

        let slug = normalize_slug(&input.slug);
        validate_slug(&slug)?;
        let name = input.name.trim().to_string();
        validate_community_name(&name)?;
        validate_description(&input.description)?;

        if self.storage.community_id_by_slug(&slug)?.is_some() {
            return Err(LoopHubError::conflict(format!(
                "Community '{}' already exists",
                slug
            )));
        }

        let now = self.now();
        let community = Community {
            id: CommunityId::new(),
            slug,
            name,
            description: input.description,
            owner_id: *actor,
            is_private: input.is_private,
            created_at: now,
            member_count: 1,
            thread_count: 0,
            pinned_thread_ids: Vec::new(),
        };
        let owner = Membership {
            user_id: *actor,
            community_id: community.id,
            role: CommunityRole::Owner,
            joined_at: now,
        };
        self.storage.create_community(&community, &owner)?;

        info!(
            community = %community.slug,
            owner = %actor.short(),
            private = community.is_private,
            "Created community"
        );
        Ok(community)
    }

    pub fn get_community(&self, viewer: Option<&UserId>, id_or_slug: &str) -> Result<CommunityView> {
        let community = self.find_community(id_or_slug)?;
        let account = self.load_viewer(viewer)?;
        let perms = self.viewer_permissions(&community, account.as_ref())?;
        Self::ensure_can_view(&perms, viewer)?;

        let (your_role, banned) = match viewer {
            Some(user) => (perms.role(user), perms.is_banned(user, self.now())),
            None => (None, false),
        };
        Ok(CommunityView {
            community,
            your_role,
            banned,
        })
    }

    /// Communities newest first. Private communities only show up for their
    /// members and site admins.
    pub fn list_communities(
        &self,
        viewer: Option<&UserId>,
        cursor: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Page<Community>> {
        let cursor = Cursor::decode_opt(cursor)?;
        let is_admin = self
            .load_viewer(viewer)?
            .is_some_and(|a| a.profile.is_admin);
        let storage = &self.storage;
        storage.list_communities(cursor.as_ref(), clamp_page_size(limit), |c| {
            if !c.is_private || is_admin {
                return Ok(true);
            }
            match viewer {
                Some(user) => Ok(storage.get_membership(&c.id, user)?.is_some()),
                None => Ok(false),
            }
        })
    }

    pub fn join_community(&mut self, actor: &UserId, community_id: &CommunityId) -> Result<Membership> {
        let account = self.load_user(actor)?;
        let mut community = self.load_community(community_id)?;
        let perms = self.permissions(&community, &[&account])?;

        if perms.is_member(actor) {
            return Err(LoopHubError::conflict("Already a member of this community"));
        }
        if perms.is_banned(actor, self.now()) {
            return Err(LoopHubError::permission_denied(
                "You are banned from this community",
            ));
        }
        if community.is_private && !perms.is_admin(actor) {
            return Err(LoopHubError::permission_denied(
                "Private communities can only be joined by invitation",
            ));
        }

        self.insert_member(&mut community, *actor)
    }

    /// Adds `user` to a community on a moderator's behalf. This is how
    /// private communities gain members.
    pub fn add_member(
        &mut self,
        actor: &UserId,
        community_id: &CommunityId,
        user: &UserId,
    ) -> Result<Membership> {
        let account = self.load_user(actor)?;
        let target = self.load_user(user)?;
        let mut community = self.load_community(community_id)?;
        let perms = self.permissions(&community, &[&account, &target])?;

        if !perms.can_moderate(actor) {
            return Err(LoopHubError::permission_denied(
                "Only moderators can add members",
            ));
        }
        if perms.is_member(user) {
            return Err(LoopHubError::conflict("User is already a member"));
        }
        if perms.is_banned(user, self.now()) {
            return Err(LoopHubError::validation("User is banned from this community"));
        }

        self.insert_member(&mut community, *user)
    }

    fn insert_member(&mut self, community: &mut Community, user: UserId) -> Result<Membership> {
        let membership = Membership {
            user_id: user,
            community_id: community.id,
            role: CommunityRole::Member,
            joined_at: self.now(),
        };
        community.member_count += 1;
        self.storage.commit(vec![
            ForumStorage::membership_op(&membership)?,
            ForumStorage::community_op(community)?,
        ])?;
        info!(
            community = %community.slug,
            user = %user.short(),
            "Joined community"
        );
        Ok(membership)
    }

    /// Leaves a community. The owner cannot leave.
    pub fn leave_community(&mut self, actor: &UserId, community_id: &CommunityId) -> Result<()> {
        let mut community = self.load_community(community_id)?;
        if community.owner_id == *actor {
            return Err(LoopHubError::validation(
                "The owner cannot leave their community",
            ));
        }
        if self.storage.get_membership(community_id, actor)?.is_none() {
            return Err(LoopHubError::not_found("Not a member of this community"));
        }

        community.member_count = community.member_count.saturating_sub(1);
        self.storage.commit(vec![
            ForumStorage::membership_delete_op(community_id, actor),
            ForumStorage::community_op(&community)?,
        ])?;
        info!(
            community = %community.slug,
            user = %actor.short(),
            "Left community"
        );
        Ok(())
    }

    /// Members with their roles, owner and moderators first.
    pub fn list_members(&self, viewer: Option<&UserId>, community_id: &CommunityId) -> Result<Vec<MemberView>> {
        let community = self.load_community(community_id)?;
        let account = self.load_viewer(viewer)?;
        let perms = self.viewer_permissions(&community, account.as_ref())?;
        Self::ensure_can_view(&perms, viewer)?;

        let mut members = Vec::new();
        for membership in self.storage.memberships(community_id)? {
            members.push(MemberView {
                user: self.user_summary(&membership.user_id)?,
                role: membership.role,
                joined_at: membership.joined_at,
            });
        }
        members.sort_by(|a, b| {
            b.role
                .cmp(&a.role)
                .then_with(|| a.joined_at.cmp(&b.joined_at))
        });
        Ok(members)
    }

    /// Renames or re-describes a community. Moderators only.
    pub fn update_community(
        &mut self,
        actor: &UserId,
        community_id: &CommunityId,
        update: CommunityUpdate,
    ) -> Result<Community> {
        let account = self.load_user(actor)?;
        let mut community = self.load_community(community_id)?;
        let perms = self.permissions(&community, &[&account])?;
        if !perms.can_moderate(actor) {
            return Err(LoopHubError::permission_denied(
                "Only moderators can edit the community",
            ));
        }

        if let Some(name) = update.name {
            let name = name.trim().to_string();
            validate_community_name(&name)?;
            community.name = name;
        }
        if let Some(description) = update.description {
            validate_description(&description)?;
            community.description = description;
        }
        self.storage.put_community(&community)?;
        Ok(community)
    }
}
