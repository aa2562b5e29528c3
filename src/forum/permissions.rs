//! Permission checks for a single community.
//!
//! The permission model is:
//! - **Site admin**: moderator in every community, bypasses karma levels
//! - **Owner**: creator of the community, can add/remove moderators
//! - **Moderator**: can hide, lock and pin content and ban members
//! - **Member**: can post threads and comments (subject to karma level)
//!
//! A [`CommunityPermissions`] is resolved per request from the community, the
//! memberships and bans of the users involved, and the admin flag of each.

use crate::error::{LoopHubError, Result};
use crate::forum::community::{Ban, Community, CommunityRole, Membership};
use crate::forum::moderation::{ModAction, ModRequest};
use crate::forum::types::{CommunityId, UserId};
use std::collections::{HashMap, HashSet};

/// Resolved permission state of a community for the users loaded into it.
#[derive(Debug, Clone)]
pub struct CommunityPermissions {
    community_id: CommunityId,
    owner_id: UserId,
    is_private: bool,
    roles: HashMap<UserId, CommunityRole>,
    bans: HashMap<UserId, Ban>,
    admins: HashSet<UserId>,
}

impl CommunityPermissions {
    /// Starts from the community itself. The owner is always a member with the
    /// owner role.
    pub fn from_community(community: &Community) -> Self {
        let mut roles = HashMap::new();
        roles.insert(community.owner_id, CommunityRole::Owner);
        Self {
            community_id: community.id,
            owner_id: community.owner_id,
            is_private: community.is_private,
            roles,
            bans: HashMap::new(),
            admins: HashSet::new(),
        }
    }

    /// Adds a loaded membership. Memberships of other communities are ignored.
    pub fn add_membership(&mut self, membership: &Membership) {
        if membership.community_id != self.community_id {
            return;
        }
        if membership.user_id == self.owner_id {
            return;
        }
        self.roles.insert(membership.user_id, membership.role);
    }

    pub fn add_ban(&mut self, ban: Ban) {
        if ban.community_id == self.community_id {
            self.bans.insert(ban.user_id, ban);
        }
    }

    pub fn add_admin(&mut self, user: UserId) {
        self.admins.insert(user);
    }

    /// Builder-style variant of the `add_*` methods.
    pub fn with_membership(mut self, membership: Option<&Membership>) -> Self {
        if let Some(m) = membership {
            self.add_membership(m);
        }
        self
    }

    pub fn with_ban(mut self, ban: Option<Ban>) -> Self {
        if let Some(b) = ban {
            self.add_ban(b);
        }
        self
    }

    pub fn with_admin(mut self, user: UserId, is_admin: bool) -> Self {
        if is_admin {
            self.add_admin(user);
        }
        self
    }

    pub fn community_id(&self) -> CommunityId {
        self.community_id
    }

    pub fn role(&self, user: &UserId) -> Option<CommunityRole> {
        self.roles.get(user).copied()
    }

    pub fn is_admin(&self, user: &UserId) -> bool {
        self.admins.contains(user)
    }

    pub fn is_owner(&self, user: &UserId) -> bool {
        *user == self.owner_id
    }

    /// Owners and site admins count as moderators.
    pub fn is_moderator(&self, user: &UserId) -> bool {
        self.is_admin(user) || self.role(user).is_some_and(CommunityRole::can_moderate)
    }

    pub fn is_member(&self, user: &UserId) -> bool {
        self.roles.contains_key(user)
    }

    pub fn is_banned(&self, user: &UserId, now: u64) -> bool {
        self.bans.get(user).is_some_and(|ban| ban.is_active(now))
    }

    pub fn ban(&self, user: &UserId) -> Option<&Ban> {
        self.bans.get(user)
    }

    /// Public communities are visible to everyone; private ones only to
    /// members and admins.
    pub fn can_view(&self, user: Option<&UserId>) -> bool {
        if !self.is_private {
            return true;
        }
        user.is_some_and(|u| self.is_member(u) || self.is_admin(u))
    }

    /// Members who are not banned may post. Admins may always post.
    pub fn can_post(&self, user: &UserId, now: u64) -> bool {
        if self.is_admin(user) {
            return true;
        }
        self.is_member(user) && !self.is_banned(user, now)
    }

    pub fn can_moderate(&self, user: &UserId) -> bool {
        self.is_moderator(user)
    }

    /// Checks that `issuer` may perform `request` and applies the resulting
    /// role/ban change to this state.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The request is for a different community
    /// - The issuer lacks the authority for the action
    /// - The action would affect the owner, or a moderator ban by a moderator
    pub fn apply_action(&mut self, issuer: &UserId, request: &ModRequest, now: u64) -> Result<()> {
        if request.community != self.community_id {
            return Err(LoopHubError::validation(
                "Moderation action is for a different community",
            ));
        }
        request.validate()?;

        let is_owner = self.is_owner(issuer);
        let is_mod = self.is_moderator(issuer);

        if request.action.is_role_action() {
            if !is_owner {
                return Err(LoopHubError::permission_denied(
                    "Only the community owner can change moderators",
                ));
            }
        } else if !is_mod {
            return Err(LoopHubError::permission_denied(
                "Only moderators can perform moderation actions",
            ));
        }

        let target = request.target_user;
        match (request.action, target) {
            (ModAction::AddModerator, Some(target)) => {
                if !self.is_member(&target) {
                    return Err(LoopHubError::validation(
                        "Only members can become moderators",
                    ));
                }
                if self.is_banned(&target, now) {
                    return Err(LoopHubError::validation(
                        "Banned users cannot become moderators",
                    ));
                }
                if self.is_owner(&target) {
                    return Err(LoopHubError::validation("The owner is already a moderator"));
                }
                self.roles.insert(target, CommunityRole::Moderator);
            }
            (ModAction::RemoveModerator, Some(target)) => {
                if self.is_owner(&target) {
                    return Err(LoopHubError::validation(
                        "Cannot remove the community owner as moderator",
                    ));
                }
                if self.role(&target) != Some(CommunityRole::Moderator) {
                    return Err(LoopHubError::validation("User is not a moderator"));
                }
                self.roles.insert(target, CommunityRole::Member);
            }
            (ModAction::BanUser, Some(target)) => {
                if self.is_owner(&target) {
                    return Err(LoopHubError::permission_denied(
                        "Cannot ban the community owner",
                    ));
                }
                if target == *issuer {
                    return Err(LoopHubError::validation("Cannot ban yourself"));
                }
                if self.is_admin(&target) {
                    return Err(LoopHubError::permission_denied(
                        "Cannot ban a site administrator",
                    ));
                }
                if self.is_moderator(&target) && !is_owner && !self.is_admin(issuer) {
                    return Err(LoopHubError::permission_denied(
                        "Moderators cannot ban other moderators",
                    ));
                }
                let expires_at = request
                    .duration_hours
                    .map(|hours| now.saturating_add(hours.saturating_mul(3_600_000)));
                // A banned moderator loses the role.
                if self.role(&target) == Some(CommunityRole::Moderator) {
                    self.roles.insert(target, CommunityRole::Member);
                }
                self.bans.insert(
                    target,
                    Ban {
                        user_id: target,
                        community_id: self.community_id,
                        reason: request.reason.clone(),
                        banned_by: *issuer,
                        created_at: now,
                        expires_at,
                    },
                );
            }
            (ModAction::UnbanUser, Some(target)) => {
                if !self.is_banned(&target, now) {
                    return Err(LoopHubError::validation("User is not banned"));
                }
                self.bans.remove(&target);
            }
            // Content actions only need moderator authority, checked above.
            _ => {}
        }

        Ok(())
    }
}
