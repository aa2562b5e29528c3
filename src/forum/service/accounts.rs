//! Registration, sessions and profiles.

use super::ForumService;
use crate::auth::{
    check_token_format, generate_token, hash_password, hash_token, verify_password, Password,
    Session,
};
use crate::error::{LoopHubError, Result};
use crate::forum::karma::{progress, LevelProgress};
use crate::forum::types::UserId;
use crate::forum::user::{
    normalize_username, validate_bio, validate_display_name, validate_username, ProfileUpdate,
    UserAccount, UserProfile,
};
use tracing::{debug, info};

impl ForumService {
    /// Creates an account. The first account ever created becomes a site
    /// admin.
    pub fn register(
        &mut self,
        username: &str,
        password: &Password,
        display_name: Option<&str>,
    ) -> Result<UserProfile> {
        let username = username.trim();
        validate_username(username)?;
        password.validate()?;
        let display_name = display_name.map(str::trim).unwrap_or_default();
        validate_display_name(display_name)?;

        let normalized = normalize_username(username);
        if self.storage.user_id_by_username(&normalized)?.is_some() {
            return Err(LoopHubError::conflict(format!(
                "Username '{}' is already taken",
                username
            )));
        }

        let is_admin = !self.storage.has_users()?;
        let profile = UserProfile {
            id: UserId::new(),
            username: username.to_string(),
            display_name: display_name.to_string(),
            bio: String::new(),
            karma: 0,
            is_admin,
            created_at: self.now(),
        };
        let account = UserAccount {
            profile: profile.clone(),
            password_hash: hash_password(password)?,
        };
        self.storage.create_user(&account, &normalized)?;

        info!(
            user = %profile.id.short(),
            username = %profile.username,
            is_admin,
            "Registered user"
        );
        Ok(profile)
    }

    /// Checks credentials and opens a session. Returns the bearer token (shown
    /// once) and the stored session.
    pub fn login(&mut self, username: &str, password: &Password) -> Result<(String, Session)> {
        let invalid = || LoopHubError::unauthorized("Invalid username or password");

        let account = match self
            .storage
            .user_id_by_username(&normalize_username(username))?
        {
            Some(id) => self.storage.get_user(&id)?.ok_or_else(invalid)?,
            None => return Err(invalid()),
        };
        if !verify_password(password, &account.password_hash)? {
            debug!(user = %account.profile.id.short(), "Rejected login");
            return Err(invalid());
        }

        let token = generate_token();
        let session = Session::new(&token, account.profile.id, self.now(), self.session_ttl_ms);
        self.storage.put_session(&session)?;
        info!(user = %account.profile.id.short(), "Opened session");
        Ok((token, session))
    }

    /// Ends the session behind `token`. Unknown tokens are not an error.
    pub fn logout(&mut self, token: &str) -> Result<()> {
        check_token_format(token)?;
        self.storage.delete_session(&hash_token(token))
    }

    /// Resolves a bearer token to its user. Expired sessions are removed on
    /// sight.
    pub fn authenticate(&self, token: &str) -> Result<UserId> {
        check_token_format(token)?;
        let token_hash = hash_token(token);
        let session = self
            .storage
            .get_session(&token_hash)?
            .filter(|s| s.matches(token))
            .ok_or_else(|| LoopHubError::unauthorized("Unknown session"))?;

        if session.is_expired(self.now()) {
            self.storage.delete_session(&token_hash)?;
            return Err(LoopHubError::unauthorized("Session expired"));
        }
        if self.storage.get_user(&session.user_id)?.is_none() {
            return Err(LoopHubError::unauthorized("Account no longer exists"));
        }
        Ok(session.user_id)
    }

    pub fn get_profile(&self, id: &UserId) -> Result<UserProfile> {
        Ok(self.load_user(id)?.profile)
    }

    /// Looks a user up by username (case-insensitive).
    pub fn find_user(&self, username: &str) -> Result<UserProfile> {
        let normalized = normalize_username(username.trim_start_matches('@'));
        let id = self
            .storage
            .user_id_by_username(&normalized)?
            .ok_or_else(|| LoopHubError::not_found(format!("User '{}' not found", username)))?;
        self.get_profile(&id)
    }

    pub fn update_profile(&mut self, actor: &UserId, update: ProfileUpdate) -> Result<UserProfile> {
        let mut account = self.load_user(actor)?;
        if let Some(display_name) = update.display_name {
            let display_name = display_name.trim();
            validate_display_name(display_name)?;
            account.profile.display_name = display_name.to_string();
        }
        if let Some(bio) = update.bio {
            validate_bio(&bio)?;
            account.profile.bio = bio;
        }
        self.storage.put_user(&account)?;
        Ok(account.profile)
    }

    pub fn level_progress(&self, id: &UserId) -> Result<LevelProgress> {
        Ok(progress(self.load_user(id)?.profile.karma))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::harness;
    use super::ForumService;
    use crate::auth::Password;
    use crate::error::LoopHubError;
    use crate::forum::user::ProfileUpdate;

    #[test]
    fn test_first_user_is_admin() {
        let mut h = harness();
        let first = h.user("alice");
        let second = h.user("bob");
        assert!(h.service.get_profile(&first).unwrap().is_admin);
        assert!(!h.service.get_profile(&second).unwrap().is_admin);
    }

    #[test]
    fn test_usernames_are_unique_case_insensitively() {
        let mut h = harness();
        h.user("alice");
        let err = h
            .service
            .register("ALICE", &Password::new("password123"), None)
            .unwrap_err();
        assert!(matches!(err, LoopHubError::Conflict(_)));
    }

    #[test]
    fn test_weak_password_rejected() {
        let mut h = harness();
        let err = h
            .service
            .register("alice", &Password::new("short"), None)
            .unwrap_err();
        assert!(matches!(err, LoopHubError::Validation(_)));
    }

    #[test]
    fn test_login_and_authenticate() {
        let mut h = harness();
        let alice = h.user("alice");
        let (token, session) = h
            .service
            .login("Alice", &Password::new("password123"))
            .unwrap();
        assert_eq!(session.user_id, alice);
        assert_eq!(h.service.authenticate(&token).unwrap(), alice);

        h.service.logout(&token).unwrap();
        assert!(matches!(
            h.service.authenticate(&token),
            Err(LoopHubError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_wrong_password_is_unauthorized() {
        let mut h = harness();
        h.user("alice");
        assert!(matches!(
            h.service.login("alice", &Password::new("wrong-password")),
            Err(LoopHubError::Unauthorized(_))
        ));
        assert!(matches!(
            h.service.login("nobody", &Password::new("password123")),
            Err(LoopHubError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_expired_session_is_removed() {
        let mut h = harness();
        h.user("alice");
        let storage = h.service.storage().clone();
        h.service = ForumService::new(storage, h.clock.clone()).with_session_ttl(1_000);
        let (token, _) = h
            .service
            .login("alice", &Password::new("password123"))
            .unwrap();
        h.clock.advance(1_000);
        assert!(matches!(
            h.service.authenticate(&token),
            Err(LoopHubError::Unauthorized(_))
        ));
        assert_eq!(h.service.stats().unwrap().sessions, 0);
    }

    #[test]
    fn test_update_profile() {
        let mut h = harness();
        let alice = h.user("alice");
        let profile = h
            .service
            .update_profile(
                &alice,
                ProfileUpdate {
                    display_name: Some("  Alice L. ".to_string()),
                    bio: Some("Hello".to_string()),
                },
            )
            .unwrap();
        assert_eq!(profile.display_name, "Alice L.");
        assert_eq!(h.service.find_user("@ALICE").unwrap().bio, "Hello");
    }
}
