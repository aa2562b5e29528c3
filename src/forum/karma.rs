//! Karma levels and the permissions they unlock.
//!
//! Levels are a fixed lookup table over karma thresholds. Each level grants
//! everything the previous one did plus its own additions. Users whose karma
//! sinks below [`RESTRICTED_KARMA`] drop to the restricted pseudo-level, which
//! may only comment.

use serde::{Deserialize, Serialize};

/// Karma below which a user is restricted.
pub const RESTRICTED_KARMA: i64 = -20;

/// What a level allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LevelPermissions {
    pub create_thread: bool,
    pub comment: bool,
    pub upvote: bool,
    pub react: bool,
    pub downvote: bool,
    pub create_poll: bool,
    pub create_community: bool,
}

impl LevelPermissions {
    /// Everything allowed; used for site admins.
    pub const ALL: LevelPermissions = LevelPermissions {
        create_thread: true,
        comment: true,
        upvote: true,
        react: true,
        downvote: true,
        create_poll: true,
        create_community: true,
    };

    const RESTRICTED: LevelPermissions = LevelPermissions {
        create_thread: false,
        comment: true,
        upvote: false,
        react: false,
        downvote: false,
        create_poll: false,
        create_community: false,
    };

    const BASE: LevelPermissions = LevelPermissions {
        create_thread: true,
        comment: true,
        upvote: true,
        react: true,
        downvote: false,
        create_poll: false,
        create_community: false,
    };

    const WITH_DOWNVOTE: LevelPermissions = LevelPermissions {
        downvote: true,
        ..Self::BASE
    };

    const WITH_POLLS: LevelPermissions = LevelPermissions {
        create_poll: true,
        ..Self::WITH_DOWNVOTE
    };
}

/// A row of the level table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Level {
    /// 0 for restricted, 1..=8 otherwise.
    pub number: u8,
    pub name: &'static str,
    pub min_karma: i64,
    pub permissions: LevelPermissions,
}

/// The restricted pseudo-level.
pub const RESTRICTED_LEVEL: Level = Level {
    number: 0,
    name: "Restricted",
    min_karma: i64::MIN,
    permissions: LevelPermissions::RESTRICTED,
};

/// Regular levels, ascending by threshold.
pub const LEVELS: [Level; 8] = [
    Level {
        number: 1,
        name: "Newcomer",
        min_karma: 0,
        permissions: LevelPermissions::BASE,
    },
    Level {
        number: 2,
        name: "Member",
        min_karma: 10,
        permissions: LevelPermissions::WITH_DOWNVOTE,
    },
    Level {
        number: 3,
        name: "Regular",
        min_karma: 50,
        permissions: LevelPermissions::WITH_POLLS,
    },
    Level {
        number: 4,
        name: "Contributor",
        min_karma: 150,
        permissions: LevelPermissions::ALL,
    },
    Level {
        number: 5,
        name: "Trusted",
        min_karma: 400,
        permissions: LevelPermissions::ALL,
    },
    Level {
        number: 6,
        name: "Veteran",
        min_karma: 1000,
        permissions: LevelPermissions::ALL,
    },
    Level {
        number: 7,
        name: "Elder",
        min_karma: 2500,
        permissions: LevelPermissions::ALL,
    },
    Level {
        number: 8,
        name: "Legend",
        min_karma: 5000,
        permissions: LevelPermissions::ALL,
    },
];

/// Level for a karma value. Karma between the restricted threshold and zero
/// still counts as level 1.
pub fn level_for_karma(karma: i64) -> Level {
    if karma < RESTRICTED_KARMA {
        return RESTRICTED_LEVEL;
    }
    LEVELS
        .iter()
        .rev()
        .find(|level| karma >= level.min_karma)
        .copied()
        .unwrap_or(LEVELS[0])
}

/// Where a user stands relative to the next level.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelProgress {
    pub karma: i64,
    pub level: Level,
    /// `None` at the top level.
    pub next: Option<Level>,
    /// Karma earned since entering the current level.
    pub karma_into_level: i64,
    /// Karma still needed for the next level (0 at the top).
    pub karma_needed: i64,
    /// 0..=100.
    pub percent: u8,
}

/// Computes progress towards the next level.
pub fn progress(karma: i64) -> LevelProgress {
    let level = level_for_karma(karma);

    if level.number == 0 {
        let next = LEVELS[0];
        // Climbing out of restriction means getting back to the threshold.
        let needed = RESTRICTED_KARMA - karma;
        return LevelProgress {
            karma,
            level,
            next: Some(next),
            karma_into_level: 0,
            karma_needed: needed.max(0),
            percent: 0,
        };
    }

    let next = LEVELS.iter().find(|l| l.number == level.number + 1).copied();
    let floor = level.min_karma.min(karma.max(level.min_karma));
    let into = (karma - floor).max(0);

    match next {
        Some(next_level) => {
            let span = next_level.min_karma - level.min_karma;
            let needed = (next_level.min_karma - karma).max(0);
            let percent = if span > 0 {
                ((into.min(span) * 100) / span) as u8
            } else {
                100
            };
            LevelProgress {
                karma,
                level,
                next: Some(next_level),
                karma_into_level: into,
                karma_needed: needed,
                percent,
            }
        }
        None => LevelProgress {
            karma,
            level,
            next: None,
            karma_into_level: into,
            karma_needed: 0,
            percent: 100,
        },
    }
}

/// Permissions for a user, admins getting everything.
pub fn permissions_for(karma: i64, is_admin: bool) -> LevelPermissions {
    if is_admin {
        LevelPermissions::ALL
    } else {
        level_for_karma(karma).permissions
    }
}

/// Returns the new level if moving from `before` to `after` crossed upward
/// into a higher level.
pub fn level_up(before: i64, after: i64) -> Option<Level> {
    let old = level_for_karma(before);
    let new = level_for_karma(after);
    (new.number > old.number).then_some(new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_ascending() {
        for pair in LEVELS.windows(2) {
            assert!(pair[0].min_karma < pair[1].min_karma);
            assert_eq!(pair[0].number + 1, pair[1].number);
        }
    }

    #[test]
    fn test_level_boundaries() {
        assert_eq!(level_for_karma(0).number, 1);
        assert_eq!(level_for_karma(-5).number, 1);
        assert_eq!(level_for_karma(9).number, 1);
        assert_eq!(level_for_karma(10).number, 2);
        assert_eq!(level_for_karma(149).number, 3);
        assert_eq!(level_for_karma(150).number, 4);
        assert_eq!(level_for_karma(1_000_000).name, "Legend");
        assert_eq!(level_for_karma(RESTRICTED_KARMA).number, 1);
        assert_eq!(level_for_karma(RESTRICTED_KARMA - 1).number, 0);
    }

    #[test]
    fn test_permissions_are_cumulative() {
        let newcomer = level_for_karma(0).permissions;
        assert!(newcomer.create_thread && newcomer.upvote && !newcomer.downvote);
        assert!(level_for_karma(10).permissions.downvote);
        assert!(!level_for_karma(10).permissions.create_poll);
        assert!(level_for_karma(50).permissions.create_poll);
        assert!(!level_for_karma(50).permissions.create_community);
        assert!(level_for_karma(150).permissions.create_community);
    }

    #[test]
    fn test_restricted_can_only_comment() {
        let perms = permissions_for(-100, false);
        assert!(perms.comment);
        assert!(!perms.create_thread && !perms.upvote && !perms.react);
        assert_eq!(permissions_for(-100, true), LevelPermissions::ALL);
    }

    #[test]
    fn test_progress_mid_level() {
        let p = progress(30);
        assert_eq!(p.level.number, 2);
        assert_eq!(p.next.unwrap().number, 3);
        assert_eq!(p.karma_into_level, 20);
        assert_eq!(p.karma_needed, 20);
        assert_eq!(p.percent, 50);
    }

    #[test]
    fn test_progress_top_and_negative() {
        let top = progress(9_999);
        assert!(top.next.is_none());
        assert_eq!(top.percent, 100);

        let negative = progress(-3);
        assert_eq!(negative.level.number, 1);
        assert_eq!(negative.karma_into_level, 0);
        assert_eq!(negative.karma_needed, 13);
        assert_eq!(negative.percent, 0);

        let restricted = progress(-25);
        assert_eq!(restricted.level.number, 0);
        assert_eq!(restricted.karma_needed, 5);
    }

    #[test]
    fn test_level_up_detection() {
        assert_eq!(level_up(9, 10).map(|l| l.number), Some(2));
        assert!(level_up(10, 11).is_none());
        assert!(level_up(10, 9).is_none());
    }
}
