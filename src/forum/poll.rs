//! Polls attached to threads.

use crate::error::{LoopHubError, Result};
use crate::forum::constants::{
    MAX_POLL_OPTIONS, MAX_POLL_OPTION_LEN, MAX_POLL_QUESTION_LEN, MIN_POLL_OPTIONS,
};
use crate::forum::types::{PollId, ThreadId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    pub id: PollId,
    pub thread_id: ThreadId,
    pub question: String,
    pub options: Vec<String>,
    pub multiple_choice: bool,
    /// `None` keeps the poll open forever.
    pub closes_at: Option<u64>,
    pub created_at: u64,
}

impl Poll {
    pub fn is_closed(&self, now: u64) -> bool {
        self.closes_at.is_some_and(|closes| now >= closes)
    }

    /// Validates a ballot against this poll and returns the choices sorted.
    pub fn check_ballot(&self, choices: &[u32], now: u64) -> Result<Vec<u32>> {
        if self.is_closed(now) {
            return Err(LoopHubError::validation("Poll is closed"));
        }
        if choices.is_empty() {
            return Err(LoopHubError::validation("Select at least one option"));
        }
        if !self.multiple_choice && choices.len() != 1 {
            return Err(LoopHubError::validation(
                "This poll accepts exactly one choice",
            ));
        }
        let mut seen = HashSet::with_capacity(choices.len());
        for &choice in choices {
            if choice as usize >= self.options.len() {
                return Err(LoopHubError::validation(format!(
                    "Option {} out of range (poll has {} options)",
                    choice,
                    self.options.len()
                )));
            }
            if !seen.insert(choice) {
                return Err(LoopHubError::validation(format!(
                    "Option {} selected twice",
                    choice
                )));
            }
        }
        let mut sorted = choices.to_vec();
        sorted.sort_unstable();
        Ok(sorted)
    }
}

/// Poll input supplied with a new thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPoll {
    pub question: String,
    pub options: Vec<String>,
    #[serde(default)]
    pub multiple_choice: bool,
    /// Hours until the poll closes; `None` for no deadline.
    #[serde(default)]
    pub duration_hours: Option<u64>,
}

impl NewPoll {
    pub fn validate(&self) -> Result<()> {
        let question = self.question.trim();
        if question.is_empty() {
            return Err(LoopHubError::validation("Poll question cannot be empty"));
        }
        if question.chars().count() > MAX_POLL_QUESTION_LEN {
            return Err(LoopHubError::validation(format!(
                "Poll question too long (max {} characters)",
                MAX_POLL_QUESTION_LEN
            )));
        }
        if !(MIN_POLL_OPTIONS..=MAX_POLL_OPTIONS).contains(&self.options.len()) {
            return Err(LoopHubError::validation(format!(
                "Polls need {}-{} options, got {}",
                MIN_POLL_OPTIONS,
                MAX_POLL_OPTIONS,
                self.options.len()
            )));
        }
        let mut seen = HashSet::new();
        for option in &self.options {
            let option = option.trim();
            if option.is_empty() {
                return Err(LoopHubError::validation("Poll options cannot be empty"));
            }
            if option.chars().count() > MAX_POLL_OPTION_LEN {
                return Err(LoopHubError::validation(format!(
                    "Poll option too long (max {} characters)",
                    MAX_POLL_OPTION_LEN
                )));
            }
            if !seen.insert(option.to_lowercase()) {
                return Err(LoopHubError::validation(format!(
                    "Duplicate poll option '{}'",
                    option
                )));
            }
        }
        if self.duration_hours == Some(0) {
            return Err(LoopHubError::validation("Poll duration must be positive"));
        }
        Ok(())
    }

    /// Builds the stored poll.
    pub fn into_poll(self, thread_id: ThreadId, now: u64) -> Poll {
        Poll {
            id: PollId::new(),
            thread_id,
            question: self.question.trim().to_string(),
            options: self.options.iter().map(|o| o.trim().to_string()).collect(),
            multiple_choice: self.multiple_choice,
            closes_at: self
                .duration_hours
                .map(|h| now.saturating_add(h.saturating_mul(3_600_000))),
            created_at: now,
        }
    }
}

/// Tally of a poll as seen by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollResults {
    pub poll: Poll,
    /// Votes per option, same order as `poll.options`.
    pub counts: Vec<u64>,
    pub total_voters: u64,
    /// Integer percentage of voters choosing each option. In multiple-choice
    /// polls these can sum past 100.
    pub percentages: Vec<u8>,
    pub your_choices: Vec<u32>,
    pub closed: bool,
}

impl PollResults {
    /// Tallies `ballots` (one entry per voter).
    pub fn tally<'a>(
        poll: Poll,
        ballots: impl IntoIterator<Item = &'a [u32]>,
        your_choices: Vec<u32>,
        now: u64,
    ) -> Self {
        let mut counts = vec![0u64; poll.options.len()];
        let mut total_voters = 0u64;
        for ballot in ballots {
            total_voters += 1;
            for &choice in ballot {
                if let Some(count) = counts.get_mut(choice as usize) {
                    *count += 1;
                }
            }
        }
        let percentages = counts
            .iter()
            .map(|&c| {
                if total_voters == 0 {
                    0
                } else {
                    ((c * 100) / total_voters) as u8
                }
            })
            .collect();
        let closed = poll.is_closed(now);
        Self {
            poll,
            counts,
            total_voters,
            percentages,
            your_choices,
            closed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_poll(multiple_choice: bool) -> NewPoll {
        NewPoll {
            question: "Favourite edition?".to_string(),
            options: vec!["2015".into(), "2018".into(), "2021".into()],
            multiple_choice,
            duration_hours: Some(1),
        }
    }

    #[test]
    fn test_new_poll_validation() {
        assert!(new_poll(false).validate().is_ok());

        let mut one = new_poll(false);
        one.options.truncate(1);
        assert!(one.validate().is_err());

        let mut many = new_poll(false);
        many.options = (0..11).map(|i| i.to_string()).collect();
        assert!(many.validate().is_err());

        let mut dup = new_poll(false);
        dup.options[1] = "2015 ".to_string();
        assert!(dup.validate().is_err());

        let mut blank = new_poll(false);
        blank.question = " ".to_string();
        assert!(blank.validate().is_err());
    }

    #[test]
    fn test_ballot_rules() {
        let poll = new_poll(false).into_poll(ThreadId::new(), 0);
        assert_eq!(poll.check_ballot(&[2], 10).unwrap(), vec![2]);
        assert!(poll.check_ballot(&[], 10).is_err());
        assert!(poll.check_ballot(&[0, 1], 10).is_err());
        assert!(poll.check_ballot(&[3], 10).is_err());
        assert!(poll.check_ballot(&[0], 3_600_000).is_err());

        let multi = new_poll(true).into_poll(ThreadId::new(), 0);
        assert_eq!(multi.check_ballot(&[2, 0], 10).unwrap(), vec![0, 2]);
        assert!(multi.check_ballot(&[1, 1], 10).is_err());
    }

    #[test]
    fn test_tally_percentages_over_voters() {
        let poll = new_poll(true).into_poll(ThreadId::new(), 0);
        let ballots: Vec<Vec<u32>> = vec![vec![0, 1], vec![0], vec![2]];
        let results = PollResults::tally(
            poll,
            ballots.iter().map(Vec::as_slice),
            vec![0],
            10,
        );
        assert_eq!(results.total_voters, 3);
        assert_eq!(results.counts, vec![2, 1, 1]);
        assert_eq!(results.percentages, vec![66, 33, 33]);
        assert!(!results.closed);
    }

    #[test]
    fn test_tally_empty() {
        let poll = new_poll(false).into_poll(ThreadId::new(), 0);
        let results = PollResults::tally(poll, std::iter::empty(), vec![], 0);
        assert_eq!(results.percentages, vec![0, 0, 0]);
    }
}
