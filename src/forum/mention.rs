//! `@username` mentions: extraction from markdown and autocomplete.

use crate::forum::user::normalize_username;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

// The leading group stands in for a lookbehind: start of text or a character
// that cannot be part of a word or another mention.
static MENTION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^\w@])@([A-Za-z0-9_]{3,32})\b").unwrap());

static CODE_SPAN_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`[^`\n]*`").unwrap());

/// Removes fenced code blocks and inline code spans.
fn strip_code(markdown: &str) -> String {
    let mut out = String::with_capacity(markdown.len());
    let mut fence: Option<&str> = None;
    for line in markdown.lines() {
        let trimmed = line.trim_start();
        match fence {
            Some(marker) => {
                if trimmed.starts_with(marker) {
                    fence = None;
                }
            }
            None => {
                if trimmed.starts_with("```") {
                    fence = Some("```");
                } else if trimmed.starts_with("~~~") {
                    fence = Some("~~~");
                } else {
                    out.push_str(&CODE_SPAN_REGEX.replace_all(line, " "));
                    out.push('\n');
                }
            }
        }
    }
    out
}

/// Lowercased, deduplicated usernames mentioned outside code, in order of
/// first appearance.
pub fn extract_mentions(markdown: &str) -> Vec<String> {
    let text = strip_code(markdown);
    let mut found: Vec<String> = Vec::new();
    for caps in MENTION_REGEX.captures_iter(&text) {
        if let Some(name) = caps.get(1) {
            let name = normalize_username(name.as_str());
            if !found.contains(&name) {
                found.push(name);
            }
        }
    }
    found
}

/// A user that can be suggested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentionCandidate {
    pub username: String,
    pub display_name: String,
    pub karma: i64,
}

/// Case-insensitive prefix matches, exact match first, then shorter names,
/// then higher karma. An empty prefix suggests nothing.
pub fn suggest(prefix: &str, candidates: &[MentionCandidate], limit: usize) -> Vec<MentionCandidate> {
    let wanted = normalize_username(prefix.trim_start_matches('@'));
    if wanted.is_empty() || limit == 0 {
        return Vec::new();
    }

    let mut matches: Vec<(&MentionCandidate, String)> = candidates
        .iter()
        .filter_map(|c| {
            let lower = normalize_username(&c.username);
            lower.starts_with(&wanted).then_some((c, lower))
        })
        .collect();

    matches.sort_by(|(a, a_lower), (b, b_lower)| {
        let a_exact = *a_lower == wanted;
        let b_exact = *b_lower == wanted;
        b_exact
            .cmp(&a_exact)
            .then_with(|| a_lower.len().cmp(&b_lower.len()))
            .then_with(|| b.karma.cmp(&a.karma))
            .then_with(|| a_lower.cmp(b_lower))
    });

    matches
        .into_iter()
        .take(limit)
        .map(|(c, _)| c.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_mentions() {
        assert_eq!(
            extract_mentions("hey @Ferris and @bob_42, also @ferris again"),
            vec!["ferris", "bob_42"]
        );
        assert_eq!(extract_mentions("@alice,@carol"), vec!["alice", "carol"]);
        assert!(extract_mentions("no mentions here").is_empty());
    }

    #[test]
    fn test_emails_and_short_names_ignored() {
        assert!(extract_mentions("mail me at ferris@rust-lang.org").is_empty());
        assert!(extract_mentions("@ab is too short").is_empty());
        assert!(extract_mentions("@@double").is_empty());
        assert!(extract_mentions(&format!("@{}", "x".repeat(33))).is_empty());
    }

    #[test]
    fn test_code_is_ignored() {
        let text = "run `@decorator` then ping @alice\n```\n@bob inside fence\n```\n~~~\n@carol\n~~~\nbye @dave";
        assert_eq!(extract_mentions(text), vec!["alice", "dave"]);
    }

    fn candidate(username: &str, karma: i64) -> MentionCandidate {
        MentionCandidate {
            username: username.to_string(),
            display_name: username.to_string(),
            karma,
        }
    }

    #[test]
    fn test_suggest_ranking() {
        let candidates = vec![
            candidate("ferris_the_crab", 900),
            candidate("Ferris", 1),
            candidate("ferrous", 50),
            candidate("fern", 10),
            candidate("ferry", 500),
            candidate("bob", 10_000),
        ];
        let names: Vec<String> = suggest("@fer", &candidates, 10)
            .into_iter()
            .map(|c| c.username)
            .collect();
        assert_eq!(names, vec!["fern", "ferry", "Ferris", "ferrous", "ferris_the_crab"]);

        let exact: Vec<String> = suggest("FERRIS", &candidates, 2)
            .into_iter()
            .map(|c| c.username)
            .collect();
        assert_eq!(exact, vec!["Ferris", "ferris_the_crab"]);

        assert!(suggest("", &candidates, 10).is_empty());
        assert!(suggest("zz", &candidates, 10).is_empty());
    }
}
