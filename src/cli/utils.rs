//! Utility functions for CLI operations.

use crate::auth::Password;
use crate::error::{LoopHubError, Result};
use chrono::{Local, TimeZone};
use rpassword::prompt_password;
use std::fs;
use std::path::{Path, PathBuf};

const TOKEN_FILE: &str = "session";

/// Directory holding the session token and the offline store.
///
/// Defaults to `<data dir>/loophub`, e.g. `~/.local/share/loophub`.
pub fn state_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    let dir = match explicit {
        Some(dir) => dir.to_path_buf(),
        None => dirs::data_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".local").join("share")))
            .ok_or_else(|| LoopHubError::config("Cannot determine a data directory"))?
            .join("loophub"),
    };

    if !dir.exists() {
        fs::create_dir_all(&dir)?;
    }
    Ok(dir)
}

/// Reads the saved session token, if any.
pub fn read_token(dir: &Path) -> Result<Option<String>> {
    let path = dir.join(TOKEN_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let token = fs::read_to_string(path)?.trim().to_string();
    Ok((!token.is_empty()).then_some(token))
}

pub fn write_token(dir: &Path, token: &str) -> Result<()> {
    let path = dir.join(TOKEN_FILE);
    fs::write(&path, token)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

pub fn clear_token(dir: &Path) -> Result<()> {
    let path = dir.join(TOKEN_FILE);
    if path.exists() {
        fs::remove_file(path)?;
    }
    Ok(())
}

/// Uses the given password, or prompts for one without echo.
pub fn password_or_prompt(given: Option<String>, prompt: &str) -> Result<Password> {
    let password = match given {
        Some(password) => password,
        None => prompt_password(format!("{}: ", prompt))
            .map_err(|e| LoopHubError::config(format!("Failed to read password: {}", e)))?,
    };

    if password.is_empty() {
        return Err(LoopHubError::validation("Password cannot be empty"));
    }
    Ok(Password::new(password))
}

/// Formats a millisecond timestamp in local time.
pub fn format_timestamp(millis: u64) -> String {
    match Local.timestamp_millis_opt(millis as i64).single() {
        Some(datetime) => datetime.format("%Y-%m-%d %H:%M").to_string(),
        None => millis.to_string(),
    }
}

/// Rough age such as "3m", "5h" or "2d".
pub fn format_age(age_ms: u64) -> String {
    let secs = age_ms / 1_000;
    match secs {
        0..=59 => format!("{}s", secs),
        60..=3_599 => format!("{}m", secs / 60),
        3_600..=86_399 => format!("{}h", secs / 3_600),
        _ => format!("{}d", secs / 86_400),
    }
}

/// First line of `text`, cut to `max` characters.
pub fn preview(text: &str, max: usize) -> String {
    let line = text.lines().next().unwrap_or_default();
    if line.chars().count() > max {
        let cut: String = line.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    } else {
        line.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_token_round_trip() {
        let dir = TempDir::new().unwrap();
        assert_eq!(read_token(dir.path()).unwrap(), None);

        write_token(dir.path(), "abc123\n").unwrap();
        assert_eq!(read_token(dir.path()).unwrap().as_deref(), Some("abc123"));

        clear_token(dir.path()).unwrap();
        assert_eq!(read_token(dir.path()).unwrap(), None);
        clear_token(dir.path()).unwrap();
    }

    #[test]
    fn test_state_dir_created() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        assert_eq!(state_dir(Some(&nested)).unwrap(), nested);
        assert!(nested.is_dir());
    }

    #[test]
    fn test_format_age() {
        assert_eq!(format_age(5_000), "5s");
        assert_eq!(format_age(3 * 60_000), "3m");
        assert_eq!(format_age(5 * 3_600_000), "5h");
        assert_eq!(format_age(49 * 3_600_000), "2d");
    }

    #[test]
    fn test_preview() {
        assert_eq!(preview("short\nsecond line", 20), "short");
        assert_eq!(preview("abcdefghij", 5), "abcd…");
        assert_eq!(preview("", 5), "");
    }

    #[test]
    fn test_empty_password_rejected() {
        assert!(password_or_prompt(Some(String::new()), "Password").is_err());
        let password = password_or_prompt(Some("hunter22".into()), "Password").unwrap();
        assert_eq!(password.len(), 8);
    }
}
