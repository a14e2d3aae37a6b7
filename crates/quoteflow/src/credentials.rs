//! Login credentials.
//!
//! The account file holds `username：value` and `password：value` lines separated by the
//! full-width colon U+FF1A. Lines using an ASCII colon are not credential lines.

use crate::result::{QuoteflowError, QuoteflowResult};
use std::fmt;
use std::path::Path;

/// Separator of the account file
pub const SEPARATOR: char = '\u{FF1A}';

/// Username and password for the configurator
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

impl Credentials {
    /// Create from values
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Parse the account file contents
    ///
    /// # Errors
    ///
    /// Returns [`QuoteflowError::Credentials`] when the username or password is missing or
    /// empty.
    pub fn parse(text: &str) -> QuoteflowResult<Self> {
        let mut username = None;
        let mut password = None;
        for line in text.lines() {
            let Some((key, value)) = line.split_once(SEPARATOR) else {
                continue;
            };
            match key.trim().trim_start_matches('\u{FEFF}') {
                "username" => username = Some(value.trim().to_string()),
                "password" => password = Some(value.trim().to_string()),
                _ => {}
            }
        }
        match (username, password) {
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => Ok(Self::new(u, p)),
            _ => Err(QuoteflowError::Credentials {
                message: "username or password not found".to_string(),
            }),
        }
    }

    /// Load and parse an account file
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or lacks a field.
    pub fn load(path: &Path) -> QuoteflowResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| QuoteflowError::Credentials {
            message: format!("cannot read {}: {e}", path.display()),
        })?;
        Self::parse(&text).map_err(|e| QuoteflowError::Credentials {
            message: format!("{e} in {}", path.display()),
        })
    }

    /// Username
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Password
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_full_width_colon() {
        let creds = Credentials::parse("username：alice\npassword： s3cr:et \n").unwrap();
        assert_eq!(creds.username(), "alice");
        assert_eq!(creds.password(), "s3cr:et");
    }

    #[test]
    fn test_ascii_colon_is_ignored() {
        let err = Credentials::parse("username: alice\npassword: secret\n").unwrap_err();
        assert!(matches!(err, QuoteflowError::Credentials { .. }));
    }

    #[test]
    fn test_missing_password() {
        assert!(Credentials::parse("username：alice\n").is_err());
        assert!(Credentials::parse("username：alice\npassword：\n").is_err());
    }

    #[test]
    fn test_bom_and_other_keys() {
        let creds = Credentials::parse("\u{FEFF}username：bob\nnote：x\npassword：pw").unwrap();
        assert_eq!(creds.username(), "bob");
    }

    #[test]
    fn test_debug_redacts_password() {
        let creds = Credentials::new("alice", "secret");
        let debug = format!("{creds:?}");
        assert!(debug.contains("alice"));
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Credentials::load(&dir.path().join("Account.txt")).unwrap_err();
        assert!(err.to_string().contains("Account.txt"));
    }
}
