//! Account email address.
//!
//! The Medibook backend keys carts and orders by the account email, so this
//! type doubles as the user key. It is kept exactly as the auth provider
//! sent it (minus surrounding whitespace); case is not folded because the
//! server compares keys byte for byte.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Why a string is not a usable account email.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EmailError {
    #[error("email cannot be empty")]
    Empty,

    #[error("email must be at most {} characters", Email::MAX_LENGTH)]
    TooLong,

    /// Not of the form `local@domain`, or contains whitespace.
    #[error("'{0}' is not an email address")]
    Malformed(String),
}

/// An account email address.
///
/// ```
/// use medibook_core::Email;
///
/// let email = Email::parse(" Jane.Doe@example.com ").unwrap();
/// assert_eq!(email.as_str(), "Jane.Doe@example.com");
/// assert_eq!(email.local_part(), "Jane.Doe");
/// assert_eq!(email.masked(), "J***@example.com");
/// assert!(Email::parse("jane doe@example.com").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// RFC 5321 path limit.
    pub const MAX_LENGTH: usize = 254;

    /// Parse an account email.
    ///
    /// # Errors
    ///
    /// Returns an error if the trimmed input is blank, too long, contains
    /// whitespace, or lacks a non-empty part on either side of a single `@`.
    pub fn parse(s: &str) -> Result<Self, EmailError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(EmailError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(EmailError::TooLong);
        }

        let well_formed = !s.contains(char::is_whitespace)
            && s.split_once('@').is_some_and(|(local, domain)| {
                !local.is_empty() && !domain.is_empty() && !domain.contains('@')
            });
        if !well_formed {
            return Err(EmailError::Malformed(s.to_owned()));
        }

        Ok(Self(s.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Part before the `@`, used as a fallback display name.
    #[must_use]
    pub fn local_part(&self) -> &str {
        self.0.split_once('@').map_or(self.0.as_str(), |(local, _)| local)
    }

    /// Form safe to write to logs: first character of the local part, then
    /// the domain.
    #[must_use]
    pub fn masked(&self) -> String {
        let (local, domain) = self.0.split_once('@').unwrap_or((self.0.as_str(), ""));
        let first = local.chars().next().map_or_else(String::new, String::from);
        format!("{first}***@{domain}")
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Email {
    type Err = EmailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Email {
    type Error = EmailError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}
