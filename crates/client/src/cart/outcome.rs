//! Results of cart operations.
//!
//! Mutations never fail with an error; they report what happened to the
//! local cart so a front end can show the right transient notice.

use crate::api::ApiError;

/// Explicit go-ahead for a destructive cart change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// The user confirmed.
    Confirmed,
    /// The user declined, or was never asked.
    Declined,
}

impl From<bool> for Confirmation {
    fn from(confirmed: bool) -> Self {
        if confirmed {
            Self::Confirmed
        } else {
            Self::Declined
        }
    }
}

/// What a cart mutation did.
#[derive(Debug)]
pub enum CartMutation {
    /// Applied locally and confirmed by the server.
    Applied,
    /// The test was already in the cart. Nothing changed.
    AlreadyInCart,
    /// The server refused the add; the optimistic item was taken back out.
    RolledBack(ApiError),
    /// The server refused the change; the cart was reloaded from the server.
    Resynced(ApiError),
    /// The server refused a removal and could not be reached to reload;
    /// the removed test was put back.
    Reverted(ApiError),
    /// Removal was not confirmed. Nothing changed.
    NotConfirmed,
    /// No signed-in user. The caller should send the user to sign in.
    SignInRequired,
}

impl CartMutation {
    /// Whether the cart now holds what the caller asked for.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Applied | Self::AlreadyInCart)
    }

    /// Transient notice to show the user, if any.
    #[must_use]
    pub fn notice(&self) -> Option<Notice> {
        match self {
            Self::Applied | Self::NotConfirmed => None,
            Self::AlreadyInCart => Some(Notice::info("This test is already in your cart")),
            Self::SignInRequired => Some(Notice::info("Please sign in to continue")),
            Self::RolledBack(_) => Some(Notice::error(
                "Could not add the test to your cart. Please try again.",
            )),
            Self::Resynced(_) => Some(Notice::error(
                "Could not update your cart. It has been refreshed from the server.",
            )),
            Self::Reverted(_) => Some(Notice::error(
                "Could not remove the test from your cart. Please try again.",
            )),
        }
    }
}

/// Severity of a [`Notice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// A short message for a toast or status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    /// Informational notice.
    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    /// Error notice.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Where the items of a cart load came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartLoad {
    /// Fresh from the server.
    Server,
    /// Server unavailable; the persisted snapshot was used.
    Cached,
    /// Server unavailable and nothing cached.
    Empty,
    /// A newer load or mutation superseded this one; its response was
    /// dropped.
    Discarded,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_in_cart_is_informational_success() {
        let outcome = CartMutation::AlreadyInCart;
        assert!(outcome.is_success());
        assert_eq!(outcome.notice().map(|n| n.level), Some(NoticeLevel::Info));
    }

    #[test]
    fn test_failures_carry_error_notices() {
        for outcome in [
            CartMutation::RolledBack(ApiError::Transport("reset".into())),
            CartMutation::Resynced(ApiError::Unauthorized),
            CartMutation::Reverted(ApiError::Transport("offline".into())),
        ] {
            assert!(!outcome.is_success());
            assert_eq!(outcome.notice().map(|n| n.level), Some(NoticeLevel::Error));
        }
    }

    #[test]
    fn test_reverted_notice_does_not_claim_a_refresh() {
        let notice = CartMutation::Reverted(ApiError::Transport("offline".into()))
            .notice()
            .map(|n| n.message)
            .unwrap_or_default();
        assert!(notice.contains("Could not remove"));
        assert!(!notice.contains("refreshed"));
    }

    #[test]
    fn test_quiet_outcomes() {
        assert!(CartMutation::Applied.notice().is_none());
        assert!(CartMutation::NotConfirmed.notice().is_none());
        assert_eq!(Confirmation::from(true), Confirmation::Confirmed);
        assert_eq!(Confirmation::from(false), Confirmation::Declined);
    }
}
