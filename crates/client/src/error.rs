//! Unified error type for callers of the client library.
//!
//! Services report their own error enums; [`ClientError`] aggregates them
//! for front ends that just want one `Result` to propagate with `?`.

use thiserror::Error;

use crate::api::ApiError;
use crate::checkout::CheckoutError;
use crate::config::ConfigError;
use crate::storage::StorageError;

/// Library-level error type.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The Medibook API call failed.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Session storage could not be opened.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Checkout could not proceed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// The operation needs a signed-in user.
    #[error("Not signed in")]
    NotSignedIn,
}

/// Result alias using [`ClientError`].
pub type Result<T, E = ClientError> = std::result::Result<T, E>;
