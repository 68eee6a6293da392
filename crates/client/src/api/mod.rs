//! Medibook REST API access.
//!
//! # Architecture
//!
//! - [`LabApi`] is the seam every service talks through, one method per
//!   endpoint. Services hold it as `Arc<dyn LabApi>`.
//! - [`HttpApi`] implements it over `reqwest`.
//! - One canonical path per operation; there is no endpoint probing.
//!
//! # Endpoints
//!
//! | Method | Path                   | Auth   |
//! |--------|------------------------|--------|
//! | GET    | `/auth/me`             | bearer |
//! | GET    | `/auth/google`         | -      |
//! | POST   | `/auth/logout`         | bearer |
//! | GET    | `/cart/{userKey}`      | -      |
//! | POST   | `/cart/add`            | -      |
//! | DELETE | `/cart/remove`         | -      |
//! | DELETE | `/cart/clear/{userKey}`| -      |
//! | POST   | `/orders/place`        | bearer |
//! | GET    | `/orders/user`         | bearer |
//! | GET    | `/categories`          | -      |
//! | GET    | `/tests`               | -      |

mod client;
pub mod types;

pub use client::HttpApi;
pub use types::*;

use async_trait::async_trait;
use medibook_core::{CategoryId, OrderId, TestId};
use thiserror::Error;
use url::Url;

use crate::auth::SessionToken;

/// Errors that can occur when talking to the Medibook API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed (connection, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Transport failure reported by a non-`reqwest` backend.
    #[error("Transport error: {0}")]
    Transport(String),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Token missing, invalid or expired.
    #[error("Unauthorized")]
    Unauthorized,

    /// The server already has this test in the user's cart.
    #[error("Item already in cart")]
    AlreadyInCart,

    /// Non-success HTTP status.
    #[error("Server returned {status}: {}", message.as_deref().unwrap_or("no details"))]
    Status {
        /// HTTP status code.
        status: u16,
        /// Message from the error body, if any.
        message: Option<String>,
    },

    /// Successful status but the body reported failure.
    #[error("Request rejected: {0}")]
    Rejected(String),

    /// Body parsed but did not carry what the endpoint promises.
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl ApiError {
    /// Message supplied by the server, suitable for showing to the user.
    #[must_use]
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Status { message, .. } => message.as_deref(),
            Self::Rejected(message) => Some(message),
            _ => None,
        }
    }

    /// Whether the error means the session is no longer valid.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}

/// The Medibook backend, one method per endpoint.
#[async_trait]
pub trait LabApi: Send + Sync {
    /// Fetch the profile for a bearer token (`GET /auth/me`).
    async fn me(&self, token: &SessionToken) -> Result<Identity, ApiError>;

    /// Provider sign-in entry point (`GET /auth/google`). Navigation only.
    fn sign_in_url(&self) -> Url;

    /// Invalidate the token server-side (`POST /auth/logout`).
    async fn logout(&self, token: &SessionToken) -> Result<(), ApiError>;

    /// Server cart for a user (`GET /cart/{userKey}`).
    async fn get_cart(&self, user_key: &str) -> Result<Vec<CartItem>, ApiError>;

    /// Add one test (`POST /cart/add`). Returns the updated cart when the
    /// server sends one.
    async fn add_to_cart(
        &self,
        user_key: &str,
        item: &CartItem,
    ) -> Result<Option<Vec<CartItem>>, ApiError>;

    /// Remove one test (`DELETE /cart/remove`).
    async fn remove_from_cart(&self, user_key: &str, test_id: &TestId) -> Result<(), ApiError>;

    /// Empty the server cart (`DELETE /cart/clear/{userKey}`).
    async fn clear_cart(&self, user_key: &str) -> Result<(), ApiError>;

    /// Place an order (`POST /orders/place`).
    async fn place_order(
        &self,
        token: &SessionToken,
        order: &PlaceOrderRequest,
    ) -> Result<OrderId, ApiError>;

    /// Orders of the signed-in user (`GET /orders/user`).
    async fn list_orders(&self, token: &SessionToken) -> Result<Vec<Order>, ApiError>;

    /// Test categories (`GET /categories`).
    async fn list_categories(&self) -> Result<Vec<Category>, ApiError>;

    /// Tests, optionally within one category (`GET /tests`).
    async fn list_tests(&self, category: Option<&CategoryId>) -> Result<Vec<LabTest>, ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_display() {
        let err = ApiError::Status {
            status: 500,
            message: Some("Database down".to_string()),
        };
        assert_eq!(err.to_string(), "Server returned 500: Database down");
        assert_eq!(err.server_message(), Some("Database down"));

        let err = ApiError::Status {
            status: 502,
            message: None,
        };
        assert_eq!(err.to_string(), "Server returned 502: no details");
        assert_eq!(err.server_message(), None);
    }

    #[test]
    fn test_only_status_and_rejected_carry_messages() {
        assert_eq!(
            ApiError::Rejected("Slot full".to_string()).server_message(),
            Some("Slot full")
        );
        assert_eq!(ApiError::Transport("reset".to_string()).server_message(), None);
        assert!(ApiError::Unauthorized.is_unauthorized());
        assert!(!ApiError::AlreadyInCart.is_unauthorized());
    }
}
