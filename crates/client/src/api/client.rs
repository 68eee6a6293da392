//! `reqwest` implementation of [`LabApi`].

use std::sync::Arc;

use async_trait::async_trait;
use medibook_core::{CategoryId, OrderId, TestId};
use reqwest::{RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use super::types::{
    CartResponse, CategoriesResponse, ErrorBody, MutationResponse, OrdersResponse,
    PlaceOrderResponse, ProfileResponse, TestsResponse,
};
use super::{ApiError, CartItem, Category, Identity, LabApi, LabTest, Order, PlaceOrderRequest};
use crate::auth::SessionToken;
use crate::config::ClientConfig;

/// How much of an unexpected body to keep in logs.
const LOG_BODY_LIMIT: usize = 500;

// =============================================================================
// HttpApi
// =============================================================================

/// Client for the Medibook REST API.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct HttpApi {
    inner: Arc<HttpApiInner>,
}

struct HttpApiInner {
    client: reqwest::Client,
    base_url: Url,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AddToCartBody<'a> {
    user_id: &'a str,
    test: &'a CartItem,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RemoveFromCartBody<'a> {
    user_id: &'a str,
    test_id: &'a TestId,
}

impl HttpApi {
    /// Create a new API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built (e.g. TLS backend
    /// initialization fails).
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .user_agent(concat!("medibook-client/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(HttpApiInner {
                client,
                base_url: config.api_url.clone(),
            }),
        })
    }

    /// Base URL all endpoint paths are appended to.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Build an endpoint URL from path segments. Segments are percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.inner.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Send a request and return the raw body of a successful response.
    async fn send(&self, request: RequestBuilder) -> Result<String, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ApiError::Unauthorized);
        }

        if !status.is_success() {
            tracing::warn!(
                status = %status,
                body = %truncate(&body),
                "Medibook API returned non-success status"
            );
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        Ok(body)
    }

    /// Send a request and parse the JSON body.
    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let body = self.send(request).await?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %truncate(&body),
                "Failed to parse Medibook API response"
            );
            ApiError::Parse(e)
        })
    }

    /// Send a cart mutation. An empty body counts as success.
    async fn send_mutation(&self, request: RequestBuilder) -> Result<MutationResponse, ApiError> {
        let body = self.send(request).await?;
        if body.trim().is_empty() {
            return Ok(MutationResponse::default());
        }
        let parsed: MutationResponse = serde_json::from_str(&body)?;
        if parsed.success == Some(false) {
            return Err(ApiError::Rejected(
                parsed
                    .message
                    .unwrap_or_else(|| "request was not accepted".to_string()),
            ));
        }
        Ok(parsed)
    }
}

#[async_trait]
impl LabApi for HttpApi {
    #[instrument(skip(self, token))]
    async fn me(&self, token: &SessionToken) -> Result<Identity, ApiError> {
        let request = self
            .inner
            .client
            .get(self.endpoint(&["auth", "me"]))
            .bearer_auth(token.expose());

        let response: ProfileResponse = self.send_json(request).await?;
        match response {
            ProfileResponse {
                success: true,
                data: Some(identity),
            } => Ok(identity),
            _ => Err(ApiError::Malformed(
                "profile response without success and data".to_string(),
            )),
        }
    }

    fn sign_in_url(&self) -> Url {
        self.endpoint(&["auth", "google"])
    }

    #[instrument(skip(self, token))]
    async fn logout(&self, token: &SessionToken) -> Result<(), ApiError> {
        let request = self
            .inner
            .client
            .post(self.endpoint(&["auth", "logout"]))
            .bearer_auth(token.expose());
        self.send(request).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_cart(&self, user_key: &str) -> Result<Vec<CartItem>, ApiError> {
        let request = self.inner.client.get(self.endpoint(&["cart", user_key]));
        let response: CartResponse = self.send_json(request).await?;
        debug!(count = response.items.len(), "Fetched cart");
        Ok(response.items)
    }

    #[instrument(skip(self, item), fields(test_id = %item.test_id))]
    async fn add_to_cart(
        &self,
        user_key: &str,
        item: &CartItem,
    ) -> Result<Option<Vec<CartItem>>, ApiError> {
        let request = self
            .inner
            .client
            .post(self.endpoint(&["cart", "add"]))
            .json(&AddToCartBody {
                user_id: user_key,
                test: item,
            });

        match self.send_mutation(request).await {
            Ok(response) => Ok(response.items),
            Err(e) if signals_already_in_cart(&e) => Err(ApiError::AlreadyInCart),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self), fields(test_id = %test_id))]
    async fn remove_from_cart(&self, user_key: &str, test_id: &TestId) -> Result<(), ApiError> {
        let request = self
            .inner
            .client
            .delete(self.endpoint(&["cart", "remove"]))
            .json(&RemoveFromCartBody {
                user_id: user_key,
                test_id,
            });
        self.send_mutation(request).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn clear_cart(&self, user_key: &str) -> Result<(), ApiError> {
        let request = self
            .inner
            .client
            .delete(self.endpoint(&["cart", "clear", user_key]));
        self.send_mutation(request).await?;
        Ok(())
    }

    #[instrument(skip(self, token, order), fields(items = order.cart_items.len(), total = %order.total_price))]
    async fn place_order(
        &self,
        token: &SessionToken,
        order: &PlaceOrderRequest,
    ) -> Result<OrderId, ApiError> {
        let request = self
            .inner
            .client
            .post(self.endpoint(&["orders", "place"]))
            .bearer_auth(token.expose())
            .json(order);

        let response: PlaceOrderResponse = self.send_json(request).await?;
        match response {
            PlaceOrderResponse {
                success: Some(false),
                message,
                ..
            }
            | PlaceOrderResponse {
                order_id: None,
                message,
                ..
            } => Err(ApiError::Rejected(
                message.unwrap_or_else(|| "order was not accepted".to_string()),
            )),
            PlaceOrderResponse {
                order_id: Some(order_id),
                ..
            } => Ok(order_id),
        }
    }

    #[instrument(skip(self, token))]
    async fn list_orders(&self, token: &SessionToken) -> Result<Vec<Order>, ApiError> {
        let request = self
            .inner
            .client
            .get(self.endpoint(&["orders", "user"]))
            .bearer_auth(token.expose());

        let response: OrdersResponse = self.send_json(request).await?;
        if response.success == Some(false) {
            return Err(ApiError::Rejected(
                response
                    .message
                    .unwrap_or_else(|| "could not list orders".to_string()),
            ));
        }
        Ok(response.orders)
    }

    #[instrument(skip(self))]
    async fn list_categories(&self) -> Result<Vec<Category>, ApiError> {
        let request = self.inner.client.get(self.endpoint(&["categories"]));
        let response: CategoriesResponse = self.send_json(request).await?;
        Ok(response.categories)
    }

    #[instrument(skip(self))]
    async fn list_tests(&self, category: Option<&CategoryId>) -> Result<Vec<LabTest>, ApiError> {
        let mut request = self.inner.client.get(self.endpoint(&["tests"]));
        if let Some(category) = category {
            request = request.query(&[("category", category.as_str())]);
        }
        let response: TestsResponse = self.send_json(request).await?;
        Ok(response.tests)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Pull a human-readable message out of an error body.
fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(ErrorBody::into_message)
}

/// The add endpoint reports duplicates with 409, or with a rejection whose
/// message mentions the item already being there.
fn signals_already_in_cart(err: &ApiError) -> bool {
    match err {
        ApiError::Status { status: 409, .. } => true,
        ApiError::Status { .. } | ApiError::Rejected(_) => err
            .server_message()
            .is_some_and(|m| m.to_ascii_lowercase().contains("already")),
        _ => false,
    }
}

fn truncate(body: &str) -> String {
    body.chars().take(LOG_BODY_LIMIT).collect()
}
