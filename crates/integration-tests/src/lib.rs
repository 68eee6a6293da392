//! Integration tests for the Medibook client.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p medibook-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `auth_session` - startup, sign-in callback, sign-out, fail-closed paths
//! - `cart_sync` - optimistic updates, rollback, resync, stale loads
//! - `checkout_flow` - step gating, validation, order placement
//! - `orders_catalog` - order history, family members, catalog cache
//!
//! Everything runs against [`FakeApi`], an in-memory backend that records
//! every call, can fail calls on demand, and can hold a response until the
//! test releases it.

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::missing_panics_doc)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use medibook_client::Medibook;
use medibook_client::api::{
    ApiError, CartItem, Category, Identity, LabApi, LabTest, Order, PatientInfo,
    PlaceOrderRequest,
};
use medibook_client::auth::SessionToken;
use medibook_client::navigation::RecordingNavigator;
use medibook_client::storage::MemoryStore;
use medibook_core::{
    CategoryId, Email, Gender, OrderId, OrderStatus, Price, Relation, TestId, TimeSlot, UserId,
};
use tokio::sync::{Notify, oneshot};
use url::Url;

/// Token the fake backend accepts for [`jane`].
pub const JANE_TOKEN: &str = "jane-token";

/// Token the fake backend accepts for [`john`].
pub const JOHN_TOKEN: &str = "john-token";

// =============================================================================
// Fake backend
// =============================================================================

/// Backend operations, for scripting failures and holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Me,
    Logout,
    GetCart,
    AddToCart,
    RemoveFromCart,
    ClearCart,
    PlaceOrder,
    ListOrders,
    ListCategories,
    ListTests,
}

/// A recorded backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Me,
    Logout,
    GetCart(String),
    AddToCart { user_key: String, test_id: TestId },
    RemoveFromCart { user_key: String, test_id: TestId },
    ClearCart(String),
    PlaceOrder(PlaceOrderRequest),
    ListOrders,
    ListCategories,
    ListTests(Option<CategoryId>),
}

impl Call {
    #[must_use]
    pub const fn endpoint(&self) -> Endpoint {
        match self {
            Self::Me => Endpoint::Me,
            Self::Logout => Endpoint::Logout,
            Self::GetCart(_) => Endpoint::GetCart,
            Self::AddToCart { .. } => Endpoint::AddToCart,
            Self::RemoveFromCart { .. } => Endpoint::RemoveFromCart,
            Self::ClearCart(_) => Endpoint::ClearCart,
            Self::PlaceOrder(_) => Endpoint::PlaceOrder,
            Self::ListOrders => Endpoint::ListOrders,
            Self::ListCategories => Endpoint::ListCategories,
            Self::ListTests(_) => Endpoint::ListTests,
        }
    }
}

/// A scripted failure.
#[derive(Debug, Clone)]
pub enum Failure {
    /// Connection-level failure.
    Network,
    /// 401/403.
    Unauthorized,
    /// Non-success status with an optional server message.
    Status(u16, Option<String>),
}

impl Failure {
    fn into_error(self) -> ApiError {
        match self {
            Self::Network => ApiError::Transport("connection reset".to_string()),
            Self::Unauthorized => ApiError::Unauthorized,
            Self::Status(status, message) => ApiError::Status { status, message },
        }
    }
}

/// A response held back until the test releases it.
pub struct Gate {
    release: oneshot::Sender<()>,
    entered: Arc<Notify>,
}

impl Gate {
    /// Wait until the held call has reached the backend.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Let the held response through.
    pub fn release(self) {
        let _ = self.release.send(());
    }
}

type HeldCall = (oneshot::Receiver<()>, Arc<Notify>);

#[derive(Default)]
struct FakeState {
    users: HashMap<String, Identity>,
    carts: HashMap<String, Vec<CartItem>>,
    orders: Vec<(String, Order)>,
    categories: Vec<Category>,
    tests: Vec<LabTest>,
    calls: Vec<Call>,
    failures: HashMap<Endpoint, VecDeque<Failure>>,
    holds: HashMap<Endpoint, VecDeque<HeldCall>>,
    next_order: u64,
}

/// In-memory Medibook backend.
pub struct FakeApi {
    base_url: Url,
    state: Mutex<FakeState>,
}

impl Default for FakeApi {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeApi {
    #[must_use]
    pub fn new() -> Self {
        Self {
            base_url: Url::parse("https://fake.medibook.test/api/").expect("static URL"),
            state: Mutex::new(FakeState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -------------------------------------------------------------------------
    // Seeding
    // -------------------------------------------------------------------------

    /// Accept `token` for `identity`.
    pub fn add_user(&self, token: &str, identity: Identity) {
        self.lock().users.insert(token.to_string(), identity);
    }

    /// Stop accepting `token`.
    pub fn revoke(&self, token: &str) {
        self.lock().users.remove(token);
    }

    /// Replace a user's server cart.
    pub fn set_cart(&self, user_key: &str, items: Vec<CartItem>) {
        self.lock().carts.insert(user_key.to_string(), items);
    }

    /// A user's server cart.
    #[must_use]
    pub fn cart(&self, user_key: &str) -> Vec<CartItem> {
        self.lock().carts.get(user_key).cloned().unwrap_or_default()
    }

    /// Replace the catalog.
    pub fn set_catalog(&self, categories: Vec<Category>, tests: Vec<LabTest>) {
        let mut state = self.lock();
        state.categories = categories;
        state.tests = tests;
    }

    /// Record an existing order for a user.
    pub fn add_order(&self, user_key: &str, order: Order) {
        self.lock().orders.push((user_key.to_string(), order));
    }

    // -------------------------------------------------------------------------
    // Scripting
    // -------------------------------------------------------------------------

    /// Fail the next call to `endpoint`.
    pub fn fail_next(&self, endpoint: Endpoint, failure: Failure) {
        self.lock()
            .failures
            .entry(endpoint)
            .or_default()
            .push_back(failure);
    }

    /// Hold the response of the next call to `endpoint`. The response is
    /// computed when the call arrives and delivered on release.
    #[must_use]
    pub fn hold_next(&self, endpoint: Endpoint) -> Gate {
        let (release, held) = oneshot::channel();
        let entered = Arc::new(Notify::new());
        self.lock()
            .holds
            .entry(endpoint)
            .or_default()
            .push_back((held, Arc::clone(&entered)));
        Gate { release, entered }
    }

    // -------------------------------------------------------------------------
    // Inspection
    // -------------------------------------------------------------------------

    /// Every call so far, oldest first.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Number of calls to `endpoint` so far.
    #[must_use]
    pub fn count(&self, endpoint: Endpoint) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.endpoint() == endpoint)
            .count()
    }

    /// Bodies of every order placement so far.
    #[must_use]
    pub fn placed_orders(&self) -> Vec<PlaceOrderRequest> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::PlaceOrder(request) => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    // -------------------------------------------------------------------------
    // Plumbing
    // -------------------------------------------------------------------------

    fn respond<T>(
        &self,
        call: Call,
        handler: impl FnOnce(&mut FakeState) -> Result<T, ApiError>,
    ) -> (Result<T, ApiError>, Option<HeldCall>) {
        let endpoint = call.endpoint();
        let mut state = self.lock();
        state.calls.push(call);
        let held = state
            .holds
            .get_mut(&endpoint)
            .and_then(VecDeque::pop_front);
        let failure = state
            .failures
            .get_mut(&endpoint)
            .and_then(VecDeque::pop_front);
        let result = match failure {
            Some(failure) => Err(failure.into_error()),
            None => handler(&mut state),
        };
        (result, held)
    }

    async fn deliver<T>(
        &self,
        call: Call,
        handler: impl FnOnce(&mut FakeState) -> Result<T, ApiError> + Send,
    ) -> Result<T, ApiError> {
        let (result, held) = self.respond(call, handler);
        if let Some((release, entered)) = held {
            entered.notify_one();
            let _ = release.await;
        }
        result
    }
}

fn user_for(state: &FakeState, token: &SessionToken) -> Result<Identity, ApiError> {
    state
        .users
        .get(token.expose())
        .cloned()
        .ok_or(ApiError::Unauthorized)
}

#[async_trait]
impl LabApi for FakeApi {
    async fn me(&self, token: &SessionToken) -> Result<Identity, ApiError> {
        self.deliver(Call::Me, |s| user_for(s, token)).await
    }

    fn sign_in_url(&self) -> Url {
        self.base_url
            .join("auth/google")
            .unwrap_or_else(|_| self.base_url.clone())
    }

    async fn logout(&self, token: &SessionToken) -> Result<(), ApiError> {
        self.deliver(Call::Logout, |s| user_for(s, token).map(|_| ()))
            .await
    }

    async fn get_cart(&self, user_key: &str) -> Result<Vec<CartItem>, ApiError> {
        self.deliver(Call::GetCart(user_key.to_string()), |s| {
            Ok(s.carts.get(user_key).cloned().unwrap_or_default())
        })
        .await
    }

    async fn add_to_cart(
        &self,
        user_key: &str,
        item: &CartItem,
    ) -> Result<Option<Vec<CartItem>>, ApiError> {
        let call = Call::AddToCart {
            user_key: user_key.to_string(),
            test_id: item.test_id.clone(),
        };
        self.deliver(call, |s| {
            let cart = s.carts.entry(user_key.to_string()).or_default();
            if cart.iter().any(|i| i.test_id == item.test_id) {
                return Err(ApiError::AlreadyInCart);
            }
            cart.push(item.clone());
            Ok(Some(cart.clone()))
        })
        .await
    }

    async fn remove_from_cart(&self, user_key: &str, test_id: &TestId) -> Result<(), ApiError> {
        let call = Call::RemoveFromCart {
            user_key: user_key.to_string(),
            test_id: test_id.clone(),
        };
        self.deliver(call, |s| {
            if let Some(cart) = s.carts.get_mut(user_key) {
                cart.retain(|i| &i.test_id != test_id);
            }
            Ok(())
        })
        .await
    }

    async fn clear_cart(&self, user_key: &str) -> Result<(), ApiError> {
        self.deliver(Call::ClearCart(user_key.to_string()), |s| {
            s.carts.remove(user_key);
            Ok(())
        })
        .await
    }

    async fn place_order(
        &self,
        token: &SessionToken,
        order: &PlaceOrderRequest,
    ) -> Result<OrderId, ApiError> {
        self.deliver(Call::PlaceOrder(order.clone()), |s| {
            let identity = user_for(s, token)?;
            s.next_order += 1;
            let order_id = OrderId::new(format!("ORD-{:04}", s.next_order));
            s.orders.push((
                identity.user_key().to_string(),
                Order {
                    order_id: order_id.clone(),
                    patient_info: order.patient_info.clone(),
                    cart_items: order.cart_items.clone(),
                    total_price: order.total_price,
                    payment_method: order.payment_method,
                    status: OrderStatus::Pending,
                    created_at: Some(Utc::now()),
                },
            ));
            Ok(order_id)
        })
        .await
    }

    async fn list_orders(&self, token: &SessionToken) -> Result<Vec<Order>, ApiError> {
        self.deliver(Call::ListOrders, |s| {
            let identity = user_for(s, token)?;
            Ok(s.orders
                .iter()
                .filter(|(owner, _)| owner == identity.user_key())
                .map(|(_, order)| order.clone())
                .collect())
        })
        .await
    }

    async fn list_categories(&self) -> Result<Vec<Category>, ApiError> {
        self.deliver(Call::ListCategories, |s| Ok(s.categories.clone()))
            .await
    }

    async fn list_tests(&self, category: Option<&CategoryId>) -> Result<Vec<LabTest>, ApiError> {
        self.deliver(Call::ListTests(category.cloned()), |s| {
            Ok(s.tests
                .iter()
                .filter(|t| category.is_none_or(|c| t.category.as_deref() == Some(c.as_str())))
                .cloned()
                .collect())
        })
        .await
    }
}

// =============================================================================
// Test context
// =============================================================================

/// A client wired to a fresh fake backend and in-memory storage.
pub struct TestContext {
    pub api: Arc<FakeApi>,
    pub store: Arc<MemoryStore>,
    pub navigator: Arc<RecordingNavigator>,
    pub app: Medibook,
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TestContext {
    /// Signed out, with Jane and John known to the backend.
    #[must_use]
    pub fn new() -> Self {
        let api = Arc::new(FakeApi::new());
        api.add_user(JANE_TOKEN, jane());
        api.add_user(JOHN_TOKEN, john());
        Self::with_api(api, Arc::new(MemoryStore::new()))
    }

    /// A new client over an existing backend and store, as after a restart.
    #[must_use]
    pub fn with_api(api: Arc<FakeApi>, store: Arc<MemoryStore>) -> Self {
        let navigator = Arc::new(RecordingNavigator::new());
        let app = Medibook::from_parts(
            api.clone(),
            store.clone(),
            navigator.clone(),
            Duration::from_secs(300),
        );
        Self {
            api,
            store,
            navigator,
            app,
        }
    }

    /// Signed in as Jane through the sign-in callback.
    pub async fn signed_in() -> Self {
        let ctx = Self::new();
        ctx.sign_in(JANE_TOKEN).await;
        ctx
    }

    /// Complete sign-in through the callback URL.
    pub async fn sign_in(&self, token: &str) {
        let callback = callback_url(token);
        self.app.initialize(Some(&callback)).await;
        let _ = self.navigator.drain();
    }

    /// Restart the client over the same backend and storage.
    #[must_use]
    pub fn restart(&self) -> Self {
        Self::with_api(Arc::clone(&self.api), Arc::clone(&self.store))
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// Location the provider redirects back to after sign-in.
#[must_use]
pub fn callback_url(token: &str) -> Url {
    let mut url = Url::parse("https://medibook.in/auth/callback?ref=google").expect("static URL");
    url.query_pairs_mut().append_pair("token", token);
    url
}

#[must_use]
pub fn jane() -> Identity {
    Identity {
        id: UserId::new("u-jane"),
        email: Email::parse("jane@example.com").expect("valid email"),
        display_name: Some("Jane Doe".to_string()),
        photo_url: None,
    }
}

#[must_use]
pub fn john() -> Identity {
    Identity {
        id: UserId::new("u-john"),
        email: Email::parse("john@example.com").expect("valid email"),
        display_name: None,
        photo_url: None,
    }
}

/// Cart item with a price.
#[must_use]
pub fn item(id: &str, price: u64) -> CartItem {
    CartItem {
        test_id: TestId::new(id),
        name: format!("Test {id}"),
        lab: None,
        price: Some(Price::new(price)),
        category: None,
        description: None,
    }
}

/// Catalog test in a category.
#[must_use]
pub fn lab_test(id: &str, category: &str, price: u64) -> LabTest {
    LabTest {
        id: TestId::new(id),
        name: format!("Test {id}"),
        lab: Some("Metro Labs".to_string()),
        price: Some(Price::new(price)),
        category: Some(category.to_string()),
        description: None,
    }
}

/// Patient details that pass every step.
#[must_use]
pub fn complete_patient() -> PatientInfo {
    PatientInfo {
        name: "Jane Doe".to_string(),
        relation: Some(Relation::Myself),
        email: "jane@example.com".to_string(),
        phone: "9876543210".to_string(),
        dob: NaiveDate::from_ymd_opt(1990, 4, 12),
        gender: Some(Gender::Female),
        address: "12 MG Road".to_string(),
        city: "Bengaluru".to_string(),
        state: "Karnataka".to_string(),
        pincode: "560001".to_string(),
        time_slot: Some(TimeSlot::LateMorning),
    }
}
