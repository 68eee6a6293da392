//! The Medibook client, with every service wired to one backend.

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::api::{HttpApi, LabApi};
use crate::auth::{AuthSession, AuthStatus};
use crate::cart::CartSync;
use crate::catalog::Catalog;
use crate::checkout::CheckoutWizard;
use crate::config::ClientConfig;
use crate::error::Result;
use crate::navigation::Navigator;
use crate::orders::OrderHistory;
use crate::storage::{FileStore, KeyValueStore, SessionStore};

/// Services shared by a front end.
///
/// Cheap to clone; clones share every service. Call
/// [`initialize`](Self::initialize) once at startup and
/// [`teardown`](Self::teardown) when the front end goes away.
#[derive(Clone)]
pub struct Medibook {
    inner: Arc<MedibookInner>,
}

struct MedibookInner {
    api: Arc<dyn LabApi>,
    auth: AuthSession,
    cart: CartSync,
    catalog: Catalog,
    orders: OrderHistory,
}

impl Medibook {
    /// Build the HTTP-backed client with a session file under the
    /// configured state directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or an existing
    /// session file cannot be read.
    pub fn new(config: &ClientConfig, navigator: Arc<dyn Navigator>) -> Result<Self> {
        let api = Arc::new(HttpApi::new(config)?);
        let store = Arc::new(FileStore::open(config.session_file())?);
        Ok(Self::from_parts(api, store, navigator, config.catalog_ttl))
    }

    /// Wire the services around any backend and store.
    #[must_use]
    pub fn from_parts(
        api: Arc<dyn LabApi>,
        store: Arc<dyn KeyValueStore>,
        navigator: Arc<dyn Navigator>,
        catalog_ttl: Duration,
    ) -> Self {
        let store = SessionStore::new(store);
        let auth = AuthSession::new(Arc::clone(&api), store.clone(), navigator);
        let cart = CartSync::new(Arc::clone(&api), store, auth.clone());
        let catalog = Catalog::new(Arc::clone(&api), catalog_ttl);
        let orders = OrderHistory::new(Arc::clone(&api), auth.clone());

        Self {
            inner: Arc::new(MedibookInner {
                api,
                auth,
                cart,
                catalog,
                orders,
            }),
        }
    }

    /// Restore the session (see [`AuthSession::initialize`]) and, when
    /// signed in, load the user's cart.
    pub async fn initialize(&self, location: Option<&Url>) -> AuthStatus {
        let status = self.inner.auth.initialize(location).await;
        if status == AuthStatus::Authenticated {
            self.inner.cart.refresh().await;
        }
        status
    }

    /// Sign out. The cart and order history follow the session and are
    /// emptied with it.
    pub async fn sign_out(&self) {
        self.inner.auth.sign_out().await;
    }

    /// Drop in-memory state. Persisted session state is kept.
    pub fn teardown(&self) {
        self.inner.cart.reset();
        self.inner.orders.clear();
        self.inner.auth.teardown();
    }

    /// Begin a checkout. Sign-in returns the user to `return_path`.
    #[must_use]
    pub fn checkout(&self, return_path: impl Into<String>) -> CheckoutWizard {
        CheckoutWizard::new(
            Arc::clone(&self.inner.api),
            self.inner.auth.clone(),
            self.inner.cart.clone(),
            return_path,
        )
    }

    #[must_use]
    pub fn auth(&self) -> &AuthSession {
        &self.inner.auth
    }

    #[must_use]
    pub fn cart(&self) -> &CartSync {
        &self.inner.cart
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    #[must_use]
    pub fn orders(&self) -> &OrderHistory {
        &self.inner.orders
    }
}
