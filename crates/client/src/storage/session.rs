//! Typed session state on top of a [`KeyValueStore`].
//!
//! Write failures are logged and swallowed: the in-memory copy held by the
//! owning service stays authoritative for the rest of the process, and the
//! worst outcome is a stale session after restart.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

use super::{KeyValueStore, StorageError, Write};
use crate::api::{CartItem, Identity};
use crate::auth::SessionToken;

/// Storage keys.
pub mod keys {
    /// Bearer token of the signed-in user.
    pub const AUTH_TOKEN: &str = "medibook.auth_token";

    /// Last fetched identity of the signed-in user.
    pub const CURRENT_USER: &str = "medibook.user";

    /// Snapshot of the signed-in user's cart.
    pub const CART_CACHE: &str = "medibook.cart";

    /// Path to return to once sign-in completes. Read once.
    pub const REDIRECT_AFTER_LOGIN: &str = "medibook.redirect_after_login";

    /// Local-only cart used while browsing anonymously.
    pub const GUEST_CART: &str = "medibook.guest_cart";
}

/// Cart snapshot tagged with its owner so one user's cache is never shown
/// to another.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CartSnapshot {
    user_key: String,
    items: Vec<CartItem>,
}

/// Typed access to persisted session state.
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    /// Wrap a storage backend.
    #[must_use]
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    // =========================================================================
    // Token & Identity
    // =========================================================================

    /// Persisted bearer token, if any.
    #[must_use]
    pub fn token(&self) -> Option<SessionToken> {
        self.read_raw(keys::AUTH_TOKEN).and_then(SessionToken::new)
    }

    /// Persist the bearer token.
    pub fn save_token(&self, token: &SessionToken) {
        self.write(&[Write::Put(keys::AUTH_TOKEN, token.expose().to_owned())]);
    }

    /// Last identity fetched for the persisted token.
    #[must_use]
    pub fn cached_identity(&self) -> Option<Identity> {
        self.read_json(keys::CURRENT_USER)
    }

    /// Cache the identity fetched for the current token.
    pub fn save_identity(&self, identity: &Identity) {
        if let Some(json) = to_json(identity) {
            self.write(&[Write::Put(keys::CURRENT_USER, json)]);
        }
    }

    /// Remove token, identity, cart snapshot and guest cart in one batch.
    pub fn clear_session(&self) {
        self.write(&[
            Write::Delete(keys::AUTH_TOKEN),
            Write::Delete(keys::CURRENT_USER),
            Write::Delete(keys::CART_CACHE),
            Write::Delete(keys::GUEST_CART),
        ]);
    }

    // =========================================================================
    // Post-login redirect
    // =========================================================================

    /// Remember where to send the user after sign-in.
    pub fn set_redirect(&self, path: &str) {
        self.write(&[Write::Put(keys::REDIRECT_AFTER_LOGIN, path.to_owned())]);
    }

    /// Read and forget the post-login redirect.
    #[must_use]
    pub fn take_redirect(&self) -> Option<String> {
        let path = self.read_raw(keys::REDIRECT_AFTER_LOGIN)?;
        self.write(&[Write::Delete(keys::REDIRECT_AFTER_LOGIN)]);
        Some(path).filter(|p| !p.trim().is_empty())
    }

    /// Forget the post-login redirect without reading it.
    pub fn clear_redirect(&self) {
        self.write(&[Write::Delete(keys::REDIRECT_AFTER_LOGIN)]);
    }

    // =========================================================================
    // Carts
    // =========================================================================

    /// Cached cart for `user_key`. A snapshot owned by someone else is
    /// ignored.
    #[must_use]
    pub fn cart_snapshot(&self, user_key: &str) -> Option<Vec<CartItem>> {
        self.read_json::<CartSnapshot>(keys::CART_CACHE)
            .filter(|snapshot| snapshot.user_key == user_key)
            .map(|snapshot| snapshot.items)
    }

    /// Replace the cached cart.
    pub fn save_cart(&self, user_key: &str, items: &[CartItem]) {
        let snapshot = CartSnapshot {
            user_key: user_key.to_owned(),
            items: items.to_vec(),
        };
        if let Some(json) = to_json(&snapshot) {
            self.write(&[Write::Put(keys::CART_CACHE, json)]);
        }
    }

    /// Drop the cached cart.
    pub fn clear_cart(&self) {
        self.write(&[Write::Delete(keys::CART_CACHE)]);
    }

    /// Anonymous local-only cart.
    #[must_use]
    pub fn guest_cart(&self) -> Vec<CartItem> {
        self.read_json(keys::GUEST_CART).unwrap_or_default()
    }

    /// Replace the anonymous cart.
    pub fn save_guest_cart(&self, items: &[CartItem]) {
        if let Some(json) = to_json(&items) {
            self.write(&[Write::Put(keys::GUEST_CART, json)]);
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn read_raw(&self, key: &str) -> Option<String> {
        match self.backend.get(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to read session storage");
                None
            }
        }
    }

    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.read_raw(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "Ignoring unreadable session entry");
                None
            }
        }
    }

    fn write(&self, batch: &[Write]) {
        if let Err(e) = self.backend.apply(batch) {
            log_write_error(&e);
        }
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Option<String> {
    match serde_json::to_string(value) {
        Ok(json) => Some(json),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to serialize session entry");
            None
        }
    }
}

fn log_write_error(e: &StorageError) {
    tracing::warn!(error = %e, "Failed to write session storage");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use medibook_core::{Email, Price, TestId, UserId};

    use super::*;
    use crate::storage::MemoryStore;

    fn store() -> (SessionStore, Arc<MemoryStore>) {
        let backend = Arc::new(MemoryStore::new());
        (SessionStore::new(backend.clone()), backend)
    }

    fn item(id: &str) -> CartItem {
        CartItem {
            test_id: TestId::new(id),
            name: id.to_uppercase(),
            lab: None,
            price: Some(Price::new(100)),
            category: None,
            description: None,
        }
    }

    #[test]
    fn test_token_roundtrip() {
        let (store, _) = store();
        assert!(store.token().is_none());
        store.save_token(&SessionToken::new("jwt").unwrap());
        assert_eq!(store.token().unwrap().expose(), "jwt");
    }

    #[test]
    fn test_cart_snapshot_is_scoped_to_owner() {
        let (store, _) = store();
        store.save_cart("jane@example.com", &[item("cbc")]);
        assert_eq!(store.cart_snapshot("jane@example.com").unwrap().len(), 1);
        assert!(store.cart_snapshot("john@example.com").is_none());
    }

    #[test]
    fn test_redirect_is_read_once() {
        let (store, _) = store();
        store.set_redirect("/checkout");
        assert_eq!(store.take_redirect().as_deref(), Some("/checkout"));
        assert_eq!(store.take_redirect(), None);
    }

    #[test]
    fn test_clear_session_removes_everything_but_redirect() {
        let (store, backend) = store();
        store.save_token(&SessionToken::new("jwt").unwrap());
        store.save_identity(&Identity {
            id: UserId::new("u1"),
            email: Email::parse("jane@example.com").unwrap(),
            display_name: None,
            photo_url: None,
        });
        store.save_cart("jane@example.com", &[item("cbc")]);
        store.save_guest_cart(&[item("tsh")]);
        store.set_redirect("/checkout");

        store.clear_session();

        assert!(store.token().is_none());
        assert!(store.cached_identity().is_none());
        assert!(store.cart_snapshot("jane@example.com").is_none());
        assert!(store.guest_cart().is_empty());
        assert!(backend.get(keys::REDIRECT_AFTER_LOGIN).unwrap().is_some());
    }

    #[test]
    fn test_unreadable_entry_is_ignored() {
        let (store, backend) = store();
        backend
            .apply(&[Write::Put(keys::GUEST_CART, "{broken".to_string())])
            .unwrap();
        assert!(store.guest_cart().is_empty());
    }
}
