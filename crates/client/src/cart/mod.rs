//! Cart synchronization layer.
//!
//! Keeps the visible cart consistent with the server while applying changes
//! optimistically.
//!
//! # Model
//!
//! - `items` is what the user sees. It is always written together with the
//!   persisted snapshot, under one lock.
//! - Every in-flight add or remove is tracked as a pending operation. When a
//!   reload lands, pending operations are replayed on top of the server list
//!   so an optimistic change is never clobbered by a reload that started
//!   before it resolved.
//! - Each load takes a sequence number. A response is applied only if no
//!   newer load was started since; a resolved mutation or a reset also
//!   supersedes loads already in flight.
//!
//! No lock is ever held across an `.await`.

mod outcome;

pub use outcome::{CartLoad, CartMutation, Confirmation, Notice, NoticeLevel};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use medibook_core::{Price, TestId};
use tracing::{debug, info, instrument, warn};

use crate::api::{ApiError, CartItem, LabApi, dedupe_items, total_of};
use crate::auth::AuthSession;
use crate::checkout::OrderConfirmation;
use crate::poll::PollHandle;
use crate::storage::SessionStore;

#[derive(Debug, Clone)]
enum PendingOp {
    Add { id: u64, item: CartItem },
    Remove { id: u64, test_id: TestId },
}

impl PendingOp {
    const fn id(&self) -> u64 {
        match self {
            Self::Add { id, .. } | Self::Remove { id, .. } => *id,
        }
    }
}

/// Apply in-flight operations, in order, on top of a server list.
fn replay(base: Vec<CartItem>, pending: &[PendingOp]) -> Vec<CartItem> {
    let mut items = dedupe_items(base);
    for op in pending {
        match op {
            PendingOp::Add { item, .. } => {
                if !items.iter().any(|i| i.test_id == item.test_id) {
                    items.push(item.clone());
                }
            }
            PendingOp::Remove { test_id, .. } => items.retain(|i| &i.test_id != test_id),
        }
    }
    items
}

#[derive(Debug, Default)]
struct CartState {
    /// User key the items belong to.
    owner: Option<String>,
    items: Vec<CartItem>,
    pending: Vec<PendingOp>,
    loading: bool,
    next_op: u64,
}

impl CartState {
    fn track(&mut self, op: impl FnOnce(u64) -> PendingOp) -> u64 {
        self.next_op += 1;
        let id = self.next_op;
        self.pending.push(op(id));
        id
    }

    /// Stop tracking `id`. False if a reset already dropped it.
    fn finish(&mut self, id: u64) -> bool {
        let before = self.pending.len();
        self.pending.retain(|op| op.id() != id);
        self.pending.len() != before
    }

    fn contains(&self, test_id: &TestId) -> bool {
        self.items.iter().any(|i| &i.test_id == test_id)
    }
}

/// The cart service.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct CartSync {
    inner: Arc<CartInner>,
}

struct CartInner {
    api: Arc<dyn LabApi>,
    store: SessionStore,
    auth: AuthSession,
    state: Mutex<CartState>,
    load_seq: AtomicU64,
}

impl CartSync {
    /// Create an empty cart service that resets whenever `auth` clears
    /// its session.
    #[must_use]
    pub fn new(api: Arc<dyn LabApi>, store: SessionStore, auth: AuthSession) -> Self {
        let inner = Arc::new(CartInner {
            api,
            store,
            auth: auth.clone(),
            state: Mutex::new(CartState::default()),
            load_seq: AtomicU64::new(0),
        });

        let weak = Arc::downgrade(&inner);
        auth.on_session_cleared(move || {
            if let Some(inner) = weak.upgrade() {
                Self { inner }.reset();
            }
        });

        Self { inner }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Current items, including optimistic changes.
    #[must_use]
    pub fn items(&self) -> Vec<CartItem> {
        self.lock().items.clone()
    }

    /// Whether a load is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.lock().loading
    }

    /// Whether the cart holds `test_id`.
    #[must_use]
    pub fn contains(&self, test_id: &TestId) -> bool {
        self.lock().contains(test_id)
    }

    /// Sum of current item prices. Missing prices count as zero.
    #[must_use]
    pub fn compute_total(&self) -> Price {
        total_of(&self.lock().items)
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Fetch the server cart for `user_key`.
    ///
    /// Falls back to the persisted snapshot (or an empty cart) when the
    /// server cannot be reached. Safe to call repeatedly; a response is
    /// dropped if a newer load has started since this one.
    #[instrument(skip(self))]
    pub async fn load_cart(&self, user_key: &str) -> CartLoad {
        let seq = self.inner.load_seq.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut state = self.lock();
            self.switch_owner(&mut state, user_key);
            state.loading = true;
        }

        let result = self.inner.api.get_cart(user_key).await;

        let mut state = self.lock();
        if self.inner.load_seq.load(Ordering::SeqCst) != seq
            || state.owner.as_deref() != Some(user_key)
        {
            debug!(seq, "Discarding stale cart response");
            return CartLoad::Discarded;
        }
        state.loading = false;

        let (base, source) = match result {
            Ok(items) => (
                items.into_iter().map(CartItem::normalized).collect(),
                CartLoad::Server,
            ),
            Err(e) => {
                warn!(error = %e, "Cart fetch failed, falling back to cached cart");
                self.inner
                    .store
                    .cart_snapshot(user_key)
                    .map_or((Vec::new(), CartLoad::Empty), |items| {
                        (items, CartLoad::Cached)
                    })
            }
        };

        let items = replay(base, &state.pending);
        debug!(items = items.len(), ?source, "Cart loaded");
        self.commit(&mut state, items);
        source
    }

    /// Reload the cart of the signed-in user. `None` when signed out.
    pub async fn refresh(&self) -> Option<CartLoad> {
        let identity = self.inner.auth.identity()?;
        Some(self.load_cart(identity.user_key()).await)
    }

    /// Reload the signed-in user's cart every `period` until the handle is
    /// dropped.
    #[must_use]
    pub fn watch(&self, period: Duration) -> PollHandle {
        let cart = self.clone();
        PollHandle::spawn("cart", period, move || {
            let cart = cart.clone();
            async move {
                cart.refresh().await;
            }
        })
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add a test to the signed-in user's cart.
    ///
    /// The item is visible immediately. If the server refuses it, it is
    /// taken back out; if the server already had it, the add counts as done.
    #[instrument(skip(self, item), fields(test_id = %item.test_id))]
    pub async fn add_item(&self, item: CartItem) -> CartMutation {
        let Some(identity) = self.inner.auth.identity() else {
            return CartMutation::SignInRequired;
        };
        let user_key = identity.user_key().to_owned();
        let item = item.normalized();

        let (op_id, seq_at_start) = {
            let mut state = self.lock();
            self.switch_owner(&mut state, &user_key);
            if state.contains(&item.test_id) {
                debug!("Test already in cart, not sending");
                return CartMutation::AlreadyInCart;
            }
            let id = state.track(|id| PendingOp::Add {
                id,
                item: item.clone(),
            });
            let mut items = state.items.clone();
            items.push(item.clone());
            self.commit(&mut state, items);
            (id, self.inner.load_seq.load(Ordering::SeqCst))
        };

        let result = self.inner.api.add_to_cart(&user_key, &item).await;

        let mut state = self.lock();
        let tracked = state.finish(op_id) && state.owner.as_deref() == Some(user_key.as_str());

        match result {
            Ok(server_items) => {
                if tracked {
                    // The returned cart is only newer than what we hold if
                    // no load has started or finished since the add began.
                    if let Some(server_items) = server_items
                        && self.inner.load_seq.load(Ordering::SeqCst) == seq_at_start
                    {
                        let base = server_items.into_iter().map(CartItem::normalized).collect();
                        let items = replay(base, &state.pending);
                        self.commit(&mut state, items);
                    }
                    self.supersede_loads(&mut state);
                }
                info!("Added to cart");
                CartMutation::Applied
            }
            Err(ApiError::AlreadyInCart) => {
                info!("Server already had this test");
                CartMutation::AlreadyInCart
            }
            Err(e) => {
                warn!(error = %e, "Add to cart failed, rolling back");
                if tracked {
                    let mut items = state.items.clone();
                    items.retain(|i| i.test_id != item.test_id);
                    self.commit(&mut state, items);
                }
                CartMutation::RolledBack(e)
            }
        }
    }

    /// Remove a test from the signed-in user's cart.
    ///
    /// Does nothing unless `confirmation` is [`Confirmation::Confirmed`].
    /// The item disappears immediately; if the server refuses, the cart is
    /// reloaded from the server. When that reload cannot reach the server
    /// either, the item is put back.
    #[instrument(skip(self, confirmation))]
    pub async fn remove_item(&self, test_id: &TestId, confirmation: Confirmation) -> CartMutation {
        if confirmation != Confirmation::Confirmed {
            debug!("Removal not confirmed");
            return CartMutation::NotConfirmed;
        }
        let Some(identity) = self.inner.auth.identity() else {
            return CartMutation::SignInRequired;
        };
        let user_key = identity.user_key().to_owned();

        let (op_id, removed) = {
            let mut state = self.lock();
            self.switch_owner(&mut state, &user_key);
            let id = state.track(|id| PendingOp::Remove {
                id,
                test_id: test_id.clone(),
            });
            let removed = state
                .items
                .iter()
                .position(|i| &i.test_id == test_id)
                .and_then(|index| Some((index, state.items.get(index)?.clone())));
            let mut items = state.items.clone();
            items.retain(|i| &i.test_id != test_id);
            self.commit(&mut state, items);
            (id, removed)
        };

        let result = self.inner.api.remove_from_cart(&user_key, test_id).await;

        let tracked = {
            let mut state = self.lock();
            let tracked =
                state.finish(op_id) && state.owner.as_deref() == Some(user_key.as_str());
            if tracked && result.is_ok() {
                self.supersede_loads(&mut state);
            }
            tracked
        };

        match result {
            Ok(()) => {
                info!("Removed from cart");
                CartMutation::Applied
            }
            Err(e) => {
                warn!(error = %e, "Remove from cart failed, resyncing");
                if !tracked {
                    return CartMutation::Resynced(e);
                }
                match self.load_cart(&user_key).await {
                    CartLoad::Cached | CartLoad::Empty => {
                        warn!("Server unreachable, restoring removed test");
                        self.restore(&user_key, removed);
                        CartMutation::Reverted(e)
                    }
                    CartLoad::Server | CartLoad::Discarded => CartMutation::Resynced(e),
                }
            }
        }
    }

    /// Put back an item whose removal the server never saw.
    fn restore(&self, user_key: &str, removed: Option<(usize, CartItem)>) {
        let Some((index, item)) = removed else {
            return;
        };
        let mut state = self.lock();
        if state.owner.as_deref() != Some(user_key) || state.contains(&item.test_id) {
            return;
        }
        let mut items = state.items.clone();
        items.insert(index.min(items.len()), item);
        self.commit(&mut state, items);
    }

    /// Empty the cart after an order was placed.
    ///
    /// Requires the confirmation of that order, so it cannot run for an
    /// order that did not go through. Local state and the snapshot are
    /// cleared first; a failed server clear triggers a resync.
    #[instrument(skip_all, fields(order_id = %order.order_id()))]
    pub async fn clear_cart(&self, order: &OrderConfirmation) -> CartMutation {
        let user_key = order.user_key();
        {
            let mut state = self.lock();
            state.owner = Some(user_key.to_owned());
            state.pending.clear();
            self.supersede_loads(&mut state);
            self.commit(&mut state, Vec::new());
        }

        match self.inner.api.clear_cart(user_key).await {
            Ok(()) => {
                info!("Cart cleared");
                CartMutation::Applied
            }
            Err(e) => {
                warn!(error = %e, "Server cart clear failed, resyncing");
                self.load_cart(user_key).await;
                CartMutation::Resynced(e)
            }
        }
    }

    /// Forget the in-memory cart, e.g. on sign-out. In-flight responses
    /// are dropped when they arrive. Storage is left alone.
    pub fn reset(&self) {
        let mut state = self.lock();
        let next_op = state.next_op;
        *state = CartState {
            next_op,
            ..CartState::default()
        };
        self.inner.load_seq.fetch_add(1, Ordering::SeqCst);
    }

    // =========================================================================
    // Guest cart
    // =========================================================================

    /// Items of the anonymous local-only cart.
    #[must_use]
    pub fn guest_items(&self) -> Vec<CartItem> {
        self.inner.store.guest_cart()
    }

    /// Add to the anonymous cart. Never reaches the server.
    pub fn add_guest_item(&self, item: CartItem) -> CartMutation {
        let item = item.normalized();
        let mut items = self.inner.store.guest_cart();
        if items.iter().any(|i| i.test_id == item.test_id) {
            return CartMutation::AlreadyInCart;
        }
        items.push(item);
        self.inner.store.save_guest_cart(&items);
        CartMutation::Applied
    }

    /// Remove from the anonymous cart, if confirmed.
    pub fn remove_guest_item(&self, test_id: &TestId, confirmation: Confirmation) -> CartMutation {
        if confirmation != Confirmation::Confirmed {
            return CartMutation::NotConfirmed;
        }
        let mut items = self.inner.store.guest_cart();
        items.retain(|i| &i.test_id != test_id);
        self.inner.store.save_guest_cart(&items);
        CartMutation::Applied
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn lock(&self) -> MutexGuard<'_, CartState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the visible items and the persisted snapshot together.
    fn commit(&self, state: &mut CartState, items: Vec<CartItem>) {
        state.items = items;
        if let Some(owner) = &state.owner {
            self.inner.store.save_cart(owner, &state.items);
        }
    }

    /// Point the cart at `user_key`, starting from their snapshot if the
    /// previous owner was someone else.
    fn switch_owner(&self, state: &mut CartState, user_key: &str) {
        if state.owner.as_deref() != Some(user_key) {
            state.owner = Some(user_key.to_owned());
            state.pending.clear();
            state.items = self.inner.store.cart_snapshot(user_key).unwrap_or_default();
        }
    }

    /// Make loads started before now drop their responses.
    fn supersede_loads(&self, state: &mut CartState) {
        self.inner.load_seq.fetch_add(1, Ordering::SeqCst);
        state.loading = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, price: Option<u64>) -> CartItem {
        CartItem {
            test_id: TestId::new(id),
            name: id.to_string(),
            lab: None,
            price: price.map(Price::new),
            category: None,
            description: None,
        }
    }

    fn ids(items: &[CartItem]) -> Vec<&str> {
        items.iter().map(|i| i.test_id.as_str()).collect()
    }

    #[test]
    fn test_replay_keeps_in_flight_add() {
        let pending = vec![PendingOp::Add {
            id: 1,
            item: item("tsh", Some(399)),
        }];
        let items = replay(vec![item("cbc", Some(599))], &pending);
        assert_eq!(ids(&items), ["cbc", "tsh"]);
    }

    #[test]
    fn test_replay_keeps_in_flight_remove() {
        let pending = vec![PendingOp::Remove {
            id: 1,
            test_id: TestId::new("cbc"),
        }];
        let items = replay(vec![item("cbc", Some(599)), item("lft", None)], &pending);
        assert_eq!(ids(&items), ["lft"]);
    }

    #[test]
    fn test_replay_does_not_duplicate() {
        let pending = vec![PendingOp::Add {
            id: 1,
            item: item("cbc", Some(599)),
        }];
        let items = replay(vec![item("cbc", Some(599)), item("cbc", Some(599))], &pending);
        assert_eq!(ids(&items), ["cbc"]);
    }

    #[test]
    fn test_replay_applies_ops_in_order() {
        let pending = vec![
            PendingOp::Remove {
                id: 1,
                test_id: TestId::new("cbc"),
            },
            PendingOp::Add {
                id: 2,
                item: item("cbc", Some(650)),
            },
        ];
        let items = replay(vec![item("cbc", Some(599))], &pending);
        assert_eq!(items.len(), 1);
        assert_eq!(items.first().and_then(|i| i.price), Some(Price::new(650)));
    }

    #[test]
    fn test_finish_reports_untracked_ops() {
        let mut state = CartState::default();
        let id = state.track(|id| PendingOp::Remove {
            id,
            test_id: TestId::new("cbc"),
        });
        assert!(state.finish(id));
        assert!(!state.finish(id));
    }

    #[test]
    fn test_total_treats_missing_price_as_zero() {
        assert_eq!(
            total_of(&[item("a", Some(599)), item("b", Some(899))]),
            Price::new(1498)
        );
        assert_eq!(total_of(&[item("a", Some(599)), item("b", None)]), Price::new(599));
    }
}
