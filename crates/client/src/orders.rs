//! Order history and the family members derived from it.
//!
//! The latest list is published on a `watch` channel so a profile view can
//! re-render whenever a refresh (manual or polled) lands. A failed refresh
//! leaves the published list alone.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use medibook_core::{Gender, Relation};
use tokio::sync::watch;
use tracing::{debug, instrument, warn};

use crate::api::{ApiError, LabApi, Order};
use crate::auth::AuthSession;
use crate::error::{ClientError, Result};
use crate::poll::PollHandle;

/// Someone other than the account holder that tests were booked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyMember {
    pub name: String,
    pub relation: Relation,
    pub gender: Option<Gender>,
    pub dob: Option<NaiveDate>,
}

/// Distinct non-self patients across `orders`, most recent booking first.
///
/// Names are compared ignoring case and surrounding whitespace.
#[must_use]
pub fn family_members(orders: &[Order]) -> Vec<FamilyMember> {
    let mut sorted: Vec<&Order> = orders.iter().collect();
    sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let mut seen = HashSet::new();
    sorted
        .into_iter()
        .filter_map(|order| {
            let patient = &order.patient_info;
            let relation = patient.relation.filter(Relation::is_family_member)?;
            let name = patient.name.trim();
            if name.is_empty() || !seen.insert((name.to_lowercase(), relation)) {
                return None;
            }
            Some(FamilyMember {
                name: name.to_owned(),
                relation,
                gender: patient.gender,
                dob: patient.dob,
            })
        })
        .collect()
}

/// The order history service.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct OrderHistory {
    inner: Arc<OrdersInner>,
}

struct OrdersInner {
    api: Arc<dyn LabApi>,
    auth: AuthSession,
    orders: watch::Sender<Vec<Order>>,
}

impl OrderHistory {
    /// Create an empty history that is cleared whenever `auth` clears its
    /// session.
    #[must_use]
    pub fn new(api: Arc<dyn LabApi>, auth: AuthSession) -> Self {
        let (orders, _) = watch::channel(Vec::new());
        let inner = Arc::new(OrdersInner {
            api,
            auth: auth.clone(),
            orders,
        });

        let weak = Arc::downgrade(&inner);
        auth.on_session_cleared(move || {
            if let Some(inner) = weak.upgrade() {
                Self { inner }.clear();
            }
        });

        Self { inner }
    }

    /// Fetch the signed-in user's orders, newest first, and publish them.
    ///
    /// # Errors
    ///
    /// - [`ClientError::NotSignedIn`] without a session
    /// - [`ClientError::Api`] if the fetch fails; a rejected session is
    ///   also invalidated
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<Vec<Order>> {
        let token = self.inner.auth.token().ok_or(ClientError::NotSignedIn)?;

        match self.inner.api.list_orders(&token).await {
            Ok(mut orders) => {
                orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                debug!(count = orders.len(), "Orders refreshed");
                self.inner.orders.send_replace(orders.clone());
                Ok(orders)
            }
            Err(ApiError::Unauthorized) => {
                self.inner.auth.invalidate();
                Err(ApiError::Unauthorized.into())
            }
            Err(e) => {
                warn!(error = %e, "Order refresh failed, keeping last list");
                Err(e.into())
            }
        }
    }

    /// Last published list.
    #[must_use]
    pub fn orders(&self) -> Vec<Order> {
        self.inner.orders.borrow().clone()
    }

    /// Receiver that sees every published list.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Vec<Order>> {
        self.inner.orders.subscribe()
    }

    /// Family members from the last published list.
    #[must_use]
    pub fn family_members(&self) -> Vec<FamilyMember> {
        family_members(&self.inner.orders.borrow())
    }

    /// Refresh every `period` until the handle is dropped. Ticks while
    /// signed out do nothing.
    #[must_use]
    pub fn watch(&self, period: Duration) -> PollHandle {
        let history = self.clone();
        PollHandle::spawn("orders", period, move || {
            let history = history.clone();
            async move {
                if history.inner.auth.is_authenticated()
                    && let Err(e) = history.refresh().await
                {
                    debug!(error = %e, "Order poll tick failed");
                }
            }
        })
    }

    /// Publish an empty list, e.g. on sign-out.
    pub fn clear(&self) {
        self.inner.orders.send_replace(Vec::new());
    }
}
