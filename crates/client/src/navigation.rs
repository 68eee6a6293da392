//! Navigation side effects requested by the session services.
//!
//! The services never render anything; when a flow needs the user somewhere
//! else (the sign-in view, the provider's login page, a remembered path) it
//! asks the [`Navigator`] the front end supplied.

use std::sync::{Mutex, PoisonError};

use url::Url;

/// Where the front end should take the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// The application's own sign-in view.
    SignIn,
    /// The identity provider's login entry point (full-page navigation).
    Provider(Url),
    /// An application path, e.g. a remembered post-login redirect.
    Path(String),
}

/// A navigation request as seen by the front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationEvent {
    /// Move to a new location.
    Navigate(Destination),
    /// Rewrite the current location in place, without a history entry.
    Replace(Url),
}

/// Performs navigation on behalf of the session services.
pub trait Navigator: Send + Sync {
    /// Move the user to `to`.
    fn navigate(&self, to: Destination);

    /// Replace the visible location without adding a history entry.
    fn replace_location(&self, url: &Url);
}

/// Navigator that records requests for the front end to act on later.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    events: Mutex<Vec<NavigationEvent>>,
}

impl RecordingNavigator {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return everything recorded so far.
    #[must_use]
    pub fn drain(&self) -> Vec<NavigationEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Most recent navigation target, ignoring in-place replacements.
    #[must_use]
    pub fn last_destination(&self) -> Option<Destination> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .rev()
            .find_map(|event| match event {
                NavigationEvent::Navigate(to) => Some(to.clone()),
                NavigationEvent::Replace(_) => None,
            })
    }

    fn push(&self, event: NavigationEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, to: Destination) {
        tracing::debug!(destination = ?to, "Navigation requested");
        self.push(NavigationEvent::Navigate(to));
    }

    fn replace_location(&self, url: &Url) {
        self.push(NavigationEvent::Replace(url.clone()));
    }
}

/// Copy of `location` without the named query parameter.
#[must_use]
pub fn without_query_param(location: &Url, name: &str) -> Url {
    let kept: Vec<(String, String)> = location
        .query_pairs()
        .filter(|(key, _)| key != name)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut stripped = location.clone();
    if kept.is_empty() {
        stripped.set_query(None);
    } else {
        stripped.query_pairs_mut().clear().extend_pairs(kept);
    }
    stripped
}
