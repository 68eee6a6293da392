//! Auth session manager.
//!
//! Single source of truth for who the current user is and what proves it.
//!
//! # Lifecycle
//!
//! 1. [`AuthSession::initialize`] picks up a token from the callback URL
//!    (preferred) or from storage and validates it against `GET /auth/me`
//! 2. A valid token yields an [`Identity`]; any failure clears every trace
//!    of the session (fail closed)
//! 3. [`AuthSession::sign_out`] tells the server, then clears local state
//!    whether or not the server answered
//!
//! An identity is only ever held together with the token that fetched it.
//! Services holding per-user state register with
//! [`AuthSession::on_session_cleared`] and are reset on every path that
//! drops the session.

mod token;

pub use token::SessionToken;

use std::sync::{Arc, PoisonError, RwLock};

use tracing::{info, instrument, warn};
use url::Url;

use crate::api::{Identity, LabApi};
use crate::navigation::{Destination, Navigator, without_query_param};
use crate::storage::SessionStore;

/// Query parameter the provider callback carries the token in.
pub const TOKEN_QUERY_PARAM: &str = "token";

/// Coarse authentication status for gating views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    /// Startup has not finished validating the session yet.
    Loading,
    /// No valid session.
    Anonymous,
    /// Identity and token are both present.
    Authenticated,
}

type SessionListener = Box<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct AuthState {
    identity: Option<Identity>,
    token: Option<SessionToken>,
    loading: bool,
}

/// The auth session service.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct AuthSession {
    inner: Arc<AuthInner>,
}

struct AuthInner {
    api: Arc<dyn LabApi>,
    store: SessionStore,
    navigator: Arc<dyn Navigator>,
    state: RwLock<AuthState>,
    listeners: RwLock<Vec<SessionListener>>,
}

impl AuthSession {
    /// Create a session service. Nothing is read until [`initialize`].
    ///
    /// [`initialize`]: Self::initialize
    #[must_use]
    pub fn new(api: Arc<dyn LabApi>, store: SessionStore, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            inner: Arc::new(AuthInner {
                api,
                store,
                navigator,
                state: RwLock::new(AuthState {
                    loading: true,
                    ..AuthState::default()
                }),
                listeners: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Restore or establish the session at startup.
    ///
    /// A `token` query parameter on `location` wins over a persisted token;
    /// it is persisted and then stripped from the visible location without
    /// a history entry.
    #[instrument(skip_all)]
    pub async fn initialize(&self, location: Option<&Url>) -> AuthStatus {
        self.write_state(|s| s.loading = true);

        let from_url = location.and_then(|url| {
            url.query_pairs()
                .find(|(key, _)| key == TOKEN_QUERY_PARAM)
                .and_then(|(_, value)| SessionToken::new(value.into_owned()))
        });

        let token = match from_url {
            Some(token) => {
                info!("Session token received from sign-in callback");
                self.inner.store.save_token(&token);
                Some(token)
            }
            None => self.inner.store.token(),
        };

        if let Some(location) = location
            && location
                .query_pairs()
                .any(|(key, _)| key == TOKEN_QUERY_PARAM)
        {
            self.inner
                .navigator
                .replace_location(&without_query_param(location, TOKEN_QUERY_PARAM));
        }

        match token {
            Some(token) => {
                self.fetch_profile(token).await;
            }
            None => self.write_state(|s| s.loading = false),
        }

        self.status()
    }

    /// Validate `token` and load the identity it belongs to.
    ///
    /// On success the identity is cached and a pending post-login redirect
    /// is consumed. On any failure the whole session is cleared.
    #[instrument(skip_all)]
    pub async fn fetch_profile(&self, token: SessionToken) -> Option<Identity> {
        self.write_state(|s| s.loading = true);

        match self.inner.api.me(&token).await {
            Ok(identity) => {
                info!(user = %identity.id, email = %identity.email.masked(), "Signed in");
                self.inner.store.save_token(&token);
                self.inner.store.save_identity(&identity);
                self.write_state(|s| {
                    s.identity = Some(identity.clone());
                    s.token = Some(token);
                    s.loading = false;
                });

                if let Some(path) = self.inner.store.take_redirect() {
                    self.inner.navigator.navigate(Destination::Path(path));
                }
                Some(identity)
            }
            Err(e) => {
                warn!(error = %e, "Profile fetch failed, clearing session");
                self.clear_local();
                None
            }
        }
    }

    /// Send the user to the identity provider's login page.
    pub fn sign_in_with_google(&self) {
        let url = self.inner.api.sign_in_url();
        self.inner.navigator.navigate(Destination::Provider(url));
    }

    /// Sign out everywhere we can.
    ///
    /// The logout call is best effort. Local and persisted session state is
    /// cleared regardless, then the user is sent to the sign-in view.
    #[instrument(skip_all)]
    pub async fn sign_out(&self) {
        if let Some(token) = self.token()
            && let Err(e) = self.inner.api.logout(&token).await
        {
            warn!(error = %e, "Logout request failed, clearing local session anyway");
        }

        self.clear_local();
        self.inner.store.clear_redirect();
        info!("Signed out");
        self.inner.navigator.navigate(Destination::SignIn);
    }

    /// Drop a session the server no longer accepts.
    ///
    /// Like [`sign_out`](Self::sign_out) without the logout call; the
    /// pending redirect is kept so the user lands back where they were.
    pub fn invalidate(&self) {
        warn!("Session rejected by server");
        self.clear_local();
        self.inner.navigator.navigate(Destination::SignIn);
    }

    /// Remember `return_to` and send the user to sign in.
    pub fn require_sign_in(&self, return_to: &str) {
        self.inner.store.set_redirect(return_to);
        self.inner.navigator.navigate(Destination::SignIn);
    }

    /// Run `listener` every time the session is cleared: sign-out, a
    /// rejected session, or a failed profile fetch.
    pub fn on_session_cleared(&self, listener: impl Fn() + Send + Sync + 'static) {
        self.inner
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(listener));
    }

    /// Forget in-memory state without touching storage, e.g. on shutdown.
    pub fn teardown(&self) {
        self.write_state(|s| *s = AuthState::default());
    }

    /// True iff both an identity and a token are held.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.read_state(|s| s.identity.is_some() && s.token.is_some())
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> AuthStatus {
        self.read_state(|s| {
            if s.loading {
                AuthStatus::Loading
            } else if s.identity.is_some() && s.token.is_some() {
                AuthStatus::Authenticated
            } else {
                AuthStatus::Anonymous
            }
        })
    }

    /// The signed-in identity.
    #[must_use]
    pub fn identity(&self) -> Option<Identity> {
        self.read_state(|s| s.token.as_ref().and(s.identity.clone()))
    }

    /// The bearer token of the signed-in user.
    #[must_use]
    pub fn token(&self) -> Option<SessionToken> {
        self.read_state(|s| s.token.clone())
    }

    /// Identity and token together, when signed in.
    #[must_use]
    pub fn credentials(&self) -> Option<(Identity, SessionToken)> {
        self.read_state(|s| match (&s.identity, &s.token) {
            (Some(identity), Some(token)) => Some((identity.clone(), token.clone())),
            _ => None,
        })
    }

    /// Identity cached by a previous run, for display while loading.
    #[must_use]
    pub fn last_known_identity(&self) -> Option<Identity> {
        self.identity()
            .or_else(|| self.inner.store.cached_identity())
    }

    fn clear_local(&self) {
        self.inner.store.clear_session();
        self.write_state(|s| {
            s.identity = None;
            s.token = None;
            s.loading = false;
        });

        let listeners = self.inner.listeners.read().unwrap_or_else(PoisonError::into_inner);
        for listener in listeners.iter() {
            listener();
        }
    }

    fn read_state<T>(&self, f: impl FnOnce(&AuthState) -> T) -> T {
        f(&self.inner.state.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn write_state(&self, f: impl FnOnce(&mut AuthState)) {
        f(&mut self.inner.state.write().unwrap_or_else(PoisonError::into_inner));
    }
}
