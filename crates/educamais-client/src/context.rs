//! Process-wide authentication state.
//!
//! [`AuthContext`] is created once at start-up from an [`AuthApi`] and
//! shared by `Arc`. It hydrates the user from the stored session in the
//! background and publishes every change through a `watch` channel.
//!
//! Consumers that should only act while a provider is alive take an
//! [`AuthHandle`] from an [`AuthScope`]. Once the scope (and every other
//! strong reference to the context) is gone, every action on the handle
//! fails with a configuration error.

use std::sync::{Arc, Weak};

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::api::AuthApi;
use crate::error::{Error, Result};
use crate::types::{Role, SignInRequest, SignUpRequest, User};

const OUTSIDE_PROVIDER: &str = "auth context used outside its provider";

/// Snapshot of the authentication state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    pub user: Option<User>,
    /// True while hydration or an auth action is in progress.
    pub loading: bool,
}

impl AuthState {
    pub fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }

    pub fn is_teacher(&self) -> bool {
        self.user.as_ref().is_some_and(|u| u.has_role(Role::Teacher))
    }

    pub fn is_student(&self) -> bool {
        self.user.as_ref().is_some_and(|u| u.has_role(Role::Student))
    }
}

/// Holds the signed-in user for the lifetime of the process.
pub struct AuthContext {
    auth: AuthApi,
    state: Arc<watch::Sender<AuthState>>,
    hydration: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthContext")
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl AuthContext {
    /// Create the context and start loading the stored session.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn init(auth: AuthApi) -> Arc<Self> {
        let (tx, _rx) = watch::channel(AuthState {
            user: None,
            loading: true,
        });
        let state = Arc::new(tx);

        let hydration = {
            let auth = auth.clone();
            let state = Arc::clone(&state);
            tokio::spawn(async move {
                let user = auth.get_session().await.map(|s| s.user);
                debug!(signed_in = user.is_some(), "Auth state hydrated");
                state.send_replace(AuthState {
                    user,
                    loading: false,
                });
            })
        };

        Arc::new(Self {
            auth,
            state,
            hydration: Mutex::new(Some(hydration)),
        })
    }

    /// Wait for the initial hydration to finish.
    pub async fn ready(&self) {
        let mut hydration = self.hydration.lock().await;
        if let Some(handle) = hydration.take()
            && let Err(e) = handle.await
        {
            warn!(error = %e, "Auth hydration task failed");
            self.state.send_modify(|s| s.loading = false);
        }
    }

    /// Current state snapshot.
    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn user(&self) -> Option<User> {
        self.state.borrow().user.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn is_signed_in(&self) -> bool {
        self.state.borrow().is_signed_in()
    }

    pub fn is_teacher(&self) -> bool {
        self.state.borrow().is_teacher()
    }

    pub fn is_student(&self) -> bool {
        self.state.borrow().is_student()
    }

    /// Re-read the stored session and publish the result.
    ///
    /// This is how a session purged after a 401 becomes visible here.
    pub async fn check_session(&self) -> Option<User> {
        self.ready().await;
        let user = self.auth.get_session().await.map(|s| s.user);
        self.state.send_if_modified(|s| {
            if s.user == user {
                false
            } else {
                s.user = user.clone();
                true
            }
        });
        user
    }

    pub async fn sign_in(&self, request: SignInRequest) -> Result<User> {
        self.ready().await;
        self.run(self.auth.sign_in(request)).await.map(|s| s.user)
    }

    pub async fn sign_up(&self, request: SignUpRequest) -> Result<User> {
        self.ready().await;
        self.run(self.auth.sign_up(request)).await.map(|s| s.user)
    }

    pub async fn logout(&self) -> Result<()> {
        self.ready().await;
        self.set_loading(true);
        let result = self.auth.sign_out().await;
        self.state.send_modify(|s| {
            if result.is_ok() {
                s.user = None;
            }
            s.loading = false;
        });
        result
    }

    /// Run a sign-in style action with the loading flag raised.
    async fn run<F>(&self, action: F) -> Result<crate::types::Session>
    where
        F: Future<Output = Result<crate::types::Session>>,
    {
        self.set_loading(true);
        let result = action.await;
        self.state.send_modify(|s| {
            if let Ok(session) = &result {
                s.user = Some(session.user.clone());
            }
            s.loading = false;
        });
        result
    }

    fn set_loading(&self, loading: bool) {
        self.state.send_modify(|s| s.loading = loading);
    }
}

/// Owns a context and hands out scoped handles to it.
#[derive(Debug)]
pub struct AuthScope {
    context: Arc<AuthContext>,
}

impl AuthScope {
    pub fn new(context: Arc<AuthContext>) -> Self {
        Self { context }
    }

    /// Create a context from `auth` and scope it.
    pub fn provide(auth: AuthApi) -> Self {
        Self::new(AuthContext::init(auth))
    }

    pub fn context(&self) -> &Arc<AuthContext> {
        &self.context
    }

    pub fn handle(&self) -> AuthHandle {
        AuthHandle {
            context: Arc::downgrade(&self.context),
        }
    }
}

/// Consumer view of an [`AuthContext`].
///
/// The default handle is not attached to any context.
#[derive(Debug, Clone, Default)]
pub struct AuthHandle {
    context: Weak<AuthContext>,
}

impl AuthHandle {
    fn context(&self) -> Result<Arc<AuthContext>> {
        self.context
            .upgrade()
            .ok_or_else(|| Error::Config(OUTSIDE_PROVIDER.to_string()))
    }

    pub fn state(&self) -> Result<AuthState> {
        Ok(self.context()?.state())
    }

    pub fn subscribe(&self) -> Result<watch::Receiver<AuthState>> {
        Ok(self.context()?.subscribe())
    }

    pub async fn sign_in(&self, request: SignInRequest) -> Result<User> {
        self.context()?.sign_in(request).await
    }

    pub async fn sign_up(&self, request: SignUpRequest) -> Result<User> {
        self.context()?.sign_up(request).await
    }

    pub async fn logout(&self) -> Result<()> {
        self.context()?.logout().await
    }

    pub async fn check_session(&self) -> Result<Option<User>> {
        Ok(self.context()?.check_session().await)
    }
}
