//! Request/response middleware stages.
//!
//! Every request built by [`ApiClient`](crate::ApiClient) passes through each
//! stage's [`Middleware::before_request`] in order, and every response status
//! through [`Middleware::after_response`]. The two built-in stages handle the
//! session: [`BearerAuth`] attaches the stored token, [`SessionPurge`] drops
//! the stored session when the server answers 401.

use std::sync::Arc;

use async_trait::async_trait;
use educamais_store::SessionStore;
use reqwest::header::AUTHORIZATION;
use reqwest::{RequestBuilder, StatusCode};
use tracing::{debug, warn};

/// A stage in the request pipeline.
#[async_trait]
pub trait Middleware: Send + Sync + std::fmt::Debug {
    /// Adjust an outgoing request.
    async fn before_request(&self, request: RequestBuilder) -> RequestBuilder {
        request
    }

    /// Observe the status of a received response.
    ///
    /// Runs before the response is turned into a value or an error; it
    /// cannot change what the caller receives.
    async fn after_response(&self, _status: StatusCode) {}
}

/// Shared middleware stage.
pub type SharedMiddleware = Arc<dyn Middleware>;

/// Attaches `Authorization: Bearer <token>` from the stored session.
///
/// Without a stored session the request goes out unauthenticated.
#[derive(Debug, Clone)]
pub struct BearerAuth {
    sessions: SessionStore,
}

impl BearerAuth {
    pub fn new(sessions: SessionStore) -> Self {
        Self { sessions }
    }
}

#[async_trait]
impl Middleware for BearerAuth {
    async fn before_request(&self, request: RequestBuilder) -> RequestBuilder {
        match self.sessions.get().await {
            Some(session) => {
                request.header(AUTHORIZATION, format!("Bearer {}", session.session_token))
            }
            None => request,
        }
    }
}

/// Clears the stored session on any 401 response.
///
/// The purge runs as a detached task so the auth error reaches the caller
/// without waiting on storage. A storage failure is only logged.
#[derive(Debug, Clone)]
pub struct SessionPurge {
    sessions: SessionStore,
}

impl SessionPurge {
    pub fn new(sessions: SessionStore) -> Self {
        Self { sessions }
    }
}

#[async_trait]
impl Middleware for SessionPurge {
    async fn after_response(&self, status: StatusCode) {
        if status != StatusCode::UNAUTHORIZED {
            return;
        }
        debug!("Unauthorized response, clearing stored session");
        let sessions = self.sessions.clone();
        tokio::spawn(async move {
            if let Err(e) = sessions.clear().await {
                warn!(error = %e, "Failed to clear session after 401");
            }
        });
    }
}
