//! The persisted user session.
//!
//! Exactly one session is stored per device, under [`SESSION_KEY`]. It is
//! always replaced wholesale; there is no partial update.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::secure::SharedSecureStore;

/// Fixed namespaced key holding the serialized session.
pub const SESSION_KEY: &str = "educamais.session";

/// Application role carried on the user profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Teacher,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Teacher => "teacher",
            Role::Student => "student",
        }
    }

    /// Case-insensitive match against a raw role string.
    pub fn matches(&self, raw: &str) -> bool {
        raw.trim().eq_ignore_ascii_case(self.as_str())
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signed-in user profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: String,
    /// Raw role string. Sent as `appRole`; older payloads use `role`.
    #[serde(
        rename = "appRole",
        alias = "role",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub role: Option<String>,
}

impl User {
    /// Whether the profile carries `role`. Absent roles never match.
    pub fn has_role(&self, role: Role) -> bool {
        self.role.as_deref().is_some_and(|raw| role.matches(raw))
    }

    /// First word of the display name, for greetings.
    pub fn first_name(&self) -> Option<&str> {
        self.name.split_whitespace().next()
    }
}

/// A signed-in user plus the bearer token for API calls.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user: User,
    pub session_token: String,
}

impl Session {
    pub fn new(user: User, session_token: impl Into<String>) -> Self {
        Self {
            user,
            session_token: session_token.into(),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user)
            .field("session_token", &"<redacted>")
            .finish()
    }
}

/// Reads and writes the single persisted session.
///
/// Every read goes to the backing store, so a purge performed elsewhere
/// (for example after a 401) is visible on the next `get()`.
#[derive(Debug, Clone)]
pub struct SessionStore {
    backend: SharedSecureStore,
}

impl SessionStore {
    pub fn new(backend: SharedSecureStore) -> Self {
        Self { backend }
    }

    /// Persist `session`, replacing any previous one.
    pub async fn save(&self, session: &Session) -> Result<()> {
        let json = serde_json::to_string(session)?;
        self.backend.set_item(SESSION_KEY, &json).await?;
        debug!(user_id = %session.user.id, "Session saved");
        Ok(())
    }

    /// Load the current session.
    ///
    /// Absent, unreadable and corrupt payloads all yield `None`.
    pub async fn get(&self) -> Option<Session> {
        let raw = match self.backend.get_item(SESSION_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Failed to read stored session");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(session) => Some(session),
            Err(e) => {
                warn!(error = %e, "Stored session is corrupt, ignoring");
                None
            }
        }
    }

    /// Remove the stored session. Idempotent.
    pub async fn clear(&self) -> Result<()> {
        self.backend.delete_item(SESSION_KEY).await?;
        debug!("Session cleared");
        Ok(())
    }

    pub async fn has_session(&self) -> bool {
        self.get().await.is_some()
    }
}
