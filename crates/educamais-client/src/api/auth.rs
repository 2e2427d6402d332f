//! Auth API.

use tracing::{debug, info, warn};

use crate::client::ApiClient;
use crate::error::Result;
use crate::types::{AuthResponse, Role, Session, SignInRequest, SignUpBody, SignUpRequest};
use crate::validation::Validate;

/// Auth API client.
///
/// Sign-in and sign-up persist the returned session; sign-out always
/// removes it locally.
#[derive(Debug, Clone)]
pub struct AuthApi {
    client: ApiClient,
}

impl AuthApi {
    pub(crate) fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Register a new account and store its session.
    pub async fn sign_up(&self, request: SignUpRequest) -> Result<Session> {
        request.validate()?;
        debug!(email = %request.email, "Signing up");

        let body = SignUpBody {
            email: &request.email,
            password: &request.password,
            name: request.effective_name(),
        };
        let response: AuthResponse = self
            .client
            .post("auth/sign-up/email", &body)
            .await
            .inspect_err(|e| warn!(error = %e, "Sign-up failed"))?;

        self.persist(response).await
    }

    /// Authenticate with email and password and store the session.
    pub async fn sign_in(&self, request: SignInRequest) -> Result<Session> {
        request.validate()?;
        debug!(email = %request.email, "Signing in");

        let response: AuthResponse = self
            .client
            .post("auth/sign-in/email", &request)
            .await
            .inspect_err(|e| warn!(error = %e, "Sign-in failed"))?;

        self.persist(response).await
    }

    /// End the session.
    ///
    /// The server call is best-effort; the local session is cleared whatever
    /// the server answers.
    pub async fn sign_out(&self) -> Result<()> {
        debug!("Signing out");
        if let Err(e) = self.client.post_empty("auth/sign-out").await {
            warn!(error = %e, "Server sign-out failed, clearing local session anyway");
        }
        self.client.sessions().clear().await?;
        info!("Signed out");
        Ok(())
    }

    /// The stored session, if any.
    pub async fn get_session(&self) -> Option<Session> {
        self.client.sessions().get().await
    }

    /// Whether `session` belongs to a user with `role`.
    pub fn has_role(session: Option<&Session>, role: Role) -> bool {
        session.is_some_and(|s| s.user.has_role(role))
    }

    pub fn is_teacher(session: Option<&Session>) -> bool {
        Self::has_role(session, Role::Teacher)
    }

    pub fn is_student(session: Option<&Session>) -> bool {
        Self::has_role(session, Role::Student)
    }

    async fn persist(&self, response: AuthResponse) -> Result<Session> {
        let session = Session::from(response);
        self.client.sessions().save(&session).await?;
        info!(user_id = %session.user.id, "Signed in");
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::User;

    fn session(role: Option<&str>) -> Session {
        Session::new(
            User {
                id: "u1".to_string(),
                email: "a@b.com".to_string(),
                name: "A".to_string(),
                role: role.map(str::to_string),
            },
            "tok",
        )
    }

    #[test]
    fn test_role_predicates() {
        let teacher = session(Some("Teacher"));
        assert!(AuthApi::is_teacher(Some(&teacher)));
        assert!(!AuthApi::is_student(Some(&teacher)));

        let student = session(Some("student"));
        assert!(AuthApi::is_student(Some(&student)));

        let none = session(None);
        assert!(!AuthApi::is_teacher(Some(&none)));
        assert!(!AuthApi::is_student(Some(&none)));

        let other = session(Some("admin"));
        assert!(!AuthApi::has_role(Some(&other), Role::Teacher));

        assert!(!AuthApi::is_teacher(None));
    }
}
