//! Request and response types for the EducaMais API.
//!
//! These types mirror the server's API contract. Post fields keep the
//! server's wire names (`titulo`, `conteudo`, ...) through serde renames.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use educamais_store::{Role, Session, User};

// ─────────────────────────────────────────────────────────────────────────────
// Envelopes
// ─────────────────────────────────────────────────────────────────────────────

/// Single-entity envelope: `{success, data}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub success: bool,
    pub data: T,
}

/// Pagination metadata for list responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub pages: u32,
}

impl Pagination {
    /// The following page number, or `None` on the last page.
    pub fn next_page(&self) -> Option<u32> {
        (self.page < self.pages).then(|| self.page + 1)
    }
}

/// Paginated list envelope: `{success, data[], pagination?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paginated<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Auth
// ─────────────────────────────────────────────────────────────────────────────

/// Credentials for `POST /auth/sign-in/email`.
#[derive(Clone, Serialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

impl SignInRequest {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for SignInRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignInRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Registration details for `POST /auth/sign-up/email`.
#[derive(Clone)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    /// Display name. Defaults to the local part of the email.
    pub name: Option<String>,
}

impl SignUpRequest {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The name sent to the server.
    pub fn effective_name(&self) -> String {
        match &self.name {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => self
                .email
                .split('@')
                .next()
                .unwrap_or_default()
                .to_string(),
        }
    }
}

impl fmt::Debug for SignUpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignUpRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("name", &self.name)
            .finish()
    }
}

/// Wire body for sign-up; `name` is always present.
#[derive(Serialize)]
pub(crate) struct SignUpBody<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub name: String,
}

/// Response from sign-in and sign-up.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

impl From<AuthResponse> for Session {
    fn from(response: AuthResponse) -> Self {
        Session::new(response.user, response.token)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Posts
// ─────────────────────────────────────────────────────────────────────────────

/// Post author summary embedded in post responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostAuthor {
    pub name: String,
    pub email: String,
    #[serde(
        rename = "appRole",
        alias = "role",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub role: Option<String>,
}

/// A post as returned by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// Server-assigned identifier.
    pub id: u64,
    #[serde(rename = "titulo")]
    pub title: String,
    #[serde(rename = "conteudo")]
    pub body: String,
    #[serde(rename = "descricao", default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(rename = "autorId")]
    pub author_id: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "atualizacao")]
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "autor", default, skip_serializing_if = "Option::is_none")]
    pub author: Option<PostAuthor>,
}

impl Post {
    /// Whether the post changed after creation.
    pub fn is_edited(&self) -> bool {
        self.updated_at != self.created_at
    }

    /// Short text for list views: the summary if present, else the body.
    pub fn excerpt(&self) -> &str {
        match self.summary.as_deref() {
            Some(summary) if !summary.trim().is_empty() => summary,
            _ => &self.body,
        }
    }

    /// Author display name.
    pub fn author_name(&self) -> &str {
        self.author
            .as_ref()
            .map(|a| a.name.as_str())
            .filter(|n| !n.is_empty())
            .unwrap_or("Unknown")
    }
}

/// Payload for creating or updating a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostInput {
    #[serde(rename = "titulo")]
    pub title: String,
    #[serde(rename = "conteudo")]
    pub body: String,
    #[serde(rename = "descricao", default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl PostInput {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            summary: None,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POST_JSON: &str = r#"{
        "id": 5,
        "titulo": "Photosynthesis",
        "conteudo": "Plants turn light into sugar.",
        "autorId": "u1",
        "createdAt": "2024-03-01T10:00:00.000Z",
        "atualizacao": "2024-03-02T08:30:00.000Z",
        "autor": {"name": "Ana", "email": "ana@escola.br", "appRole": "teacher"}
    }"#;

    #[test]
    fn test_post_from_wire() {
        let post: Post = serde_json::from_str(POST_JSON).unwrap();
        assert_eq!(post.id, 5);
        assert_eq!(post.title, "Photosynthesis");
        assert_eq!(post.author_name(), "Ana");
        assert!(post.is_edited());
        assert_eq!(post.excerpt(), "Plants turn light into sugar.");
    }

    #[test]
    fn test_unedited_post() {
        let mut post: Post = serde_json::from_str(POST_JSON).unwrap();
        post.updated_at = post.created_at;
        post.summary = Some("Short".to_string());
        post.author = None;
        assert!(!post.is_edited());
        assert_eq!(post.excerpt(), "Short");
        assert_eq!(post.author_name(), "Unknown");
    }

    #[test]
    fn test_post_input_wire_names() {
        let json = serde_json::to_value(PostInput::new("Title", "Body text here")).unwrap();
        assert_eq!(json, serde_json::json!({"titulo": "Title", "conteudo": "Body text here"}));

        let json =
            serde_json::to_value(PostInput::new("T", "B").with_summary("S")).unwrap();
        assert_eq!(json["descricao"], "S");
    }

    #[test]
    fn test_pagination_next_page() {
        let p = Pagination {
            page: 1,
            limit: 10,
            total: 25,
            pages: 3,
        };
        assert_eq!(p.next_page(), Some(2));
        let last = Pagination { page: 3, ..p };
        assert_eq!(last.next_page(), None);
        let empty = Pagination {
            page: 1,
            pages: 0,
            total: 0,
            ..p
        };
        assert_eq!(empty.next_page(), None);
    }

    #[test]
    fn test_list_envelope_without_pagination() {
        let page: Paginated<Post> =
            serde_json::from_str(r#"{"success": true, "data": []}"#).unwrap();
        assert!(page.success);
        assert!(page.pagination.is_none());
    }

    #[test]
    fn test_sign_up_name_defaults_to_email_local_part() {
        let request = SignUpRequest::new("maria.silva@escola.br", "secret1");
        assert_eq!(request.effective_name(), "maria.silva");
        assert_eq!(request.with_name("Maria").effective_name(), "Maria");
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let rendered = format!("{:?}", SignInRequest::new("a@b.com", "hunter22"));
        assert!(!rendered.contains("hunter22"));
    }

    #[test]
    fn test_auth_response_into_session() {
        let response: AuthResponse = serde_json::from_str(
            r#"{"user":{"id":"u1","email":"a@b.com","name":"A"},"token":"tok1"}"#,
        )
        .unwrap();
        let session: Session = response.into();
        assert_eq!(session.session_token, "tok1");
        assert_eq!(session.user.id, "u1");
    }
}
