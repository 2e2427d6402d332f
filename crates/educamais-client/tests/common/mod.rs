//! Shared fixtures for client integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use educamais_client::{ApiClient, Session, User};
use educamais_store::{EncryptedFileStore, SessionStore};
use serde_json::{Value, json};
use tempfile::TempDir;
use wiremock::MockServer;

/// A mock API server plus a client whose session lives in a temp dir.
pub struct TestApi {
    pub server: MockServer,
    pub client: ApiClient,
    pub sessions: SessionStore,
    _dir: TempDir,
}

impl TestApi {
    pub async fn start() -> Result<Self> {
        let server = MockServer::start().await;
        let dir = TempDir::new()?;
        let store = EncryptedFileStore::open(dir.path())?;
        let sessions = SessionStore::new(Arc::new(store));

        let client = ApiClient::builder()
            .base_url(server.uri())
            .timeout(Duration::from_secs(5))
            .session_store(sessions.clone())
            .build()?;

        Ok(Self {
            server,
            client,
            sessions,
            _dir: dir,
        })
    }

    /// Store a session for a user with `role`.
    pub async fn sign_in_as(&self, role: &str, token: &str) -> Result<()> {
        self.sessions
            .save(&Session::new(user(role), token))
            .await?;
        Ok(())
    }

    /// Poll until the stored session is gone.
    pub async fn wait_for_purge(&self) -> bool {
        for _ in 0..50 {
            if self.sessions.get().await.is_none() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }
}

pub fn user(role: &str) -> User {
    User {
        id: "u1".to_string(),
        email: "ana@escola.br".to_string(),
        name: "Ana Souza".to_string(),
        role: Some(role.to_string()),
    }
}

pub fn auth_body(token: &str, role: &str) -> Value {
    json!({
        "user": {"id": "u1", "email": "ana@escola.br", "name": "Ana Souza", "appRole": role},
        "token": token
    })
}

pub fn post_json(id: u64, title: &str) -> Value {
    json!({
        "id": id,
        "titulo": title,
        "conteudo": format!("Body of {}", title),
        "descricao": null,
        "autorId": "u1",
        "createdAt": "2024-03-01T10:00:00.000Z",
        "atualizacao": "2024-03-01T10:00:00.000Z",
        "autor": {"name": "Ana Souza", "email": "ana@escola.br", "appRole": "teacher"}
    })
}

pub fn page_json(ids: std::ops::RangeInclusive<u64>, page: u32, limit: u32, total: u64) -> Value {
    let pages = total.div_ceil(limit as u64);
    let data: Vec<Value> = ids.map(|id| post_json(id, &format!("Post {}", id))).collect();
    json!({
        "success": true,
        "data": data,
        "pagination": {"page": page, "limit": limit, "total": total, "pages": pages}
    })
}
