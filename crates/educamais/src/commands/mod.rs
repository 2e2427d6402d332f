//! CLI command handlers.

pub mod auth;
pub mod config;
pub mod posts;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use educamais_client::ApiClient;
use educamais_config::{ConfigSource, EducaConfig, StorageBackend};
use educamais_query::{PostQueries, QueryConfig};
use educamais_store::{EncryptedFileStore, KeyringStore, SessionStore, SharedSecureStore};

/// Subdirectory of the data directory holding encrypted items.
const SECURE_DIR: &str = "secure";

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Merged configuration.
    pub config: EducaConfig,
    /// Config files that were checked.
    pub sources: Vec<ConfigSource>,
    /// Server URL to connect to.
    pub server_url: String,
    /// Directory for session storage and logs.
    pub data_dir: PathBuf,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// Open the configured session storage backend.
    pub fn session_store(&self) -> Result<SessionStore> {
        let backend: SharedSecureStore = match self.config.storage().backend {
            StorageBackend::Keyring if KeyringStore::is_available() => {
                Arc::new(KeyringStore::new())
            }
            StorageBackend::Keyring => {
                tracing::warn!("Keyring support not compiled in, using encrypted files");
                Arc::new(self.file_store()?)
            }
            StorageBackend::File => Arc::new(self.file_store()?),
        };
        Ok(SessionStore::new(backend))
    }

    fn file_store(&self) -> Result<EncryptedFileStore> {
        let dir = self.data_dir.join(SECURE_DIR);
        EncryptedFileStore::open(&dir)
            .with_context(|| format!("failed to open session storage at {}", dir.display()))
    }

    /// Build an API client bound to the session store.
    pub fn client(&self) -> Result<ApiClient> {
        let client = ApiClient::builder()
            .base_url(&self.server_url)
            .timeout(self.config.api().timeout())
            .session_store(self.session_store()?)
            .build()?;
        Ok(client)
    }

    /// Cached post queries over `client`.
    pub fn queries(&self, client: &ApiClient) -> PostQueries {
        PostQueries::new(client, QueryConfig::from(&self.config.cache()))
    }
}

/// Clear the stored session after a 401 before the process exits.
///
/// The client's own purge runs in a background task that does not survive
/// runtime shutdown.
pub async fn settle_session<T>(client: &ApiClient, result: Result<T>) -> Result<T> {
    if let Err(e) = &result
        && e.downcast_ref::<educamais_client::Error>()
            .is_some_and(educamais_client::Error::is_auth_error)
        && let Err(clear_err) = client.sessions().clear().await
    {
        tracing::warn!(error = %clear_err, "Failed to clear rejected session");
    }
    result
}
