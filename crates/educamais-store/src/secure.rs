//! The encrypted key-value slot abstraction.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{Result, StoreError};

// ============================================================================
// SecureStore Trait
// ============================================================================

/// App-scoped key-value storage for secrets.
///
/// Every call goes to the backing storage; implementations must not keep
/// values in memory on behalf of callers.
#[async_trait]
pub trait SecureStore: Send + Sync + std::fmt::Debug {
    /// Write `value` under `key`, replacing any prior value.
    async fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Read the value under `key`, `None` if absent.
    async fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Delete the value under `key`. Deleting a missing key is not an error.
    async fn delete_item(&self, key: &str) -> Result<()>;
}

/// Shared secure store for use across async contexts.
pub type SharedSecureStore = Arc<dyn SecureStore>;

/// Run blocking storage work on tokio's blocking pool.
pub(crate) async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
}

// ============================================================================
// MemoryStore (for testing)
// ============================================================================

/// In-memory store for tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored items.
    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }
}

#[async_trait]
impl SecureStore for MemoryStore {
    async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.items
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.read().await.get(key).cloned())
    }

    async fn delete_item(&self, key: &str) -> Result<()> {
        self.items.write().await.remove(key);
        Ok(())
    }
}

/// Create a shared in-memory store (for testing).
pub fn create_memory_store() -> SharedSecureStore {
    Arc::new(MemoryStore::new())
}
