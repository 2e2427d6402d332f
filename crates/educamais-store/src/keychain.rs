//! OS keychain storage (macOS Keychain, Linux secret-service, Windows
//! Credential Manager).
//!
//! Entries are stored as service="educamais", user="<key>".

use async_trait::async_trait;

use crate::error::Result;
#[cfg(feature = "keyring")]
use crate::error::StoreError;
use crate::secure::SecureStore;
#[cfg(feature = "keyring")]
use crate::secure::blocking;

/// Keyring service name.
pub const SERVICE_NAME: &str = "educamais";

/// Keychain-backed store.
#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    /// Use a custom service name (separates installs or test runs).
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    /// Whether keychain support was compiled in.
    pub fn is_available() -> bool {
        cfg!(feature = "keyring")
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Keyring implementation (feature-gated)
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(feature = "keyring")]
#[async_trait]
impl SecureStore for KeyringStore {
    async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let (service, key, value) = (self.service.clone(), key.to_string(), value.to_string());
        blocking(move || {
            entry(&service, &key)?
                .set_password(&value)
                .map_err(|e| StoreError::Keyring(format!("failed to store in keyring: {}", e)))
        })
        .await
    }

    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        let (service, key) = (self.service.clone(), key.to_string());
        blocking(move || match entry(&service, &key)?.get_password() {
            Ok(value) if value.is_empty() => Ok(None),
            Ok(value) => Ok(Some(value)),
            Err(::keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(StoreError::Keyring(e.to_string())),
        })
        .await
    }

    async fn delete_item(&self, key: &str) -> Result<()> {
        let (service, key) = (self.service.clone(), key.to_string());
        blocking(move || match entry(&service, &key)?.delete_credential() {
            Ok(()) | Err(::keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(StoreError::Keyring(format!(
                "failed to delete from keyring: {}",
                e
            ))),
        })
        .await
    }
}

#[cfg(feature = "keyring")]
fn entry(service: &str, key: &str) -> Result<::keyring::Entry> {
    ::keyring::Entry::new(service, key).map_err(|e| StoreError::Keyring(e.to_string()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Stubs when keyring feature is disabled
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(not(feature = "keyring"))]
const NOT_COMPILED: &str = "keyring support not compiled in (enable the 'keyring' feature)";

#[cfg(not(feature = "keyring"))]
#[async_trait]
impl SecureStore for KeyringStore {
    async fn set_item(&self, _key: &str, _value: &str) -> Result<()> {
        Err(crate::error::StoreError::Unavailable(NOT_COMPILED.to_string()))
    }

    async fn get_item(&self, _key: &str) -> Result<Option<String>> {
        Err(crate::error::StoreError::Unavailable(NOT_COMPILED.to_string()))
    }

    async fn delete_item(&self, _key: &str) -> Result<()> {
        Err(crate::error::StoreError::Unavailable(NOT_COMPILED.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(feature = "keyring"))]
    #[tokio::test]
    async fn test_keyring_disabled() {
        let store = KeyringStore::new();
        assert!(!KeyringStore::is_available());
        let err = store.set_item("k", "v").await.unwrap_err();
        assert!(err.to_string().contains("not compiled"));
    }
}
