//! Age-encrypted file storage.
//!
//! Each key lives in its own file under the store directory, encrypted to an
//! x25519 identity that is generated on first use and kept alongside the
//! items. Writes go through a temporary file and a rename so a reader never
//! observes a half-written value.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use age::secrecy::ExposeSecret;
use age::x25519::{Identity, Recipient};
use async_trait::async_trait;

use crate::error::{Result, StoreError};
use crate::secure::{SecureStore, blocking};

/// File holding the store's private identity.
pub const IDENTITY_FILE: &str = "store.key";

/// Extension for encrypted item files.
const ITEM_EXTENSION: &str = "age";

/// Encrypted file-backed store.
///
/// Disk and age work runs on tokio's blocking pool.
#[derive(Clone)]
pub struct EncryptedFileStore {
    inner: Arc<Inner>,
}

struct Inner {
    dir: PathBuf,
    identity: Identity,
    recipient: Recipient,
}

impl std::fmt::Debug for EncryptedFileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedFileStore")
            .field("dir", &self.inner.dir)
            .finish_non_exhaustive()
    }
}

impl EncryptedFileStore {
    /// Open (or initialise) a store rooted at `dir`.
    ///
    /// Creates the directory and the identity file if they do not exist.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| io_error(&dir, e))?;

        let identity = load_or_create_identity(&dir.join(IDENTITY_FILE))?;
        let recipient = identity.to_public();

        Ok(Self {
            inner: Arc::new(Inner {
                dir,
                identity,
                recipient,
            }),
        })
    }

    /// Path of the file backing `key`.
    pub fn item_path(&self, key: &str) -> PathBuf {
        self.inner.item_path(key)
    }
}

impl Inner {
    fn item_path(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", sanitize_key(key), ITEM_EXTENSION))
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        let ciphertext = age::encrypt(&self.recipient, value.as_bytes())
            .map_err(|e| StoreError::Encryption(e.to_string()))?;

        let path = self.item_path(key);
        let tmp = path.with_extension("tmp");
        write_private(&tmp, &ciphertext)?;
        std::fs::rename(&tmp, &path).map_err(|e| io_error(&path, e))
    }

    fn read(&self, key: &str) -> Result<Option<String>> {
        let path = self.item_path(key);
        let ciphertext = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(&path, e)),
        };

        let plaintext = age::decrypt(&self.identity, &ciphertext)
            .map_err(|e| StoreError::Encryption(e.to_string()))?;

        String::from_utf8(plaintext)
            .map(Some)
            .map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.item_path(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&path, e)),
        }
    }
}

#[async_trait]
impl SecureStore for EncryptedFileStore {
    async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let inner = self.inner.clone();
        let (owned_key, value) = (key.to_string(), value.to_string());
        blocking(move || inner.write(&owned_key, &value)).await?;

        tracing::debug!(key = %key, "Secure item written");
        Ok(())
    }

    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        let inner = self.inner.clone();
        let key = key.to_string();
        blocking(move || inner.read(&key)).await
    }

    async fn delete_item(&self, key: &str) -> Result<()> {
        let inner = self.inner.clone();
        let key = key.to_string();
        blocking(move || inner.remove(&key)).await
    }
}

fn load_or_create_identity(path: &Path) -> Result<Identity> {
    if path.exists() {
        let contents = std::fs::read_to_string(path).map_err(|e| io_error(path, e))?;
        return contents
            .trim()
            .parse::<Identity>()
            .map_err(|e| StoreError::Encryption(format!("invalid identity file: {}", e)));
    }

    let identity = Identity::generate();
    write_private(path, identity.to_string().expose_secret().as_bytes())?;
    tracing::info!("Generated new storage identity at {}", path.display());
    Ok(identity)
}

/// Write a file readable only by the current user.
fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path).map_err(|e| io_error(path, e))?;
    file.write_all(contents).map_err(|e| io_error(path, e))?;
    file.sync_all().map_err(|e| io_error(path, e))
}

/// Map a storage key onto a safe file stem.
fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_roundtrip_is_encrypted_on_disk() {
        let temp = tempdir().unwrap();
        let store = EncryptedFileStore::open(temp.path()).unwrap();

        store.set_item("educamais.session", "{\"secret\":1}").await.unwrap();

        let raw = std::fs::read(store.item_path("educamais.session")).unwrap();
        assert!(!String::from_utf8_lossy(&raw).contains("secret"));
        assert_eq!(
            store.get_item("educamais.session").await.unwrap().as_deref(),
            Some("{\"secret\":1}")
        );
    }

    #[tokio::test]
    async fn test_identity_persists_across_opens() {
        let temp = tempdir().unwrap();
        {
            let store = EncryptedFileStore::open(temp.path()).unwrap();
            store.set_item("k", "value").await.unwrap();
        }
        let reopened = EncryptedFileStore::open(temp.path()).unwrap();
        assert_eq!(reopened.get_item("k").await.unwrap().as_deref(), Some("value"));
    }

    #[tokio::test]
    async fn test_missing_item_is_none() {
        let temp = tempdir().unwrap();
        let store = EncryptedFileStore::open(temp.path()).unwrap();
        assert!(store.get_item("absent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let temp = tempdir().unwrap();
        let store = EncryptedFileStore::open(temp.path()).unwrap();
        store.set_item("k", "v").await.unwrap();

        store.delete_item("k").await.unwrap();
        store.delete_item("k").await.unwrap();

        assert!(!store.item_path("k").exists());
    }

    #[tokio::test]
    async fn test_tampered_item_is_an_error() {
        let temp = tempdir().unwrap();
        let store = EncryptedFileStore::open(temp.path()).unwrap();
        std::fs::write(store.item_path("k"), b"not age data").unwrap();

        let result = store.get_item("k").await;
        assert!(matches!(result, Err(StoreError::Encryption(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_writers_and_readers() {
        let temp = tempdir().unwrap();
        let store = EncryptedFileStore::open(temp.path()).unwrap();

        let mut tasks = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                let key = format!("item-{}", i);
                store.set_item(&key, &format!("value {}", i)).await.unwrap();
                store.get_item(&key).await.unwrap()
            }));
        }

        for (i, task) in tasks.into_iter().enumerate() {
            assert_eq!(task.await.unwrap(), Some(format!("value {}", i)));
        }
    }

    #[test]
    fn test_sanitize_key() {
        assert_eq!(sanitize_key("educamais.session"), "educamais.session");
        assert_eq!(sanitize_key("@a/b c"), "_a_b_c");
    }

    #[cfg(unix)]
    #[test]
    fn test_identity_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempdir().unwrap();
        EncryptedFileStore::open(temp.path()).unwrap();
        let mode = std::fs::metadata(temp.path().join(IDENTITY_FILE))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
