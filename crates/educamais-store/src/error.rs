//! Error types for secure storage.

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors raised by secure storage backends.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("storage I/O error at '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// Value could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Value could not be encrypted or decrypted.
    #[error("encryption error: {0}")]
    Encryption(String),

    /// OS keychain access failed.
    #[error("keyring error: {0}")]
    Keyring(String),

    /// Background storage task panicked or was cancelled.
    #[error("storage task failed: {0}")]
    Task(String),

    /// Backend not available in this build.
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}
