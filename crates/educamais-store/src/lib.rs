//! Encrypted on-device session storage.
//!
//! This crate provides:
//! - [`SecureStore`]: an app-scoped, encrypted key-value slot
//! - [`EncryptedFileStore`]: age-encrypted files under the data directory
//! - [`KeyringStore`]: the OS keychain (with the `keyring` feature)
//! - [`SessionStore`]: save/get/clear of the single user [`Session`]
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use educamais_store::{EncryptedFileStore, SessionStore};
//!
//! let backend = Arc::new(EncryptedFileStore::open(data_dir.join("secure"))?);
//! let sessions = SessionStore::new(backend);
//! if let Some(session) = sessions.get().await {
//!     println!("signed in as {}", session.user.email);
//! }
//! ```

mod encrypted_file;
mod error;
mod keychain;
mod secure;
mod session;

pub use encrypted_file::{EncryptedFileStore, IDENTITY_FILE};
pub use error::{Result, StoreError};
pub use keychain::{KeyringStore, SERVICE_NAME};
pub use secure::{MemoryStore, SecureStore, SharedSecureStore, create_memory_store};
pub use session::{Role, SESSION_KEY, Session, SessionStore, User};
