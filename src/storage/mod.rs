//! Storage backend
//!
//! The server reads and writes user files only through [`StorageBackend`],
//! scoped per user: every call names the authenticated user and the backend
//! resolves names against that user's private root.

pub mod filesystem;
pub mod validation;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::StorageError;

pub use filesystem::FsStorage;
pub use validation::sanitize_filename;

pub type ReadHandle = Box<dyn AsyncRead + Send + Unpin>;
pub type WriteHandle = Box<dyn AsyncWrite + Send + Unpin>;

/// Directory entries yielded one at a time.
#[async_trait]
pub trait EntryStream: Send {
    async fn next_entry(&mut self) -> Result<Option<String>, StorageError>;
}

#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Called after a successful login.
    async fn prepare_user(&self, _user: &str) -> Result<(), StorageError> {
        Ok(())
    }

    async fn list_entries(&self, user: &str) -> Result<Box<dyn EntryStream>, StorageError>;

    /// `NotFound` if `name` does not exist in the user's root.
    async fn open_for_read(&self, user: &str, name: &str) -> Result<ReadHandle, StorageError>;

    /// Creates or truncates `name`; `CreateFailed` if that is not possible.
    async fn open_for_write(&self, user: &str, name: &str) -> Result<WriteHandle, StorageError>;
}
