//! File system storage
//!
//! Each user owns the directory `<root>/<username>`.

use async_trait::async_trait;
use log::{debug, info};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::StorageError;
use crate::storage::validation::sanitize_filename;
use crate::storage::{EntryStream, ReadHandle, StorageBackend, WriteHandle};

pub struct FsStorage {
    root: PathBuf,
    create_user_roots: bool,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>, create_user_roots: bool) -> Self {
        Self {
            root: root.into(),
            create_user_roots,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The private root of `user`.
    pub fn user_root(&self, user: &str) -> Result<PathBuf, StorageError> {
        Ok(self.root.join(sanitize_filename(user)?))
    }

    fn resolve(&self, user: &str, name: &str) -> Result<PathBuf, StorageError> {
        Ok(self.user_root(user)?.join(sanitize_filename(name)?))
    }
}

struct DirEntries(fs::ReadDir);

#[async_trait]
impl EntryStream for DirEntries {
    async fn next_entry(&mut self) -> Result<Option<String>, StorageError> {
        let entry = self.0.next_entry().await.map_err(StorageError::ListFailed)?;
        Ok(entry.map(|e| e.file_name().to_string_lossy().into_owned()))
    }
}

#[async_trait]
impl StorageBackend for FsStorage {
    async fn prepare_user(&self, user: &str) -> Result<(), StorageError> {
        if !self.create_user_roots {
            return Ok(());
        }
        let dir = self.user_root(user)?;
        fs::create_dir_all(&dir).await?;
        debug!("User root ready: {}", dir.display());
        Ok(())
    }

    async fn list_entries(&self, user: &str) -> Result<Box<dyn EntryStream>, StorageError> {
        let dir = self.user_root(user)?;
        let entries = fs::read_dir(&dir)
            .await
            .map_err(StorageError::ListFailed)?;
        Ok(Box::new(DirEntries(entries)))
    }

    async fn open_for_read(&self, user: &str, name: &str) -> Result<ReadHandle, StorageError> {
        let path = self.resolve(user, name)?;
        match fs::File::open(&path).await {
            Ok(file) => {
                // Directories open fine on unix but are not retrievable.
                let meta = file.metadata().await?;
                if !meta.is_file() {
                    return Err(StorageError::NotFound(name.to_string()));
                }
                Ok(Box::new(file))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(name.to_string()))
            }
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn open_for_write(&self, user: &str, name: &str) -> Result<WriteHandle, StorageError> {
        let path = self.resolve(user, name)?;
        let file = fs::File::create(&path)
            .await
            .map_err(|e| StorageError::CreateFailed(name.to_string(), e))?;
        info!("Opened {} for upload", path.display());
        Ok(Box::new(file))
    }
}
