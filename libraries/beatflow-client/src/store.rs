//! Credential persistence
//!
//! A single JSON file. Writes go through a temporary sibling and a rename so
//! a crash never leaves a truncated credential behind.

use crate::credentials::Credential;
use crate::error::Result;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// JSON file holding one [`Credential`]
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored credential. A missing file is not an error.
    pub async fn load(&self) -> Result<Option<Credential>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn save(&self, credential: &Credential) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_vec_pretty(credential)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!(path = %self.path.display(), "Credential saved");
        Ok(())
    }

    /// Remove the stored credential, if any
    pub async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "Credential removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn credential() -> Credential {
        Credential {
            access_token: "BQD1".into(),
            refresh_token: Some("AQC2".into()),
            expires_at_epoch_ms: 1_700_000_000_000,
        }
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let store = FileCredentialStore::new(dir.path().join("nested").join("credential.json"));

        store.save(&credential()).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(credential()));
    }

    #[tokio::test]
    async fn test_missing_file_loads_nothing() {
        let dir = TempDir::new().unwrap();
        let store = FileCredentialStore::new(dir.path().join("credential.json"));

        assert_eq!(store.load().await.unwrap(), None);
        // Clearing nothing is fine
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_clear_removes_file() {
        let dir = TempDir::new().unwrap();
        let store = FileCredentialStore::new(dir.path().join("credential.json"));

        store.save(&credential()).await.unwrap();
        store.clear().await.unwrap();
        assert!(!store.path().exists());
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("credential.json");
        std::fs::write(&path, b"{not json").unwrap();

        let store = FileCredentialStore::new(path);
        assert!(store.load().await.is_err());
    }
}
