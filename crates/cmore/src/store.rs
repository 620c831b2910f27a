use std::io;
use std::path::PathBuf;

use crate::error::Result;

pub(crate) const CONFIG_FILE: &str = "configuration.json";
pub(crate) const CREDENTIALS_FILE: &str = "credentials";
pub(crate) const COOKIE_FILE: &str = "cookie_file";

/// Raw document storage in the addon-provided settings directory.
///
/// The store only moves bytes; callers own the JSON decoding. Writes are
/// whole-document overwrites, last writer wins.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    dir: PathBuf,
}

impl SettingsStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Load a document, or `None` when it does not exist yet. A missing
    /// file is a normal state, not an error.
    pub async fn load(&self, name: &str) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.path(name)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn save(&self, name: &str, bytes: &[u8]) -> Result<()> {
        tokio::fs::write(self.path(name), bytes).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_document_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path());
        assert_eq!(store.load("credentials").await.unwrap(), None);
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path());
        store.save("credentials", b"{}").await.unwrap();
        assert_eq!(store.load("credentials").await.unwrap(), Some(b"{}".to_vec()));
    }
}
