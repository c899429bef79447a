use std::path::PathBuf;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use crate::ports::{BlobStorage, PortError, PortResult};

/// One JSON file per key under a base directory. Keys are percent-encoded
/// into file names, so distinct keys never share a file.
pub struct FileBlobStorage {
    dir: PathBuf,
}

impl FileBlobStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .bytes()
            .map(|b| match b {
                b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' => (b as char).to_string(),
                other => format!("%{other:02X}"),
            })
            .collect();
        self.dir.join(format!("{file_name}.json"))
    }
}

#[async_trait]
impl BlobStorage for FileBlobStorage {
    async fn load(&self, key: &str) -> PortResult<Option<String>> {
        let path = self.path_for(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(blob) => Ok(Some(blob)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(PortError::Storage(format!(
                "failed to read {}: {err}",
                path.display()
            ))),
        }
    }

    async fn save(&self, key: &str, blob: &str) -> PortResult<()> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|err| {
            PortError::Storage(format!("failed to create {}: {err}", self.dir.display()))
        })?;

        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, blob)
            .await
            .map_err(|err| PortError::Storage(format!("failed to write {}: {err}", tmp.display())))?;
        tokio::fs::rename(&tmp, &path).await.map_err(|err| {
            PortError::Storage(format!("failed to replace {}: {err}", path.display()))
        })?;

        debug!(key, bytes = blob.len(), "blob saved");
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryBlobStorage {
    blobs: DashMap<String, String>,
}

impl MemoryBlobStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.blobs.get(key).map(|entry| entry.value().clone())
    }

    pub fn insert(&self, key: &str, blob: &str) {
        self.blobs.insert(key.to_string(), blob.to_string());
    }
}

#[async_trait]
impl BlobStorage for MemoryBlobStorage {
    async fn load(&self, key: &str) -> PortResult<Option<String>> {
        Ok(self.get(key))
    }

    async fn save(&self, key: &str, blob: &str) -> PortResult<()> {
        self.insert(key, blob);
        Ok(())
    }
}
