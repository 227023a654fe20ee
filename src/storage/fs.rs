use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::ParishError;
use crate::storage::{BlobStore, ObjectMeta, StoredObject};

/// Filesystem-backed blob store. Each object is a file under the root
/// directory plus a `.meta` sidecar holding the content type. Writes go
/// through a temp file and rename so readers never see partial bodies.
pub struct FsBlobStore {
    root: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
struct SidecarMeta {
    content_type: String,
}

impl FsBlobStore {
    pub async fn new(root: PathBuf) -> Result<Self> {
        tokio::fs::create_dir_all(&root)
            .await
            .context("Failed to create blob store root directory")?;
        Ok(Self { root })
    }

    fn validate_key(key: &str) -> Result<()> {
        if key.is_empty() || key.starts_with('/') || key.contains('\\') {
            return Err(ParishError::Validation(format!("Invalid object key: '{}'", key)).into());
        }
        if key.split('/').any(|part| part.is_empty() || part == "..") {
            return Err(ParishError::Validation(format!("Invalid object key: '{}'", key)).into());
        }
        Ok(())
    }

    fn body_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn meta_path(&self, key: &str) -> PathBuf {
        PathBuf::from(format!("{}.meta", self.root.join(key).display()))
    }

    async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
        let tmp_path = PathBuf::from(format!("{}.tmp", path.display()));
        tokio::fs::write(&tmp_path, bytes)
            .await
            .context("Failed to write temporary object file")?;
        tokio::fs::rename(&tmp_path, path)
            .await
            .context("Failed to rename temporary object file")?;
        Ok(())
    }

    async fn remove_if_exists(path: &Path) -> Result<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).context("Failed to remove object file"),
        }
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn get(&self, key: &str) -> Result<Option<StoredObject>> {
        Self::validate_key(key)?;
        let body = match tokio::fs::read(self.body_path(key)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).context("Failed to read object file"),
        };
        let content_type = match tokio::fs::read(self.meta_path(key)).await {
            Ok(meta_bytes) => serde_json::from_slice::<SidecarMeta>(&meta_bytes)
                .map(|m| m.content_type)
                .unwrap_or_else(|_| "application/octet-stream".to_string()),
            Err(_) => "application/octet-stream".to_string(),
        };
        Ok(Some(StoredObject { body, content_type }))
    }

    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<()> {
        Self::validate_key(key)?;
        let path = self.body_path(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create object parent directory")?;
        }
        Self::write_atomic(&path, &body).await?;
        let meta = serde_json::to_vec(&SidecarMeta {
            content_type: content_type.to_string(),
        })?;
        Self::write_atomic(&self.meta_path(key), &meta).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        Self::validate_key(key)?;
        Self::remove_if_exists(&self.body_path(key)).await?;
        Self::remove_if_exists(&self.meta_path(key)).await?;
        Ok(())
    }

    async fn head(&self, key: &str) -> Result<Option<ObjectMeta>> {
        Self::validate_key(key)?;
        let stat = match tokio::fs::metadata(self.body_path(key)).await {
            Ok(stat) => stat,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).context("Failed to stat object file"),
        };
        let content_type = match tokio::fs::read(self.meta_path(key)).await {
            Ok(meta_bytes) => serde_json::from_slice::<SidecarMeta>(&meta_bytes)
                .map(|m| m.content_type)
                .unwrap_or_else(|_| "application/octet-stream".to_string()),
            Err(_) => "application/octet-stream".to_string(),
        };
        Ok(Some(ObjectMeta {
            size: stat.len(),
            content_type,
        }))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e).context("Failed to list store directory"),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                    continue;
                }
                let name = entry.file_name().to_string_lossy().to_string();
                if name.ends_with(".meta") || name.ends_with(".tmp") {
                    continue;
                }
                let relative = path
                    .strip_prefix(&self.root)
                    .map_err(|e| ParishError::Storage(e.to_string()))?;
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if key.starts_with(prefix) {
                    keys.push(key);
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}
