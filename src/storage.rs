//! Disk-backed object store. One directory per bucket, flat keys inside.

use crate::error::{CoreError, CoreResult};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ObjectStore {
    root: PathBuf,
}

impl ObjectStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Writes `bytes` under `bucket/key`, creating the bucket directory on
    /// first use. Keys are generated server-side; anything resembling a path
    /// traversal is rejected outright.
    pub async fn upload(&self, bucket: &str, key: &str, bytes: &[u8]) -> CoreResult<()> {
        let path = self.path_for(bucket, key)?;
        let parent = path
            .parent()
            .ok_or_else(|| CoreError::internal("object path missing parent"))?;
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|err| CoreError::unavailable(format!("failed to create bucket dir: {err}")))?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|err| CoreError::unavailable(format!("failed to write object: {err}")))?;
        Ok(())
    }

    /// Public URL the HTTP layer serves the object back under.
    pub fn public_url(&self, bucket: &str, key: &str) -> String {
        format!("/media/{bucket}/{key}")
    }

    pub fn path_for(&self, bucket: &str, key: &str) -> CoreResult<PathBuf> {
        for part in [bucket, key] {
            if part.is_empty() || part.contains("..") || part.contains('/') || part.contains('\\')
            {
                return Err(CoreError::validation(format!(
                    "invalid object path component: {part:?}"
                )));
            }
        }
        Ok(self.root.join(bucket).join(key))
    }
}
