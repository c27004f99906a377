//! Local filesystem JSON record store.
//!
//! Every cache namespace sits on top of this: one JSON document per key,
//! written atomically so concurrent readers never see a torn record.

use std::path::{Path, PathBuf};

use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};

/// Entry count and size of one directory of records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct DirStats {
    pub entries: usize,
    pub bytes: u64,
}

/// JSON documents addressed by relative keys under a root directory.
#[derive(Debug, Clone)]
pub struct JsonStore {
    root_dir: PathBuf,
}

impl JsonStore {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    pub async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension(format!("{:08x}.tmp", rand::random::<u32>()));
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(AppError::Io(e));
        }
        Ok(())
    }

    pub async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if the file doesn't exist.
    pub async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.path(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    pub async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Delete one record; `false` if it was not there.
    pub async fn remove(&self, key: &str) -> Result<bool> {
        match tokio::fs::remove_file(self.path(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Delete a whole directory of records, returning how many were removed.
    pub async fn remove_dir(&self, dir: &str) -> Result<usize> {
        let count = self.list(dir).await?.len();
        match tokio::fs::remove_dir_all(self.path(dir)).await {
            Ok(()) => Ok(count),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Keys of the `.json` records directly inside `dir`.
    pub async fn list(&self, dir: &str) -> Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(self.path(dir)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AppError::Io(e)),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.ends_with(".json") && entry.file_type().await?.is_file() {
                keys.push(format!("{}/{}", dir.trim_end_matches('/'), name));
            }
        }
        keys.sort();
        Ok(keys)
    }

    /// Subdirectories directly inside `dir`.
    pub async fn list_dirs(&self, dir: &str) -> Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(self.path(dir)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AppError::Io(e)),
        };

        let mut dirs = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                dirs.push(format!(
                    "{}/{}",
                    dir.trim_end_matches('/'),
                    entry.file_name().to_string_lossy()
                ));
            }
        }
        dirs.sort();
        Ok(dirs)
    }

    /// Count and total size of all records under `dir`, recursively.
    pub async fn stats(&self, dir: &str) -> Result<DirStats> {
        let mut stats = DirStats::default();
        let mut pending = vec![dir.to_string()];
        while let Some(current) = pending.pop() {
            for key in self.list(&current).await? {
                let meta = tokio::fs::metadata(self.path(&key)).await?;
                stats.entries += 1;
                stats.bytes += meta.len();
            }
            pending.extend(self.list_dirs(&current).await?);
        }
        Ok(stats)
    }
}
