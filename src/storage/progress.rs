// src/storage/progress.rs

//! Resumable per-user download progress.
//!
//! One record per `(user_id, novel_url)` at
//! `progress/{sanitized_user}_{hash(novel_url)}.json`. Records older than the
//! configured TTL are ignored on read.

use chrono::{Duration, Utc};

use super::local::JsonStore;
use crate::error::Result;
use crate::models::{CacheConfig, DownloadProgress};
use crate::utils::hash::{key_hash, sanitize_id};

const PROGRESS_DIR: &str = "progress";

pub struct ProgressStore {
    store: JsonStore,
    ttl: Duration,
}

impl ProgressStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            store: JsonStore::new(config.root.clone()),
            ttl: Duration::seconds(config.progress_ttl_secs.min(u64::MAX >> 12) as i64),
        }
    }

    fn key(user_id: &str, novel_url: &str) -> String {
        format!(
            "{PROGRESS_DIR}/{}_{}.json",
            sanitize_id(user_id),
            key_hash(novel_url)
        )
    }

    fn is_fresh(&self, progress: &DownloadProgress) -> bool {
        Utc::now() - progress.updated_at < self.ttl
    }

    /// Persist a record, stamping `updated_at`.
    pub async fn save(&self, progress: &DownloadProgress) -> Result<()> {
        let mut record = progress.clone();
        record.updated_at = Utc::now();
        self.store
            .write_json(&Self::key(&record.user_id, &record.novel_url), &record)
            .await?;
        log::debug!(
            "Saved progress for {} on {}: {} done, {} failed ({:?})",
            record.user_id,
            record.novel_url,
            record.completed_chapter_urls.len(),
            record.failed_chapter_urls.len(),
            record.status
        );
        Ok(())
    }

    /// Exact record for a novel, or the user's most recent incomplete job.
    pub async fn get(&self, user_id: &str, novel_url: Option<&str>) -> Result<Option<DownloadProgress>> {
        match novel_url {
            Some(url) => {
                let record: Option<DownloadProgress> =
                    self.store.read_json(&Self::key(user_id, url)).await?;
                Ok(record.filter(|p| self.is_fresh(p)))
            }
            None => Ok(self
                .list_for_user(user_id)
                .await?
                .into_iter()
                .filter(|p| p.status.is_resumable())
                .max_by_key(|p| p.updated_at)),
        }
    }

    /// Every fresh record belonging to a user.
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<DownloadProgress>> {
        let prefix = format!("{PROGRESS_DIR}/{}_", sanitize_id(user_id));
        let mut records = Vec::new();
        for key in self.store.list(PROGRESS_DIR).await? {
            if !key.starts_with(&prefix) {
                continue;
            }
            match self.store.read_json::<DownloadProgress>(&key).await {
                Ok(Some(record)) if record.user_id == user_id && self.is_fresh(&record) => {
                    records.push(record)
                }
                Ok(_) => {}
                Err(e) => log::debug!("Skipping unreadable progress record {}: {}", key, e),
            }
        }
        Ok(records)
    }

    pub async fn clear(&self, user_id: &str, novel_url: &str) -> Result<bool> {
        let removed = self.store.remove(&Self::key(user_id, novel_url)).await?;
        if removed {
            log::debug!("Cleared progress for {} on {}", user_id, novel_url);
        }
        Ok(removed)
    }
}
