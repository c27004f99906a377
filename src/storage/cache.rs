// src/storage/cache.rs

//! Layered cache: search results, novel metadata and chapter content.
//!
//! ```text
//! {root}/
//! ├── search/{hash(query|source)}.json      # TTL 1h
//! ├── novels/{hash(novel_url)}.json         # TTL 24h
//! └── chapters/{hash(novel_url)}/
//!     └── {hash(chapter_url)}.json          # permanent
//! ```
//!
//! Reads are best effort: a missing, stale, corrupt or invalid record is a
//! miss, never an error.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::local::{DirStats, JsonStore};
use crate::error::Result;
use crate::fetch::body_block_signature;
use crate::models::{CacheConfig, ChapterContent, NovelMetadata, SearchResult};
use crate::utils::hash::key_hash;

const SEARCH_DIR: &str = "search";
const NOVELS_DIR: &str = "novels";
const CHAPTERS_DIR: &str = "chapters";

/// Why a chapter body cannot be trusted as content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentRejection {
    TooShort { chars: usize, min: usize },
    BlockPage(&'static str),
}

impl fmt::Display for ContentRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort { chars, min } => write!(f, "body too short ({chars} <= {min} chars)"),
            Self::BlockPage(sig) => write!(f, "block page signature '{sig}'"),
        }
    }
}

/// Accept only bodies longer than `min_chars` without a block-page marker.
pub fn check_chapter_body(text: &str, min_chars: usize) -> std::result::Result<(), ContentRejection> {
    let chars = text.trim().chars().count();
    if chars <= min_chars {
        return Err(ContentRejection::TooShort {
            chars,
            min: min_chars,
        });
    }
    if let Some(sig) = body_block_signature(text) {
        return Err(ContentRejection::BlockPage(sig));
    }
    Ok(())
}

/// Self-describing TTL record.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Record<T> {
    key: String,
    cached_at: DateTime<Utc>,
    data: T,
}

impl<T> Record<T> {
    fn new(key: impl Into<String>, data: T) -> Self {
        Self {
            key: key.into(),
            cached_at: Utc::now(),
            data,
        }
    }

    fn is_fresh(&self, ttl: Duration) -> bool {
        Utc::now() - self.cached_at < ttl
    }
}

/// Per-namespace sizes.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CacheStats {
    pub search: DirStats,
    pub novels: DirStats,
    pub chapters: DirStats,
}

pub struct NovelCache {
    store: JsonStore,
    config: CacheConfig,
}

fn secs(value: u64) -> Duration {
    Duration::seconds(value.min(u64::MAX >> 12) as i64)
}

impl NovelCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            store: JsonStore::new(config.root.clone()),
            config,
        }
    }

    pub fn store(&self) -> &JsonStore {
        &self.store
    }

    pub fn min_chapter_chars(&self) -> usize {
        self.config.min_chapter_chars
    }

    fn search_key(query: &str, source: &str) -> String {
        let logical = format!("{}|{}", query.trim().to_lowercase(), source);
        format!("{SEARCH_DIR}/{}.json", key_hash(&logical))
    }

    fn novel_key(novel_url: &str) -> String {
        format!("{NOVELS_DIR}/{}.json", key_hash(novel_url))
    }

    fn chapter_dir(novel_url: &str) -> String {
        format!("{CHAPTERS_DIR}/{}", key_hash(novel_url))
    }

    fn chapter_key(novel_url: &str, chapter_url: &str) -> String {
        format!("{}/{}.json", Self::chapter_dir(novel_url), key_hash(chapter_url))
    }

    async fn read_fresh<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
        ttl: Duration,
    ) -> Option<T> {
        match self.store.read_json::<Record<T>>(key).await {
            Ok(Some(record)) if record.is_fresh(ttl) => Some(record.data),
            Ok(_) => None,
            Err(e) => {
                log::debug!("Ignoring unreadable cache record {}: {}", key, e);
                None
            }
        }
    }

    // ---- search ----

    pub async fn get_search(&self, query: &str, source: &str) -> Option<Vec<SearchResult>> {
        let key = Self::search_key(query, source);
        let hit = self
            .read_fresh(&key, secs(self.config.search_ttl_secs))
            .await;
        if hit.is_some() {
            log::debug!("Search cache hit for '{}' on {}", query, source);
        }
        hit
    }

    pub async fn put_search(&self, query: &str, source: &str, results: &[SearchResult]) -> Result<()> {
        let key = Self::search_key(query, source);
        let record = Record::new(format!("{query}|{source}"), results);
        self.store.write_json(&key, &record).await
    }

    // ---- metadata ----

    pub async fn get_metadata(&self, novel_url: &str) -> Option<NovelMetadata> {
        self.read_fresh(
            &Self::novel_key(novel_url),
            secs(self.config.metadata_ttl_secs),
        )
        .await
    }

    pub async fn put_metadata(&self, novel_url: &str, metadata: &NovelMetadata) -> Result<()> {
        let record = Record::new(novel_url, metadata);
        self.store
            .write_json(&Self::novel_key(novel_url), &record)
            .await
    }

    // ---- chapters ----

    /// Cached chapter, provided it still passes validation.
    pub async fn get_chapter(&self, novel_url: &str, chapter_url: &str) -> Option<ChapterContent> {
        let key = Self::chapter_key(novel_url, chapter_url);
        match self.store.read_json::<ChapterContent>(&key).await {
            Ok(Some(chapter)) => {
                match check_chapter_body(&chapter.body_text, self.config.min_chapter_chars) {
                    Ok(()) => Some(chapter),
                    Err(reason) => {
                        log::warn!("Ignoring invalid cached chapter {}: {}", chapter_url, reason);
                        None
                    }
                }
            }
            Ok(None) => None,
            Err(e) => {
                log::debug!("Ignoring unreadable chapter record {}: {}", key, e);
                None
            }
        }
    }

    /// Store a chapter permanently. Returns `Ok(false)` when the body is rejected.
    pub async fn put_chapter(&self, novel_url: &str, chapter: &ChapterContent) -> Result<bool> {
        if let Err(reason) = check_chapter_body(&chapter.body_text, self.config.min_chapter_chars) {
            log::warn!("Not caching chapter {}: {}", chapter.source_url, reason);
            return Ok(false);
        }
        let key = Self::chapter_key(novel_url, &chapter.source_url);
        self.store.write_json(&key, chapter).await?;
        Ok(true)
    }

    /// Source URLs of every valid chapter cached for a novel.
    pub async fn cached_chapter_urls(&self, novel_url: &str) -> Result<HashSet<String>> {
        let mut urls = HashSet::new();
        for key in self.store.list(&Self::chapter_dir(novel_url)).await? {
            if let Ok(Some(chapter)) = self.store.read_json::<ChapterContent>(&key).await {
                if check_chapter_body(&chapter.body_text, self.config.min_chapter_chars).is_ok() {
                    urls.insert(chapter.source_url);
                }
            }
        }
        Ok(urls)
    }

    /// Remove every chapter cached under one novel.
    pub async fn clear_novel_chapters(&self, novel_url: &str) -> Result<usize> {
        let removed = self.store.remove_dir(&Self::chapter_dir(novel_url)).await?;
        log::info!("Cleared {} cached chapters for {}", removed, novel_url);
        Ok(removed)
    }

    /// Drop stale search and metadata records.
    pub async fn clear_expired(&self) -> Result<usize> {
        let mut removed = 0;
        for (dir, ttl) in [
            (SEARCH_DIR, secs(self.config.search_ttl_secs)),
            (NOVELS_DIR, secs(self.config.metadata_ttl_secs)),
        ] {
            for key in self.store.list(dir).await? {
                let stale = match self.store.read_json::<Record<serde_json::Value>>(&key).await {
                    Ok(Some(record)) => !record.is_fresh(ttl),
                    Ok(None) => false,
                    Err(_) => true,
                };
                if stale && self.store.remove(&key).await? {
                    removed += 1;
                }
            }
        }
        log::info!("Removed {} expired cache records", removed);
        Ok(removed)
    }

    pub async fn stats(&self) -> Result<CacheStats> {
        Ok(CacheStats {
            search: self.store.stats(SEARCH_DIR).await?,
            novels: self.store.stats(NOVELS_DIR).await?,
            chapters: self.store.stats(CHAPTERS_DIR).await?,
        })
    }

    #[cfg(test)]
    async fn backdate_metadata(&self, novel_url: &str, age: Duration) {
        let key = Self::novel_key(novel_url);
        if let Ok(Some(mut record)) = self.store.read_json::<Record<NovelMetadata>>(&key).await {
            record.cached_at = record.cached_at - age;
            let _ = self.store.write_json(&key, &record).await;
        }
    }
}
