// src/models/mod.rs

//! Domain models for the download engine.
//!
//! Plain data shared by the fetch layer, the site adapters, the caches and
//! the coordinator, plus the TOML configuration structures.

mod chapter;
mod config;
mod novel;
mod progress;
mod search;

// Re-export all public types
pub use chapter::{
    ChapterContent, ChapterLink, infer_chapter_number, marked_chapter_number, parse_title_number,
    sort_and_dedup_links,
};
pub use config::{BrowserConfig, CacheConfig, Config, DownloadConfig, FetchConfig};
pub use novel::{NovelMetadata, NovelResult};
pub use progress::{ChapterRange, DownloadProgress, DownloadStatus, ProgressSnapshot};
pub use search::{NovelCandidate, SearchResult, slug_key};
