//! Persistent stores.
//!
//! ```text
//! {cache.root}/
//! ├── search/       # short-TTL search results
//! ├── novels/       # 24h novel metadata
//! ├── chapters/     # permanent chapter content, one directory per novel
//! └── progress/     # resumable per-user job records
//! ```

pub mod cache;
pub mod local;
pub mod progress;

pub use cache::{CacheStats, ContentRejection, NovelCache, check_chapter_body};
pub use local::{DirStats, JsonStore};
pub use progress::ProgressStore;
