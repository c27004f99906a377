//! Resumable download progress and the snapshots handed to callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a download job record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    InProgress,
    Partial,
    Failed,
    Completed,
}

impl DownloadStatus {
    /// Records in these states can seed a resumed job.
    pub fn is_resumable(self) -> bool {
        !matches!(self, Self::Completed)
    }
}

/// Requested chapter window, 1-based and inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterRange {
    pub start: u32,
    /// `None` means through the last listed chapter
    pub end: Option<u32>,
}

impl ChapterRange {
    pub fn new(start: u32, end: Option<u32>) -> Self {
        Self {
            start: start.max(1),
            end,
        }
    }

    pub fn all() -> Self {
        Self::new(1, None)
    }

    /// Number of chapters requested, if bounded.
    pub fn len(&self) -> Option<usize> {
        self.end
            .map(|end| end.saturating_sub(self.start) as usize + 1)
    }
}

impl Default for ChapterRange {
    fn default() -> Self {
        Self::all()
    }
}

/// Persisted state of one user's job on one novel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadProgress {
    pub user_id: String,
    pub novel_url: String,
    pub title: String,
    pub requested_range: ChapterRange,
    #[serde(default)]
    pub completed_chapter_urls: Vec<String>,
    #[serde(default)]
    pub failed_chapter_urls: Vec<String>,
    pub status: DownloadStatus,
    pub updated_at: DateTime<Utc>,
}

impl DownloadProgress {
    pub fn new(
        user_id: impl Into<String>,
        novel_url: impl Into<String>,
        title: impl Into<String>,
        requested_range: ChapterRange,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            novel_url: novel_url.into(),
            title: title.into(),
            requested_range,
            completed_chapter_urls: Vec::new(),
            failed_chapter_urls: Vec::new(),
            status: DownloadStatus::InProgress,
            updated_at: Utc::now(),
        }
    }
}

/// Immutable progress report passed to the caller after every unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
}

impl ProgressSnapshot {
    /// Units finished either way.
    pub fn done(&self) -> usize {
        self.completed + self.failed
    }
}
