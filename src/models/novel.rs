//! Novel-level metadata and the assembled download result.

use serde::{Deserialize, Serialize};

use super::ChapterContent;

/// Metadata scraped from a novel's landing page.
///
/// Every field except the title is best-effort; consumers must tolerate `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NovelMetadata {
    pub title: String,
    #[serde(default)]
    pub total_chapters: Option<u32>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub cover_image_url: Option<String>,
    #[serde(default)]
    pub translator: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub year: Option<u16>,
}

impl NovelMetadata {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Fill empty fields from another extraction of the same novel.
    pub fn merge_missing(&mut self, other: NovelMetadata) {
        if self.title.trim().is_empty() {
            self.title = other.title;
        }
        self.total_chapters = self.total_chapters.or(other.total_chapters);
        self.author = self.author.take().or(other.author);
        self.cover_image_url = self.cover_image_url.take().or(other.cover_image_url);
        self.translator = self.translator.take().or(other.translator);
        self.genre = self.genre.take().or(other.genre);
        self.status = self.status.take().or(other.status);
        self.description = self.description.take().or(other.description);
        self.language = self.language.take().or(other.language);
        self.year = self.year.or(other.year);
    }
}

/// Output of a download job, ready for rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NovelResult {
    pub title: String,
    pub novel_url: String,
    pub metadata: NovelMetadata,
    /// Ordered by chapter number, one entry per source URL
    pub chapters: Vec<ChapterContent>,
    pub failed_count: usize,
    /// Chapters listed by the site, before range selection
    pub total_available: usize,
    /// The job stopped early on request
    #[serde(default)]
    pub cancelled: bool,
}

impl NovelResult {
    pub fn is_complete(&self) -> bool {
        self.failed_count == 0 && !self.cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_missing_keeps_existing_values() {
        let mut primary = NovelMetadata {
            title: "Primary".into(),
            author: Some("A".into()),
            ..NovelMetadata::default()
        };
        primary.merge_missing(NovelMetadata {
            title: "Other".into(),
            author: Some("B".into()),
            total_chapters: Some(120),
            ..NovelMetadata::default()
        });

        assert_eq!(primary.title, "Primary");
        assert_eq!(primary.author.as_deref(), Some("A"));
        assert_eq!(primary.total_chapters, Some(120));
    }

    #[test]
    fn test_cover_may_be_absent_in_json() {
        let meta: NovelMetadata = serde_json::from_str(r#"{"title":"T"}"#).unwrap();
        assert!(meta.cover_image_url.is_none());
    }
}
