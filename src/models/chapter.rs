//! Chapter listing entries and downloaded chapter content.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

static URL_CHAPTER_WORD: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)chapter[-_]?(\d+)").ok());
static URL_TRAILING_NUMBER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"/(\d+)(?:\.html?)?/?$").ok());
static URL_C_NUMBER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)/c(\d+)(?:[/?#.]|$)").ok());
static TITLE_NUMBER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:chapter|ch\.?)\s*(\d+)").ok());

fn first_capture(pattern: &LazyLock<Option<Regex>>, text: &str) -> Option<u32> {
    pattern
        .as_ref()?
        .captures(text)?
        .get(1)?
        .as_str()
        .parse()
        .ok()
}

/// Infer a chapter number from `chapter-NNN`, a trailing `/NNN` or `/cNNN` in a URL.
pub fn infer_chapter_number(url: &str) -> Option<u32> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    first_capture(&URL_CHAPTER_WORD, path)
        .or_else(|| first_capture(&URL_TRAILING_NUMBER, path))
        .or_else(|| first_capture(&URL_C_NUMBER, path))
}

/// Number from an explicit `chapter-NNN` or `/cNNN` marker only.
///
/// A bare trailing `/NNN` is often a database id, so it orders links but is
/// never trusted as the chapter number.
pub fn marked_chapter_number(url: &str) -> Option<u32> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    first_capture(&URL_CHAPTER_WORD, path).or_else(|| first_capture(&URL_C_NUMBER, path))
}

/// Parse "Chapter 12: ..." / "Ch. 12" style numbers out of a chapter title.
pub fn parse_title_number(title: &str) -> Option<u32> {
    first_capture(&TITLE_NUMBER, title)
}

/// One entry of a novel's chapter listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterLink {
    pub url: String,
    /// Ordering key only; `None` sorts after every numbered link
    pub inferred_number: Option<u32>,
    /// Anchor text from the listing, when the site provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl ChapterLink {
    /// Build a link and infer its number from the URL.
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        let inferred_number = infer_chapter_number(&url);
        Self {
            url,
            inferred_number,
            label: None,
        }
    }

    /// Build a link with a number supplied by the site's own data.
    pub fn numbered(url: impl Into<String>, number: u32) -> Self {
        Self {
            url: url.into(),
            inferred_number: Some(number),
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        let label = label.into();
        let label = label.trim();
        if !label.is_empty() {
            self.label = Some(label.to_string());
        }
        self
    }
}

/// Collapse duplicate URLs to their first occurrence, then order by inferred number.
///
/// The sort is stable, so unnumbered links keep their listing order at the end.
pub fn sort_and_dedup_links(links: Vec<ChapterLink>) -> Vec<ChapterLink> {
    let mut seen = HashSet::new();
    let mut unique: Vec<ChapterLink> = links
        .into_iter()
        .filter(|link| seen.insert(link.url.clone()))
        .collect();
    unique.sort_by_key(|link| (link.inferred_number.is_none(), link.inferred_number));
    unique
}

/// A downloaded chapter. Immutable once cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterContent {
    pub title: String,
    pub body_text: String,
    pub chapter_number: u32,
    pub source_url: String,
    pub cached_at: DateTime<Utc>,
}

impl ChapterContent {
    pub fn new(
        title: impl Into<String>,
        body_text: impl Into<String>,
        chapter_number: u32,
        source_url: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            body_text: body_text.into(),
            chapter_number,
            source_url: source_url.into(),
            cached_at: Utc::now(),
        }
    }

    /// Body length in characters, not bytes.
    pub fn body_chars(&self) -> usize {
        self.body_text.chars().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_chapter_number_patterns() {
        assert_eq!(
            infer_chapter_number("https://site.com/novel/foo/chapter-123"),
            Some(123)
        );
        assert_eq!(
            infer_chapter_number("https://site.com/novel/foo/chapter_7.html"),
            Some(7)
        );
        assert_eq!(infer_chapter_number("https://site.com/foo/42"), Some(42));
        assert_eq!(infer_chapter_number("https://site.com/foo/42/"), Some(42));
        assert_eq!(infer_chapter_number("https://site.com/foo/c15"), Some(15));
        assert_eq!(infer_chapter_number("https://site.com/foo/intro"), None);
        assert_eq!(marked_chapter_number("https://site.com/foo/chapter/48213"), None);
        assert_eq!(marked_chapter_number("https://site.com/foo/chapter-12"), Some(12));
        assert_eq!(marked_chapter_number("https://site.com/foo/c15"), Some(15));
    }

    #[test]
    fn test_infer_ignores_query_string() {
        assert_eq!(
            infer_chapter_number("https://site.com/novel/foo/chapter-9?page=2"),
            Some(9)
        );
    }

    #[test]
    fn test_parse_title_number() {
        assert_eq!(parse_title_number("Chapter 12: The Return"), Some(12));
        assert_eq!(parse_title_number("Ch. 3 - Start"), Some(3));
        assert_eq!(parse_title_number("Prologue"), None);
    }

    #[test]
    fn test_sort_orders_by_number() {
        let links = [5, 3, 1, 4, 2]
            .iter()
            .map(|n| ChapterLink::new(format!("https://s.com/n/chapter-{n}")))
            .collect();
        let sorted = sort_and_dedup_links(links);
        let numbers: Vec<_> = sorted.iter().filter_map(|l| l.inferred_number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let links = vec![
            ChapterLink::new("https://s.com/n/chapter-1").with_label("first"),
            ChapterLink::new("https://s.com/n/chapter-1").with_label("second"),
        ];
        let sorted = sort_and_dedup_links(links);
        assert_eq!(sorted.len(), 1);
        assert_eq!(sorted[0].label.as_deref(), Some("first"));
    }

    #[test]
    fn test_unnumbered_sort_last() {
        let links = vec![
            ChapterLink::new("https://s.com/n/afterword"),
            ChapterLink::new("https://s.com/n/chapter-2"),
            ChapterLink::new("https://s.com/n/chapter-1"),
        ];
        let sorted = sort_and_dedup_links(links);
        assert_eq!(sorted[0].inferred_number, Some(1));
        assert_eq!(sorted[2].url, "https://s.com/n/afterword");
    }
}
