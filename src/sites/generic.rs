// src/sites/generic.rs

//! Fallback adapter plus the layout-driven extraction the site adapters share.

use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;

use super::text::{
    COMMON_SKIP, TextOptions, assemble_body, block_paragraphs, clean_chapter_title, collect_links,
    first_text, select_first, sel,
};
use super::{ExtractError, SiteAdapter};
use crate::models::{ChapterContent, ChapterLink, SearchResult, infer_chapter_number, parse_title_number};
use crate::utils::resolve;

static CHAPTER_HREF: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)chapter[-_]?\d+|/ch[-_]?\d+|/c\d+").ok());

const CONTENT_SELECTORS: &[&str] = &[
    "#chapter-content",
    "#chr-content",
    ".chapter-content",
    ".reading-content",
    ".chr-c",
    ".chapter__content",
    ".content-inner",
    "#content",
    "article",
];

const TITLE_SELECTORS: &[&str] = &[
    ".chapter-title",
    ".chr-title",
    ".chr-text",
    "h1",
    "h2",
    "h3",
    "title",
];

/// Where a site keeps the parts of a chapter page.
pub(crate) struct ChapterLayout<'a> {
    pub title: &'a [&'a str],
    pub content: &'a [&'a str],
    /// Subtrees removed from the content container
    pub skip: &'a str,
    pub emphasis: bool,
}

impl Default for ChapterLayout<'_> {
    fn default() -> Self {
        Self {
            title: TITLE_SELECTORS,
            content: CONTENT_SELECTORS,
            skip: COMMON_SKIP,
            emphasis: false,
        }
    }
}

/// Chapter number from the title, else from the URL, else 0 (assigned later).
pub(crate) fn number_hint(title: &str, url: &str) -> u32 {
    parse_title_number(title)
        .or_else(|| infer_chapter_number(url))
        .unwrap_or(0)
}

/// Extract title and body using `layout`, dropping paragraphs `is_junk` flags.
pub(crate) fn extract_with_layout(
    doc: &Html,
    url: &str,
    layout: &ChapterLayout<'_>,
    is_junk: impl Fn(&str) -> bool,
) -> Result<ChapterContent, ExtractError> {
    let root = select_first(doc, layout.content).ok_or(ExtractError::NoContent)?;

    let title = first_text(doc, layout.title)
        .or_else(|| first_text(doc, TITLE_SELECTORS))
        .map(|t| clean_chapter_title(&t))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| match infer_chapter_number(url) {
            Some(n) => format!("Chapter {n}"),
            None => "Untitled".to_string(),
        });

    let mut options = TextOptions::skipping(layout.skip);
    options.emphasis = layout.emphasis;
    let body = assemble_body(block_paragraphs(root, &options), &title, is_junk);
    if body.is_empty() {
        return Err(ExtractError::EmptyBody);
    }

    let number = number_hint(&title, url);
    Ok(ChapterContent::new(title, body, number, url))
}

/// Anchors that look like chapter links anywhere on the page.
pub(crate) fn heuristic_links(doc: &Html, url: &str) -> Vec<ChapterLink> {
    let numbered = collect_links(doc, &[], url, |href| {
        CHAPTER_HREF.as_ref().is_some_and(|re| re.is_match(href))
    });
    if !numbered.is_empty() {
        return numbered;
    }
    collect_links(doc, &[], url, |href| href.to_lowercase().contains("chapter"))
}

/// Search hits from anchors matching `selectors`, up to `limit`.
///
/// The anchor's `title` attribute wins over its text.
pub(crate) fn search_hits(
    doc: &Html,
    page_url: &str,
    selectors: &[&str],
    source: &str,
    limit: usize,
    keep: impl Fn(&str) -> bool,
) -> Vec<SearchResult> {
    let mut hits: Vec<SearchResult> = Vec::new();
    for s in selectors.iter().filter_map(|s| sel(s)) {
        for a in doc.select(&s) {
            if hits.len() >= limit {
                return hits;
            }
            let Some(href) = a.value().attr("href") else {
                continue;
            };
            let Some(url) = resolve(page_url, href.trim()) else {
                continue;
            };
            if !keep(&url) || hits.iter().any(|h| h.url == url) {
                continue;
            }
            let title = a
                .value()
                .attr("title")
                .map(super::text::collapse_ws)
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| super::text::inline_text(a));
            if title.chars().count() > 2 {
                hits.push(SearchResult {
                    title,
                    url,
                    source_site: source.to_string(),
                });
            }
        }
        if !hits.is_empty() {
            break;
        }
    }
    hits
}

/// Adapter for sites without a dedicated one.
pub struct GenericAdapter;

impl SiteAdapter for GenericAdapter {
    fn name(&self) -> &'static str {
        "Generic"
    }

    fn domains(&self) -> &'static [&'static str] {
        &[]
    }

    fn matches(&self, _url: &str) -> bool {
        false
    }

    fn extract_chapter(&self, html: &str, url: &str) -> Result<ChapterContent, ExtractError> {
        let doc = Html::parse_document(html);
        extract_with_layout(&doc, url, &ChapterLayout::default(), |_| false)
    }
}
