// src/sites/lnmtl.rs

//! LNMTL, machine-translated novels. Chapters live under `/chapter/...`
//! rather than beneath the novel page, so there is no base-path guard.

use scraper::Html;

use super::generic::{ChapterLayout, extract_with_layout, search_hits};
use super::{ExtractError, SiteAdapter, encode_query};
use crate::models::{ChapterContent, SearchResult};

const LAYOUT: ChapterLayout<'static> = ChapterLayout {
    title: &[".chapter-title", "h3.dashhead-title", "h1"],
    content: &[".chapter-body", ".translated", ".text-content"],
    skip: "script, style, .ads",
    emphasis: false,
};

pub struct LnmtlAdapter;

impl SiteAdapter for LnmtlAdapter {
    fn name(&self) -> &'static str {
        "LNMTL"
    }

    fn domains(&self) -> &'static [&'static str] {
        &["lnmtl"]
    }

    fn title_selectors(&self) -> &'static [&'static str] {
        &[".novel-name", "h1.title"]
    }

    fn extract_chapter(&self, html: &str, url: &str) -> Result<ChapterContent, ExtractError> {
        extract_with_layout(&Html::parse_document(html), url, &LAYOUT, |_| false)
    }

    fn novel_base_path(&self, _novel_url: &str) -> Option<String> {
        None
    }

    fn search_url(&self, query: &str) -> Option<String> {
        Some(format!("https://lnmtl.com/novel?q={}", encode_query(query)))
    }

    fn extract_search_results(&self, html: &str, url: &str) -> Vec<SearchResult> {
        search_hits(
            &Html::parse_document(html),
            url,
            &[".media-title a", "a[href*=\"/novel/\"]"],
            self.name(),
            5,
            |href| href.contains("/novel/"),
        )
    }

    fn health_url(&self) -> Option<String> {
        Some("https://lnmtl.com/".to_string())
    }
}
