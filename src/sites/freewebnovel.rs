// src/sites/freewebnovel.rs

use scraper::Html;

use super::generic::{ChapterLayout, extract_with_layout, heuristic_links, search_hits};
use super::text::{COMMON_SKIP, collect_links};
use super::{ExtractError, SiteAdapter, encode_query};
use crate::models::{ChapterContent, ChapterLink, SearchResult};

const LAYOUT: ChapterLayout<'static> = ChapterLayout {
    title: &["span.chapter", ".chapter-title", "h1", ".tit"],
    content: &[".txt", ".chapter-content", "#chapter-content"],
    skip: COMMON_SKIP,
    emphasis: false,
};

fn is_junk(line: &str) -> bool {
    let lower = line.to_lowercase();
    lower.contains("freewebnovel") && lower.chars().count() < 120
}

pub struct FreeWebNovelAdapter;

impl SiteAdapter for FreeWebNovelAdapter {
    fn name(&self) -> &'static str {
        "FreeWebNovel"
    }

    fn domains(&self) -> &'static [&'static str] {
        &["freewebnovel"]
    }

    fn title_selectors(&self) -> &'static [&'static str] {
        &["h1.tit", ".book-name", ".novel-title"]
    }

    fn extract_chapter_links(&self, html: &str, url: &str) -> Vec<ChapterLink> {
        let doc = Html::parse_document(html);
        let links = collect_links(&doc, &[".chapter-list", ".m-newest2", ".chapter-item"], url, |href| {
            href.to_lowercase().contains("chapter")
        });
        if links.is_empty() {
            heuristic_links(&doc, url)
        } else {
            links
        }
    }

    fn extract_chapter(&self, html: &str, url: &str) -> Result<ChapterContent, ExtractError> {
        extract_with_layout(&Html::parse_document(html), url, &LAYOUT, is_junk)
    }

    fn search_url(&self, query: &str) -> Option<String> {
        Some(format!(
            "https://freewebnovel.com/search?searchkey={}",
            encode_query(query)
        ))
    }

    fn extract_search_results(&self, html: &str, url: &str) -> Vec<SearchResult> {
        search_hits(
            &Html::parse_document(html),
            url,
            &[".tit a", ".book-img-text li a, .novel-item a"],
            self.name(),
            5,
            |_| true,
        )
    }

    fn health_url(&self) -> Option<String> {
        Some("https://freewebnovel.com/".to_string())
    }
}
