// src/sites/novelfire.rs

//! NovelFire. The chapter index is a separate `/chapters` page, paged with
//! `?page=N` and no total count, so it is walked until a page adds nothing.

use scraper::Html;

use super::generic::{ChapterLayout, extract_with_layout, search_hits};
use super::text::collect_links;
use super::{ExtractError, ListingPages, SiteAdapter, encode_query};
use crate::models::{ChapterContent, ChapterLink, SearchResult};
use crate::utils::url_path;

const MAX_LISTING_PAGES: u32 = 100;

const LAYOUT: ChapterLayout<'static> = ChapterLayout {
    title: &[".chapter-title", "h1"],
    content: &["#content", "article", ".chapter-content"],
    skip: "script, style, noscript, iframe, img, .ads, .navigation, .chapter-nav, .prev-next",
    emphasis: false,
};

pub struct NovelFireAdapter;

impl SiteAdapter for NovelFireAdapter {
    fn name(&self) -> &'static str {
        "NovelFire"
    }

    fn domains(&self) -> &'static [&'static str] {
        &["novelfire"]
    }

    fn title_selectors(&self) -> &'static [&'static str] {
        &[".novel-title", "h1.name"]
    }

    fn listing_url(&self, novel_url: &str) -> Option<String> {
        let base = novel_url.split(['?', '#']).next().unwrap_or(novel_url);
        let base = base.trim_end_matches('/');
        if base.ends_with("/chapters") {
            Some(base.to_string())
        } else {
            Some(format!("{base}/chapters"))
        }
    }

    fn extract_chapter_links(&self, html: &str, url: &str) -> Vec<ChapterLink> {
        let doc = Html::parse_document(html);
        collect_links(&doc, &[".chapter-list"], url, |href| {
            href.to_lowercase().contains("/chapter-")
        })
    }

    fn listing_pages(&self, _first_html: &str, listing_url: &str, found: &[ChapterLink]) -> ListingPages {
        if found.is_empty() {
            return ListingPages::Single;
        }
        ListingPages::UntilExhausted {
            base: listing_url.to_string(),
            first: 2,
            max_pages: MAX_LISTING_PAGES,
        }
    }

    fn extract_chapter(&self, html: &str, url: &str) -> Result<ChapterContent, ExtractError> {
        extract_with_layout(&Html::parse_document(html), url, &LAYOUT, |_| false)
    }

    fn novel_base_path(&self, novel_url: &str) -> Option<String> {
        let path = url_path(novel_url)?.to_lowercase();
        let rest = path.split("/book/").nth(1)?;
        let slug = rest.split('/').find(|s| !s.is_empty())?;
        Some(format!("/book/{slug}"))
    }

    fn search_url(&self, query: &str) -> Option<String> {
        Some(format!("https://novelfire.net/search?keyword={}", encode_query(query)))
    }

    fn extract_search_results(&self, html: &str, url: &str) -> Vec<SearchResult> {
        let mut hits = search_hits(
            &Html::parse_document(html),
            url,
            &["a[href*=\"/book/\"]"],
            self.name(),
            5,
            |href| !href.contains("/chapters") && !href.contains("/chapter-"),
        );
        for hit in &mut hits {
            if let Some(head) = hit.title.split("Rank").next() {
                hit.title = head.trim().to_string();
            }
        }
        hits.retain(|h| h.title.chars().count() > 2);
        hits
    }

    fn health_url(&self) -> Option<String> {
        Some("https://novelfire.net/".to_string())
    }
}
