// src/sites/webnovel.rs

//! WebNovel. Member chapters only render for a logged-in browser, so every
//! fetch starts in the cookie-seeded browser context.

use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;

use super::generic::{ChapterLayout, extract_with_layout};
use super::text::{COMMON_SKIP, collect_links, select_first};
use super::{ExtractError, SiteAdapter};
use crate::fetch::{BrowserPolicy, SiteTraits};
use crate::models::{ChapterContent, ChapterLink};
use crate::utils::url_path;

static BOOK_ID: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"/book/(?:[^/]*_)?(\d+)").ok());

const LOCK_MARKERS: &[&str] = &[
    ".j_locked",
    ".cha-lock",
    ".chapter-lock",
    ".premium-content",
    ".unlock-btn",
    "[class*=\"locked\"]",
    "[class*=\"paywall\"]",
];

/// Free previews of locked chapters stop short of this.
const MIN_UNLOCKED_CHARS: usize = 500;

const LAYOUT: ChapterLayout<'static> = ChapterLayout {
    title: &[".cha-tit h3", ".chapter-title", "h1.title", ".j_chapterName"],
    content: &[".cha-words", ".chapter-content", "#chapter-content", ".j_contentWrap"],
    skip: COMMON_SKIP,
    emphasis: false,
};

pub struct WebNovelAdapter;

impl SiteAdapter for WebNovelAdapter {
    fn name(&self) -> &'static str {
        "WebNovel"
    }

    fn domains(&self) -> &'static [&'static str] {
        &["webnovel.com"]
    }

    fn traits(&self) -> SiteTraits {
        SiteTraits {
            challenge_wait: true,
            browser: BrowserPolicy::Authenticated,
            ..SiteTraits::default()
        }
    }

    fn title_selectors(&self) -> &'static [&'static str] {
        &[".det-info h1", "h1"]
    }

    fn listing_url(&self, novel_url: &str) -> Option<String> {
        let id = BOOK_ID.as_ref()?.captures(novel_url)?.get(1)?.as_str().to_string();
        Some(format!("https://www.webnovel.com/book/{id}/catalog"))
    }

    fn extract_chapter_links(&self, html: &str, url: &str) -> Vec<ChapterLink> {
        let doc = Html::parse_document(html);
        // Chapter pages are /book/<book>/<chapter>; the book page itself has one segment less.
        let is_chapter = |href: &str| {
            url_path(href).is_some_and(|p| {
                p.starts_with("/book/") && p.trim_end_matches('/').matches('/').count() >= 3
                    && !p.ends_with("/catalog")
            })
        };
        collect_links(&doc, &[".volume-item", ".content-list", ".j_catalog_list"], url, is_chapter)
            .into_iter()
            .enumerate()
            .map(|(i, link)| ChapterLink::numbered(link.url, i as u32 + 1))
            .collect()
    }

    fn extract_chapter(&self, html: &str, url: &str) -> Result<ChapterContent, ExtractError> {
        let doc = Html::parse_document(html);
        if select_first(&doc, LOCK_MARKERS).is_some() {
            return Err(ExtractError::Paywalled);
        }
        let chapter = extract_with_layout(&doc, url, &LAYOUT, |_| false)?;
        if chapter.body_chars() < MIN_UNLOCKED_CHARS {
            log::info!("[WebNovel] {} looks truncated ({} chars)", url, chapter.body_chars());
            return Err(ExtractError::Paywalled);
        }
        Ok(chapter)
    }

    fn chapter_ids_are_opaque(&self) -> bool {
        true
    }

    fn novel_base_path(&self, novel_url: &str) -> Option<String> {
        let path = url_path(novel_url)?.to_lowercase();
        let rest = path.strip_prefix("/book/")?;
        let book = rest.split('/').find(|s| !s.is_empty())?;
        Some(format!("/book/{book}"))
    }
}
