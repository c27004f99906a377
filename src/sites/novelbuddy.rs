// src/sites/novelbuddy.rs

//! NovelBuddy. Novel pages also list site-wide recent updates, so links are
//! kept only when they live under the novel's own path.

use scraper::Html;

use super::generic::{ChapterLayout, extract_with_layout, search_hits};
use super::text::collect_links;
use super::{ExtractError, SiteAdapter, encode_query};
use crate::models::{ChapterContent, ChapterLink, SearchResult};
use crate::utils::url_path;

const LISTING_CONTAINERS: &[&str] = &[
    "#chapter-list",
    ".chapter-list",
    ".list-chapter",
    ".chapters",
    ".chapter__list",
    "#chapters",
    ".list-chapter-book",
    ".chapter-wrapper",
];

const LAYOUT: ChapterLayout<'static> = ChapterLayout {
    title: &["h1", ".chapter__title", ".chapter-title"],
    content: &[
        ".chapter__content",
        ".content-inner",
        ".viewer-content",
        "#chapter-content",
        ".reading-content",
        ".chapter-content",
    ],
    skip: "script, style, noscript, iframe, img, .ads, .navigation, .chapter-nav, .chapter-title, \
           .chapter__title, .player, .audio, audio, source, .tts, .text-to-speech, .voice, .video, \
           .mejs-container, .chapter-player",
    emphasis: false,
};

/// Leftover text from the embedded text-to-speech player.
fn is_player_text(line: &str) -> bool {
    let lower = line.to_lowercase();
    ["audio player", "microsoft david", "press reset"]
        .iter()
        .any(|marker| lower.contains(marker))
}

pub struct NovelBuddyAdapter;

impl SiteAdapter for NovelBuddyAdapter {
    fn name(&self) -> &'static str {
        "NovelBuddy"
    }

    fn domains(&self) -> &'static [&'static str] {
        &["novelbuddy"]
    }

    fn title_selectors(&self) -> &'static [&'static str] {
        &[".novel-title", "h1"]
    }

    fn extract_chapter_links(&self, html: &str, url: &str) -> Vec<ChapterLink> {
        let doc = Html::parse_document(html);
        let base_path = url_path(url)
            .map(|p| p.trim_end_matches('/').to_lowercase())
            .unwrap_or_default();
        let slug = self
            .novel_base_path(url)
            .and_then(|p| p.rsplit('/').next().map(str::to_string));

        let keep = |href: &str| {
            if !href.to_lowercase().contains("/chapter-") {
                return false;
            }
            let path = url_path(href).unwrap_or_default().to_lowercase();
            path.starts_with(&base_path) && slug.as_ref().is_none_or(|s| path.contains(s.as_str()))
        };

        let links = collect_links(&doc, LISTING_CONTAINERS, url, keep);
        if links.is_empty() {
            collect_links(&doc, &["body"], url, keep)
        } else {
            links
        }
    }

    fn extract_chapter(&self, html: &str, url: &str) -> Result<ChapterContent, ExtractError> {
        extract_with_layout(&Html::parse_document(html), url, &LAYOUT, is_player_text)
    }

    fn search_url(&self, query: &str) -> Option<String> {
        Some(format!("https://novelbuddy.com/search?q={}", encode_query(query)))
    }

    fn extract_search_results(&self, html: &str, url: &str) -> Vec<SearchResult> {
        search_hits(
            &Html::parse_document(html),
            url,
            &[".book-item a, .book-detailed-item a", "a[href*=\"/novel/\"]"],
            self.name(),
            5,
            |href| href.contains("/novel/") && !href.contains("/chapter-"),
        )
    }

    fn health_url(&self) -> Option<String> {
        Some("https://novelbuddy.com/".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_links_restricted_to_novel_path() {
        let html = r#"<div class="chapter-list">
            <a href="/novel/shadow-slave/chapter-2">2</a>
            <a href="/novel/shadow-slave/chapter-1">1</a>
            <a href="/novel/other-book/chapter-50">Other</a>
          </div>"#;
        let links = NovelBuddyAdapter.extract_chapter_links(html, "https://novelbuddy.com/novel/shadow-slave");
        let urls: Vec<_> = links.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://novelbuddy.com/novel/shadow-slave/chapter-2",
                "https://novelbuddy.com/novel/shadow-slave/chapter-1",
            ]
        );
    }

    #[test]
    fn test_links_fallback_without_container() {
        let html = r#"<ul><li><a href="/novel/shadow-slave/chapter-7">7</a></li>
            <li><a href="/novel/hot-pick/chapter-1">hot</a></li></ul>"#;
        let links = NovelBuddyAdapter.extract_chapter_links(html, "https://novelbuddy.com/novel/shadow-slave/");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].inferred_number, Some(7));
    }

    #[test]
    fn test_player_text_removed() {
        let html = r#"<html><body><h1>Shadow Slave Chapter 7: Dawn</h1>
            <div class="chapter__content"><div class="player">Audio player</div>
            <p>Use Microsoft David voice</p><p>The sun rose over the ruined city.</p></div></body></html>"#;
        let chapter = NovelBuddyAdapter
            .extract_chapter(html, "https://novelbuddy.com/novel/shadow-slave/chapter-7")
            .unwrap();
        assert_eq!(chapter.title, "Chapter 7: Dawn");
        assert_eq!(chapter.body_text, "The sun rose over the ruined city.");
    }
}
