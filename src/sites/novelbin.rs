// src/sites/novelbin.rs

//! NovelBin and its mirror family (novelbin.me, .com, .cfd, ...).

use scraper::Html;

use super::generic::{ChapterLayout, extract_with_layout, heuristic_links, search_hits};
use super::text::{COMMON_SKIP, collect_links};
use super::{ExtractError, SiteAdapter, encode_query};
use crate::fetch::SiteTraits;
use crate::models::{ChapterContent, ChapterLink, SearchResult};
use crate::utils::{origin, url_path};

const LISTING_CONTAINERS: &[&str] = &["#chapter-list", ".chapter-list", ".list-chapter", "#list-chapter"];

const LAYOUT: ChapterLayout<'static> = ChapterLayout {
    title: &[".chr-title", ".chr-text", "h2 a.chr-title", ".chapter-title"],
    content: &["#chr-content", "#chapter-content", ".chr-c"],
    skip: COMMON_SKIP,
    emphasis: false,
};

fn is_junk(line: &str) -> bool {
    let lower = line.to_lowercase();
    (lower.contains("novelbin") && lower.chars().count() < 120)
        || lower.starts_with("if you find any errors")
}

pub struct NovelBinAdapter;

impl SiteAdapter for NovelBinAdapter {
    fn name(&self) -> &'static str {
        "NovelBin"
    }

    fn domains(&self) -> &'static [&'static str] {
        &["novelbin"]
    }

    fn traits(&self) -> SiteTraits {
        SiteTraits {
            high_security: true,
            ..SiteTraits::default()
        }
    }

    fn title_selectors(&self) -> &'static [&'static str] {
        &["h3.title", ".books .title", "h1"]
    }

    fn extract_chapter_links(&self, html: &str, url: &str) -> Vec<ChapterLink> {
        let doc = Html::parse_document(html);
        let keep = |href: &str| {
            let lower = href.to_lowercase();
            lower.contains("chapter") || lower.contains("/c")
        };
        let links = collect_links(&doc, LISTING_CONTAINERS, url, keep);
        if links.is_empty() {
            heuristic_links(&doc, url)
        } else {
            links
        }
    }

    fn extract_chapter(&self, html: &str, url: &str) -> Result<ChapterContent, ExtractError> {
        extract_with_layout(&Html::parse_document(html), url, &LAYOUT, is_junk)
    }

    /// Chapter pages expect the `/novel-book/<slug>` page as referer.
    fn chapter_referer(&self, novel_url: &str) -> Option<String> {
        let host = origin(novel_url)?;
        let path = url_path(novel_url)?;
        let slug = path.trim_end_matches('/').rsplit('/').next()?;
        Some(format!("{host}/novel-book/{slug}"))
    }

    fn novel_base_path(&self, novel_url: &str) -> Option<String> {
        let path = url_path(novel_url)?.to_lowercase();
        let path = path.trim_end_matches('/');
        (path.matches('/').count() >= 2).then(|| path.to_string())
    }

    fn search_url(&self, query: &str) -> Option<String> {
        Some(format!("https://novelbin.me/search?keyword={}", encode_query(query)))
    }

    fn extract_search_results(&self, html: &str, url: &str) -> Vec<SearchResult> {
        search_hits(
            &Html::parse_document(html),
            url,
            &[
                "h3.novel-title a",
                ".novel-title a",
                ".list-novel a[href*=\"/novel-book/\"]",
                "a[href*=\"/novel-book/\"], a[href*=\"/b/\"]",
            ],
            self.name(),
            5,
            |href| href.contains("/novel-book/") || href.contains("/novel/") || href.contains("/b/"),
        )
    }

    fn health_url(&self) -> Option<String> {
        Some("https://novelbin.me/".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_containers() {
        let html = r#"<div id="list-chapter"><ul>
            <li><a href="/novel-book/shadow/chapter-1-awakening">Chapter 1</a></li>
            <li><a href="/novel-book/shadow/chapter-2">Chapter 2</a></li></ul></div>
            <div class="sidebar"><a href="/novel-book/other/chapter-99">Hot</a></div>"#;
        let links = NovelBinAdapter.extract_chapter_links(html, "https://novelbin.me/novel-book/shadow");
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].inferred_number, Some(1));
        assert_eq!(links[1].url, "https://novelbin.me/novel-book/shadow/chapter-2");
    }

    #[test]
    fn test_chapter_extraction_drops_site_lines() {
        let html = r#"<html><body><a class="chr-title" title="Chapter 2">Chapter 2: Ash</a>
            <div id="chr-content"><p>First line of the chapter.</p>
            <p>Read latest chapters at novelbin.me</p><script>ads()</script>
            <p>Second line.</p></div></body></html>"#;
        let chapter = NovelBinAdapter
            .extract_chapter(html, "https://novelbin.me/novel-book/shadow/chapter-2")
            .unwrap();
        assert_eq!(chapter.title, "Chapter 2: Ash");
        assert_eq!(chapter.body_text, "First line of the chapter.\n\nSecond line.");
    }

    #[test]
    fn test_referer_and_base_path() {
        let adapter = NovelBinAdapter;
        assert_eq!(
            adapter.chapter_referer("https://novelbin.com/b/shadow-slave").as_deref(),
            Some("https://novelbin.com/novel-book/shadow-slave")
        );
        assert_eq!(
            adapter.novel_base_path("https://novelbin.me/novel-book/Shadow-Slave/").as_deref(),
            Some("/novel-book/shadow-slave")
        );
        assert!(adapter.traits().high_security);
    }

    #[test]
    fn test_search_results() {
        let html = r#"<div class="list-novel"><h3 class="novel-title">
            <a href="https://novelbin.me/novel-book/shadow-slave" title="Shadow Slave">Shadow Slave</a></h3></div>"#;
        let hits = NovelBinAdapter.extract_search_results(html, "https://novelbin.me/search?keyword=shadow");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source_site, "NovelBin");
    }
}
