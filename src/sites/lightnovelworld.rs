// src/sites/lightnovelworld.rs

//! LightNovelWorld and its mirrors (lightnovelworld.co, lnworld.com, the
//! older lightnovelcave). Heavily protected, so requests rotate IPs.

use scraper::{ElementRef, Html};

use super::generic::{ChapterLayout, extract_with_layout, heuristic_links, search_hits};
use super::text::{COMMON_SKIP, collect_links, inline_text, sel};
use super::{ExtractError, SiteAdapter, encode_query};
use crate::fetch::SiteTraits;
use crate::models::{ChapterContent, ChapterLink, SearchResult};
use crate::utils::resolve;

const SEARCH_LIMIT: usize = 5;

/// Card headings that belong to the page chrome, not to a novel.
const CHROME_HEADINGS: &[&str] = &["navigation", "actions", "settings"];

const LAYOUT: ChapterLayout<'static> = ChapterLayout {
    title: &[".chapter-title", "h1"],
    content: &["#chapter-container", ".chapter-content", "#chapter-content"],
    skip: COMMON_SKIP,
    emphasis: false,
};

fn is_junk(line: &str) -> bool {
    let lower = line.to_lowercase();
    (lower.contains("lightnovelworld") || lower.contains("lnworld")) && lower.chars().count() < 120
}

/// Nearest novel link in the card around a `h3.card-title`.
fn card_link<'a>(heading: ElementRef<'a>) -> Option<ElementRef<'a>> {
    let anchor = sel("a[href*=\"/novel/\"]")?;
    heading
        .ancestors()
        .take(5)
        .filter_map(ElementRef::wrap)
        .find_map(|scope| scope.select(&anchor).next())
}

pub struct LightNovelWorldAdapter;

impl SiteAdapter for LightNovelWorldAdapter {
    fn name(&self) -> &'static str {
        "LightNovelWorld"
    }

    fn domains(&self) -> &'static [&'static str] {
        &["lightnovelworld", "lnworld", "lightnovelcave"]
    }

    fn traits(&self) -> SiteTraits {
        SiteTraits {
            high_security: true,
            ..SiteTraits::default()
        }
    }

    fn title_selectors(&self) -> &'static [&'static str] {
        &["h1.novel-title", ".novel-title", ".novel-info h1"]
    }

    fn extract_chapter_links(&self, html: &str, url: &str) -> Vec<ChapterLink> {
        let doc = Html::parse_document(html);
        let links = collect_links(&doc, &[".chapter-list", ".chapter-item"], url, |href| {
            href.to_lowercase().contains("/chapter-")
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
            "https://www.lightnovelworld.com/search?keyword={}",
            encode_query(query)
        ))
    }

    fn extract_search_results(&self, html: &str, url: &str) -> Vec<SearchResult> {
        let doc = Html::parse_document(html);
        let mut hits: Vec<SearchResult> = Vec::new();

        if let Some(heading) = sel("h3.card-title") {
            for card in doc.select(&heading) {
                if hits.len() >= SEARCH_LIMIT {
                    break;
                }
                let title = inline_text(card);
                if title.is_empty() || CHROME_HEADINGS.contains(&title.to_lowercase().as_str()) {
                    continue;
                }
                let Some(href) = card_link(card).and_then(|a| a.value().attr("href")) else {
                    continue;
                };
                let Some(novel_url) = resolve(url, href.trim()) else {
                    continue;
                };
                if hits.iter().any(|h| h.url == novel_url) {
                    continue;
                }
                hits.push(SearchResult {
                    title,
                    url: novel_url,
                    source_site: self.name().to_string(),
                });
            }
        }

        if hits.is_empty() {
            hits = search_hits(
                &doc,
                url,
                &[".novel-item a[href*=\"/novel/\"]", ".novel-list a[href*=\"/novel/\"]"],
                self.name(),
                SEARCH_LIMIT,
                |href| !href.contains("/chapter-"),
            );
        }
        hits
    }

    fn health_url(&self) -> Option<String> {
        Some("https://www.lightnovelworld.com/".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sites::AdapterRegistry;

    #[test]
    fn test_mirror_hosts_resolve_here() {
        let registry = AdapterRegistry::with_defaults();
        for url in [
            "https://www.lightnovelworld.com/novel/shadow-slave",
            "https://lightnovelworld.co/novel/shadow-slave",
            "https://lnworld.com/novel/shadow-slave",
        ] {
            assert_eq!(registry.resolve(url).name(), "LightNovelWorld");
        }
        assert!(LightNovelWorldAdapter.traits().high_security);
    }

    #[test]
    fn test_chapter_list() {
        let html = r#"<ul class="chapter-list">
            <li><a href="/novel/shadow-slave/chapter-2">Two</a></li>
            <li><a href="/novel/shadow-slave/reviews">Reviews</a></li>
            <li><a href="/novel/shadow-slave/chapter-1">One</a></li></ul>"#;
        let links = LightNovelWorldAdapter
            .extract_chapter_links(html, "https://www.lightnovelworld.com/novel/shadow-slave");
        let urls: Vec<_> = links.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://www.lightnovelworld.com/novel/shadow-slave/chapter-2",
                "https://www.lightnovelworld.com/novel/shadow-slave/chapter-1",
            ]
        );
    }

    #[test]
    fn test_chapter_body_drops_site_stamp() {
        let html = r#"<html><body><h1>Chapter 4: Ash</h1><div id="chapter-container">
            <p>Sunny opened his eyes.</p><p>Visit lightnovelworld.com for more</p></div></body></html>"#;
        let chapter = LightNovelWorldAdapter
            .extract_chapter(html, "https://www.lightnovelworld.com/novel/shadow-slave/chapter-4")
            .unwrap();
        assert_eq!(chapter.title, "Chapter 4: Ash");
        assert_eq!(chapter.body_text, "Sunny opened his eyes.");
    }

    #[test]
    fn test_search_cards_find_link_in_parent() {
        let html = r#"<div class="card"><h3 class="card-title">Navigation</h3></div>
            <div class="card"><a href="/novel/shadow-slave"><img></a>
              <div class="body"><h3 class="card-title">Shadow Slave</h3></div></div>
            <div class="card"><div><h3 class="card-title">Orphan Card</h3></div></div>"#;
        let hits = LightNovelWorldAdapter
            .extract_search_results(html, "https://www.lightnovelworld.com/search?keyword=shadow");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Shadow Slave");
        assert_eq!(hits[0].url, "https://www.lightnovelworld.com/novel/shadow-slave");
        assert_eq!(hits[0].source_site, "LightNovelWorld");
    }
}
