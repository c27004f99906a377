// src/sites/ranobes.rs

//! Ranobes: paged chapter index with an embedded JSON state blob.
//!
//! The chapter index lives at `/chapters/{id}/` and carries
//! `window.__DATA__ = {"count_all": N, "chapters": [...]}`. Page count is
//! `ceil(count_all / chapters_on_page_1)`; later pages sit at
//! `/chapters/{id}/page/{p}/`. Chapter ids in URLs are opaque but grow with
//! publication order.

use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;
use serde_json::Value;

use super::generic::{number_hint, search_hits};
use super::meta::generic_metadata;
use super::text::{
    TextOptions, assemble_body, block_paragraphs, collapse_ws, collect_links, first_text,
    select_first, sel,
};
use super::{ExtractError, ListingPages, SiteAdapter, encode_query};
use crate::fetch::SiteTraits;
use crate::models::{ChapterContent, ChapterLink, NovelMetadata, SearchResult};

const BASE: &str = "https://ranobes.net";

/// Upper bound on index pages, whatever the page claims.
const MAX_LISTING_PAGES: u32 = 300;

const CONTENT_SELECTORS: &[&str] = &[
    "#arrticle",
    ".story",
    "#dle-content",
    ".text.story-text",
    "[id^=\"post-message\"]",
];

const JUNK_SELECTORS: &str = "script, style, .ads, .social-buttons, .navigation, .btn-group, \
    .mechanic-buttons, #u_o, #u_b, #click_y, #bookmark, .bookmark, .footer, .bottom-menu, \
    .stats, .report, a[href*='chapter-list'], a[href*='next-chapter'], .nav-buttons, \
    .prev-next, .next-chapter, .prev-chapter, img, div[align=\"center\"]";

const NAV_LINES: &[&str] = &[
    "options",
    "bookmark",
    "chapters list",
    "next >>",
    "previous",
    "report",
    "back",
    "<< back",
    "next",
];

static NOVEL_ID: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"/novels/(\d+)").ok());
static LISTING_ID: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"/chapters/(\d+)").ok());
static CHAPTER_ID: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(\d+)\.html$").ok());
static REPORT_LINE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)^\d+\s*report$").ok());
static WATERMARKS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"ŖᴀNÕḂĒŚ",
        r"(?i)RANOBES",
        r"ᖇᗩᑎOᗷᗴᔕ",
        r"[ŖR][ᴀAa][NÑ][OÕ][BḂ][EĒ][SŚ]",
        r"R\s*A\s*N\s*O\s*B\s*E\s*S",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});
static TITLE_NOISE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [r"(?i)\s*online\s*-\s*RANOBES\.NET.*$", r"(?i)\s*-\s*Read.*$", r"(?i)\s*-\s*Ranobes.*$"]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
});

fn capture(pattern: &LazyLock<Option<Regex>>, text: &str) -> Option<String> {
    Some(pattern.as_ref()?.captures(text)?.get(1)?.as_str().to_string())
}

/// Locate `marker` in the page and parse the brace-balanced object after it.
pub(crate) fn embedded_json(html: &str, marker: &str) -> Option<Value> {
    let start = html.find(marker)?;
    let open = start + html[start..].find('{')?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in html[open..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let raw = &html[open..=open + offset];
                    return match serde_json::from_str(raw) {
                        Ok(value) => Some(value),
                        Err(e) => {
                            log::warn!("[Ranobes] Embedded JSON did not parse: {}", e);
                            None
                        }
                    };
                }
            }
            _ => {}
        }
    }
    None
}

/// `count_all` may arrive as a number or a numeric string.
fn count_all(data: &Value) -> Option<u32> {
    let value = data.get("count_all")?;
    value
        .as_u64()
        .and_then(|n| u32::try_from(n).ok())
        .or_else(|| value.as_str()?.trim().parse().ok())
}

fn data_links(data: &Value) -> Vec<ChapterLink> {
    let Some(chapters) = data.get("chapters").and_then(Value::as_array) else {
        return Vec::new();
    };
    chapters
        .iter()
        .filter_map(|c| c.get("link")?.as_str())
        .map(|link| link.split('#').next().unwrap_or(link))
        .filter(|link| !link.is_empty())
        .map(|link| {
            if link.starts_with("http") {
                link.to_string()
            } else {
                format!("{BASE}/{}", link.trim_start_matches('/'))
            }
        })
        .map(numbered_link)
        .collect()
}

fn numbered_link(url: String) -> ChapterLink {
    match capture(&CHAPTER_ID, &url).and_then(|id| id.parse().ok()) {
        Some(id) => ChapterLink::numbered(url, id),
        None => ChapterLink::new(url),
    }
}

fn clean_title(raw: &str) -> String {
    let first = raw.split(['•', '|']).next().unwrap_or(raw);
    let mut title = collapse_ws(first);
    for re in TITLE_NOISE.iter() {
        title = re.replace(&title, "").to_string();
    }
    title.trim().to_string()
}

fn strip_watermarks(paragraph: String) -> String {
    let mut text = paragraph;
    for re in WATERMARKS.iter() {
        text = re.replace_all(&text, "").to_string();
    }
    collapse_ws(&text)
}

fn is_nav_line(line: &str) -> bool {
    let lower = line.trim().to_lowercase();
    NAV_LINES.contains(&lower.as_str()) || REPORT_LINE.as_ref().is_some_and(|re| re.is_match(&lower))
}

pub struct RanobesAdapter;

impl SiteAdapter for RanobesAdapter {
    fn name(&self) -> &'static str {
        "Ranobes"
    }

    fn domains(&self) -> &'static [&'static str] {
        &["ranobes"]
    }

    fn traits(&self) -> SiteTraits {
        SiteTraits {
            high_security: true,
            challenge_wait: true,
            ..SiteTraits::default()
        }
    }

    fn extract_metadata(&self, html: &str, url: &str) -> NovelMetadata {
        let doc = Html::parse_document(html);
        let mut metadata = generic_metadata(&doc, url, &["h1.title", ".r-fullstory-s1 h1"]);
        metadata.title = clean_title(&metadata.title);
        metadata.total_chapters = embedded_json(html, "window.__DATA__")
            .as_ref()
            .and_then(count_all)
            .filter(|n| *n > 0);
        metadata
    }

    fn listing_url(&self, novel_url: &str) -> Option<String> {
        capture(&NOVEL_ID, novel_url).map(|id| format!("{BASE}/chapters/{id}/"))
    }

    fn extract_chapter_links(&self, html: &str, url: &str) -> Vec<ChapterLink> {
        if let Some(data) = embedded_json(html, "window.__DATA__") {
            let links = data_links(&data);
            if !links.is_empty() {
                return links;
            }
        }
        let doc = Html::parse_document(html);
        collect_links(
            &doc,
            &[".chapters-list", ".chapter-item", "#chapters-list"],
            url,
            |href| href.contains("/read-") || href.contains("/chapters/"),
        )
        .into_iter()
        .map(|link| {
            let label = link.label.clone();
            let numbered = numbered_link(link.url);
            match label {
                Some(label) => numbered.with_label(label),
                None => numbered,
            }
        })
        .collect()
    }

    fn listing_pages(&self, first_html: &str, listing_url: &str, found: &[ChapterLink]) -> ListingPages {
        let Some(id) = capture(&LISTING_ID, listing_url) else {
            return ListingPages::Single;
        };
        let page_url = |p: u32| format!("{BASE}/chapters/{id}/page/{p}/");

        let data = embedded_json(first_html, "window.__DATA__");
        let total = data.as_ref().and_then(count_all).unwrap_or(0);
        let max_page = if total > 0 {
            let per_page = data
                .as_ref()
                .map(|d| data_links(d).len())
                .filter(|n| *n > 0)
                .unwrap_or_else(|| found.len().max(10)) as u32;
            total.div_ceil(per_page)
        } else {
            let doc = Html::parse_document(first_html);
            sel(".pages a, .navigation a, .pagination a")
                .map(|s| {
                    doc.select(&s)
                        .filter_map(|a| a.text().collect::<String>().trim().parse::<u32>().ok())
                        .max()
                        .unwrap_or(1)
                })
                .unwrap_or(1)
        };
        if max_page > MAX_LISTING_PAGES {
            log::warn!(
                "[Ranobes] {} index pages claimed, capping at {}",
                max_page,
                MAX_LISTING_PAGES
            );
        }
        let max_page = max_page.min(MAX_LISTING_PAGES);

        log::info!("[Ranobes] {} chapters listed over {} pages", total, max_page);
        if max_page <= 1 {
            ListingPages::Single
        } else {
            ListingPages::Known((2..=max_page).map(page_url).collect())
        }
    }

    fn extract_chapter(&self, html: &str, url: &str) -> Result<ChapterContent, ExtractError> {
        let doc = Html::parse_document(html);
        let root = select_first(&doc, CONTENT_SELECTORS).ok_or(ExtractError::NoContent)?;

        let title = first_text(&doc, &["h1.title", "h1", "title"])
            .map(|t| clean_title(&t))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "Untitled".to_string());

        let options = TextOptions::skipping(JUNK_SELECTORS).with_emphasis();
        let paragraphs = block_paragraphs(root, &options)
            .into_iter()
            .map(strip_watermarks)
            .collect();
        let body = assemble_body(paragraphs, &title, is_nav_line);
        if body.is_empty() {
            return Err(ExtractError::EmptyBody);
        }
        Ok(ChapterContent::new(title.clone(), body, number_hint(&title, ""), url))
    }

    fn chapter_referer(&self, novel_url: &str) -> Option<String> {
        self.listing_url(novel_url).or_else(|| Some(novel_url.to_string()))
    }

    fn sequential_chapters(&self) -> bool {
        true
    }

    fn has_front_matter(&self) -> bool {
        true
    }

    fn chapter_ids_are_opaque(&self) -> bool {
        true
    }

    fn novel_base_path(&self, _novel_url: &str) -> Option<String> {
        None
    }

    fn search_url(&self, query: &str) -> Option<String> {
        Some(format!("{BASE}/search/{}/", encode_query(query)))
    }

    fn extract_search_results(&self, html: &str, url: &str) -> Vec<SearchResult> {
        let doc = Html::parse_document(html);
        let mut hits = search_hits(
            &doc,
            url,
            &[
                ".short-cont .short-title a, article.short .short-title a",
                ".shortstory .short-title a, .shortstory h2 a",
                "a[href*=\"/novels/\"][href$=\".html\"]",
            ],
            self.name(),
            10,
            |href| capture(&NOVEL_ID, href).is_some() && href.ends_with(".html"),
        );
        for hit in &mut hits {
            hit.title = clean_title(&hit.title);
        }
        hits
    }

    fn health_url(&self) -> Option<String> {
        Some(format!("{BASE}/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_page(count_all: &str, ids: &[u32]) -> String {
        let chapters: Vec<String> = ids
            .iter()
            .map(|id| format!(r#"{{"id":{id},"title":"Ch {{x}}","link":"https://ranobes.net/read-{id}.html#top"}}"#))
            .collect();
        format!(
            r#"<html><body><div id="dle-content"></div><script>
            window.__DATA__ = {{"count_all": {count_all}, "note": "a }} brace", "chapters": [{}]}};
            </script></body></html>"#,
            chapters.join(",")
        )
    }

    #[test]
    fn test_listing_url_from_novel_id() {
        assert_eq!(
            RanobesAdapter
                .listing_url("https://ranobes.net/novels/164915-a-monster-who-levels-up.html")
                .as_deref(),
            Some("https://ranobes.net/chapters/164915/")
        );
        assert_eq!(RanobesAdapter.listing_url("https://ranobes.net/about"), None);
    }

    #[test]
    fn test_embedded_json_links_are_numbered_by_id() {
        let html = index_page("55", &[1003, 1002, 1001]);
        let links = RanobesAdapter.extract_chapter_links(&html, "https://ranobes.net/chapters/9/");
        assert_eq!(links.len(), 3);
        assert_eq!(links[0].url, "https://ranobes.net/read-1003.html");
        assert_eq!(links[0].inferred_number, Some(1003));
    }

    #[test]
    fn test_page_math_from_count_all() {
        let html = index_page("\"25\"", &(1..=10).collect::<Vec<_>>());
        let pages = RanobesAdapter.listing_pages(&html, "https://ranobes.net/chapters/9/", &[]);
        assert_eq!(
            pages,
            ListingPages::Known(vec![
                "https://ranobes.net/chapters/9/page/2/".to_string(),
                "https://ranobes.net/chapters/9/page/3/".to_string(),
            ])
        );
    }

    #[test]
    fn test_visual_pagination_fallback() {
        let html = r#"<div class="pages"><a>1</a><a>2</a><a>4</a><a>Next</a></div>"#;
        let pages = RanobesAdapter.listing_pages(html, "https://ranobes.net/chapters/9/", &[]);
        assert_eq!(
            pages,
            ListingPages::Known(vec![
                "https://ranobes.net/chapters/9/page/2/".to_string(),
                "https://ranobes.net/chapters/9/page/3/".to_string(),
                "https://ranobes.net/chapters/9/page/4/".to_string(),
            ])
        );
    }

    #[test]
    fn test_stray_page_number_is_capped() {
        let html = r#"<div class="navigation"><a>1</a><a>2</a><a>2024</a><a>999999</a></div>"#;
        let ListingPages::Known(pages) =
            RanobesAdapter.listing_pages(html, "https://ranobes.net/chapters/9/", &[])
        else {
            panic!("expected known pages");
        };
        assert_eq!(pages.len() as u32, MAX_LISTING_PAGES - 1);
        assert_eq!(
            pages.last().map(String::as_str),
            Some("https://ranobes.net/chapters/9/page/300/")
        );
    }

    #[test]
    fn test_chapter_cleanup() {
        let html = r#"<html><body><h1 class="title">Chapter 5 • The Pact | Shadow online - RANOBES.NET</h1>
            <div id="arrticle">
              <p>The blade was <em>cold</em>.</p>
              <p>ŖᴀNÕḂĒŚ Sunny stepped forward.</p>
              <p>NEXT >></p>
              <p>12 Report</p>
              <div class="ads"><p>Buy now</p></div>
              <p>R A N O B E S</p>
            </div></body></html>"#;
        let chapter = RanobesAdapter
            .extract_chapter(html, "https://ranobes.net/read-1005.html")
            .unwrap();
        assert_eq!(chapter.title, "Chapter 5");
        assert_eq!(chapter.chapter_number, 5);
        assert_eq!(
            chapter.body_text,
            "The blade was *cold*.\n\nSunny stepped forward."
        );
    }

    #[test]
    fn test_search_results() {
        let html = r#"<div class="short-cont"><h2 class="short-title">
            <a href="/novels/77-shadow-slave.html">Shadow Slave - Ranobes</a></h2></div>"#;
        let hits = RanobesAdapter.extract_search_results(html, "https://ranobes.net/search/shadow/");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Shadow Slave");
        assert_eq!(hits[0].url, "https://ranobes.net/novels/77-shadow-slave.html");
    }

    #[test]
    fn test_quirks() {
        let adapter = RanobesAdapter;
        assert!(adapter.sequential_chapters());
        assert!(adapter.has_front_matter());
        assert!(adapter.chapter_ids_are_opaque());
        assert!(adapter.traits().high_security);
        assert_eq!(adapter.novel_base_path("https://ranobes.net/novels/1-x.html"), None);
    }
}
