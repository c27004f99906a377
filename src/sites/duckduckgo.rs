// src/sites/duckduckgo.rs

//! DuckDuckGo HTML search as a catch-all search source.
//!
//! Search only: hits point at other novel sites, so this adapter never
//! downloads anything itself. Result links are DuckDuckGo redirects carrying
//! the target in the `uddg` query parameter.

use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;
use url::Url;

use super::text::{inline_text, sel};
use super::{ExtractError, SiteAdapter, encode_query};
use crate::models::{ChapterContent, ChapterLink, SearchResult};
use crate::utils::resolve;

const SEARCH_LIMIT: usize = 15;

/// Hosts whose pages are worth offering as novel sources.
const NOVEL_SITES: &[&str] = &[
    "novelbin",
    "royalroad",
    "novelfire",
    "freewebnovel",
    "creativenovels",
    "lightnovelworld",
    "lnmtl",
    "readernovel",
    "novelbuddy",
    "lightnovelcave",
    "libread",
    "wtr-lab",
    "yonglibrary",
    "ranobes",
    "readnovelfull",
    "novellive",
    "webnovel",
    "scribblehub",
];

static TITLE_SUFFIX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\s*[-|]\s*(read|novel|online|free).*$").ok());

/// Real target of a result link, unwrapping `/l/?uddg=...` redirects.
fn target_url(page_url: &str, href: &str) -> Option<String> {
    let absolute = resolve(page_url, href.trim())?;
    let parsed = Url::parse(&absolute).ok()?;
    if !parsed.host_str().is_some_and(|h| h.contains("duckduckgo.com")) {
        return Some(absolute);
    }
    parsed
        .query_pairs()
        .find(|(key, _)| key == "uddg")
        .map(|(_, target)| target.into_owned())
}

fn clean_result_title(title: &str) -> String {
    match TITLE_SUFFIX.as_ref() {
        Some(re) => re.replace(title, "").trim().to_string(),
        None => title.trim().to_string(),
    }
}

pub struct DuckDuckGoAdapter;

impl SiteAdapter for DuckDuckGoAdapter {
    fn name(&self) -> &'static str {
        "DuckDuckGo"
    }

    fn domains(&self) -> &'static [&'static str] {
        &["duckduckgo.com"]
    }

    fn extract_chapter_links(&self, _html: &str, _url: &str) -> Vec<ChapterLink> {
        Vec::new()
    }

    fn extract_chapter(&self, _html: &str, _url: &str) -> Result<ChapterContent, ExtractError> {
        Err(ExtractError::NoContent)
    }

    fn chapter_referer(&self, _novel_url: &str) -> Option<String> {
        None
    }

    fn search_url(&self, query: &str) -> Option<String> {
        let terms = format!("{} novel read online", query.trim());
        Some(format!("https://html.duckduckgo.com/html/?q={}", encode_query(&terms)))
    }

    fn extract_search_results(&self, html: &str, url: &str) -> Vec<SearchResult> {
        let doc = Html::parse_document(html);
        let anchors: Vec<_> = [".result__a, .result-link a, a.result__url", "a[href*=\"uddg=\"]"]
            .iter()
            .filter_map(|s| sel(s))
            .map(|s| doc.select(&s).collect::<Vec<_>>())
            .find(|found| !found.is_empty())
            .unwrap_or_default();

        let mut hits: Vec<SearchResult> = Vec::new();
        for a in anchors {
            if hits.len() >= SEARCH_LIMIT {
                break;
            }
            let Some(target) = a.value().attr("href").and_then(|href| target_url(url, href)) else {
                continue;
            };
            let lower = target.to_lowercase();
            if !NOVEL_SITES.iter().any(|site| lower.contains(site)) {
                continue;
            }
            let title = clean_result_title(&inline_text(a));
            if title.is_empty() || hits.iter().any(|h| h.url == target) {
                continue;
            }
            hits.push(SearchResult {
                title,
                url: target,
                source_site: self.name().to_string(),
            });
        }
        hits
    }

    fn health_url(&self) -> Option<String> {
        Some("https://duckduckgo.com/".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "https://html.duckduckgo.com/html/?q=shadow+slave+novel+read+online";

    #[test]
    fn test_search_url_adds_novel_terms() {
        assert_eq!(
            DuckDuckGoAdapter.search_url("shadow slave").as_deref(),
            Some("https://html.duckduckgo.com/html/?q=shadow+slave+novel+read+online")
        );
    }

    #[test]
    fn test_results_unwrap_redirects_and_keep_novel_sites() {
        let html = r#"<div class="results">
            <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fnovelbin.me%2Fb%2Fshadow-slave&rut=x">Shadow Slave - Read Novel Online Free</a>
            <a class="result__a" href="https://en.wikipedia.org/wiki/Shadow_Slave">Shadow Slave - Wikipedia</a>
            <a class="result__a" href="https://www.royalroad.com/fiction/5555/shadow-slave">Shadow Slave | Royal Road</a>
            <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fnovelbin.me%2Fb%2Fshadow-slave">dup</a>
            </div>"#;
        let hits = DuckDuckGoAdapter.extract_search_results(html, PAGE);

        let urls: Vec<_> = hits.iter().map(|h| h.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://novelbin.me/b/shadow-slave",
                "https://www.royalroad.com/fiction/5555/shadow-slave",
            ]
        );
        assert_eq!(hits[0].title, "Shadow Slave");
        assert_eq!(hits[1].title, "Shadow Slave | Royal Road");
        assert!(hits.iter().all(|h| h.source_site == "DuckDuckGo"));
    }

    #[test]
    fn test_never_downloads() {
        assert_eq!(
            DuckDuckGoAdapter.extract_chapter("<p>x</p>", PAGE),
            Err(ExtractError::NoContent)
        );
        assert!(DuckDuckGoAdapter.extract_chapter_links("<a href='/chapter-1'>1</a>", PAGE).is_empty());
    }
}
