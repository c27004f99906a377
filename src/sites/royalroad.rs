// src/sites/royalroad.rs

//! Royal Road. Chapter URLs carry database ids, so listing position is the
//! chapter order, and author notes are moved after the story text.

use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;

use super::generic::search_hits;
use super::text::{
    COMMON_SKIP, TextOptions, assemble_body, block_paragraphs, clean_chapter_title, collect_links,
    first_text, select_first, sel,
};
use super::{ExtractError, SiteAdapter, encode_query};
use crate::models::{ChapterContent, ChapterLink, SearchResult, parse_title_number};
use crate::utils::url_path;

static FICTION_PATH: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^/fiction/\d+").ok());

const NOTE_SELECTOR: &str = ".author-note-portlet";

pub struct RoyalRoadAdapter;

impl SiteAdapter for RoyalRoadAdapter {
    fn name(&self) -> &'static str {
        "RoyalRoad"
    }

    fn domains(&self) -> &'static [&'static str] {
        &["royalroad.com"]
    }

    fn title_selectors(&self) -> &'static [&'static str] {
        &[".fic-title h1", "h1"]
    }

    fn extract_chapter_links(&self, html: &str, url: &str) -> Vec<ChapterLink> {
        let doc = Html::parse_document(html);
        collect_links(&doc, &["#chapters tbody tr", ".chapter-row"], url, |href| {
            href.contains("/chapter/")
        })
        .into_iter()
        .enumerate()
        .map(|(i, link)| {
            let numbered = ChapterLink::numbered(link.url, i as u32 + 1);
            match link.label {
                Some(label) => numbered.with_label(label),
                None => numbered,
            }
        })
        .collect()
    }

    fn extract_chapter(&self, html: &str, url: &str) -> Result<ChapterContent, ExtractError> {
        let doc = Html::parse_document(html);
        let root = select_first(&doc, &[".chapter-content", ".chapter-inner"]).ok_or(ExtractError::NoContent)?;

        let title = first_text(&doc, &["h1", "title"])
            .map(|t| clean_chapter_title(&t))
            .unwrap_or_else(|| "Untitled".to_string());

        let skip = format!("{COMMON_SKIP}, {NOTE_SELECTOR}");
        let story = assemble_body(block_paragraphs(root, &TextOptions::skipping(&skip)), &title, |_| false);
        if story.is_empty() {
            return Err(ExtractError::EmptyBody);
        }

        let notes: Vec<String> = sel(NOTE_SELECTOR)
            .map(|s| {
                doc.select(&s)
                    .map(|note| {
                        assemble_body(block_paragraphs(note, &TextOptions::skipping(COMMON_SKIP)), "", |_| false)
                    })
                    .filter(|text| !text.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let body = if notes.is_empty() {
            story
        } else {
            format!("{story}\n\n* * *\n\n{}", notes.join("\n\n"))
        };
        let number = parse_title_number(&title).unwrap_or(0);
        Ok(ChapterContent::new(title, body, number, url))
    }

    fn chapter_ids_are_opaque(&self) -> bool {
        true
    }

    fn novel_base_path(&self, novel_url: &str) -> Option<String> {
        let path = url_path(novel_url)?.to_lowercase();
        Some(FICTION_PATH.as_ref()?.find(&path)?.as_str().to_string())
    }

    fn search_url(&self, query: &str) -> Option<String> {
        Some(format!(
            "https://www.royalroad.com/fictions/search?title={}",
            encode_query(query)
        ))
    }

    fn extract_search_results(&self, html: &str, url: &str) -> Vec<SearchResult> {
        search_hits(
            &Html::parse_document(html),
            url,
            &[".fiction-title a"],
            self.name(),
            5,
            |href| href.contains("/fiction/"),
        )
    }

    fn health_url(&self) -> Option<String> {
        Some("https://www.royalroad.com/".to_string())
    }
}
