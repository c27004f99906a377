// src/sites/meta.rs

//! Heuristic novel metadata extraction.
//!
//! Selector lists cover the layouts of the supported sites plus common
//! generic markup; adapters prepend their own selectors where needed.

use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;

use super::text::{collapse_ws, first_attr, first_text, sel};
use crate::models::{ChapterLink, NovelMetadata};
use crate::utils::resolve;

const AUTHOR_SELECTORS: &[&str] = &[
    ".author a",
    ".info a[href*=\"/author/\"]",
    ".author-name",
    "a[href*=\"/author/\"]",
    ".author-content a",
    ".fiction-info a[href*=\"/profile/\"]",
    "[itemprop=\"author\"]",
    ".author",
];

const COVER_SELECTORS: &[&str] = &[
    ".pic img",
    ".book-img img",
    ".cover img",
    ".novel-cover img",
    ".book-cover img",
    ".cover-detail img",
    ".cover-art-container img",
    ".fiction-cover img",
    "img[alt*=\"cover\"]",
    ".novel-img img",
    ".thumbnail img",
];

const TRANSLATOR_SELECTORS: &[&str] = &[
    "a[href*=\"/translator/\"]",
    ".translator a",
    "[itemprop=\"translator\"]",
];

const GENRE_SELECTORS: &[&str] = &[
    ".genres a",
    ".genre a",
    ".tags a",
    "[itemprop=\"genre\"]",
    ".novel-tags a",
];

const STATUS_SELECTORS: &[&str] = &[".status", ".novel-status", "[itemprop=\"status\"]"];

const DESCRIPTION_SELECTORS: &[&str] = &[
    ".summary",
    ".description",
    ".synopsis",
    "[itemprop=\"description\"]",
    ".book-intro",
    ".novel-description",
    ".desc-text",
];

const TITLE_SUFFIXES: &[&str] = &[
    r"(?i)\s*-\s*Free Web Novel.*$",
    r"(?i)\s*-\s*Read Free.*$",
    r"(?i)\s*-\s*Read .* Online.*$",
    r"(?i)\s*\|\s*Novel.*$",
    r"(?i)\s*-\s*Novel\s*$",
    r"(?i)\s*\|\s*Royal Road.*$",
];

static SUFFIXES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    TITLE_SUFFIXES
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
});
static AUTHOR_IN_TEXT: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"Authors?[:\s]+([A-Za-z0-9_\- ]+?)\s*(?:\n|Status|Genre|Chapter|Current)").ok()
});
static CHAPTER_COUNT_IN_TEXT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)(\d{2,})\s*(?:chapters?|ch\.)").ok());
static YEAR_IN_TEXT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)(?:year|released|published)[:\s]+((?:19|20)\d{2})").ok());

const PLACEHOLDER_WORDS: &[&str] = &["author", "authors", "n/a", "unknown", "translator"];

/// Strip site branding from a page title.
pub fn clean_novel_title(raw: &str) -> String {
    let mut title = collapse_ws(raw);
    for re in SUFFIXES.iter() {
        title = re.replace(&title, "").to_string();
    }
    title.trim().to_string()
}

fn meaningful(value: String) -> Option<String> {
    let lower = value.to_lowercase();
    (!value.is_empty() && !PLACEHOLDER_WORDS.contains(&lower.as_str())).then_some(value)
}

/// Fill every field the heuristics can find. `title` is left empty when absent.
pub fn generic_metadata(doc: &Html, url: &str, title_selectors: &[&str]) -> NovelMetadata {
    let title = first_text(doc, title_selectors)
        .or_else(|| first_text(doc, &["h1", "title"]))
        .map(|t| clean_novel_title(&t))
        .unwrap_or_default();

    let mut meta = NovelMetadata::titled(title);
    meta.author = AUTHOR_SELECTORS
        .iter()
        .find_map(|s| first_text(doc, &[s]).and_then(meaningful))
        .or_else(|| author_from_text(doc));
    meta.cover_image_url = first_attr(doc, COVER_SELECTORS, &["src", "data-src", "data-lazy-src"])
        .filter(|src| {
            let lower = src.to_lowercase();
            !lower.contains("placeholder") && !lower.contains("nocover")
        })
        .and_then(|src| resolve(url, &src));
    meta.translator = TRANSLATOR_SELECTORS
        .iter()
        .find_map(|s| first_text(doc, &[s]).and_then(meaningful));
    meta.genre = genres(doc);
    meta.status = status(doc);
    meta.description = DESCRIPTION_SELECTORS
        .iter()
        .find_map(|s| first_text(doc, &[s]).filter(|d| d.chars().count() > 50))
        .map(|d| d.chars().take(2000).collect());
    meta.language = doc
        .root_element()
        .value()
        .attr("lang")
        .map(|l| l.to_string())
        .or_else(|| Some("en".to_string()));
    meta.year = page_text(doc).and_then(|text| {
        YEAR_IN_TEXT
            .as_ref()?
            .captures(&text)?
            .get(1)?
            .as_str()
            .parse()
            .ok()
    });
    meta
}

fn page_text(doc: &Html) -> Option<String> {
    let body = sel("body")?;
    doc.select(&body)
        .next()
        .map(|b| b.text().collect::<Vec<_>>().join("\n"))
}

fn author_from_text(doc: &Html) -> Option<String> {
    let text = page_text(doc)?;
    let author = AUTHOR_IN_TEXT
        .as_ref()?
        .captures(&text)?
        .get(1)?
        .as_str()
        .trim()
        .to_string();
    (author.len() < 50).then_some(author).and_then(meaningful)
}

fn genres(doc: &Html) -> Option<String> {
    let mut genres: Vec<String> = Vec::new();
    for s in GENRE_SELECTORS.iter().filter_map(|s| sel(s)) {
        for el in doc.select(&s).take(10) {
            let g = collapse_ws(&el.text().collect::<String>());
            let lower = g.to_lowercase();
            if !g.is_empty() && g.len() < 50 && lower != "genres" && lower != "tags" && !genres.contains(&g) {
                genres.push(g);
            }
        }
    }
    (!genres.is_empty()).then(|| genres.into_iter().take(5).collect::<Vec<_>>().join(", "))
}

fn status(doc: &Html) -> Option<String> {
    STATUS_SELECTORS.iter().find_map(|s| {
        let text = first_text(doc, &[s])?.to_lowercase();
        if text.contains("ongoing") {
            Some("Ongoing".to_string())
        } else if text.contains("complet") {
            Some("Completed".to_string())
        } else {
            None
        }
    })
}

/// Highest chapter number among listing links, else an "N chapters" phrase.
pub fn estimate_total_chapters(doc: &Html, links: &[ChapterLink]) -> Option<u32> {
    links
        .iter()
        .filter_map(|l| l.inferred_number)
        .max()
        .or_else(|| {
            let text = page_text(doc)?;
            CHAPTER_COUNT_IN_TEXT
                .as_ref()?
                .captures(&text)?
                .get(1)?
                .as_str()
                .parse()
                .ok()
        })
}
