// src/sites/text.rs

//! Markup-to-text helpers shared by the adapters.

use std::sync::LazyLock;

use regex::Regex;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, Result};
use crate::models::ChapterLink;
use crate::utils::resolve_url;

/// Elements that end the current paragraph.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "br", "hr", "h1", "h2", "h3", "h4", "h5", "h6", "li", "ul", "ol", "blockquote",
    "section", "article", "tr", "table", "pre",
];

/// Junk removed from every chapter body.
pub const COMMON_SKIP: &str = "script, style, noscript, iframe, img, .ads, .adsbygoogle";

static CHAPTER_TITLE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)(chapter\s*\d+.*)").ok());
static WHITESPACE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\s+").ok());

/// Parse a CSS selector, naming the selector on failure.
pub fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| AppError::selector(selector, format!("{e:?}")))
}

/// Parse a selector that is a literal in the code; invalid ones match nothing.
pub fn sel(selector: &str) -> Option<Selector> {
    match parse_selector(selector) {
        Ok(s) => Some(s),
        Err(e) => {
            log::error!("{}", e);
            None
        }
    }
}

/// Collapse runs of whitespace (including non-breaking spaces) to one space.
pub fn collapse_ws(text: &str) -> String {
    let text = text.replace('\u{a0}', " ");
    match WHITESPACE.as_ref() {
        Some(re) => re.replace_all(text.trim(), " ").to_string(),
        None => text.split_whitespace().collect::<Vec<_>>().join(" "),
    }
}

/// Flattened text of one element.
pub fn inline_text(el: ElementRef<'_>) -> String {
    collapse_ws(&el.text().collect::<String>())
}

/// First element matching any selector in the list, in list order.
pub fn select_first<'a>(doc: &'a Html, selectors: &[&str]) -> Option<ElementRef<'a>> {
    selectors
        .iter()
        .filter_map(|s| sel(s))
        .find_map(|s| doc.select(&s).next())
}

/// Non-empty text of the first matching element.
pub fn first_text(doc: &Html, selectors: &[&str]) -> Option<String> {
    selectors.iter().filter_map(|s| sel(s)).find_map(|s| {
        doc.select(&s)
            .map(inline_text)
            .find(|text| !text.is_empty())
    })
}

/// First non-empty value among `attrs` on elements matching `selectors`.
pub fn first_attr(doc: &Html, selectors: &[&str], attrs: &[&str]) -> Option<String> {
    selectors.iter().filter_map(|s| sel(s)).find_map(|s| {
        doc.select(&s).find_map(|el| {
            attrs
                .iter()
                .filter_map(|a| el.value().attr(a))
                .map(str::trim)
                .find(|v| !v.is_empty())
                .map(str::to_string)
        })
    })
}

/// Options for [`block_paragraphs`].
#[derive(Default)]
pub struct TextOptions {
    /// Subtrees dropped entirely
    pub skip: Option<Selector>,
    /// Render `<em>`/`<i>` as `*text*`
    pub emphasis: bool,
}

impl TextOptions {
    pub fn skipping(selector: &str) -> Self {
        Self {
            skip: sel(selector),
            emphasis: false,
        }
    }

    pub fn with_emphasis(mut self) -> Self {
        self.emphasis = true;
        self
    }
}

struct Collector {
    paragraphs: Vec<String>,
    current: String,
}

impl Collector {
    fn flush(&mut self) {
        let para = collapse_ws(&self.current);
        if !para.is_empty() {
            self.paragraphs.push(para);
        }
        self.current.clear();
    }
}

fn walk(el: ElementRef<'_>, opts: &TextOptions, out: &mut Collector) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => out.current.push_str(text),
            Node::Element(element) => {
                let Some(child_el) = ElementRef::wrap(child) else {
                    continue;
                };
                if opts.skip.as_ref().is_some_and(|s| s.matches(&child_el)) {
                    continue;
                }
                let name = element.name();
                let block = BLOCK_TAGS.contains(&name);
                if block {
                    out.flush();
                }
                if opts.emphasis && matches!(name, "em" | "i") {
                    let inner = inline_text(child_el);
                    if !inner.is_empty() {
                        out.current.push_str(&format!("*{inner}*"));
                    }
                } else {
                    walk(child_el, opts, out);
                }
                if block {
                    out.flush();
                }
            }
            _ => {}
        }
    }
}

/// Paragraphs of a container, split at block-level elements.
pub fn block_paragraphs(root: ElementRef<'_>, opts: &TextOptions) -> Vec<String> {
    let mut out = Collector {
        paragraphs: Vec::new(),
        current: String::new(),
    };
    walk(root, opts, &mut out);
    out.flush();
    out.paragraphs
}

/// Join paragraphs into a body, dropping a repeated title and junk lines.
pub fn assemble_body(
    paragraphs: Vec<String>,
    title: &str,
    is_junk: impl Fn(&str) -> bool,
) -> String {
    let title = title.trim().to_lowercase();
    paragraphs
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .filter(|p| title.is_empty() || p.to_lowercase() != title)
        .filter(|p| !is_junk(p))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Reduce a heading to its `Chapter N ...` part when present.
pub fn clean_chapter_title(raw: &str) -> String {
    let raw = collapse_ws(raw);
    CHAPTER_TITLE
        .as_ref()
        .and_then(|re| re.captures(&raw))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or(raw)
}

/// Anchors inside `containers` (or the whole page) whose href passes `keep`.
///
/// Hrefs are resolved against `base_url`, fragments dropped, and duplicates
/// collapsed to the first occurrence.
pub fn collect_links(
    doc: &Html,
    containers: &[&str],
    base_url: &str,
    keep: impl Fn(&str) -> bool,
) -> Vec<ChapterLink> {
    let Ok(base) = url::Url::parse(base_url) else {
        return Vec::new();
    };
    let Some(anchor) = sel("a[href]") else {
        return Vec::new();
    };

    let scopes: Vec<ElementRef<'_>> = containers
        .iter()
        .filter_map(|s| sel(s))
        .flat_map(|s| doc.select(&s).collect::<Vec<_>>())
        .collect();
    let scopes = if scopes.is_empty() && containers.is_empty() {
        vec![doc.root_element()]
    } else {
        scopes
    };

    let mut seen = std::collections::HashSet::new();
    let mut links = Vec::new();
    for scope in scopes {
        for a in scope.select(&anchor) {
            let Some(href) = a.value().attr("href") else {
                continue;
            };
            let href = href.trim();
            if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
                continue;
            }
            let full = resolve_url(&base, href);
            let full = full.split('#').next().unwrap_or(&full).to_string();
            if !keep(&full) || !seen.insert(full.clone()) {
                continue;
            }
            links.push(ChapterLink::new(full).with_label(inline_text(a)));
        }
    }
    links
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_of(html: &str, opts: &TextOptions) -> Vec<String> {
        let doc = Html::parse_document(html);
        let root = select_first(&doc, &["#c"]).unwrap();
        block_paragraphs(root, opts)
    }

    #[test]
    fn test_block_paragraphs_split_on_blocks() {
        let paras = body_of(
            "<div id=\"c\"><p>One  two</p>loose<br>after<div>Three</div></div>",
            &TextOptions::default(),
        );
        assert_eq!(paras, vec!["One two", "loose", "after", "Three"]);
    }

    #[test]
    fn test_skip_selector_drops_subtrees() {
        let paras = body_of(
            "<div id=\"c\"><p>Keep</p><div class=\"ads\"><p>Buy</p></div><script>x()</script></div>",
            &TextOptions::skipping(COMMON_SKIP),
        );
        assert_eq!(paras, vec!["Keep"]);
    }

    #[test]
    fn test_emphasis_markup() {
        let paras = body_of(
            "<div id=\"c\"><p>He said <em>never</em> again.</p></div>",
            &TextOptions::default().with_emphasis(),
        );
        assert_eq!(paras, vec!["He said *never* again."]);
    }

    #[test]
    fn test_assemble_body_drops_title_and_junk() {
        let body = assemble_body(
            vec!["Chapter 1".into(), "Text".into(), "NEXT".into()],
            "chapter 1",
            |p| p == "NEXT",
        );
        assert_eq!(body, "Text");
    }

    #[test]
    fn test_clean_chapter_title() {
        assert_eq!(
            clean_chapter_title("My Novel - Chapter 12: Return"),
            "Chapter 12: Return"
        );
        assert_eq!(clean_chapter_title("  Prologue "), "Prologue");
    }

    #[test]
    fn test_collect_links_resolves_and_dedups() {
        let doc = Html::parse_document(
            r##"<ul class="list"><li><a href="/n/chapter-1">One</a></li>
               <li><a href="/n/chapter-1#c">Again</a></li>
               <li><a href="#top">Top</a></li></ul>
               <a href="/n/chapter-9">outside</a>"##,
        );
        let links = collect_links(&doc, &[".list"], "https://s.com/n", |u| u.contains("chapter"));
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].url, "https://s.com/n/chapter-1");
        assert_eq!(links[0].inferred_number, Some(1));
        assert_eq!(links[0].label.as_deref(), Some("One"));
    }

    #[test]
    fn test_parse_selector_error() {
        assert!(parse_selector("div[").is_err());
    }
}
