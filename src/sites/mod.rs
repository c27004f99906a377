// src/sites/mod.rs

//! Per-site extraction behind one trait.
//!
//! Each adapter turns raw markup into metadata, chapter links and chapter
//! bodies, and declares the quirks the fetch layer and the coordinator
//! need to know about (security level, paging, sequential downloads).
//! URLs that match no adapter go to [`GenericAdapter`].

mod duckduckgo;
mod freewebnovel;
mod generic;
mod lightnovelworld;
mod lnmtl;
pub mod meta;
mod novelbin;
mod novelbuddy;
mod novelfire;
mod ranobes;
mod royalroad;
pub mod text;
mod webnovel;

use std::sync::Arc;

use scraper::Html;
use thiserror::Error;

use crate::fetch::SiteTraits;
use crate::models::{ChapterContent, ChapterLink, NovelMetadata, SearchResult};
use crate::utils::{get_domain, url_path};

pub use duckduckgo::DuckDuckGoAdapter;
pub use freewebnovel::FreeWebNovelAdapter;
pub use generic::GenericAdapter;
pub use lightnovelworld::LightNovelWorldAdapter;
pub use lnmtl::LnmtlAdapter;
pub use novelbin::NovelBinAdapter;
pub use novelbuddy::NovelBuddyAdapter;
pub use novelfire::NovelFireAdapter;
pub use ranobes::RanobesAdapter;
pub use royalroad::RoyalRoadAdapter;
pub use webnovel::WebNovelAdapter;

/// Why a fetched chapter page yielded no usable chapter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("no chapter content container found")]
    NoContent,

    #[error("chapter body is empty after cleanup")]
    EmptyBody,

    #[error("chapter is locked behind a paywall")]
    Paywalled,
}

/// Extra listing pages beyond the first one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingPages {
    /// The first page holds every link
    Single,
    /// Exact page URLs, computed from counts embedded in the first page
    Known(Vec<String>),
    /// `base?page=N` from `first` upward until a page adds no new links
    UntilExhausted {
        base: String,
        first: u32,
        max_pages: u32,
    },
}

impl ListingPages {
    /// URL of page `n` for the `UntilExhausted` form.
    pub fn page_url(base: &str, n: u32) -> String {
        let sep = if base.contains('?') { '&' } else { '?' };
        format!("{base}{sep}page={n}")
    }
}

/// Search-query encoding shared by the adapters' search URLs.
pub(crate) fn encode_query(query: &str) -> String {
    url::form_urlencoded::byte_serialize(query.trim().as_bytes()).collect()
}

/// Extraction strategy for one family of sites.
///
/// Only the name, the domains and chapter extraction are required; every
/// other method has a heuristic default that suits most novel sites.
pub trait SiteAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Domain fragments this adapter claims, matched as substrings of the host.
    fn domains(&self) -> &'static [&'static str];

    fn matches(&self, url: &str) -> bool {
        let Some(host) = get_domain(url) else {
            return false;
        };
        self.domains().iter().any(|d| {
            host == *d || host.ends_with(&format!(".{d}")) || (!d.contains('.') && host.contains(d))
        })
    }

    fn traits(&self) -> SiteTraits {
        SiteTraits::default()
    }

    /// Selectors tried first for the novel title.
    fn title_selectors(&self) -> &'static [&'static str] {
        &[]
    }

    fn extract_metadata(&self, html: &str, url: &str) -> NovelMetadata {
        let doc = Html::parse_document(html);
        let mut metadata = meta::generic_metadata(&doc, url, self.title_selectors());
        let links = self.extract_chapter_links(html, url);
        metadata.total_chapters = meta::estimate_total_chapters(&doc, &links);
        metadata
    }

    /// Page holding the chapter list when it is not the novel page itself.
    fn listing_url(&self, _novel_url: &str) -> Option<String> {
        None
    }

    fn extract_chapter_links(&self, html: &str, url: &str) -> Vec<ChapterLink> {
        generic::heuristic_links(&Html::parse_document(html), url)
    }

    /// Further listing pages, decided from the first one.
    fn listing_pages(&self, _first_html: &str, _listing_url: &str, _found: &[ChapterLink]) -> ListingPages {
        ListingPages::Single
    }

    fn extract_chapter(&self, html: &str, url: &str) -> Result<ChapterContent, ExtractError>;

    /// `Referer` sent with chapter requests.
    fn chapter_referer(&self, novel_url: &str) -> Option<String> {
        Some(novel_url.to_string())
    }

    /// Download chapters one at a time with the longer delay.
    fn sequential_chapters(&self) -> bool {
        false
    }

    /// The first listed link is a prologue or introduction, not chapter 1.
    fn has_front_matter(&self) -> bool {
        false
    }

    /// Chapter URLs carry ids that are not chapter numbers.
    fn chapter_ids_are_opaque(&self) -> bool {
        false
    }

    /// Path prefix every chapter of this novel must live under.
    fn novel_base_path(&self, novel_url: &str) -> Option<String> {
        let path = url_path(novel_url)?.to_lowercase();
        let rest = path.split("/novel/").nth(1)?;
        let slug = rest.split('/').find(|s| !s.is_empty())?;
        Some(format!("/novel/{slug}"))
    }

    fn search_url(&self, _query: &str) -> Option<String> {
        None
    }

    fn extract_search_results(&self, _html: &str, _url: &str) -> Vec<SearchResult> {
        Vec::new()
    }

    /// Page probed before searching this site.
    fn health_url(&self) -> Option<String> {
        None
    }
}

/// Domain-keyed adapter table with a generic fallback.
pub struct AdapterRegistry {
    adapters: Vec<Arc<dyn SiteAdapter>>,
    fallback: Arc<dyn SiteAdapter>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            adapters: Vec::new(),
            fallback: Arc::new(GenericAdapter),
        }
    }

    /// Registry holding every built-in adapter.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        // FreeWebNovel before WebNovel: the host "freewebnovel.com" contains "webnovel.com".
        registry.register(Arc::new(FreeWebNovelAdapter));
        registry.register(Arc::new(WebNovelAdapter));
        registry.register(Arc::new(RanobesAdapter));
        registry.register(Arc::new(NovelBinAdapter));
        registry.register(Arc::new(NovelBuddyAdapter));
        registry.register(Arc::new(NovelFireAdapter));
        registry.register(Arc::new(RoyalRoadAdapter));
        registry.register(Arc::new(LightNovelWorldAdapter));
        registry.register(Arc::new(LnmtlAdapter));
        // Search-only; its hits point at the sites above.
        registry.register(Arc::new(DuckDuckGoAdapter));
        registry
    }

    pub fn register(&mut self, adapter: Arc<dyn SiteAdapter>) {
        self.adapters.push(adapter);
    }

    /// Adapter for `url`; the generic one when no domain matches.
    pub fn resolve(&self, url: &str) -> Arc<dyn SiteAdapter> {
        self.adapters
            .iter()
            .find(|a| a.matches(url))
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }

    /// Adapters that can run a search.
    pub fn searchable(&self) -> Vec<Arc<dyn SiteAdapter>> {
        self.adapters
            .iter()
            .filter(|a| a.search_url("probe").is_some())
            .cloned()
            .collect()
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_by_domain() {
        let registry = AdapterRegistry::with_defaults();
        assert_eq!(registry.resolve("https://ranobes.net/novels/1-x.html").name(), "Ranobes");
        assert_eq!(registry.resolve("https://novelbin.me/b/x").name(), "NovelBin");
        assert_eq!(registry.resolve("https://novelbin.com/b/x").name(), "NovelBin");
        assert_eq!(registry.resolve("https://www.royalroad.com/fiction/1/x").name(), "RoyalRoad");
        assert_eq!(registry.resolve("https://lnmtl.com/novel/x").name(), "LNMTL");
        assert_eq!(
            registry.resolve("https://www.lightnovelworld.com/novel/x").name(),
            "LightNovelWorld"
        );
        assert_eq!(registry.resolve("https://unknown.org/novel/x").name(), "Generic");
    }

    #[test]
    fn test_freewebnovel_is_not_webnovel() {
        let registry = AdapterRegistry::with_defaults();
        assert_eq!(
            registry.resolve("https://freewebnovel.com/novel/x").name(),
            "FreeWebNovel"
        );
        assert_eq!(
            registry.resolve("https://www.webnovel.com/book/x_1").name(),
            "WebNovel"
        );
    }

    #[test]
    fn test_searchable_excludes_generic_and_webnovel() {
        let names: Vec<_> = AdapterRegistry::with_defaults()
            .searchable()
            .iter()
            .map(|a| a.name())
            .collect();
        assert!(names.contains(&"NovelBin"));
        assert!(names.contains(&"RoyalRoad"));
        assert!(names.contains(&"LightNovelWorld"));
        assert!(names.contains(&"LNMTL"));
        assert_eq!(names.last(), Some(&"DuckDuckGo"));
        assert!(!names.contains(&"WebNovel"));
        assert!(!names.contains(&"Generic"));
    }

    #[test]
    fn test_default_novel_base_path() {
        let adapter = GenericAdapter;
        assert_eq!(
            adapter.novel_base_path("https://s.com/novel/Shadow-Slave").as_deref(),
            Some("/novel/shadow-slave")
        );
        assert_eq!(adapter.novel_base_path("https://s.com/b/shadow-slave"), None);
    }

    #[test]
    fn test_page_url() {
        assert_eq!(ListingPages::page_url("https://s.com/x/chapters", 2), "https://s.com/x/chapters?page=2");
        assert_eq!(ListingPages::page_url("https://s.com/x?sort=1", 3), "https://s.com/x?sort=1&page=3");
    }
}
