// src/pipeline/search.rs

//! Multi-site search.
//!
//! Every searchable adapter is probed, the live ones are queried at once,
//! and the hits are cleaned, filtered for relevance and grouped into one
//! candidate per novel.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock};

use futures::stream::{self, StreamExt};
use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

use crate::error::{AppError, Result};
use crate::fetch::{FetchRequest, Fetcher};
use crate::models::{NovelCandidate, SearchResult, slug_key};
use crate::sites::{AdapterRegistry, SiteAdapter};
use crate::storage::NovelCache;

/// Sites searched at once.
const SEARCH_WIDTH: usize = 8;

const GENERIC_TITLES: &[&str] = &["novel", "manga", "read online", "untitled"];

static TRAILING_ID: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\s+\d{4,}$").ok());
static MTL_PREFIX: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?i)^mtl\s+").ok());

fn words(text: &str) -> HashSet<String> {
    text.unicode_words().map(|w| w.to_lowercase()).collect()
}

/// Display title without trailing numeric ids or an `MTL` prefix.
fn clean_title(title: &str) -> String {
    let mut clean = title.trim().to_string();
    for pattern in [&TRAILING_ID, &MTL_PREFIX] {
        if let Some(re) = pattern.as_ref() {
            clean = re.replace(&clean, "").trim().to_string();
        }
    }
    if clean.is_empty() {
        title.trim().to_string()
    } else {
        clean
    }
}

/// Share of query words found in the title; 0 means unrelated.
fn relevance(query_words: &HashSet<String>, title: &str) -> f64 {
    if query_words.is_empty() {
        return 0.0;
    }
    let shared = words(title).intersection(query_words).count();
    shared as f64 / query_words.len() as f64
}

/// Grouping key: URL slug, else the alphanumeric title.
fn group_key(hit: &SearchResult) -> String {
    slug_key(&hit.url).unwrap_or_else(|| {
        hit.title
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect()
    })
}

/// Clean, filter and group raw hits, best match first.
///
/// Hits must share at least one word with the query. Candidates are ordered
/// by their best hit's relevance, then by how many sites carry them.
pub fn group_results(query: &str, hits: Vec<SearchResult>) -> Vec<NovelCandidate> {
    let query_words = words(query);
    let mut seen_urls = HashSet::new();
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, (f64, NovelCandidate)> = HashMap::new();

    for mut hit in hits {
        if hit.url.trim().is_empty() || hit.title.trim().is_empty() {
            continue;
        }
        if GENERIC_TITLES.contains(&hit.title.trim().to_lowercase().as_str()) {
            continue;
        }
        hit.title = clean_title(&hit.title);
        let score = relevance(&query_words, &hit.title);
        if score <= 0.0 || !seen_urls.insert(hit.url.clone()) {
            continue;
        }

        let key = group_key(&hit);
        match groups.get_mut(&key) {
            Some((best, candidate)) => {
                *best = best.max(score);
                candidate.sources.push(hit);
            }
            None => {
                order.push(key.clone());
                let candidate = NovelCandidate {
                    normalized_title: key.clone(),
                    title: hit.title.clone(),
                    sources: vec![hit],
                };
                groups.insert(key, (score, candidate));
            }
        }
    }

    let mut ranked: Vec<(f64, NovelCandidate)> = order
        .into_iter()
        .filter_map(|key| groups.remove(&key))
        .collect();
    ranked.sort_by(|a, b| {
        b.0.total_cmp(&a.0)
            .then_with(|| b.1.sources.len().cmp(&a.1.sources.len()))
    });
    ranked.into_iter().map(|(_, candidate)| candidate).collect()
}

/// Fans a query out to every searchable site.
pub struct SearchAggregator {
    fetcher: Arc<Fetcher>,
    registry: Arc<AdapterRegistry>,
    cache: Arc<NovelCache>,
}

impl SearchAggregator {
    pub fn new(fetcher: Arc<Fetcher>, registry: Arc<AdapterRegistry>, cache: Arc<NovelCache>) -> Self {
        Self {
            fetcher,
            registry,
            cache,
        }
    }

    pub async fn search(&self, query: &str) -> Result<Vec<NovelCandidate>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::validation("search query is empty"));
        }

        let adapters = self.registry.searchable();
        log::info!("Searching {} sites for '{}'", adapters.len(), query);

        let mut per_site: Vec<(usize, Vec<SearchResult>)> = stream::iter(adapters.into_iter().enumerate())
            .map(|(i, adapter)| async move { (i, self.search_site(adapter.as_ref(), query).await) })
            .buffer_unordered(SEARCH_WIDTH)
            .collect()
            .await;
        // Completion order is arbitrary; keep registry order for stable grouping.
        per_site.sort_by_key(|(i, _)| *i);

        let hits: Vec<SearchResult> = per_site.into_iter().flat_map(|(_, hits)| hits).collect();
        let candidates = group_results(query, hits);
        log::info!("Search for '{}' found {} candidates", query, candidates.len());
        Ok(candidates)
    }

    /// Hits from one site; a dead or failing site yields none.
    async fn search_site(&self, adapter: &dyn SiteAdapter, query: &str) -> Vec<SearchResult> {
        let name = adapter.name();
        if let Some(cached) = self.cache.get_search(query, name).await {
            return cached;
        }
        if let Some(health_url) = adapter.health_url() {
            if !self.fetcher.health().is_healthy(&health_url).await {
                return Vec::new();
            }
        }
        let Some(url) = adapter.search_url(query) else {
            return Vec::new();
        };

        let request = FetchRequest::search(&url).with_traits(adapter.traits());
        let hits = match self.fetcher.fetch(&request).await {
            Ok(page) => adapter.extract_search_results(&page.body, &page.url),
            Err(e) => {
                log::warn!("[{}] search failed: {}", name, e);
                return Vec::new();
            }
        };
        log::debug!("[{}] {} hits for '{}'", name, hits.len(), query);

        if !hits.is_empty() {
            if let Err(e) = self.cache.put_search(query, name, &hits).await {
                log::warn!("Failed to cache search results for {}: {}", name, e);
            }
        }
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sites::{FreeWebNovelAdapter, RoyalRoadAdapter};
    use crate::testing::{ScriptedTransport, fast_config};

    const FWN_SEARCH: &str = "https://freewebnovel.com/search?searchkey=shadow+slave";
    const RR_SEARCH: &str = "https://www.royalroad.com/fictions/search?title=shadow+slave";

    fn hit(title: &str, url: &str, site: &str) -> SearchResult {
        SearchResult {
            title: title.into(),
            url: url.into(),
            source_site: site.into(),
        }
    }

    fn aggregator(transport: &Arc<ScriptedTransport>, root: &std::path::Path) -> SearchAggregator {
        let config = fast_config(root);
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(FreeWebNovelAdapter));
        registry.register(Arc::new(RoyalRoadAdapter));
        SearchAggregator::new(
            Arc::new(Fetcher::new(config.fetch.clone(), transport.clone(), None)),
            Arc::new(registry),
            Arc::new(NovelCache::new(config.cache)),
        )
    }

    fn script_sites(transport: &ScriptedTransport) {
        transport.set_head("freewebnovel.com", 200);
        transport.set_head("royalroad.com", 200);
        transport.set(
            FWN_SEARCH,
            200,
            r#"<html><body>
            <div class="tit"><a href="/novel/shadow-slave">Shadow Slave</a></div>
            <div class="tit"><a href="/novel/cooking-basics">Cooking Basics</a></div>
            </body></html>"#,
        );
        transport.set(
            RR_SEARCH,
            200,
            r#"<html><body>
            <h2 class="fiction-title"><a href="/fiction/5555/shadow-slave">MTL Shadow Slave 118044</a></h2>
            <h2 class="fiction-title"><a href="/fiction/77/slave-of-shadows">Slave of Shadows</a></h2>
            </body></html>"#,
        );
    }

    #[test]
    fn test_clean_title() {
        assert_eq!(clean_title("Mtl Martial Peak 118044"), "Martial Peak");
        assert_eq!(clean_title("2012"), "2012");
        assert_eq!(clean_title("Lord of the Mysteries"), "Lord of the Mysteries");
    }

    #[test]
    fn test_group_results_filters_and_ranks() {
        let hits = vec![
            hit("Slave Hunter", "https://a.com/novel/slave-hunter", "A"),
            hit("Novel", "https://a.com/novel/x", "A"),
            hit("Shadow Slave", "https://a.com/novel/shadow-slave", "A"),
            hit("Cooking Basics", "https://a.com/novel/cooking", "A"),
            hit("Shadow Slave", "https://b.com/b/shadow-slave", "B"),
            hit("Shadow Slave", "https://b.com/b/shadow-slave", "B"),
        ];
        let candidates = group_results("Shadow Slave", hits);

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].normalized_title, "shadowslave");
        assert_eq!(candidates[0].sources.len(), 2);
        assert_eq!(candidates[1].title, "Slave Hunter");
    }

    #[tokio::test]
    async fn test_search_groups_across_sites() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(ScriptedTransport::new());
        script_sites(&transport);
        let aggregator = aggregator(&transport, dir.path());

        let candidates = aggregator.search("shadow slave").await.unwrap();
        let titles: Vec<_> = candidates.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Shadow Slave", "Slave of Shadows"]);

        let sites: Vec<_> = candidates[0].sources.iter().map(|s| s.source_site.as_str()).collect();
        assert_eq!(sites, vec!["FreeWebNovel", "RoyalRoad"]);
        assert_eq!(candidates[0].sources[1].title, "Shadow Slave");
    }

    #[tokio::test]
    async fn test_dead_site_is_not_searched() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(ScriptedTransport::new());
        script_sites(&transport);
        transport.set_head("freewebnovel.com", 503);
        let aggregator = aggregator(&transport, dir.path());

        let candidates = aggregator.search("shadow slave").await.unwrap();
        assert_eq!(transport.request_count(FWN_SEARCH), 0);
        assert!(candidates.iter().all(|c| c.sources.iter().all(|s| s.source_site == "RoyalRoad")));
    }

    #[tokio::test]
    async fn test_repeat_search_uses_cache() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(ScriptedTransport::new());
        script_sites(&transport);
        let aggregator = aggregator(&transport, dir.path());

        let first = aggregator.search("shadow slave").await.unwrap();
        let second = aggregator.search("shadow slave").await.unwrap();
        assert_eq!(first.len(), second.len());
        assert_eq!(transport.request_count(FWN_SEARCH), 1);
        assert_eq!(transport.request_count(RR_SEARCH), 1);
    }

    #[tokio::test]
    async fn test_empty_query_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(ScriptedTransport::new());
        let err = aggregator(&transport, dir.path()).search("  ").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
