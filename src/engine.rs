// src/engine.rs

//! Engine facade.
//!
//! Owns the shared fetcher, adapter registry and stores, and exposes the
//! operations a front end needs: scrape, metadata, search and the stores.

use std::sync::Arc;

use crate::browser::{PageRenderer, build_renderer};
use crate::error::{AppError, Result};
use crate::fetch::{BandwidthUsage, Fetcher, HttpTransport, Transport};
use crate::models::{ChapterRange, Config, NovelCandidate, NovelMetadata, NovelResult};
use crate::pipeline::{Coordinator, DownloadRequest, JobHooks, SearchAggregator};
use crate::sites::AdapterRegistry;
use crate::storage::{NovelCache, ProgressStore};
use crate::utils::is_http_url;

pub struct Engine {
    fetcher: Arc<Fetcher>,
    cache: Arc<NovelCache>,
    progress: Arc<ProgressStore>,
    coordinator: Coordinator,
    search: SearchAggregator,
}

impl Engine {
    /// Build the production stack: reqwest transport, optional browser, built-in adapters.
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(&config.fetch)?);
        let renderer = build_renderer(&config.browser).await;
        Ok(Self::with_parts(
            config,
            transport,
            renderer,
            AdapterRegistry::with_defaults(),
        ))
    }

    /// Assemble an engine from explicit parts.
    pub fn with_parts(
        config: Config,
        transport: Arc<dyn Transport>,
        renderer: Option<Arc<dyn PageRenderer>>,
        registry: AdapterRegistry,
    ) -> Self {
        let fetcher = Arc::new(Fetcher::new(config.fetch.clone(), transport, renderer));
        let registry = Arc::new(registry);
        let cache = Arc::new(NovelCache::new(config.cache.clone()));
        let progress = Arc::new(ProgressStore::new(&config.cache));

        let coordinator = Coordinator::new(
            Arc::clone(&fetcher),
            Arc::clone(&registry),
            Arc::clone(&cache),
            Arc::clone(&progress),
            config.download.clone(),
        );
        let search = SearchAggregator::new(Arc::clone(&fetcher), registry, Arc::clone(&cache));

        log::debug!(
            "Engine ready (browser tier: {})",
            if fetcher.has_browser() { "on" } else { "off" }
        );
        Self {
            fetcher,
            cache,
            progress,
            coordinator,
            search,
        }
    }

    /// Download a novel given its URL or a free-text title.
    ///
    /// A title is searched and the best candidate's first source is used.
    pub async fn scrape(
        &self,
        input: &str,
        range: ChapterRange,
        concurrency: Option<usize>,
        user_id: Option<&str>,
        hooks: &JobHooks,
    ) -> Result<NovelResult> {
        let novel_url = self.resolve_input(input).await?;
        let mut request = DownloadRequest::new(novel_url).with_range(range);
        request.concurrency = concurrency;
        request.user_id = user_id.map(str::to_string);
        self.download(&request, hooks).await
    }

    pub async fn download(&self, request: &DownloadRequest, hooks: &JobHooks) -> Result<NovelResult> {
        self.coordinator.download(request, hooks).await
    }

    /// Metadata only; no chapter is fetched.
    pub async fn get_metadata(&self, novel_url: &str) -> Result<NovelMetadata> {
        if !is_http_url(novel_url) {
            return Err(AppError::unsupported(novel_url, "not an http(s) URL"));
        }
        self.coordinator.metadata(novel_url.trim()).await
    }

    pub async fn search(&self, query: &str) -> Result<Vec<NovelCandidate>> {
        self.search.search(query).await
    }

    pub fn cache(&self) -> &NovelCache {
        &self.cache
    }

    pub fn progress(&self) -> &ProgressStore {
        &self.progress
    }

    pub fn bandwidth(&self) -> BandwidthUsage {
        self.fetcher.bandwidth()
    }

    /// Close the browser tier, if one was started.
    pub async fn shutdown(&self) {
        self.fetcher.shutdown().await;
    }

    async fn resolve_input(&self, input: &str) -> Result<String> {
        let input = input.trim();
        if is_http_url(input) {
            return Ok(input.to_string());
        }
        let candidates = self.search(input).await?;
        let url = candidates
            .first()
            .and_then(|c| c.sources.first())
            .map(|s| s.url.clone())
            .ok_or_else(|| AppError::unsupported(input, "no search results"))?;
        log::info!("Resolved '{}' to {}", input, url);
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sites::FreeWebNovelAdapter;
    use crate::testing::{ScriptedTransport, chapter_page, fast_config, listing_page};

    const NOVEL: &str = "https://freewebnovel.com/novel/foo-saga";

    fn engine(transport: &Arc<ScriptedTransport>, root: &std::path::Path) -> Engine {
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(FreeWebNovelAdapter));
        Engine::with_parts(fast_config(root), transport.clone(), None, registry)
    }

    fn script_novel(transport: &ScriptedTransport) {
        let urls: Vec<String> = (1..=3).map(|n| format!("{NOVEL}/chapter-{n}")).collect();
        transport.set(NOVEL, 200, &listing_page("Foo Saga", &urls));
        for (n, url) in urls.iter().enumerate() {
            let n = n + 1;
            transport.set(url, 200, &chapter_page(&format!("Chapter {n}"), &format!("foo {n}")));
        }
    }

    #[tokio::test]
    async fn test_scrape_by_url() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(ScriptedTransport::new());
        script_novel(&transport);
        let engine = engine(&transport, dir.path());

        let result = engine
            .scrape(NOVEL, ChapterRange::new(2, Some(3)), Some(2), None, &JobHooks::new())
            .await
            .unwrap();
        assert_eq!(result.title, "Foo Saga");
        let numbers: Vec<_> = result.chapters.iter().map(|c| c.chapter_number).collect();
        assert_eq!(numbers, vec![2, 3]);
        assert_eq!(result.total_available, 3);
        assert_eq!(transport.request_count(&format!("{NOVEL}/chapter-1")), 0);
    }

    #[tokio::test]
    async fn test_scrape_by_title_goes_through_search() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(ScriptedTransport::new());
        script_novel(&transport);
        transport.set_head("freewebnovel.com", 200);
        transport.set(
            "https://freewebnovel.com/search?searchkey=foo+saga",
            200,
            r#"<div class="tit"><a href="/novel/foo-saga">Foo Saga</a></div>"#,
        );
        let engine = engine(&transport, dir.path());

        let result = engine
            .scrape("Foo Saga", ChapterRange::all(), None, None, &JobHooks::new())
            .await
            .unwrap();
        assert_eq!(result.novel_url, NOVEL);
        assert_eq!(result.chapters.len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_title_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(ScriptedTransport::new());
        let engine = engine(&transport, dir.path());

        let err = engine
            .scrape("nothing here", ChapterRange::all(), None, None, &JobHooks::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unsupported { .. }));
    }

    #[tokio::test]
    async fn test_metadata_is_cached() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(ScriptedTransport::new());
        script_novel(&transport);
        let engine = engine(&transport, dir.path());

        let first = engine.get_metadata(NOVEL).await.unwrap();
        let second = engine.get_metadata(NOVEL).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.total_chapters, Some(3));
        assert_eq!(transport.request_count(NOVEL), 1);
        assert!(engine.get_metadata("foo saga").await.is_err());
    }
}
