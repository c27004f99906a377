// src/pipeline/download.rs

//! Download coordinator.
//!
//! One job runs in five stages: metadata, chapter listing, range selection,
//! concurrent chapter downloads, then normalization. Cached chapters are
//! reused without touching the network, and a per-user progress record is
//! kept so an interrupted job can pick up where it stopped.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future;
use futures::stream::{self, StreamExt};
use rand::Rng;
use thiserror::Error;

use super::normalize::{NormalizeOptions, normalize_chapters};
use crate::error::{AppError, Result};
use crate::fetch::{FetchError, FetchRequest, Fetcher};
use crate::models::{
    ChapterContent, ChapterLink, ChapterRange, DownloadConfig, DownloadProgress, DownloadStatus,
    NovelMetadata, NovelResult, ProgressSnapshot, marked_chapter_number, parse_title_number,
    sort_and_dedup_links,
};
use crate::sites::{AdapterRegistry, ExtractError, ListingPages, SiteAdapter};
use crate::storage::{ContentRejection, NovelCache, ProgressStore, check_chapter_body};
use crate::utils::url_path;

/// Listing pages fetched at once when the site tolerates it.
const LISTING_FETCH_WIDTH: usize = 4;

pub type ProgressFn = Arc<dyn Fn(ProgressSnapshot) + Send + Sync>;
pub type CancelFn = Arc<dyn Fn() -> bool + Send + Sync>;

/// Caller hooks for one job: a progress sink and a cancellation probe.
#[derive(Clone, Default)]
pub struct JobHooks {
    on_progress: Option<ProgressFn>,
    is_cancelled: Option<CancelFn>,
}

impl JobHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_progress(mut self, f: impl Fn(ProgressSnapshot) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(f));
        self
    }

    pub fn with_cancel(mut self, f: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.is_cancelled = Some(Arc::new(f));
        self
    }

    fn report(&self, snapshot: ProgressSnapshot) {
        if let Some(f) = &self.on_progress {
            f(snapshot);
        }
    }

    fn cancelled(&self) -> bool {
        self.is_cancelled.as_ref().is_some_and(|f| f())
    }
}

/// What to download.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub novel_url: String,
    pub range: ChapterRange,
    /// Worker count; the configured default when `None`
    pub concurrency: Option<usize>,
    /// Enables the resumable progress record
    pub user_id: Option<String>,
}

impl DownloadRequest {
    pub fn new(novel_url: impl Into<String>) -> Self {
        Self {
            novel_url: novel_url.into(),
            range: ChapterRange::all(),
            concurrency: None,
            user_id: None,
        }
    }

    pub fn with_range(mut self, range: ChapterRange) -> Self {
        self.range = range;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// Why one chapter did not make it into the result.
#[derive(Error, Debug)]
enum ChapterFailure {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("extraction failed: {0}")]
    Extract(#[from] ExtractError),

    #[error("page belongs elsewhere: {0}")]
    Mismatch(String),

    #[error("content rejected: {0}")]
    Rejected(ContentRejection),
}

/// A listed chapter picked for this job, with the number it will carry.
#[derive(Debug, Clone)]
struct PlannedChapter {
    link: ChapterLink,
    number: u32,
}

/// Chapters picked from the listing plus whether a prologue rides along.
struct Selection {
    chapters: Vec<PlannedChapter>,
    include_prologue: bool,
}

/// Pick the requested window out of the sorted listing.
///
/// On sites whose first entry is front matter, a range starting at 1 takes
/// one extra link so the requested chapter count survives renumbering.
/// A link keeps the number its URL marks explicitly; anything else gets its
/// listing position.
fn select_range(
    links: &[ChapterLink],
    range: ChapterRange,
    front_matter: bool,
    opaque_ids: bool,
) -> Result<Selection> {
    let start_idx = range.start.saturating_sub(1) as usize;
    if start_idx >= links.len() {
        return Err(AppError::validation(format!(
            "range starts at chapter {} but only {} chapters are listed",
            range.start,
            links.len()
        )));
    }

    let include_prologue = front_matter && range.start == 1;
    let mut end_idx = range
        .end
        .map_or(links.len(), |end| end as usize)
        .min(links.len());
    if include_prologue && range.end.is_some() {
        end_idx = (end_idx + 1).min(links.len());
    }
    if end_idx <= start_idx {
        return Err(AppError::validation(format!(
            "empty chapter range {}..{:?}",
            range.start, range.end
        )));
    }

    let chapters = links[start_idx..end_idx]
        .iter()
        .enumerate()
        .map(|(i, link)| {
            let positional = range.start + i as u32;
            let number = if opaque_ids {
                positional
            } else {
                marked_chapter_number(&link.url).unwrap_or(positional)
            };
            PlannedChapter {
                link: link.clone(),
                number,
            }
        })
        .collect();

    Ok(Selection {
        chapters,
        include_prologue,
    })
}

/// Reasons a fetched chapter page is not the chapter that was asked for.
///
/// The expected number is the planned one. The number check is skipped when
/// chapter ids are opaque; otherwise a title number or an explicitly marked
/// number in the final URL that differs from it is enough.
fn chapter_mismatch(
    adapter: &dyn SiteAdapter,
    novel_url: &str,
    planned: &PlannedChapter,
    final_url: &str,
    chapter: &ChapterContent,
) -> Option<String> {
    if !adapter.chapter_ids_are_opaque() {
        let expected = planned.number;
        if let Some(found) = parse_title_number(&chapter.title).filter(|n| *n != expected) {
            return Some(format!("title says chapter {found}, expected {expected}"));
        }
        if let Some(found) = marked_chapter_number(final_url).filter(|n| *n != expected) {
            return Some(format!("landed on chapter {found}, expected {expected}"));
        }
    }

    let base = adapter.novel_base_path(novel_url)?;
    let path = url_path(final_url).unwrap_or_default().to_lowercase();
    if path.starts_with(&base) {
        None
    } else {
        Some(format!("{path} is outside {base}"))
    }
}

/// Random politeness delay in `[lo, hi]` milliseconds.
fn jitter(range: [u64; 2]) -> Duration {
    let [lo, hi] = range;
    if hi == 0 {
        return Duration::ZERO;
    }
    let ms = if lo >= hi {
        hi
    } else {
        rand::thread_rng().gen_range(lo..=hi)
    };
    Duration::from_millis(ms)
}

/// Runs download jobs against the shared fetcher, adapters and stores.
pub struct Coordinator {
    fetcher: Arc<Fetcher>,
    registry: Arc<AdapterRegistry>,
    cache: Arc<NovelCache>,
    progress: Arc<ProgressStore>,
    config: DownloadConfig,
}

impl Coordinator {
    pub fn new(
        fetcher: Arc<Fetcher>,
        registry: Arc<AdapterRegistry>,
        cache: Arc<NovelCache>,
        progress: Arc<ProgressStore>,
        config: DownloadConfig,
    ) -> Self {
        Self {
            fetcher,
            registry,
            cache,
            progress,
            config,
        }
    }

    /// Novel metadata, from the cache when fresh.
    pub async fn metadata(&self, novel_url: &str) -> Result<NovelMetadata> {
        let adapter = self.registry.resolve(novel_url);
        let (metadata, _) = self.load_novel(adapter.as_ref(), novel_url).await?;
        Ok(metadata)
    }

    /// Metadata plus the novel page body when it had to be fetched.
    async fn load_novel(
        &self,
        adapter: &dyn SiteAdapter,
        novel_url: &str,
    ) -> Result<(NovelMetadata, Option<String>)> {
        if let Some(metadata) = self.cache.get_metadata(novel_url).await {
            log::debug!("Metadata cache hit for '{}'", novel_url);
            return Ok((metadata, None));
        }

        let request = FetchRequest::plain(novel_url).with_traits(adapter.traits());
        let page = self
            .fetcher
            .fetch(&request)
            .await
            .map_err(|e| AppError::metadata(novel_url, e))?;

        let metadata = adapter.extract_metadata(&page.body, &page.url);
        if metadata.title.trim().is_empty() {
            return Err(AppError::metadata(novel_url, "no title on the novel page"));
        }
        if let Err(e) = self.cache.put_metadata(novel_url, &metadata).await {
            log::warn!("Failed to cache metadata for {}: {}", novel_url, e);
        }
        Ok((metadata, Some(page.body)))
    }

    /// Every chapter link the listing exposes, sorted and deduplicated.
    async fn list_chapters(
        &self,
        adapter: &dyn SiteAdapter,
        novel_url: &str,
        novel_html: Option<String>,
    ) -> Result<Vec<ChapterLink>> {
        let traits = adapter.traits();
        let listing_url = adapter
            .listing_url(novel_url)
            .unwrap_or_else(|| novel_url.to_string());

        let first_html = match novel_html.filter(|_| listing_url == novel_url) {
            Some(html) => html,
            None => {
                let request = FetchRequest::plain(&listing_url).with_traits(traits);
                self.fetcher.fetch(&request).await?.body
            }
        };

        let mut links = adapter.extract_chapter_links(&first_html, &listing_url);
        match adapter.listing_pages(&first_html, &listing_url, &links) {
            ListingPages::Single => {}
            ListingPages::Known(pages) => {
                log::debug!("[{}] {} more listing pages", adapter.name(), pages.len());
                let width = if adapter.sequential_chapters() {
                    1
                } else {
                    LISTING_FETCH_WIDTH
                };
                let extra: Vec<Vec<ChapterLink>> = stream::iter(pages)
                    .map(|page| async move {
                        let request = FetchRequest::plain(&page).with_traits(traits);
                        match self.fetcher.fetch(&request).await {
                            Ok(fetched) => adapter.extract_chapter_links(&fetched.body, &page),
                            Err(e) => {
                                log::warn!("Skipping listing page {}: {}", page, e);
                                Vec::new()
                            }
                        }
                    })
                    .buffered(width)
                    .collect()
                    .await;
                links.extend(extra.into_iter().flatten());
            }
            ListingPages::UntilExhausted {
                base,
                first,
                max_pages,
            } => {
                let mut seen: HashSet<String> = links.iter().map(|l| l.url.clone()).collect();
                for n in first..=max_pages {
                    let page = ListingPages::page_url(&base, n);
                    let request = FetchRequest::plain(&page).with_traits(traits);
                    let body = match self.fetcher.fetch(&request).await {
                        Ok(fetched) => fetched.body,
                        Err(e) => {
                            log::debug!("Listing stops at page {}: {}", n, e);
                            break;
                        }
                    };
                    let fresh: Vec<ChapterLink> = adapter
                        .extract_chapter_links(&body, &page)
                        .into_iter()
                        .filter(|l| seen.insert(l.url.clone()))
                        .collect();
                    if fresh.is_empty() {
                        break;
                    }
                    links.extend(fresh);
                }
            }
        }

        if links.is_empty() {
            return Err(AppError::NoChapterLinks {
                url: novel_url.to_string(),
            });
        }
        Ok(sort_and_dedup_links(links))
    }

    /// Run one download job.
    pub async fn download(&self, request: &DownloadRequest, hooks: &JobHooks) -> Result<NovelResult> {
        let novel_url = request.novel_url.as_str();
        let adapter = self.registry.resolve(novel_url);
        log::info!("[{}] Downloading {}", adapter.name(), novel_url);

        let (metadata, novel_html) = self.load_novel(adapter.as_ref(), novel_url).await?;
        let links = self.list_chapters(adapter.as_ref(), novel_url, novel_html).await?;
        let total_available = (metadata.total_chapters.unwrap_or(0) as usize).max(links.len());
        log::info!(
            "'{}': {} chapters listed, {} available",
            metadata.title,
            links.len(),
            total_available
        );

        let selection = select_range(
            &links,
            request.range,
            adapter.has_front_matter(),
            adapter.chapter_ids_are_opaque(),
        )?;
        let total = selection.chapters.len();

        let mut record = match &request.user_id {
            Some(user) => Some(self.start_progress(user, novel_url, &metadata.title, request.range).await),
            None => None,
        };

        let concurrency = if adapter.sequential_chapters() {
            1
        } else {
            request
                .concurrency
                .unwrap_or(self.config.default_concurrency)
                .max(1)
        };
        let delay_range = if adapter.sequential_chapters() {
            self.config.sequential_delay_ms
        } else {
            self.config.chapter_delay_ms
        };
        let save_every = self.config.progress_save_every.max(1);

        let mut chapters = Vec::with_capacity(total);
        let mut failed = 0usize;
        let mut cancelled = hooks.cancelled();

        if !cancelled {
            let adapter_ref = adapter.as_ref();
            // Dispatch stops once cancelled; units already running are drained.
            let mut results = stream::iter(selection.chapters)
                .take_while(|_| future::ready(!hooks.cancelled()))
                .map(|planned| async move {
                    let outcome = self
                        .download_one(adapter_ref, novel_url, &planned, delay_range)
                        .await;
                    (planned, outcome)
                })
                .buffer_unordered(concurrency);

            while let Some((planned, outcome)) = results.next().await {
                if cancelled {
                    // Cached when it succeeded; the result stops at the cancellation point.
                    log::debug!("Chapter {} finished after cancellation", planned.number);
                    continue;
                }
                match outcome {
                    Ok(chapter) => {
                        if let Some(record) = record.as_mut() {
                            record.completed_chapter_urls.push(planned.link.url.clone());
                        }
                        chapters.push(chapter);
                    }
                    Err(e) => {
                        failed += 1;
                        log::warn!("Chapter {} ({}) failed: {}", planned.number, planned.link.url, e);
                        if let Some(record) = record.as_mut() {
                            record.failed_chapter_urls.push(planned.link.url.clone());
                        }
                    }
                }

                let snapshot = ProgressSnapshot {
                    completed: chapters.len(),
                    failed,
                    total,
                };
                hooks.report(snapshot);
                if let Some(record) = record.as_ref() {
                    if snapshot.done() % save_every == 0 {
                        self.save_progress(record).await;
                    }
                }
                if hooks.cancelled() {
                    log::info!(
                        "Download of {} cancelled after {} chapters, draining in-flight requests",
                        novel_url,
                        snapshot.done()
                    );
                    cancelled = true;
                }
            }
        }

        if let Some(record) = record.as_mut() {
            if failed == 0 && !cancelled {
                if let Err(e) = self.progress.clear(&record.user_id, novel_url).await {
                    log::warn!("Failed to clear progress for {}: {}", novel_url, e);
                }
            } else {
                record.status = if chapters.is_empty() {
                    DownloadStatus::Failed
                } else {
                    DownloadStatus::Partial
                };
                self.save_progress(record).await;
            }
        }

        let chapters = normalize_chapters(
            chapters,
            NormalizeOptions {
                range: request.range,
                include_prologue: selection.include_prologue,
            },
        );
        log::info!(
            "'{}': {} chapters downloaded, {} failed",
            metadata.title,
            chapters.len(),
            failed
        );

        Ok(NovelResult {
            title: metadata.title.clone(),
            novel_url: novel_url.to_string(),
            metadata,
            chapters,
            failed_count: failed,
            total_available,
            cancelled,
        })
    }

    /// Cached copy, else fetch, extract, verify and cache one chapter.
    async fn download_one(
        &self,
        adapter: &dyn SiteAdapter,
        novel_url: &str,
        planned: &PlannedChapter,
        delay_range: [u64; 2],
    ) -> std::result::Result<ChapterContent, ChapterFailure> {
        let link = &planned.link;
        if let Some(mut cached) = self.cache.get_chapter(novel_url, &link.url).await {
            log::debug!("Chapter cache hit for '{}'", link.url);
            cached.chapter_number = planned.number;
            return Ok(cached);
        }

        let delay = jitter(delay_range);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut request = FetchRequest::chapter(&link.url).with_traits(adapter.traits());
        if let Some(referer) = adapter.chapter_referer(novel_url) {
            request = request.with_referer(referer);
        }
        let fetched = self.fetcher.fetch(&request).await?;

        let mut chapter = adapter.extract_chapter(&fetched.body, &fetched.url)?;
        if let Some(reason) = chapter_mismatch(adapter, novel_url, planned, &fetched.url, &chapter) {
            return Err(ChapterFailure::Mismatch(reason));
        }
        check_chapter_body(&chapter.body_text, self.cache.min_chapter_chars())
            .map_err(ChapterFailure::Rejected)?;

        chapter.source_url = link.url.clone();
        chapter.chapter_number = planned.number;
        if let Err(e) = self.cache.put_chapter(novel_url, &chapter).await {
            log::warn!("Failed to cache chapter {}: {}", link.url, e);
        }
        Ok(chapter)
    }

    /// Fresh in-progress record; chapters an earlier run finished come back as cache hits.
    async fn start_progress(
        &self,
        user_id: &str,
        novel_url: &str,
        title: &str,
        range: ChapterRange,
    ) -> DownloadProgress {
        match self.progress.get(user_id, Some(novel_url)).await {
            Ok(Some(previous)) => log::info!(
                "Resuming {} for {}: {} chapters done earlier",
                novel_url,
                user_id,
                previous.completed_chapter_urls.len()
            ),
            Ok(None) => {}
            Err(e) => log::warn!("Ignoring unreadable progress for {}: {}", novel_url, e),
        }
        let record = DownloadProgress::new(user_id, novel_url, title, range);
        self.save_progress(&record).await;
        record
    }

    async fn save_progress(&self, record: &DownloadProgress) {
        if let Err(e) = self.progress.save(record).await {
            log::warn!("Failed to save progress for {}: {}", record.novel_url, e);
        }
    }
}
