// src/testing.rs

//! In-memory fakes and HTML fixtures shared by unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::browser::{BrowserError, PageRenderer, RenderOptions, RenderedPage};
use crate::fetch::{OutboundRequest, RawResponse, Route, Transport, TransportError};
use crate::models::{Config, FetchConfig};
use crate::utils::get_domain;

/// A GET the scripted transport saw.
#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub url: String,
    pub user_agent: Option<String>,
    pub route: Route,
}

fn response(url: &str, status: u16, body: &str) -> RawResponse {
    RawResponse {
        status,
        final_url: url.to_string(),
        body: body.to_string(),
        content_length: None,
    }
}

/// Transport answering from per-URL scripts.
///
/// `push` queues one-shot responses consumed in order; `set` installs the
/// response returned once the queue is empty. Unknown URLs fail to connect.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    queued: Mutex<HashMap<String, VecDeque<RawResponse>>>,
    sticky: Mutex<HashMap<String, RawResponse>>,
    delays: Mutex<HashMap<String, Duration>>,
    heads: Mutex<HashMap<String, u16>>,
    posts: Mutex<VecDeque<RawResponse>>,
    log: Mutex<Vec<RecordedRequest>>,
    head_calls: AtomicUsize,
    posted: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, url: &str, status: u16, body: &str) {
        self.queued
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(response(url, status, body));
    }

    pub fn set(&self, url: &str, status: u16, body: &str) {
        self.sticky
            .lock()
            .unwrap()
            .insert(url.to_string(), response(url, status, body));
    }

    /// Answer `url` with a redirect-style final URL.
    pub fn set_redirect(&self, url: &str, final_url: &str, body: &str) {
        self.sticky
            .lock()
            .unwrap()
            .insert(url.to_string(), response(final_url, 200, body));
    }

    pub fn set_delay(&self, url: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(url.to_string(), delay);
    }

    pub fn set_head(&self, domain: &str, status: u16) {
        self.heads.lock().unwrap().insert(domain.to_string(), status);
    }

    pub fn push_post(&self, status: u16, body: &str) {
        self.posts
            .lock()
            .unwrap()
            .push_back(response("", status, body));
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.log.lock().unwrap().clone()
    }

    pub fn request_count(&self, url: &str) -> usize {
        self.log.lock().unwrap().iter().filter(|r| r.url == url).count()
    }

    pub fn head_count(&self) -> usize {
        self.head_calls.load(Ordering::SeqCst)
    }

    pub fn posted_urls(&self) -> Vec<String> {
        self.posted.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, request: &OutboundRequest) -> Result<RawResponse, TransportError> {
        self.log.lock().unwrap().push(RecordedRequest {
            url: request.url.clone(),
            user_agent: request
                .headers
                .get("user-agent")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            route: request.route,
        });

        let delay = self.delays.lock().unwrap().get(&request.url).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let queued = self
            .queued
            .lock()
            .unwrap()
            .get_mut(&request.url)
            .and_then(VecDeque::pop_front);
        if let Some(response) = queued {
            return Ok(response);
        }
        self.sticky
            .lock()
            .unwrap()
            .get(&request.url)
            .cloned()
            .ok_or_else(|| TransportError::Connect(format!("no script for {}", request.url)))
    }

    async fn head(&self, url: &str, _timeout: Duration) -> Result<u16, TransportError> {
        self.head_calls.fetch_add(1, Ordering::SeqCst);
        let domain = get_domain(url).unwrap_or_default();
        let heads = self.heads.lock().unwrap();
        heads
            .get(&domain)
            .or_else(|| heads.get(domain.trim_start_matches("www.")))
            .copied()
            .ok_or_else(|| TransportError::Connect(format!("no host {domain}")))
    }

    async fn post_json(
        &self,
        url: &str,
        _body: &serde_json::Value,
        _timeout: Duration,
    ) -> Result<RawResponse, TransportError> {
        self.posted.lock().unwrap().push(url.to_string());
        self.posts
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| TransportError::Connect("solver not scripted".into()))
    }
}

/// Renderer returning canned pages; unknown URLs stay behind a challenge.
#[derive(Default)]
pub(crate) struct FakeRenderer {
    pages: Mutex<HashMap<String, String>>,
    calls: AtomicUsize,
    last: Mutex<Option<RenderOptions>>,
}

impl FakeRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, url: &str, html: &str) {
        self.pages
            .lock()
            .unwrap()
            .insert(url.to_string(), html.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_options(&self) -> Option<RenderOptions> {
        *self.last.lock().unwrap()
    }
}

#[async_trait]
impl PageRenderer for FakeRenderer {
    async fn render(&self, url: &str, options: &RenderOptions) -> Result<RenderedPage, BrowserError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some(*options);
        match self.pages.lock().unwrap().get(url) {
            Some(html) => Ok(RenderedPage {
                url: url.to_string(),
                title: String::new(),
                html: html.clone(),
            }),
            None => Err(BrowserError::ChallengeBlocked {
                url: url.to_string(),
            }),
        }
    }

    async fn shutdown(&self) {}
}

/// Fetch settings with two attempts and no sleeping.
pub(crate) fn fast_fetch_config() -> FetchConfig {
    FetchConfig {
        max_attempts: 2,
        search_attempts: 1,
        retry_base_delay_ms: 0,
        retry_step_ms: 0,
        rate_limit_delay_ms: 0,
        ..FetchConfig::default()
    }
}

/// Full config rooted in `cache_root` with zero delays.
pub(crate) fn fast_config(cache_root: &std::path::Path) -> Config {
    let mut config = Config {
        fetch: fast_fetch_config(),
        ..Config::default()
    };
    config.cache.root = cache_root.to_path_buf();
    config.download.chapter_delay_ms = [0, 0];
    config.download.sequential_delay_ms = [0, 0];
    config
}

/// Paragraph text comfortably above the minimum chapter length.
pub(crate) fn prose(seed: &str) -> String {
    format!(
        "{seed}. The night wind carried the smell of rain across the valley while the caravan \
         settled in. Lanterns swayed from the wagon hooks and the drivers spoke in low voices \
         about the road ahead, the broken bridge, and the toll they would pay at dawn."
    )
}

/// Simple HTML page with a body long enough to pass as content.
pub(crate) fn long_html(seed: &str) -> String {
    format!(
        "<html><head><title>{seed}</title></head><body><div id=\"content\"><p>{}</p></div></body></html>",
        prose(seed)
    )
}

/// Chapter page in the markup the generic adapter understands.
pub(crate) fn chapter_page(title: &str, seed: &str) -> String {
    format!(
        "<html><head><title>{title}</title></head><body>\
         <h1 class=\"chapter-title\">{title}</h1>\
         <div class=\"chapter-content\"><p>{}</p><p>{}</p></div></body></html>",
        prose(seed),
        prose(&format!("{seed} continued"))
    )
}

/// Novel page listing `urls` as chapter anchors.
pub(crate) fn listing_page(title: &str, urls: &[String]) -> String {
    let anchors: String = urls
        .iter()
        .enumerate()
        .map(|(i, url)| format!("<li><a href=\"{url}\">Chapter {}</a></li>", i + 1))
        .collect();
    format!(
        "<html><head><title>{title}</title></head><body><h1>{title}</h1>\
         <ul class=\"chapter-list\">{anchors}</ul></body></html>"
    )
}
