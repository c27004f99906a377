// src/fetch/ladder.rs

//! The escalating fetch ladder.
//!
//! One logical GET walks these steps and stops at the first usable body:
//!
//! ```text
//! stable headers ─▶ bypass headers (+ rotating proxy) ─▶ mirrors ─▶ challenge solver ─▶ browser
//! ```
//!
//! Block pages (403/429/503 or a challenge signature on 200) never count as
//! content. Only running out of steps yields a `FetchError`.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::header::HeaderMap;
use serde::Serialize;

use super::FetchError;
use super::bandwidth::{BandwidthMeter, BandwidthUsage};
use super::block::{BlockReason, Verdict, classify};
use super::headers::{HeaderProfiles, set_referer};
use super::health::SiteHealthMonitor;
use super::mirrors::alternate_urls;
use super::solver::ChallengeSolver;
use super::transport::{OutboundRequest, RawResponse, Route, Transport};
use crate::browser::{BrowserError, PageRenderer, RenderOptions};
use crate::models::FetchConfig;
use crate::utils::get_domain;

/// What the caller is fetching; selects timeouts and how far the ladder goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchIntent {
    Plain,
    Search,
    Chapter,
}

/// Ladder step that produced (or last failed) a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LadderStep {
    Plain,
    BypassHeaders,
    Mirror,
    ChallengeSolver,
    Browser,
}

/// How a site uses the headless browser tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BrowserPolicy {
    /// Last resort after every HTTP step failed
    #[default]
    Fallback,
    /// Logged-in context first; plain HTTP never sees member content
    Authenticated,
}

/// Per-site hints supplied by the site adapter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SiteTraits {
    /// Rotate the outbound IP on retries
    pub high_security: bool,
    /// Wait out interstitial challenges in the browser
    pub challenge_wait: bool,
    pub browser: BrowserPolicy,
}

/// One logical GET.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub intent: FetchIntent,
    pub referer: Option<String>,
    pub traits: SiteTraits,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>, intent: FetchIntent) -> Self {
        Self {
            url: url.into(),
            intent,
            referer: None,
            traits: SiteTraits::default(),
        }
    }

    pub fn plain(url: impl Into<String>) -> Self {
        Self::new(url, FetchIntent::Plain)
    }

    pub fn search(url: impl Into<String>) -> Self {
        Self::new(url, FetchIntent::Search)
    }

    pub fn chapter(url: impl Into<String>) -> Self {
        Self::new(url, FetchIntent::Chapter)
    }

    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    pub fn with_traits(mut self, traits: SiteTraits) -> Self {
        self.traits = traits;
        self
    }
}

/// A usable response body.
#[derive(Debug, Clone)]
pub struct Fetched {
    /// URL after redirects or mirror substitution
    pub url: String,
    pub status: u16,
    pub body: String,
    pub step: LadderStep,
}

/// Result of a single HTTP attempt.
enum Attempt {
    Content(RawResponse),
    Blocked(BlockReason, RawResponse),
    Gone(u16),
    Failed(String),
}

/// Remembers what went wrong for the final error.
#[derive(Default)]
struct Trail {
    attempts: usize,
    last: Option<String>,
}

impl Trail {
    fn note(&mut self, step: LadderStep, what: impl Into<String>) {
        self.attempts += 1;
        self.last = Some(format!("{:?}: {}", step, what.into()));
    }

    fn into_error(self, url: &str) -> FetchError {
        FetchError::Exhausted {
            url: url.to_string(),
            attempts: self.attempts,
            last: self.last.unwrap_or_else(|| "no attempt made".into()),
        }
    }
}

/// Executes fetch requests through the ladder.
pub struct Fetcher {
    config: FetchConfig,
    transport: Arc<dyn Transport>,
    renderer: Option<Arc<dyn PageRenderer>>,
    solver: Option<ChallengeSolver>,
    headers: HeaderProfiles,
    bandwidth: BandwidthMeter,
    health: SiteHealthMonitor,
}

impl Fetcher {
    /// Build a fetcher; `renderer` is `None` when the browser tier is off.
    pub fn new(
        config: FetchConfig,
        transport: Arc<dyn Transport>,
        renderer: Option<Arc<dyn PageRenderer>>,
    ) -> Self {
        let solver = config
            .challenge_solver_url
            .as_ref()
            .map(|url| ChallengeSolver::new(url.clone(), config.challenge_solver_timeout_ms));
        let health = SiteHealthMonitor::new(
            Arc::clone(&transport),
            Duration::from_secs(config.health_ttl_secs),
            Duration::from_secs(config.health_timeout_secs),
        );
        let bandwidth = BandwidthMeter::new(config.monthly_budget_bytes());

        Self {
            config,
            transport,
            renderer,
            solver,
            headers: HeaderProfiles::new(),
            bandwidth,
            health,
        }
    }

    pub fn health(&self) -> &SiteHealthMonitor {
        &self.health
    }

    pub fn bandwidth(&self) -> BandwidthUsage {
        self.bandwidth.usage()
    }

    pub fn has_browser(&self) -> bool {
        self.renderer.is_some()
    }

    /// Close the browser tier if one was started.
    pub async fn shutdown(&self) {
        if let Some(renderer) = &self.renderer {
            renderer.shutdown().await;
        }
    }

    /// Run one logical GET through the ladder.
    pub async fn fetch(&self, request: &FetchRequest) -> Result<Fetched, FetchError> {
        let url = request.url.as_str();
        let domain = get_domain(url).ok_or_else(|| FetchError::InvalidUrl(url.to_string()))?;
        let high_security = request.traits.high_security || self.config.is_high_security(&domain);
        let mut trail = Trail::default();

        if request.traits.browser == BrowserPolicy::Authenticated
            && request.intent != FetchIntent::Search
        {
            if let Some(fetched) = self.try_browser(request, true, &mut trail).await {
                return Ok(fetched);
            }
        }

        // Steps (a) and (b): header profiles
        let (attempts, timeout) = match request.intent {
            FetchIntent::Search => (self.config.search_attempts, self.config.search_timeout()),
            _ => (self.config.max_attempts, self.config.timeout()),
        };

        for attempt in 1..=attempts {
            let bypass = attempt >= 2 || request.intent == FetchIntent::Search;
            let step = if bypass {
                LadderStep::BypassHeaders
            } else {
                LadderStep::Plain
            };
            let mut headers = if bypass {
                HeaderProfiles::bypass(url)
            } else {
                self.headers.stable(url)
            };
            if let Some(referer) = &request.referer {
                set_referer(&mut headers, referer);
            }
            let route = if attempt >= 2 && high_security && self.config.rotating_proxy_url.is_some()
            {
                log::debug!("Rotating outbound IP for attempt {} on {}", attempt, domain);
                Route::Rotating
            } else {
                Route::Default
            };

            match self.attempt(url, headers, route, timeout).await {
                Attempt::Content(response) => {
                    log::debug!("Fetched {} via {:?} (attempt {})", url, step, attempt);
                    return Ok(Fetched {
                        url: response.final_url,
                        status: response.status,
                        body: response.body,
                        step,
                    });
                }
                Attempt::Gone(status) => {
                    log::warn!("{} returned HTTP {}, not retrying", url, status);
                    return Err(FetchError::NotFound {
                        url: url.to_string(),
                        status,
                    });
                }
                Attempt::Blocked(reason, response) => {
                    log::warn!(
                        "Attempt {}/{} blocked on {} ({:?}): {}",
                        attempt,
                        attempts,
                        domain,
                        step,
                        reason
                    );
                    self.dump_blocked(&domain, &format!("attempt{attempt}"), &response.body)
                        .await;
                    if reason == BlockReason::Status(429) {
                        tokio::time::sleep(Duration::from_millis(self.config.rate_limit_delay_ms))
                            .await;
                    }
                    trail.note(step, reason.to_string());
                }
                Attempt::Failed(message) => {
                    log::warn!(
                        "Attempt {}/{} failed on {} ({:?}): {}",
                        attempt,
                        attempts,
                        domain,
                        step,
                        message
                    );
                    trail.note(step, message);
                }
            }

            if attempt < attempts {
                tokio::time::sleep(self.config.retry_delay(attempt)).await;
            }
        }

        if request.intent == FetchIntent::Search {
            log::debug!("Search fetch gave up on {}", url);
            return Err(trail.into_error(url));
        }

        // Step (c): mirrors
        if let Some(fetched) = self.try_mirrors(request, high_security, &mut trail).await {
            return Ok(fetched);
        }

        // Step (d): external challenge solver
        if let Some(solver) = &self.solver {
            log::info!("Delegating {} to challenge solver", url);
            match solver.solve(self.transport.as_ref(), url).await {
                Ok(response) => {
                    self.bandwidth.record(response.wire_size());
                    return Ok(Fetched {
                        url: response.final_url,
                        status: response.status,
                        body: response.body,
                        step: LadderStep::ChallengeSolver,
                    });
                }
                Err(e) => {
                    log::warn!("Challenge solver failed for {}: {}", url, e);
                    trail.note(LadderStep::ChallengeSolver, e.to_string());
                }
            }
        }

        // Step (e): headless browser
        if request.traits.browser != BrowserPolicy::Authenticated {
            if let Some(fetched) = self.try_browser(request, false, &mut trail).await {
                return Ok(fetched);
            }
        }

        log::error!(
            "All fetch strategies failed for {} after {} attempts",
            url,
            trail.attempts
        );
        Err(trail.into_error(url))
    }

    async fn attempt(
        &self,
        url: &str,
        headers: HeaderMap,
        route: Route,
        timeout: Duration,
    ) -> Attempt {
        let outbound = OutboundRequest {
            url: url.to_string(),
            headers,
            route,
            timeout,
        };
        let response = match self.transport.get(&outbound).await {
            Ok(response) => response,
            Err(e) => return Attempt::Failed(e.to_string()),
        };
        self.bandwidth.record(response.wire_size());

        match classify(response.status, &response.body) {
            Verdict::Content => Attempt::Content(response),
            Verdict::Blocked(reason) => Attempt::Blocked(reason, response),
            Verdict::Gone(status) => Attempt::Gone(status),
            Verdict::Failed(status) => Attempt::Failed(format!("HTTP {status}")),
        }
    }

    async fn try_mirrors(
        &self,
        request: &FetchRequest,
        high_security: bool,
        trail: &mut Trail,
    ) -> Option<Fetched> {
        let alternates = alternate_urls(&request.url);
        if alternates.is_empty() {
            return None;
        }
        log::info!(
            "Trying {} mirrors for {}",
            alternates.len(),
            request.url
        );

        let route = if high_security && self.config.rotating_proxy_url.is_some() {
            Route::Rotating
        } else {
            Route::Default
        };

        for alt in alternates {
            if !self.health.is_healthy(&alt).await {
                log::debug!("Skipping dead mirror {}", alt);
                continue;
            }
            let mut headers = HeaderProfiles::bypass(&alt);
            if let Some(referer) = &request.referer {
                set_referer(&mut headers, referer);
            }
            match self.attempt(&alt, headers, route, self.config.timeout()).await {
                Attempt::Content(response) => {
                    log::info!("Mirror success: {}", alt);
                    return Some(Fetched {
                        url: response.final_url,
                        status: response.status,
                        body: response.body,
                        step: LadderStep::Mirror,
                    });
                }
                Attempt::Blocked(reason, _) => {
                    log::warn!("Mirror {} blocked: {}", alt, reason);
                    trail.note(LadderStep::Mirror, format!("{alt}: {reason}"));
                }
                Attempt::Gone(status) => {
                    trail.note(LadderStep::Mirror, format!("{alt}: HTTP {status}"));
                }
                Attempt::Failed(message) => {
                    log::debug!("Mirror {} failed: {}", alt, message);
                    trail.note(LadderStep::Mirror, format!("{alt}: {message}"));
                }
            }
        }
        None
    }

    async fn try_browser(
        &self,
        request: &FetchRequest,
        authenticated: bool,
        trail: &mut Trail,
    ) -> Option<Fetched> {
        let renderer = self.renderer.as_ref()?;
        let options = RenderOptions {
            authenticated,
            challenge_wait: request.traits.challenge_wait || request.traits.high_security,
        };
        log::info!(
            "Rendering {} in headless browser{}",
            request.url,
            if authenticated { " (authenticated)" } else { "" }
        );

        match renderer.render(&request.url, &options).await {
            Ok(page) => match classify(200, &page.html) {
                Verdict::Content => Some(Fetched {
                    url: page.url,
                    status: 200,
                    body: page.html,
                    step: LadderStep::Browser,
                }),
                other => {
                    log::warn!("Browser page for {} still blocked: {:?}", request.url, other);
                    trail.note(LadderStep::Browser, format!("{other:?}"));
                    None
                }
            },
            Err(BrowserError::ChallengeBlocked { url }) => {
                log::warn!("Browser could not clear challenge on {}", url);
                trail.note(LadderStep::Browser, "CHALLENGE_BLOCKED");
                None
            }
            Err(e) => {
                log::warn!("Browser fetch failed for {}: {}", request.url, e);
                trail.note(LadderStep::Browser, e.to_string());
                None
            }
        }
    }

    /// Write a blocked body to the debug directory, if one is configured.
    async fn dump_blocked(&self, domain: &str, tag: &str, body: &str) {
        let Some(dir) = &self.config.debug_dump_dir else {
            return;
        };
        if let Err(e) = write_dump(dir, domain, tag, body).await {
            log::debug!("Could not write debug dump for {}: {}", domain, e);
        }
    }
}

async fn write_dump(dir: &Path, domain: &str, tag: &str, body: &str) -> std::io::Result<()> {
    let folder = dir.join(domain.replace(':', "_"));
    tokio::fs::create_dir_all(&folder).await?;
    let name = format!("{}_{}.html", Utc::now().format("%Y%m%d_%H%M%S%3f"), tag);
    tokio::fs::write(folder.join(name), body).await
}
