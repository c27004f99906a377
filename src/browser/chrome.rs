// src/browser/chrome.rs

//! Chrome-backed renderer over the DevTools protocol.
//!
//! One browser process per renderer, started on first use. Every render
//! holds the single gate permit from page creation to page close, so
//! browser work is serialized no matter how many chapter workers call in.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromeConfig};
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams, EventRequestPaused, FailRequestParams,
};
use chromiumoxide::cdp::browser_protocol::network::{CookieParam, ErrorReason, ResourceType};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::storage::SetCookiesParams;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams,
};
use futures::StreamExt;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;

use super::cookies::SessionCookie;
use super::{BrowserError, PageRenderer, RenderOptions, RenderedPage};
use crate::fetch::block::is_challenge_page;
use crate::fetch::headers::random_user_agent;
use crate::models::BrowserConfig;

const STEALTH_JS: &str = r#"
    Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
    Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5] });
    Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
    window.chrome = { runtime: {} };
"#;

const LAUNCH_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-infobars",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--no-sandbox",
    "--window-size=1920,1080",
    "--disable-extensions",
    "--disable-background-networking",
    "--disable-sync",
    "--no-first-run",
];

/// Resource types aborted at the network layer.
fn is_blocked_resource(kind: &ResourceType) -> bool {
    matches!(
        kind,
        ResourceType::Image | ResourceType::Font | ResourceType::Stylesheet | ResourceType::Media
    )
}

fn protocol(e: impl std::fmt::Display) -> BrowserError {
    BrowserError::Protocol(e.to_string())
}

/// The event loop ends when the DevTools connection drops, e.g. after a crash.
fn handler_gone(handler: &JoinHandle<()>) -> bool {
    handler.is_finished()
}

/// A running browser and the contexts created in it.
struct Session {
    browser: Browser,
    handler: JoinHandle<()>,
    shared: Option<BrowserContextId>,
    authenticated: Option<BrowserContextId>,
}

pub struct ChromeRenderer {
    config: BrowserConfig,
    cookies: Vec<SessionCookie>,
    gate: Semaphore,
    session: Mutex<Option<Session>>,
}

impl ChromeRenderer {
    pub fn new(config: BrowserConfig, cookies: Vec<SessionCookie>) -> Self {
        Self {
            config,
            cookies,
            gate: Semaphore::new(1),
            session: Mutex::new(None),
        }
    }

    async fn launch(&self) -> Result<Session, BrowserError> {
        let mut builder = ChromeConfig::builder().args(LAUNCH_ARGS.iter().copied());
        if !self.config.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &self.config.executable {
            builder = builder.chrome_executable(path);
        }
        let chrome_config = builder.build().map_err(BrowserError::Launch)?;

        let (browser, mut handler) = Browser::launch(chrome_config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;
        let handler = tokio::spawn(async move { while handler.next().await.is_some() {} });

        log::info!("Headless browser started");
        Ok(Session {
            browser,
            handler,
            shared: None,
            authenticated: None,
        })
    }

    /// Open a blank page in the right context, launching lazily.
    ///
    /// A session whose connection is gone, or that fails to open a page, is
    /// dropped so the next call starts a fresh browser.
    async fn open_page(&self, authenticated: bool) -> Result<Page, BrowserError> {
        let mut guard = self.session.lock().await;
        if let Some(dead) = guard.take_if(|s| handler_gone(&s.handler)) {
            log::warn!("Headless browser connection lost, relaunching");
            dead.handler.abort();
        }
        if guard.is_none() {
            *guard = Some(self.launch().await?);
        }
        let session = guard
            .as_mut()
            .ok_or_else(|| BrowserError::Launch("browser session missing".into()))?;

        match self.page_in(session, authenticated).await {
            Ok(page) => Ok(page),
            Err(e) => {
                if let Some(broken) = guard.take() {
                    log::warn!("Discarding headless browser after page failure: {}", e);
                    broken.handler.abort();
                }
                Err(e)
            }
        }
    }

    async fn page_in(&self, session: &mut Session, authenticated: bool) -> Result<Page, BrowserError> {
        let context = if authenticated {
            match &session.authenticated {
                Some(id) => id.clone(),
                None => {
                    let id = session
                        .browser
                        .create_browser_context(CreateBrowserContextParams::default())
                        .await
                        .map_err(protocol)?;
                    self.seed_cookies(&session.browser, &id).await;
                    session.authenticated = Some(id.clone());
                    id
                }
            }
        } else {
            match &session.shared {
                Some(id) => id.clone(),
                None => {
                    let id = session
                        .browser
                        .create_browser_context(CreateBrowserContextParams::default())
                        .await
                        .map_err(protocol)?;
                    session.shared = Some(id.clone());
                    id
                }
            }
        };

        let target = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context)
            .build()
            .map_err(BrowserError::Protocol)?;
        session.browser.new_page(target).await.map_err(protocol)
    }

    async fn seed_cookies(&self, browser: &Browser, context: &BrowserContextId) {
        let cookies: Vec<CookieParam> = self
            .cookies
            .iter()
            .filter_map(|c| {
                CookieParam::builder()
                    .name(c.name.clone())
                    .value(c.value.clone())
                    .domain(c.domain.clone())
                    .path(c.path.clone())
                    .http_only(c.http_only)
                    .secure(c.secure)
                    .build()
                    .ok()
            })
            .collect();
        if cookies.is_empty() {
            log::warn!("Authenticated browser context has no session cookies");
            return;
        }

        let count = cookies.len();
        let params = SetCookiesParams::builder()
            .cookies(cookies)
            .browser_context_id(context.clone())
            .build();
        match params {
            Ok(params) => match browser.execute(params).await {
                Ok(_) => log::info!("Seeded {} cookies into authenticated context", count),
                Err(e) => log::warn!("Failed to seed cookies: {}", e),
            },
            Err(e) => log::warn!("Invalid cookie parameters: {}", e),
        }
    }

    /// Abort images, fonts, stylesheets and media for this page.
    async fn intercept_resources(&self, page: &Page) -> Result<Option<JoinHandle<()>>, BrowserError> {
        if !self.config.block_resources {
            return Ok(None);
        }
        let mut events = page
            .event_listener::<EventRequestPaused>()
            .await
            .map_err(protocol)?;
        page.execute(EnableParams::default()).await.map_err(protocol)?;

        let page = page.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let outcome = if is_blocked_resource(&event.resource_type) {
                    page.execute(FailRequestParams::new(
                        event.request_id.clone(),
                        ErrorReason::BlockedByClient,
                    ))
                    .await
                    .map(|_| ())
                } else {
                    page.execute(ContinueRequestParams::new(event.request_id.clone()))
                        .await
                        .map(|_| ())
                };
                if let Err(e) = outcome {
                    log::debug!("Request interception failed: {}", e);
                }
            }
        });
        Ok(Some(task))
    }

    /// Poll title and content until the challenge marker disappears.
    async fn wait_out_challenge(&self, page: &Page, url: &str) -> Result<(), BrowserError> {
        let poll = Duration::from_millis(self.config.challenge_poll_ms);
        let budget = Duration::from_secs(self.config.challenge_timeout_secs);

        let wait = async {
            for round in 0..self.config.challenge_max_polls {
                let title = page.get_title().await.ok().flatten().unwrap_or_default();
                let html = page.content().await.unwrap_or_default();
                if !is_challenge_page(&title, &html) {
                    if round > 0 {
                        log::info!("Challenge cleared on {} after {} polls", url, round);
                    }
                    return true;
                }
                log::debug!("Challenge still present on {} (poll {})", url, round + 1);
                tokio::time::sleep(poll).await;
            }
            false
        };

        match tokio::time::timeout(budget, wait).await {
            Ok(true) => Ok(()),
            _ => Err(BrowserError::ChallengeBlocked {
                url: url.to_string(),
            }),
        }
    }

    async fn render_in(
        &self,
        page: &Page,
        url: &str,
        options: &RenderOptions,
    ) -> Result<RenderedPage, BrowserError> {
        if let Err(e) = page
            .execute(AddScriptToEvaluateOnNewDocumentParams::new(STEALTH_JS))
            .await
        {
            log::debug!("Stealth script injection failed: {}", e);
        }
        if let Err(e) = page.set_user_agent(random_user_agent()).await {
            log::debug!("User-Agent override failed: {}", e);
        }

        let secs = self.config.navigation_timeout_secs;
        match tokio::time::timeout(Duration::from_secs(secs), page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                return Err(BrowserError::Navigation {
                    url: url.to_string(),
                    message: e.to_string(),
                });
            }
            Err(_) => {
                return Err(BrowserError::Timeout {
                    url: url.to_string(),
                    secs,
                });
            }
        }

        if options.challenge_wait {
            self.wait_out_challenge(page, url).await?;
        }

        let html = page.content().await.map_err(protocol)?;
        let title = page.get_title().await.ok().flatten().unwrap_or_default();
        let final_url = page
            .url()
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| url.to_string());

        Ok(RenderedPage {
            url: final_url,
            title,
            html,
        })
    }
}

#[async_trait]
impl PageRenderer for ChromeRenderer {
    async fn render(&self, url: &str, options: &RenderOptions) -> Result<RenderedPage, BrowserError> {
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| BrowserError::Launch("browser gate closed".into()))?;

        let page = self.open_page(options.authenticated).await?;
        let interceptor = match self.intercept_resources(&page).await {
            Ok(task) => task,
            Err(e) => {
                log::debug!("Resource blocking unavailable: {}", e);
                None
            }
        };

        let result = self.render_in(&page, url, options).await;

        if let Some(task) = interceptor {
            task.abort();
        }
        if let Err(e) = page.close().await {
            log::debug!("Failed to close page for {}: {}", url, e);
        }
        result
    }

    async fn shutdown(&self) {
        let mut guard = self.session.lock().await;
        if let Some(mut session) = guard.take() {
            if let Err(e) = session.browser.close().await {
                log::warn!("Browser close failed: {}", e);
            }
            session.handler.abort();
            log::info!("Headless browser closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocked_resource_types() {
        assert!(is_blocked_resource(&ResourceType::Image));
        assert!(is_blocked_resource(&ResourceType::Font));
        assert!(is_blocked_resource(&ResourceType::Stylesheet));
        assert!(is_blocked_resource(&ResourceType::Media));
        assert!(!is_blocked_resource(&ResourceType::Document));
        assert!(!is_blocked_resource(&ResourceType::Script));
    }

    #[tokio::test]
    async fn test_finished_event_loop_marks_session_dead() {
        let done = tokio::spawn(async {});
        while !done.is_finished() {
            tokio::task::yield_now().await;
        }
        assert!(handler_gone(&done));

        let running = tokio::spawn(std::future::pending::<()>());
        assert!(!handler_gone(&running));
        running.abort();
    }

    #[tokio::test]
    async fn test_failed_launch_keeps_no_session() {
        let config = BrowserConfig {
            executable: Some("/nonexistent/chrome".into()),
            ..BrowserConfig::default()
        };
        let renderer = ChromeRenderer::new(config, Vec::new());
        for _ in 0..2 {
            let Err(err) = renderer.open_page(false).await else {
                panic!("launch should fail without a Chrome binary");
            };
            assert!(matches!(err, BrowserError::Launch(_)));
            assert!(renderer.session.lock().await.is_none());
        }
    }

    #[tokio::test]
    async fn test_shutdown_before_launch_is_noop() {
        let renderer = ChromeRenderer::new(BrowserConfig::default(), Vec::new());
        renderer.shutdown().await;
        assert!(renderer.session.lock().await.is_none());
    }
}
