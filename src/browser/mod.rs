// src/browser/mod.rs

//! Headless browser tier.
//!
//! The fetch ladder only sees the [`PageRenderer`] trait. The Chrome
//! implementation lives behind the `browser` feature; with the feature off,
//! or `browser.enabled = false`, no renderer is built and the ladder simply
//! stops before this step.

pub mod cookies;

#[cfg(feature = "browser")]
pub mod chrome;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::BrowserConfig;

pub use cookies::{SessionCookie, load_cookies};

#[cfg(feature = "browser")]
pub use chrome::ChromeRenderer;

#[derive(Error, Debug, Clone)]
pub enum BrowserError {
    #[error("headless browser is disabled")]
    Disabled,

    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("navigation to {url} timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    /// The challenge marker never went away within the wait budget
    #[error("CHALLENGE_BLOCKED: {url}")]
    ChallengeBlocked { url: String },

    #[error("devtools protocol error: {0}")]
    Protocol(String),
}

/// Per-render switches derived from the site's traits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Use the cookie-seeded context instead of the shared one
    pub authenticated: bool,
    /// Poll until the challenge interstitial clears
    pub challenge_wait: bool,
}

/// A fully rendered page.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// URL after navigation settled
    pub url: String,
    pub title: String,
    pub html: String,
}

/// Renders pages in a real browser engine.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, url: &str, options: &RenderOptions) -> Result<RenderedPage, BrowserError>;

    /// Close the browser; a later render may start it again.
    async fn shutdown(&self);
}

/// Build the configured renderer, if any.
pub async fn build_renderer(config: &BrowserConfig) -> Option<Arc<dyn PageRenderer>> {
    if !config.enabled {
        log::debug!("Headless browser disabled by configuration");
        return None;
    }

    #[cfg(feature = "browser")]
    {
        let cookies = match &config.cookies_file {
            Some(path) => load_cookies(path).await,
            None => Vec::new(),
        };
        Some(Arc::new(ChromeRenderer::new(config.clone(), cookies)))
    }

    #[cfg(not(feature = "browser"))]
    {
        log::warn!("browser.enabled is set but the crate was built without the `browser` feature");
        None
    }
}
