//! Session cookie files for the authenticated browser context.
//!
//! The file is a JSON array in the format browser cookie exporters write:
//!
//! ```json
//! [{"name": "sid", "value": "...", "domain": ".webnovel.com", "path": "/",
//!   "expires": 1767225600, "httpOnly": true, "secure": true}]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default = "root_path")]
    pub path: String,
    /// Seconds since the epoch; absent for session cookies
    #[serde(default)]
    pub expires: Option<f64>,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
}

fn root_path() -> String {
    "/".to_string()
}

impl SessionCookie {
    pub fn is_expired(&self, now_secs: f64) -> bool {
        matches!(self.expires, Some(exp) if exp > 0.0 && exp < now_secs)
    }
}

/// Load cookies from disk, dropping expired ones.
///
/// A missing or unreadable file yields an empty list so the browser still
/// starts, just without a logged-in session.
pub async fn load_cookies(path: &Path) -> Vec<SessionCookie> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) => {
            log::warn!("Could not read cookie file {}: {}", path.display(), e);
            return Vec::new();
        }
    };

    let cookies: Vec<SessionCookie> = match serde_json::from_str(&content) {
        Ok(cookies) => cookies,
        Err(e) => {
            log::warn!("Invalid cookie file {}: {}", path.display(), e);
            return Vec::new();
        }
    };

    let now = chrono::Utc::now().timestamp() as f64;
    let total = cookies.len();
    let live: Vec<_> = cookies.into_iter().filter(|c| !c.is_expired(now)).collect();
    if live.len() < total {
        log::info!("Dropped {} expired cookies", total - live.len());
    }
    log::info!("Loaded {} session cookies from {}", live.len(), path.display());
    live
}
