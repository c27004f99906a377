//! Browser-like request header profiles.
//!
//! The stable profile keeps one User-Agent for the whole session. The bypass
//! profile picks a fresh agent each call and spoofs same-origin navigation.

use rand::seq::SliceRandom;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

/// Desktop and mobile agents of current browsers.
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/129.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_2) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_2) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14.2; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36 Edg/131.0.0.0",
    "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Mobile Safari/537.36",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_2 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Mobile/15E148 Safari/604.1",
];

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8";
const SEC_CH_UA: &str = "\"Chromium\";v=\"131\", \"Not_A Brand\";v=\"24\"";

/// Pick a random User-Agent from the pool.
pub fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

fn insert(headers: &mut HeaderMap, name: &'static str, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(HeaderName::from_static(name), value);
    }
}

/// Set or replace the Referer of a prepared header map.
pub fn set_referer(headers: &mut HeaderMap, referer: &str) {
    insert(headers, "referer", referer);
}

/// Header profiles for one fetch session.
#[derive(Debug, Clone)]
pub struct HeaderProfiles {
    session_agent: &'static str,
}

impl Default for HeaderProfiles {
    fn default() -> Self {
        Self::new()
    }
}

impl HeaderProfiles {
    /// New session with a randomly chosen, then fixed, User-Agent.
    pub fn new() -> Self {
        Self {
            session_agent: random_user_agent(),
        }
    }

    pub fn with_agent(agent: &'static str) -> Self {
        Self {
            session_agent: agent,
        }
    }

    pub fn session_agent(&self) -> &'static str {
        self.session_agent
    }

    /// Consistent per-session headers for the first attempt.
    pub fn stable(&self, url: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        insert(&mut headers, "user-agent", self.session_agent);
        insert(&mut headers, "accept", ACCEPT_HTML);
        insert(&mut headers, "accept-language", "en-US,en;q=0.9");
        insert(&mut headers, "upgrade-insecure-requests", "1");
        insert(&mut headers, "sec-fetch-dest", "document");
        insert(&mut headers, "sec-fetch-mode", "navigate");
        insert(&mut headers, "sec-fetch-site", "none");
        insert(&mut headers, "sec-fetch-user", "?1");
        insert(&mut headers, "cache-control", "max-age=0");
        insert(&mut headers, "sec-ch-ua", SEC_CH_UA);
        insert(&mut headers, "sec-ch-ua-mobile", "?0");
        insert(&mut headers, "sec-ch-ua-platform", "\"Windows\"");
        if let Some(origin) = crate::utils::origin(url) {
            insert(&mut headers, "referer", &format!("{origin}/"));
            insert(&mut headers, "origin", &origin);
        }
        headers
    }

    /// Fresh randomized profile for retries against challenge pages.
    pub fn bypass(url: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        insert(&mut headers, "user-agent", random_user_agent());
        insert(&mut headers, "accept", ACCEPT_HTML);
        insert(&mut headers, "accept-language", "en-US,en;q=0.9");
        insert(&mut headers, "upgrade-insecure-requests", "1");
        insert(&mut headers, "sec-fetch-dest", "document");
        insert(&mut headers, "sec-fetch-mode", "navigate");
        insert(&mut headers, "sec-fetch-site", "same-origin");
        insert(&mut headers, "sec-fetch-user", "?1");
        insert(&mut headers, "cache-control", "no-cache");
        insert(&mut headers, "pragma", "no-cache");
        insert(&mut headers, "sec-ch-ua", SEC_CH_UA);
        insert(&mut headers, "sec-ch-ua-mobile", "?0");
        insert(&mut headers, "sec-ch-ua-platform", "\"Windows\"");
        insert(&mut headers, "dnt", "1");
        if let Some(origin) = crate::utils::origin(url) {
            insert(&mut headers, "referer", &format!("{origin}/"));
            insert(&mut headers, "origin", &origin);
        }
        headers
    }
}
