//! Short-lived liveness cache for sites and mirrors.
//!
//! An entry older than the TTL, or no entry at all, means "probe now".

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::transport::Transport;
use crate::utils::{get_domain, origin};

/// Result of the last probe against a domain.
#[derive(Debug, Clone, Serialize)]
pub struct SiteHealthEntry {
    pub domain: String,
    pub healthy: bool,
    pub checked_at: DateTime<Utc>,
}

impl SiteHealthEntry {
    fn is_fresh(&self, ttl: chrono::Duration, now: DateTime<Utc>) -> bool {
        now - self.checked_at < ttl
    }
}

/// Probes sites with HEAD requests and remembers the answer for a while.
pub struct SiteHealthMonitor {
    transport: Arc<dyn Transport>,
    ttl: chrono::Duration,
    timeout: Duration,
    entries: Mutex<HashMap<String, SiteHealthEntry>>,
}

impl SiteHealthMonitor {
    pub fn new(transport: Arc<dyn Transport>, ttl: Duration, timeout: Duration) -> Self {
        Self {
            transport,
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::minutes(5)),
            timeout,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Fresh cached entry for a domain, if any.
    pub fn cached(&self, domain: &str) -> Option<SiteHealthEntry> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .get(domain)
            .filter(|entry| entry.is_fresh(self.ttl, Utc::now()))
            .cloned()
    }

    /// Whether the site behind `url` answers with a status below 400.
    pub async fn is_healthy(&self, url: &str) -> bool {
        let Some(domain) = get_domain(url) else {
            return false;
        };
        if let Some(entry) = self.cached(&domain) {
            return entry.healthy;
        }

        let probe_url = origin(url).map(|o| format!("{o}/")).unwrap_or_else(|| url.to_string());
        let healthy = match self.transport.head(&probe_url, self.timeout).await {
            Ok(status) => status < 400,
            Err(e) => {
                log::debug!("Health probe failed for {}: {}", domain, e);
                false
            }
        };
        if !healthy {
            log::info!("Site {} appears down, skipping", domain);
        }

        self.record(&domain, healthy);
        healthy
    }

    /// Store a probe result observed elsewhere.
    pub fn record(&self, domain: &str, healthy: bool) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            domain.to_string(),
            SiteHealthEntry {
                domain: domain.to_string(),
                healthy,
                checked_at: Utc::now(),
            },
        );
    }

    #[cfg(test)]
    fn backdate(&self, domain: &str, age: chrono::Duration) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = entries.get_mut(domain) {
            entry.checked_at = entry.checked_at - age;
        }
    }
}
