//! Engine configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Fetch ladder, proxies and bandwidth accounting
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Headless browser tier
    #[serde(default)]
    pub browser: BrowserConfig,

    /// On-disk cache locations and TTLs
    #[serde(default)]
    pub cache: CacheConfig,

    /// Chapter download coordinator
    #[serde(default)]
    pub download: DownloadConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Apply deployment overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("PROXY_URL") {
            self.fetch.proxy_url = Some(url);
        }
        if let Some(url) = non_empty("ROTATING_PROXY_URL") {
            self.fetch.rotating_proxy_url = Some(url);
        }
        if let Some(url) = non_empty("FLARESOLVERR_URL") {
            self.fetch.challenge_solver_url = Some(url);
        }
        if let Some(flag) = non_empty("NOVELFETCH_BROWSER") {
            self.browser.enabled = matches!(flag.to_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(dir) = non_empty("NOVELFETCH_DEBUG_DIR") {
            self.fetch.debug_dump_dir = Some(PathBuf::from(dir));
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.fetch.max_attempts == 0 {
            return Err(AppError::validation("fetch.max_attempts must be > 0"));
        }
        if self.fetch.search_attempts == 0 {
            return Err(AppError::validation("fetch.search_attempts must be > 0"));
        }
        if self.fetch.timeout_secs == 0 || self.fetch.search_timeout_secs == 0 {
            return Err(AppError::validation("fetch timeouts must be > 0"));
        }
        for (name, value) in [
            ("fetch.proxy_url", &self.fetch.proxy_url),
            ("fetch.rotating_proxy_url", &self.fetch.rotating_proxy_url),
            ("fetch.challenge_solver_url", &self.fetch.challenge_solver_url),
        ] {
            if let Some(raw) = value {
                url::Url::parse(raw)
                    .map_err(|e| AppError::validation(format!("{name} is not a URL: {e}")))?;
            }
        }
        if self.browser.challenge_max_polls == 0 {
            return Err(AppError::validation(
                "browser.challenge_max_polls must be > 0",
            ));
        }
        if self.cache.root.as_os_str().is_empty() {
            return Err(AppError::validation("cache.root is empty"));
        }
        if self.download.default_concurrency == 0 {
            return Err(AppError::validation(
                "download.default_concurrency must be > 0",
            ));
        }
        if self.download.progress_save_every == 0 {
            return Err(AppError::validation(
                "download.progress_save_every must be > 0",
            ));
        }
        for (name, [min, max]) in [
            ("download.chapter_delay_ms", self.download.chapter_delay_ms),
            ("download.sequential_delay_ms", self.download.sequential_delay_ms),
        ] {
            if min > max {
                return Err(AppError::validation(format!("{name} has min > max")));
            }
        }
        Ok(())
    }
}

/// Fetch ladder behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Header-profile attempts per request before mirrors are tried
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Per-attempt timeout for plain and chapter fetches
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Per-attempt timeout for search pages
    #[serde(default = "defaults::search_timeout")]
    pub search_timeout_secs: u64,

    /// Attempts for search pages
    #[serde(default = "defaults::search_attempts")]
    pub search_attempts: u32,

    /// Base sleep between attempts
    #[serde(default = "defaults::retry_base_delay")]
    pub retry_base_delay_ms: u64,

    /// Extra sleep added per attempt number
    #[serde(default = "defaults::retry_step")]
    pub retry_step_ms: u64,

    /// Additional sleep after an HTTP 429
    #[serde(default = "defaults::rate_limit_delay")]
    pub rate_limit_delay_ms: u64,

    /// Domain substrings that get the rotating proxy on retries
    #[serde(default = "defaults::high_security_domains")]
    pub high_security_domains: Vec<String>,

    /// Outbound proxy for every request
    #[serde(default)]
    pub proxy_url: Option<String>,

    /// Higher-turnover proxy for high-security domains
    #[serde(default)]
    pub rotating_proxy_url: Option<String>,

    /// FlareSolverr-compatible endpoint (`.../v1`)
    #[serde(default)]
    pub challenge_solver_url: Option<String>,

    /// Timeout handed to the challenge solver
    #[serde(default = "defaults::challenge_solver_timeout")]
    pub challenge_solver_timeout_ms: u64,

    /// Monthly proxy bandwidth budget, 0 disables warnings
    #[serde(default = "defaults::monthly_budget")]
    pub monthly_budget_mb: u64,

    /// How long a site health probe stays fresh
    #[serde(default = "defaults::health_ttl")]
    pub health_ttl_secs: u64,

    /// Timeout for a single health probe
    #[serde(default = "defaults::health_timeout")]
    pub health_timeout_secs: u64,

    /// Write blocked bodies here for offline inspection
    #[serde(default)]
    pub debug_dump_dir: Option<PathBuf>,
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search_timeout_secs)
    }

    /// Sleep after a failed attempt (1-based): base + attempt * step.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms + u64::from(attempt) * self.retry_step_ms)
    }

    pub fn monthly_budget_bytes(&self) -> u64 {
        self.monthly_budget_mb * 1_048_576
    }

    pub fn is_high_security(&self, domain: &str) -> bool {
        let domain = domain.to_lowercase();
        self.high_security_domains
            .iter()
            .any(|pattern| domain.contains(pattern.as_str()))
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::max_attempts(),
            timeout_secs: defaults::timeout(),
            search_timeout_secs: defaults::search_timeout(),
            search_attempts: defaults::search_attempts(),
            retry_base_delay_ms: defaults::retry_base_delay(),
            retry_step_ms: defaults::retry_step(),
            rate_limit_delay_ms: defaults::rate_limit_delay(),
            high_security_domains: defaults::high_security_domains(),
            proxy_url: None,
            rotating_proxy_url: None,
            challenge_solver_url: None,
            challenge_solver_timeout_ms: defaults::challenge_solver_timeout(),
            monthly_budget_mb: defaults::monthly_budget(),
            health_ttl_secs: defaults::health_ttl(),
            health_timeout_secs: defaults::health_timeout(),
            debug_dump_dir: None,
        }
    }
}

/// Headless browser tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Master switch; some hosts cannot run Chrome at all
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "defaults::headless")]
    pub headless: bool,

    /// Explicit Chrome/Chromium executable
    #[serde(default)]
    pub executable: Option<PathBuf>,

    /// Session cookies for the authenticated context
    #[serde(default)]
    pub cookies_file: Option<PathBuf>,

    #[serde(default = "defaults::navigation_timeout")]
    pub navigation_timeout_secs: u64,

    /// Sleep between challenge checks
    #[serde(default = "defaults::challenge_poll")]
    pub challenge_poll_ms: u64,

    #[serde(default = "defaults::challenge_max_polls")]
    pub challenge_max_polls: u32,

    /// Hard cap on the whole challenge wait loop
    #[serde(default = "defaults::challenge_timeout")]
    pub challenge_timeout_secs: u64,

    /// Abort image, font, stylesheet and media requests
    #[serde(default = "defaults::block_resources")]
    pub block_resources: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            headless: defaults::headless(),
            executable: None,
            cookies_file: None,
            navigation_timeout_secs: defaults::navigation_timeout(),
            challenge_poll_ms: defaults::challenge_poll(),
            challenge_max_polls: defaults::challenge_max_polls(),
            challenge_timeout_secs: defaults::challenge_timeout(),
            block_resources: defaults::block_resources(),
        }
    }
}

/// Cache locations and TTLs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "defaults::cache_root")]
    pub root: PathBuf,

    #[serde(default = "defaults::search_ttl")]
    pub search_ttl_secs: u64,

    #[serde(default = "defaults::metadata_ttl")]
    pub metadata_ttl_secs: u64,

    /// Bodies at or below this many characters are never cached
    #[serde(default = "defaults::min_chapter_chars")]
    pub min_chapter_chars: usize,

    /// Progress records older than this are ignored
    #[serde(default = "defaults::progress_ttl")]
    pub progress_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: defaults::cache_root(),
            search_ttl_secs: defaults::search_ttl(),
            metadata_ttl_secs: defaults::metadata_ttl(),
            min_chapter_chars: defaults::min_chapter_chars(),
            progress_ttl_secs: defaults::progress_ttl(),
        }
    }
}

/// Download coordinator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Worker count when the caller does not pass one
    #[serde(default = "defaults::default_concurrency")]
    pub default_concurrency: usize,

    /// Persist the progress record every N completions
    #[serde(default = "defaults::progress_save_every")]
    pub progress_save_every: usize,

    /// Random politeness delay before each chapter fetch, `[min, max]`
    #[serde(default = "defaults::chapter_delay")]
    pub chapter_delay_ms: [u64; 2],

    /// Delay range for sites that force sequential downloads
    #[serde(default = "defaults::sequential_delay")]
    pub sequential_delay_ms: [u64; 2],
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            default_concurrency: defaults::default_concurrency(),
            progress_save_every: defaults::progress_save_every(),
            chapter_delay_ms: defaults::chapter_delay(),
            sequential_delay_ms: defaults::sequential_delay(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Fetch defaults
    pub fn max_attempts() -> u32 {
        4
    }
    pub fn timeout() -> u64 {
        15
    }
    pub fn search_timeout() -> u64 {
        10
    }
    pub fn search_attempts() -> u32 {
        2
    }
    pub fn retry_base_delay() -> u64 {
        1000
    }
    pub fn retry_step() -> u64 {
        500
    }
    pub fn rate_limit_delay() -> u64 {
        3000
    }
    pub fn high_security_domains() -> Vec<String> {
        vec![
            "ranobes".into(),
            "novelbin".into(),
            "lightnovelworld".into(),
        ]
    }
    pub fn challenge_solver_timeout() -> u64 {
        60_000
    }
    pub fn monthly_budget() -> u64 {
        10_240
    }
    pub fn health_ttl() -> u64 {
        300
    }
    pub fn health_timeout() -> u64 {
        5
    }

    // Browser defaults
    pub fn headless() -> bool {
        true
    }
    pub fn navigation_timeout() -> u64 {
        30
    }
    pub fn challenge_poll() -> u64 {
        3000
    }
    pub fn challenge_max_polls() -> u32 {
        5
    }
    pub fn challenge_timeout() -> u64 {
        20
    }
    pub fn block_resources() -> bool {
        true
    }

    // Cache defaults
    pub fn cache_root() -> PathBuf {
        PathBuf::from("novel_cache")
    }
    pub fn search_ttl() -> u64 {
        3600
    }
    pub fn metadata_ttl() -> u64 {
        86_400
    }
    pub fn min_chapter_chars() -> usize {
        200
    }
    pub fn progress_ttl() -> u64 {
        7 * 86_400
    }

    // Download defaults
    pub fn default_concurrency() -> usize {
        5
    }
    pub fn progress_save_every() -> usize {
        10
    }
    pub fn chapter_delay() -> [u64; 2] {
        [500, 1500]
    }
    pub fn sequential_delay() -> [u64; 2] {
        [1500, 3000]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fetch.max_attempts, 4);
        assert_eq!(config.cache.search_ttl_secs, 3600);
        assert_eq!(config.cache.metadata_ttl_secs, 86_400);
        assert!(!config.browser.enabled);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [fetch]
            max_attempts = 2
            proxy_url = "http://proxy.local:8080"

            [browser]
            enabled = true
            "#,
        )
        .unwrap();

        assert_eq!(config.fetch.max_attempts, 2);
        assert_eq!(config.fetch.timeout_secs, 15);
        assert_eq!(
            config.fetch.proxy_url.as_deref(),
            Some("http://proxy.local:8080")
        );
        assert!(config.browser.enabled);
        assert_eq!(config.browser.challenge_max_polls, 5);
        assert_eq!(config.download.progress_save_every, 10);
    }

    #[test]
    fn test_retry_delay_grows_with_attempt() {
        let fetch = FetchConfig::default();
        assert_eq!(fetch.retry_delay(1), Duration::from_millis(1500));
        assert_eq!(fetch.retry_delay(2), Duration::from_millis(2000));
    }

    #[test]
    fn test_high_security_matching() {
        let fetch = FetchConfig::default();
        assert!(fetch.is_high_security("ranobes.net"));
        assert!(fetch.is_high_security("www.NovelBin.me"));
        assert!(!fetch.is_high_security("royalroad.com"));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("PROXY_URL", "http://p:1"),
            ("ROTATING_PROXY_URL", ""),
            ("FLARESOLVERR_URL", "http://solver:8191/v1"),
            ("NOVELFETCH_BROWSER", "true"),
        ]);
        let mut config = Config::default();
        config.apply_vars(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.fetch.proxy_url.as_deref(), Some("http://p:1"));
        assert!(config.fetch.rotating_proxy_url.is_none());
        assert_eq!(
            config.fetch.challenge_solver_url.as_deref(),
            Some("http://solver:8191/v1")
        );
        assert!(config.browser.enabled);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.fetch.proxy_url = Some("not a url".into());
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.download.chapter_delay_ms = [2000, 100];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.download.default_concurrency = 0;
        assert!(config.validate().is_err());
    }
}
