//! Search hits and their cross-site grouping.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static ID_PREFIX: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"^\d+-").ok());
static ID_SUFFIX: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"-\d+$").ok());

/// One hit from one site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub source_site: String,
}

/// The same work found on one or more sites.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NovelCandidate {
    /// Grouping key derived from the URL slug
    pub normalized_title: String,
    /// Display title from the first source
    pub title: String,
    pub sources: Vec<SearchResult>,
}

/// Grouping key for a novel URL, built from its path slug.
///
/// `/novels/1234-the-wandering-sword.html` and `/b/the-wandering-sword`
/// both give `thewanderingsword`.
pub fn slug_key(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed
        .path_segments()?
        .filter(|s| !s.is_empty())
        .next_back()?
        .to_lowercase();

    let mut slug = segment
        .trim_end_matches(".html")
        .trim_end_matches(".htm")
        .to_string();
    for pattern in [&ID_PREFIX, &ID_SUFFIX] {
        if let Some(re) = pattern.as_ref() {
            slug = re.replace(&slug, "").into_owned();
        }
    }

    let key: String = slug.chars().filter(|c| c.is_alphanumeric()).collect();
    (!key.is_empty()).then_some(key)
}
