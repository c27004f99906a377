//! Utility functions and helpers.

pub mod hash;

use url::Url;

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Resolve a URL string against a base URL string.
pub fn resolve(base_url: &str, href: &str) -> Option<String> {
    Url::parse(base_url)
        .ok()
        .map(|base| resolve_url(&base, href))
}

/// Extract the lowercase host from a URL string.
pub fn get_domain(url_str: &str) -> Option<String> {
    Url::parse(url_str)
        .ok()
        .and_then(|u| u.host_str().map(|s| s.to_lowercase()))
}

/// Scheme and host of a URL, e.g. `https://novelbin.me`.
pub fn origin(url_str: &str) -> Option<String> {
    let parsed = Url::parse(url_str).ok()?;
    let host = parsed.host_str()?;
    Some(format!("{}://{}", parsed.scheme(), host))
}

/// Path component of a URL without query or fragment.
pub fn url_path(url_str: &str) -> Option<String> {
    Url::parse(url_str).ok().map(|u| u.path().to_string())
}

/// Whether the input looks like an absolute http(s) URL rather than a search query.
pub fn is_http_url(input: &str) -> bool {
    Url::parse(input.trim())
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_url() {
        let base = Url::parse("https://example.com/path/").unwrap();
        assert_eq!(
            resolve_url(&base, "page.html"),
            "https://example.com/path/page.html"
        );
        assert_eq!(
            resolve_url(&base, "/root.html"),
            "https://example.com/root.html"
        );
        assert_eq!(
            resolve_url(&base, "https://other.com/x"),
            "https://other.com/x"
        );
    }

    #[test]
    fn test_get_domain() {
        assert_eq!(
            get_domain("https://Example.com/path"),
            Some("example.com".to_string())
        );
        assert_eq!(
            get_domain("https://sub.example.com:8080/path"),
            Some("sub.example.com".to_string())
        );
        assert_eq!(get_domain("nonsense"), None);
    }

    #[test]
    fn test_origin_and_path() {
        assert_eq!(
            origin("https://novelbin.me/b/foo?x=1").as_deref(),
            Some("https://novelbin.me")
        );
        assert_eq!(
            url_path("https://novelbin.me/b/foo?x=1").as_deref(),
            Some("/b/foo")
        );
    }

    #[test]
    fn test_is_http_url() {
        assert!(is_http_url("https://novelbin.me/b/foo"));
        assert!(!is_http_url("shadow slave"));
        assert!(!is_http_url("ftp://host/file"));
    }
}
