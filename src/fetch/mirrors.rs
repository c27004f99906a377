//! Alternate domains serving the same catalogue.

use url::Url;

/// Mirror families in preference order.
const SITE_MIRRORS: &[(&str, &[&str])] = &[
    (
        "novelbin",
        &[
            "novelbin.me",
            "novelbin.com",
            "novelbin.cfd",
            "novelbin.net",
            "novelbin.org",
            "novelbin.cc",
            "novelbin.tv",
        ],
    ),
    (
        "lightnovelworld",
        &["lightnovelworld.com", "lightnovelworld.co", "lnworld.com"],
    ),
    (
        "freewebnovel",
        &["freewebnovel.com", "freewebnovel.me", "freewebnovel.net"],
    ),
    (
        "novelfire",
        &["novelfire.net", "novelfire.com", "novelfire.org"],
    ),
];

/// Family key for a domain, e.g. `novelbin` for `www.novelbin.me`.
pub fn mirror_family(domain: &str) -> Option<&'static str> {
    let domain = domain.to_lowercase();
    SITE_MIRRORS
        .iter()
        .find(|(key, _)| domain.contains(key))
        .map(|(key, _)| *key)
}

/// The same URL on every other mirror of its family, in preference order.
pub fn alternate_urls(url: &str) -> Vec<String> {
    let Ok(parsed) = Url::parse(url) else {
        return Vec::new();
    };
    let Some(host) = parsed.host_str().map(str::to_lowercase) else {
        return Vec::new();
    };
    let bare_host = host.trim_start_matches("www.");

    let Some((_, mirrors)) = SITE_MIRRORS.iter().find(|(key, _)| host.contains(key)) else {
        return Vec::new();
    };

    mirrors
        .iter()
        .filter(|mirror| **mirror != bare_host)
        .filter_map(|mirror| {
            let mut alt = parsed.clone();
            alt.set_host(Some(mirror)).ok()?;
            Some(alt.to_string())
        })
        .collect()
}
