//! Classification of responses into content, block pages and failures.

use std::fmt;

/// Markers of anti-bot interstitials, matched against the head of the body.
const CHALLENGE_SIGNATURES: &[&str] = &[
    "checking your browser",
    "cf-browser-verification",
    "attention required! | cloudflare",
    "enable javascript and cookies to continue",
    "abnormal activity",
    "dear visitor",
];

/// Markers that must never appear near the start of an extracted chapter body.
const BODY_BLOCK_SIGNATURES: &[&str] = &[
    "rate limited",
    "abnormal activity",
    "checking your browser",
    "cf-browser-verification",
    "enable javascript and cookies",
];

/// Titles shown while a challenge is being evaluated in a real browser.
const CHALLENGE_TITLES: &[&str] = &[
    "just a moment",
    "checking your browser",
    "checking if the site connection is secure",
    "attention required",
    "please wait...",
];

const SAMPLE_CHARS: usize = 800;

/// Why a response was treated as an anti-bot block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockReason {
    Status(u16),
    Signature(&'static str),
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(status) => write!(f, "HTTP {status}"),
            Self::Signature(sig) => write!(f, "signature '{sig}'"),
        }
    }
}

/// Outcome of inspecting one HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Content,
    Blocked(BlockReason),
    /// Resource does not exist; escalation cannot help
    Gone(u16),
    /// Any other non-success status, retried
    Failed(u16),
}

fn sample(body: &str) -> String {
    body.chars().take(SAMPLE_CHARS).collect::<String>().to_lowercase()
}

/// Lowercased `<title>` text, if the sample holds a complete one.
fn title_text(head: &str) -> Option<&str> {
    let open = head.find("<title")?;
    let start = open + head[open..].find('>')? + 1;
    let len = head[start..].find("</title")?;
    Some(head[start..start + len].trim())
}

/// First challenge signature found in the head of an HTML body.
///
/// Interstitial titles only count inside `<title>`, since chapter prose can
/// quote them.
pub fn challenge_signature(body: &str) -> Option<&'static str> {
    let head = sample(body);
    if let Some(title) = title_text(&head) {
        if let Some(sig) = CHALLENGE_TITLES.iter().find(|marker| title.contains(*marker)) {
            return Some(*sig);
        }
    }
    if let Some(sig) = CHALLENGE_SIGNATURES.iter().find(|sig| head.contains(*sig)) {
        return Some(*sig);
    }
    if head.contains("cloudflare") && head.contains("challenge") {
        return Some("cloudflare challenge");
    }
    None
}

/// Classify a response by status first, then by body signature.
pub fn classify(status: u16, body: &str) -> Verdict {
    match status {
        403 | 429 | 503 => Verdict::Blocked(BlockReason::Status(status)),
        404 | 410 => Verdict::Gone(status),
        200..=299 => match challenge_signature(body) {
            Some(sig) => Verdict::Blocked(BlockReason::Signature(sig)),
            None => Verdict::Content,
        },
        _ => Verdict::Failed(status),
    }
}

/// Block-page marker in already-extracted chapter text.
pub fn body_block_signature(text: &str) -> Option<&'static str> {
    let head = sample(text);
    BODY_BLOCK_SIGNATURES
        .iter()
        .find(|sig| head.contains(*sig))
        .copied()
}

/// Whether a rendered page still shows a challenge.
pub fn is_challenge_page(title: &str, html: &str) -> bool {
    let title = title.to_lowercase();
    CHALLENGE_TITLES.iter().any(|marker| title.contains(marker))
        || challenge_signature(html).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocking_statuses() {
        assert_eq!(
            classify(403, "<html>ok</html>"),
            Verdict::Blocked(BlockReason::Status(403))
        );
        assert_eq!(
            classify(429, ""),
            Verdict::Blocked(BlockReason::Status(429))
        );
        assert_eq!(
            classify(503, ""),
            Verdict::Blocked(BlockReason::Status(503))
        );
    }

    #[test]
    fn test_challenge_on_200_is_blocked() {
        let body = "<html><head><title>Just a moment...</title></head></html>";
        assert_eq!(
            classify(200, body),
            Verdict::Blocked(BlockReason::Signature("just a moment"))
        );

        let body = "<p>We detected abnormal activity from your network</p>";
        assert!(matches!(classify(200, body), Verdict::Blocked(_)));
    }

    #[test]
    fn test_plain_content_and_failures() {
        assert_eq!(classify(200, "<p>Chapter text</p>"), Verdict::Content);
        assert_eq!(classify(404, ""), Verdict::Gone(404));
        assert_eq!(classify(500, ""), Verdict::Failed(500));
    }

    #[test]
    fn test_signature_only_checked_near_top() {
        let body = format!("{}checking your browser", "x".repeat(2000));
        assert_eq!(classify(200, &body), Verdict::Content);
    }

    #[test]
    fn test_quoted_interstitial_text_in_prose_is_content() {
        let body = r#"<html><head><title>Chapter 3 - The Fool</title></head>
            <body><p>"Just a moment..." Klein said, and the access denied sign flickered.</p></body></html>"#;
        assert_eq!(classify(200, body), Verdict::Content);
        assert_eq!(
            body_block_signature(r#""Just a moment..." Klein said. Access denied, read the door."#),
            None
        );
    }

    #[test]
    fn test_body_block_signature() {
        assert_eq!(body_block_signature("Rate limited"), Some("rate limited"));
        assert_eq!(body_block_signature("He waited. Then he left."), None);
    }

    #[test]
    fn test_challenge_page_by_title() {
        assert!(is_challenge_page("Just a moment...", "<html></html>"));
        assert!(!is_challenge_page("Chapter 1 - Novel", "<p>text</p>"));
    }
}
