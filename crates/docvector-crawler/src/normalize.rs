//! URL canonicalisation (spec §4.1), grounded in the teacher's
//! `WebCrawlerRetriever::normalize_url` (strip fragment, drop tracking
//! query params) and extended with the scheme/extension rejection and
//! trailing-slash rules the crawler needs.

use url::Url;

const BINARY_EXTENSIONS: &[&str] = &[
    ".pdf", ".png", ".jpg", ".jpeg", ".gif", ".svg", ".css", ".js", ".ico", ".woff", ".woff2",
    ".ttf", ".eot",
];

/// Canonicalise a URL: force scheme+host+path, strip the fragment, strip a
/// trailing slash (except on the root path), and keep the query string.
/// Returns `None` for non-HTTP(S) schemes or well-known binary extensions —
/// callers treat that as "do not crawl".
pub fn normalize_url(raw: &str) -> Option<String> {
    let mut parsed = Url::parse(raw).ok()?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return None;
    }

    parsed.set_fragment(None);

    let path = parsed.path().to_ascii_lowercase();
    if BINARY_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
        return None;
    }

    if parsed.path().len() > 1 && parsed.path().ends_with('/') {
        let trimmed = parsed.path().trim_end_matches('/').to_string();
        parsed.set_path(&trimmed);
    }

    Some(parsed.to_string())
}

/// The registrable host, used for the allowed-domain check.
pub fn host_of(url: &str) -> Option<String> {
    Url::parse(url).ok()?.host_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fragment() {
        let normalized = normalize_url("https://docs.example.com/guide#section-2").unwrap();
        assert_eq!(normalized, "https://docs.example.com/guide");
    }

    #[test]
    fn strips_trailing_slash_except_root() {
        assert_eq!(
            normalize_url("https://docs.example.com/guide/").unwrap(),
            "https://docs.example.com/guide"
        );
        assert_eq!(
            normalize_url("https://docs.example.com/").unwrap(),
            "https://docs.example.com/"
        );
    }

    #[test]
    fn preserves_query_string() {
        let normalized = normalize_url("https://docs.example.com/search?q=rust&page=2").unwrap();
        assert_eq!(normalized, "https://docs.example.com/search?q=rust&page=2");
    }

    #[test]
    fn rejects_non_http_schemes() {
        assert!(normalize_url("ftp://example.com/file").is_none());
        assert!(normalize_url("mailto:a@b.com").is_none());
    }

    #[test]
    fn rejects_binary_extensions() {
        assert!(normalize_url("https://example.com/logo.PNG").is_none());
        assert!(normalize_url("https://example.com/bundle.js").is_none());
    }

    #[test]
    fn is_idempotent() {
        let once = normalize_url("https://docs.example.com/guide/?x=1#frag").unwrap();
        let twice = normalize_url(&once).unwrap();
        assert_eq!(once, twice);
    }
}
