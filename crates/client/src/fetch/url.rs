//! URL discovery, canonicalization and cache-key normalization.

use std::sync::LazyLock;

use regex::Regex;
use url::{Host, Position, Url};

/// Error type for URL canonicalization failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// `http(s)://` up to whitespace or a CJK ideograph.
static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://[^\s\x{4e00}-\x{9fff}]+").unwrap_or_else(|e| unreachable!("static pattern: {e}"))
});

/// Punctuation that ends a sentence rather than a URL.
const TRAILING_PUNCTUATION: &[char] =
    &['.', ',', ';', ':', '!', '?', ')', ']', '}', '>', '"', '\'', '，', '。', '；', '：', '！', '？', '）', '」', '』'];

/// Find `http://` and `https://` URLs in free text, in order of appearance.
pub fn extract_urls(text: &str) -> Vec<String> {
    URL_PATTERN
        .find_iter(text)
        .map(|m| m.as_str().trim_end_matches(TRAILING_PUNCTUATION))
        .filter(|url| url.len() > "https://".len())
        .map(str::to_string)
        .collect()
}

/// Whether `url` parses as an absolute http(s) URL with a host.
pub fn is_valid_url(url: &str) -> bool {
    Url::parse(url)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some_and(|h| !h.is_empty()))
        .unwrap_or(false)
}

/// Canonicalize a URL string for consistent caching and safety checks.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Default scheme to https:// if missing
/// 3. Lowercase the host
/// 4. Remove fragment (#...)
/// 5. Keep query string intact (do not reorder)
pub fn canonicalize(input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let url_str = if trimmed.contains("://") { trimmed.to_string() } else { format!("https://{trimmed}") };

    let mut parsed = Url::parse(&url_str).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if let Some(host) = parsed.host_str() {
        let host = host.to_lowercase();
        parsed
            .set_host(Some(&host))
            .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

/// Cache key for a URL.
///
/// On top of [`canonicalize`], trailing slashes are removed from the path
/// and, with `unify_www`, leading `www.` labels are dropped from domain hosts
/// (never from IP addresses, and never down to a bare TLD). Applying it
/// twice gives the same key.
pub fn normalize(input: &str, unify_www: bool) -> Result<String, UrlError> {
    let mut parsed = canonicalize(input)?;

    if unify_www {
        let bare = match parsed.host() {
            Some(Host::Domain(host)) => {
                let mut bare = host;
                while let Some(rest) = bare.strip_prefix("www.").filter(|b| b.contains('.')) {
                    bare = rest;
                }
                (bare != host).then(|| bare.to_string())
            }
            _ => None,
        };
        if let Some(bare) = bare {
            parsed
                .set_host(Some(&bare))
                .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
        }
    }

    let mut key = parsed[..Position::BeforePath].to_string();
    key.push_str(parsed.path().trim_end_matches('/'));
    if let Some(query) = parsed.query() {
        key.push('?');
        key.push_str(query);
    }

    Ok(key)
}
