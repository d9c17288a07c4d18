//! Link and image harvesting with URL resolution.

use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

use linkdigest_core::SectionLink;

/// Extract links from a parsed document, resolving relative URLs against the base URL.
///
/// This extracts all `<a>` tags with href attributes, resolves relative URLs,
/// skips non-http targets (`mailto:`, `javascript:`) and removes duplicates
/// (by resolved URL).
pub fn extract_links(document: &Html, base_url: &Url, selector: &Selector) -> Vec<SectionLink> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };

        let Some(resolved) = resolve_http(base_url, href) else {
            continue;
        };

        if !seen.insert(resolved.clone()) {
            continue;
        }

        let text = element.text().collect::<Vec<_>>().join(" ").trim().to_string();
        let text = if text.is_empty() { "[link]".to_string() } else { text };

        links.push(SectionLink { text, url: resolved });
    }

    links
}

/// Resolved `src` of every `<img>`, deduplicated, in document order.
pub fn extract_images(document: &Html, base_url: &Url, selector: &Selector) -> Vec<String> {
    let mut seen = HashSet::new();
    document
        .select(selector)
        .filter_map(|img| img.value().attr("src"))
        .filter_map(|src| resolve_http(base_url, src))
        .filter(|src| seen.insert(src.clone()))
        .collect()
}

fn resolve_http(base_url: &Url, href: &str) -> Option<String> {
    let resolved = base_url.join(href.trim()).ok()?;
    matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn links(html: &str, base: &str) -> Vec<SectionLink> {
        let document = Html::parse_document(html);
        let selector = Selector::parse("a[href]").unwrap();
        extract_links(&document, &Url::parse(base).unwrap(), &selector)
    }

    #[test]
    fn test_extract_links_relative() {
        let html = r#"
            <html>
                <body>
                    <a href="/about">About</a>
                    <a href="contact">Contact</a>
                </body>
            </html>
        "#;

        let found = links(html, "https://example.com/path/");

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].text, "About");
        assert_eq!(found[0].url, "https://example.com/about");
        assert_eq!(found[1].text, "Contact");
        assert_eq!(found[1].url, "https://example.com/path/contact");
    }

    #[test]
    fn test_extract_links_duplicate() {
        let html = r#"
            <a href="https://example.com">First</a>
            <a href="https://example.com">Second</a>
        "#;

        let found = links(html, "https://example.com");

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].text, "First");
    }

    #[test]
    fn test_extract_links_empty_text_and_non_http() {
        let html = r#"
            <a href="https://example.com"></a>
            <a href="mailto:someone@example.com">Mail</a>
            <a href="javascript:void(0)">Click</a>
        "#;

        let found = links(html, "https://example.com");

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].text, "[link]");
    }

    #[test]
    fn test_extract_images() {
        let document = Html::parse_document(
            r#"<img src="/a.png"><img src="/a.png"><img src="data:image/png;base64,xx"><img alt="none">"#,
        );
        let selector = Selector::parse("img[src]").unwrap();
        let images = extract_images(&document, &Url::parse("https://example.com/post/").unwrap(), &selector);
        assert_eq!(images, vec!["https://example.com/a.png"]);
    }
}
