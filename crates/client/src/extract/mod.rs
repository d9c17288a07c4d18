//! Readable content extraction using scraper.
//!
//! ### Main Text
//! - Candidate containers: `article`, `main`, `.article-content`,
//!   `.post-content`, `.content`, `body`; the one with the most text wins.
//! - Text inside `script`, `style` and `noscript` is skipped.
//! - One text node per line, trimmed, empty lines dropped.
//! - Truncated to `max_content_length` characters with a trailing `...`.
//!
//! ### Sections
//! - Images, links, code blocks and metadata, each opt-in via `ExtractConfig`.

pub mod links;

pub use links::{extract_images, extract_links};

use std::collections::BTreeMap;

use linkdigest_core::config::ExtractConfig;
use linkdigest_core::{ContentExtractor, Error, ExtractedPage, ExtractedSections};
use scraper::{ElementRef, Html, Selector};
use url::Url;

const CONTENT_SELECTORS: &[&str] = &["article", "main", ".article-content", ".post-content", ".content", "body"];
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];
const META_NAMES: &[&str] = &["description", "keywords", "author"];

fn selector(css: &str) -> Result<Selector, Error> {
    Selector::parse(css).map_err(|e| Error::ExtractFailed(format!("selector {css}: {e}")))
}

/// Visible text below `element`, one trimmed text node per line.
fn visible_text(element: ElementRef<'_>) -> String {
    let mut lines = Vec::new();
    for node in element.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .ancestors()
            .filter_map(|a| a.value().as_element())
            .any(|e| SKIPPED_ELEMENTS.contains(&e.name()));
        if hidden {
            continue;
        }
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            lines.push(trimmed);
        }
    }
    lines.join("\n")
}

fn truncate_chars(text: String, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text,
    }
}

/// HTML to [`ExtractedPage`] extractor.
#[derive(Debug, Clone)]
pub struct HtmlExtractor {
    max_content_length: usize,
    sections: ExtractConfig,
}

impl Default for HtmlExtractor {
    fn default() -> Self {
        Self::new(10_000, ExtractConfig::default())
    }
}

impl HtmlExtractor {
    pub fn new(max_content_length: usize, sections: ExtractConfig) -> Self {
        Self { max_content_length, sections }
    }

    fn title(document: &Html) -> Result<Option<String>, Error> {
        let title = document
            .select(&selector("title")?)
            .next()
            .map(|t| t.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty());
        Ok(title)
    }

    fn main_text(document: &Html) -> Result<String, Error> {
        let mut best = String::new();
        for css in CONTENT_SELECTORS {
            if let Some(element) = document.select(&selector(css)?).next() {
                let text = visible_text(element);
                if text.chars().count() > best.chars().count() {
                    best = text;
                }
            }
        }
        Ok(best)
    }

    fn sections(&self, document: &Html, base: &Url) -> Result<Option<ExtractedSections>, Error> {
        if !self.sections.any() {
            return Ok(None);
        }

        let mut sections = ExtractedSections::default();
        if self.sections.links {
            sections.links = extract_links(document, base, &selector("a[href]")?);
        }
        if self.sections.images {
            sections.images = extract_images(document, base, &selector("img[src]")?);
        }
        if self.sections.code_blocks {
            sections.code_blocks = document
                .select(&selector("pre")?)
                .map(|pre| pre.text().collect::<String>().trim().to_string())
                .filter(|code| !code.is_empty())
                .collect();
        }
        if self.sections.meta {
            sections.meta = Self::meta(document)?;
        }

        Ok(Some(sections))
    }

    fn meta(document: &Html) -> Result<BTreeMap<String, String>, Error> {
        let mut meta = BTreeMap::new();
        for element in document.select(&selector("meta[content]")?) {
            let attrs = element.value();
            let Some(name) = attrs.attr("name").or_else(|| attrs.attr("property")) else {
                continue;
            };
            let name = name.to_lowercase();
            if !(META_NAMES.contains(&name.as_str()) || name.starts_with("og:")) {
                continue;
            }
            let content = attrs.attr("content").unwrap_or_default().trim();
            if !content.is_empty() {
                meta.entry(name).or_insert_with(|| content.to_string());
            }
        }
        Ok(meta)
    }
}

impl ContentExtractor for HtmlExtractor {
    fn extract(&self, html: &str, url: &str) -> Result<ExtractedPage, Error> {
        let base = Url::parse(url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let document = Html::parse_document(html);

        let content = Self::main_text(&document)?;
        if content.is_empty() {
            return Err(Error::ExtractFailed("no readable text found".into()));
        }

        Ok(ExtractedPage {
            url: url.to_string(),
            title: Self::title(&document)?,
            content: truncate_chars(content, self.max_content_length),
            sections: self.sections(&document, &base)?,
        })
    }
}
