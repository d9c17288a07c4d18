//! Network-facing collaborators for linkdigest.
//!
//! Implementations of the `linkdigest-core` pipeline traits: an HTTP fetcher
//! with retry, an HTML extractor, an OpenAI-compatible chat analyzer and,
//! behind the `render` feature, a pooled headless-browser screenshotter.

pub mod extract;
pub mod fetch;
pub mod llm;
#[cfg(feature = "render")]
pub mod render;

#[cfg(test)]
mod test_support;

pub use extract::{HtmlExtractor, extract_images, extract_links};
pub use fetch::{
    DomainFilter, FetchClient, FetchConfig, FetchResponse, UrlError, canonicalize, extract_urls, is_private_or_reserved,
    is_valid_url, normalize,
};
pub use llm::ChatAnalyzer;
#[cfg(feature = "render")]
pub use render::HeadlessScreenshotter;
