//! Per-URL analysis pipeline.
//!
//! [`AnalysisPipeline::process`] runs cache lookup, fetch, extraction,
//! analysis, screenshot capture and cache update for one normalized URL.
//! Collaborator failures become error-shaped [`PipelineResult`]s; `process`
//! itself never fails.

pub mod summary;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::cache::{AnalysisPayload, CacheManager, ExtractedSections};
use crate::error::{Error, FailureKind};

/// Downloads page HTML.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, Error>;
}

/// Turns HTML into readable text and optional sections.
pub trait ContentExtractor: Send + Sync {
    fn extract(&self, html: &str, url: &str) -> Result<ExtractedPage, Error>;
}

/// Produces an analysis of extracted page content.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, page: &ExtractedPage) -> Result<String, Error>;
}

/// Captures an image of a rendered page.
#[async_trait]
pub trait Screenshotter: Send + Sync {
    async fn capture(&self, url: &str) -> Result<Bytes, Error>;

    /// MIME type of captured images.
    fn mime_type(&self) -> &'static str {
        "image/png"
    }
}

/// Readable content of a fetched page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedPage {
    pub url: String,
    pub title: Option<String>,
    /// Main text, one paragraph per line.
    pub content: String,
    pub sections: Option<ExtractedSections>,
}

/// Outcome category of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    /// Freshly analyzed.
    Success,
    /// Served from the cache, by URL or by identical content.
    Cached,
    /// Failed; `result` holds the error text.
    Failed(FailureKind),
}

/// Uniform result shape for successful and failed runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PipelineResult {
    pub url: String,
    /// Analysis text, or the error message when failed.
    pub result: String,
    #[serde(skip)]
    #[schemars(skip)]
    pub screenshot: Option<Bytes>,
    pub status: ResultStatus,
}

impl PipelineResult {
    fn from_payload(url: &str, payload: AnalysisPayload, status: ResultStatus) -> Self {
        Self { url: url.to_string(), result: payload.result, screenshot: payload.screenshot, status }
    }

    fn failed(url: &str, err: &Error) -> Self {
        let kind = err.failure_kind();
        tracing::warn!(url, error = %err, kind = kind.label(), "pipeline failed");
        Self {
            url: url.to_string(),
            result: format!("Could not analyze {url} ({}): {err}", kind.label()),
            screenshot: None,
            status: ResultStatus::Failed(kind),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.status, ResultStatus::Failed(_))
    }
}

/// Whether a batch is worth showing: false when every result failed.
pub fn should_deliver(results: &[PipelineResult]) -> bool {
    results.iter().any(|r| !r.is_error())
}

/// Analysis pipeline over pluggable collaborators.
pub struct AnalysisPipeline {
    fetcher: Arc<dyn PageFetcher>,
    extractor: Arc<dyn ContentExtractor>,
    analyzer: Option<Arc<dyn Analyzer>>,
    screenshotter: Option<Arc<dyn Screenshotter>>,
    cache: Option<CacheManager>,
}

impl std::fmt::Debug for AnalysisPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisPipeline")
            .field("analyzer", &self.analyzer.is_some())
            .field("screenshotter", &self.screenshotter.is_some())
            .field("cache", &self.cache.is_some())
            .finish()
    }
}

impl AnalysisPipeline {
    pub fn new(fetcher: Arc<dyn PageFetcher>, extractor: Arc<dyn ContentExtractor>) -> Self {
        Self { fetcher, extractor, analyzer: None, screenshotter: None, cache: None }
    }

    pub fn with_cache(mut self, cache: CacheManager) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn Analyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    pub fn with_screenshotter(mut self, screenshotter: Arc<dyn Screenshotter>) -> Self {
        self.screenshotter = Some(screenshotter);
        self
    }

    pub fn cache(&self) -> Option<&CacheManager> {
        self.cache.as_ref()
    }

    /// MIME type of screenshots in results, if screenshots are enabled.
    pub fn screenshot_mime(&self) -> Option<&'static str> {
        self.screenshotter.as_ref().map(|s| s.mime_type())
    }

    /// Analyze one normalized URL.
    pub async fn process(&self, url: String) -> PipelineResult {
        if let Some(cache) = &self.cache
            && let Some(payload) = cache.get(&url).await
        {
            tracing::info!(url, "serving cached analysis");
            return PipelineResult::from_payload(&url, payload, ResultStatus::Cached);
        }

        let html = match self.fetcher.fetch(&url).await {
            Ok(html) if html.trim().is_empty() => {
                return PipelineResult::failed(&url, &Error::FetchFailed("empty response body".into()));
            }
            Ok(html) => html,
            Err(e) => return PipelineResult::failed(&url, &e),
        };

        let page = match self.extractor.extract(&html, &url) {
            Ok(page) if page.content.trim().is_empty() => {
                return PipelineResult::failed(&url, &Error::ExtractFailed("no readable content".into()));
            }
            Ok(page) => page,
            Err(e) => return PipelineResult::failed(&url, &e),
        };

        if let Some(cache) = &self.cache
            && let Some(payload) = cache.get_by_content_hash(&page.content).await
        {
            tracing::info!(url, original = %payload.url, "serving analysis of identical content");
            return PipelineResult::from_payload(&url, payload, ResultStatus::Cached);
        }

        let mut result = self.analyze(&page).await;
        if let Some(sections) = page.sections.as_ref().filter(|s| !s.is_empty()) {
            result.push_str(&summary::render_sections(sections));
        }

        let screenshot = match &self.screenshotter {
            Some(shooter) => match shooter.capture(&url).await {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    tracing::warn!(url, error = %e, "screenshot failed");
                    result.push_str(&format!("\n\nNote: screenshot unavailable ({e})"));
                    None
                }
            },
            None => None,
        };

        let payload = AnalysisPayload {
            url: url.clone(),
            result,
            title: page.title.clone(),
            sections: page.sections.clone(),
            screenshot,
            has_screenshot: false,
        };

        if let Some(cache) = &self.cache
            && let Err(e) = cache.set_with_content_hash(&url, payload.clone(), &page.content).await
        {
            tracing::warn!(url, error = %e, "analysis not persisted");
        }

        PipelineResult::from_payload(&url, payload, ResultStatus::Success)
    }

    async fn analyze(&self, page: &ExtractedPage) -> String {
        let Some(analyzer) = &self.analyzer else {
            return summary::fallback_summary(page);
        };
        match analyzer.analyze(page).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                tracing::warn!(url = %page.url, "empty analysis, using local summary");
                summary::fallback_summary(page)
            }
            Err(e) => {
                tracing::warn!(url = %page.url, error = %e, "analysis failed, using local summary");
                summary::fallback_summary(page)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheSettings, EntryStore, SectionLink};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[derive(Default)]
    struct StubFetcher {
        pages: HashMap<String, String>,
        calls: AtomicUsize,
    }

    impl StubFetcher {
        fn with(pages: &[(&str, &str)]) -> Self {
            Self {
                pages: pages.iter().map(|(u, h)| (u.to_string(), h.to_string())).collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PageFetcher for StubFetcher {
        async fn fetch(&self, url: &str) -> Result<String, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.pages.get(url).cloned().ok_or_else(|| Error::HttpError(format!("status 404 for {url}")))
        }
    }

    /// Treats the HTML as plain text; "<broken>" fails.
    struct StubExtractor;

    impl ContentExtractor for StubExtractor {
        fn extract(&self, html: &str, url: &str) -> Result<ExtractedPage, Error> {
            if html == "<broken>" {
                return Err(Error::ExtractFailed("unparseable".into()));
            }
            Ok(ExtractedPage { url: url.into(), title: Some("Title".into()), content: html.into(), sections: None })
        }
    }

    struct StubAnalyzer {
        fail: bool,
    }

    #[async_trait]
    impl Analyzer for StubAnalyzer {
        async fn analyze(&self, page: &ExtractedPage) -> Result<String, Error> {
            if self.fail {
                return Err(Error::LlmFailed("model offline".into()));
            }
            Ok(format!("LLM says: {}", page.content))
        }
    }

    struct StubShooter {
        fail: bool,
    }

    #[async_trait]
    impl Screenshotter for StubShooter {
        async fn capture(&self, _url: &str) -> Result<Bytes, Error> {
            if self.fail { Err(Error::ScreenshotFailed("no browser".into())) } else { Ok(Bytes::from_static(b"PNG")) }
        }
    }

    async fn cache(dir: &TempDir) -> CacheManager {
        let store = EntryStore::open(dir.path()).await.unwrap();
        CacheManager::new(store, CacheSettings::default()).await
    }

    #[tokio::test]
    async fn test_success_then_cached() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(StubFetcher::with(&[("https://a.example", "hello world")]));
        let pipeline = AnalysisPipeline::new(fetcher.clone(), Arc::new(StubExtractor))
            .with_analyzer(Arc::new(StubAnalyzer { fail: false }))
            .with_cache(cache(&dir).await);

        let first = pipeline.process("https://a.example".into()).await;
        assert_eq!(first.status, ResultStatus::Success);
        assert_eq!(first.result, "LLM says: hello world");

        let second = pipeline.process("https://a.example".into()).await;
        assert_eq!(second.status, ResultStatus::Cached);
        assert_eq!(second.result, first.result);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_identical_content_served_from_cache() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(StubFetcher::with(&[("https://a.example", "same"), ("https://b.example", "same")]));
        let pipeline = AnalysisPipeline::new(fetcher, Arc::new(StubExtractor))
            .with_analyzer(Arc::new(StubAnalyzer { fail: false }))
            .with_cache(cache(&dir).await);

        pipeline.process("https://a.example".into()).await;
        let mirror = pipeline.process("https://b.example".into()).await;

        assert_eq!(mirror.status, ResultStatus::Cached);
        assert_eq!(mirror.url, "https://b.example");
        assert_eq!(mirror.result, "LLM says: same");
    }

    #[tokio::test]
    async fn test_fetch_failure_is_error_shaped() {
        let pipeline = AnalysisPipeline::new(Arc::new(StubFetcher::default()), Arc::new(StubExtractor));
        let result = pipeline.process("https://missing.example".into()).await;

        assert_eq!(result.status, ResultStatus::Failed(FailureKind::Network));
        assert!(result.result.contains("https://missing.example"));
        assert!(result.is_error());
    }

    #[tokio::test]
    async fn test_empty_body_is_network_failure() {
        let fetcher = Arc::new(StubFetcher::with(&[("https://blank.example", "   ")]));
        let pipeline = AnalysisPipeline::new(fetcher, Arc::new(StubExtractor));
        let result = pipeline.process("https://blank.example".into()).await;
        assert_eq!(result.status, ResultStatus::Failed(FailureKind::Network));
    }

    #[tokio::test]
    async fn test_extract_failure_is_parse_failure() {
        let fetcher = Arc::new(StubFetcher::with(&[("https://bad.example", "<broken>")]));
        let pipeline = AnalysisPipeline::new(fetcher, Arc::new(StubExtractor));
        let result = pipeline.process("https://bad.example".into()).await;
        assert_eq!(result.status, ResultStatus::Failed(FailureKind::Parse));
    }

    #[tokio::test]
    async fn test_analyzer_failure_falls_back() {
        let fetcher = Arc::new(StubFetcher::with(&[("https://a.example", "line one\nline two")]));
        let pipeline = AnalysisPipeline::new(fetcher, Arc::new(StubExtractor))
            .with_analyzer(Arc::new(StubAnalyzer { fail: true }));
        let result = pipeline.process("https://a.example".into()).await;

        assert_eq!(result.status, ResultStatus::Success);
        assert!(result.result.starts_with("## Title"));
        assert!(result.result.contains("- line one"));
    }

    #[tokio::test]
    async fn test_screenshot_failure_appends_notice() {
        let fetcher = Arc::new(StubFetcher::with(&[("https://a.example", "text")]));
        let pipeline = AnalysisPipeline::new(fetcher, Arc::new(StubExtractor))
            .with_analyzer(Arc::new(StubAnalyzer { fail: false }))
            .with_screenshotter(Arc::new(StubShooter { fail: true }));
        let result = pipeline.process("https://a.example".into()).await;

        assert_eq!(result.status, ResultStatus::Success);
        assert!(result.screenshot.is_none());
        assert!(result.result.contains("screenshot unavailable"));
    }

    #[tokio::test]
    async fn test_screenshot_is_cached_with_result() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir).await;
        let fetcher = Arc::new(StubFetcher::with(&[("https://a.example", "text")]));
        let pipeline = AnalysisPipeline::new(fetcher, Arc::new(StubExtractor))
            .with_screenshotter(Arc::new(StubShooter { fail: false }))
            .with_cache(cache.clone());

        let result = pipeline.process("https://a.example".into()).await;
        assert_eq!(result.screenshot, Some(Bytes::from_static(b"PNG")));
        assert!(cache.store().blob_path("https://a.example").exists());
        assert_eq!(pipeline.screenshot_mime(), Some("image/png"));
    }

    #[tokio::test]
    async fn test_write_failure_still_returns_result() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir).await;
        std::fs::remove_dir_all(dir.path()).unwrap();
        let fetcher = Arc::new(StubFetcher::with(&[("https://a.example", "text")]));
        let pipeline = AnalysisPipeline::new(fetcher, Arc::new(StubExtractor)).with_cache(cache);

        let result = pipeline.process("https://a.example".into()).await;
        assert_eq!(result.status, ResultStatus::Success);
    }

    #[tokio::test]
    async fn test_sections_are_appended() {
        struct SectionExtractor;
        impl ContentExtractor for SectionExtractor {
            fn extract(&self, html: &str, url: &str) -> Result<ExtractedPage, Error> {
                let sections = ExtractedSections {
                    links: vec![SectionLink { text: "Home".into(), url: "https://a.example/".into() }],
                    ..Default::default()
                };
                Ok(ExtractedPage { url: url.into(), title: None, content: html.into(), sections: Some(sections) })
            }
        }

        let fetcher = Arc::new(StubFetcher::with(&[("https://a.example", "text")]));
        let pipeline = AnalysisPipeline::new(fetcher, Arc::new(SectionExtractor))
            .with_analyzer(Arc::new(StubAnalyzer { fail: false }));
        let result = pipeline.process("https://a.example".into()).await;
        assert!(result.result.contains("### Links\n- [Home](https://a.example/)"));
    }

    #[test]
    fn test_should_deliver() {
        let ok = PipelineResult { url: "a".into(), result: "r".into(), screenshot: None, status: ResultStatus::Success };
        let bad = PipelineResult { status: ResultStatus::Failed(FailureKind::Network), ..ok.clone() };

        assert!(should_deliver(&[bad.clone(), ok]));
        assert!(!should_deliver(&[bad.clone(), bad]));
        assert!(!should_deliver(&[]));
    }
}
