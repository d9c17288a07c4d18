//! Shared server state built from configuration.

use std::sync::Arc;

use linkdigest_client::{ChatAnalyzer, DomainFilter, FetchClient, FetchConfig, HtmlExtractor};
use linkdigest_core::{AnalysisPipeline, AppConfig, CacheManager, Dispatcher, EntryStore, Error};

/// Everything a tool call needs: the pipeline, the dispatcher that fans URLs
/// out to it, and the URL admission rules.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub pipeline: Arc<AnalysisPipeline>,
    pub dispatcher: Dispatcher,
    pub filter: DomainFilter,
}

impl AppState {
    /// Wire up collaborators for `config`.
    ///
    /// The cache directory is created when caching is enabled. Screenshots
    /// are skipped with a warning when the binary was built without the
    /// `render` feature.
    pub async fn build(config: AppConfig) -> Result<Self, Error> {
        let fetcher = FetchClient::new(FetchConfig::from(&config.network))?;
        let extractor = HtmlExtractor::new(config.network.max_content_length, config.extract.clone());
        let mut pipeline = AnalysisPipeline::new(Arc::new(fetcher), Arc::new(extractor));

        if config.cache.enabled {
            let store = EntryStore::open(config.cache.dir.clone()).await?;
            let cache = CacheManager::new(store, config.cache_settings()).await;
            tracing::info!(dir = %config.cache.dir.display(), "cache enabled");
            pipeline = pipeline.with_cache(cache);
        }

        if config.llm.enabled {
            let analyzer = ChatAnalyzer::new(&config.llm, config.network.timeout())?;
            tracing::info!(endpoint = analyzer.endpoint(), model = %config.llm.model, "LLM analysis enabled");
            pipeline = pipeline.with_analyzer(Arc::new(analyzer));
        }

        if config.screenshot.enabled {
            pipeline = with_screenshots(pipeline, &config);
        }

        Ok(Self::from_parts(config, pipeline))
    }

    /// Assemble state around an already-built pipeline.
    pub fn from_parts(config: AppConfig, pipeline: AnalysisPipeline) -> Self {
        let filter = DomainFilter::new(&config.domains.allowlist, &config.domains.blocklist);
        let dispatcher = Dispatcher::new(config.dispatch_settings());
        Self { config: Arc::new(config), pipeline: Arc::new(pipeline), dispatcher, filter }
    }

    pub fn cache(&self) -> Option<&CacheManager> {
        self.pipeline.cache()
    }
}

#[cfg(feature = "render")]
fn with_screenshots(pipeline: AnalysisPipeline, config: &AppConfig) -> AnalysisPipeline {
    let screenshotter = linkdigest_client::HeadlessScreenshotter::new(config.screenshot.clone());
    tracing::info!(pool_size = config.screenshot.pool_size, "screenshots enabled");
    pipeline.with_screenshotter(Arc::new(screenshotter))
}

#[cfg(not(feature = "render"))]
fn with_screenshots(pipeline: AnalysisPipeline, _config: &AppConfig) -> AnalysisPipeline {
    tracing::warn!(error = %Error::RenderDisabled, "screenshots requested but not compiled in");
    pipeline
}
