//! Offline state and output helpers for tool tests.

use std::sync::Arc;

use async_trait::async_trait;
use linkdigest_client::HtmlExtractor;
use linkdigest_core::{AnalysisPipeline, AppConfig, CacheManager, EntryStore, Error, PageFetcher};
use rmcp::model::CallToolResult;
use tempfile::TempDir;

use crate::state::AppState;

/// Serves the same small page for every URL.
pub(crate) struct StubFetcher;

#[async_trait]
impl PageFetcher for StubFetcher {
    async fn fetch(&self, url: &str) -> Result<String, Error> {
        Ok(format!(
            "<html><head><title>Stub Page</title></head><body><article><p>Content served for {url}.</p></article></body></html>"
        ))
    }
}

fn pipeline() -> AnalysisPipeline {
    AnalysisPipeline::new(Arc::new(StubFetcher), Arc::new(HtmlExtractor::default()))
}

/// State with the stub fetcher and no cache.
pub(crate) fn html_state(config: AppConfig) -> AppState {
    AppState::from_parts(config, pipeline())
}

/// State with the stub fetcher and a cache in a fresh temp dir.
pub(crate) async fn cached_state() -> (AppState, TempDir) {
    let dir = TempDir::new().unwrap();
    let config = AppConfig::default();
    let store = EntryStore::open(dir.path()).await.unwrap();
    let cache = CacheManager::new(store, config.cache_settings()).await;
    (AppState::from_parts(config, pipeline().with_cache(cache)), dir)
}

/// Parse the JSON text block of a tool result.
pub(crate) fn output_json(result: CallToolResult) -> serde_json::Value {
    let text = &result.content[0].raw.as_text().unwrap().text;
    serde_json::from_str(text).unwrap()
}
