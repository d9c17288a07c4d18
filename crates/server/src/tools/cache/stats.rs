//! web_cache_stats tool implementation.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use linkdigest_core::{CacheStats, Error};

use crate::state::AppState;

/// Output from the web_cache_stats tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheStatsOutput {
    pub enabled: bool,
    #[serde(flatten)]
    pub stats: CacheStats,
    pub max_entries: usize,
    pub ttl_minutes: u64,
    pub dir: String,
}

/// Implementation of the web_cache_stats tool.
///
/// Reports zero counts when the cache is disabled.
pub async fn stats_impl(state: &AppState) -> Result<CallToolResult, McpError> {
    let stats = match state.cache() {
        Some(cache) => cache.get_stats().await,
        None => CacheStats::default(),
    };

    let config = &state.config.cache;
    let output = CacheStatsOutput {
        enabled: state.cache().is_some(),
        stats,
        max_entries: config.max_entries,
        ttl_minutes: config.ttl_minutes,
        dir: config.dir.display().to_string(),
    };

    let json = serde_json::to_string_pretty(&output).map_err(|e| Error::Serialize(e.to_string()))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
