//! web_cache_delete tool implementation.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use linkdigest_client::normalize;
use linkdigest_core::Error;

use super::require_cache;
use crate::state::AppState;

/// Parameters for the web_cache_delete tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheDeleteParams {
    /// URL whose cached analysis should be removed. Normalized before lookup.
    pub url: String,
}

/// Implementation of the web_cache_delete tool.
pub async fn delete_impl(state: &AppState, params: CacheDeleteParams) -> Result<CallToolResult, McpError> {
    let cache = require_cache(state)?;
    let key = normalize(&params.url, state.config.network.unified_domain).map_err(|e| Error::InvalidUrl(e.to_string()))?;

    cache.delete(&key).await;

    let json = serde_json::json!({ "deleted": key });
    Ok(CallToolResult::success(vec![Content::text(json.to_string())]))
}
