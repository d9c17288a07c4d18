//! web_cache_clear tool implementation.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};

use super::require_cache;
use crate::state::AppState;

/// Implementation of the web_cache_clear tool.
pub async fn clear_impl(state: &AppState) -> Result<CallToolResult, McpError> {
    require_cache(state)?.clear().await?;
    Ok(CallToolResult::success(vec![Content::text(r#"{"cleared": true}"#)]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::analyze::{WebAnalyzeParams, analyze_impl};
    use crate::tools::test_support::{cached_state, html_state, output_json};
    use linkdigest_core::AppConfig;

    #[tokio::test]
    async fn test_clear_empties_cache() {
        let (state, _dir) = cached_state().await;
        let params = WebAnalyzeParams { text: None, urls: vec!["https://example.com/a".into()] };
        analyze_impl(&state, params).await.unwrap();

        let json = output_json(clear_impl(&state).await.unwrap());
        assert_eq!(json["cleared"], true);

        let cache = state.cache().unwrap();
        assert_eq!(cache.get_stats().await.total, 0);
        assert!(cache.get("https://example.com/a").await.is_none());
    }

    #[tokio::test]
    async fn test_clear_requires_cache() {
        let state = html_state(AppConfig::default());
        assert!(clear_impl(&state).await.is_err());
    }
}
