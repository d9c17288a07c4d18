//! web_cache_export tool implementation.
//!
//! Renders cached analyses as one Markdown, JSON or plain-text document,
//! either for a single URL or for every unexpired entry.

use std::fmt::Write;

use chrono::{DateTime, Utc};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use linkdigest_client::{is_valid_url, normalize};
use linkdigest_core::{AnalysisPayload, Error};

use super::require_cache;
use crate::state::AppState;

const ALL: &str = "all";

/// Document format for exports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    #[serde(alias = "markdown")]
    Md,
    Json,
    Txt,
}

/// Parameters for the web_cache_export tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheExportParams {
    /// A URL, or "all" for every cached analysis.
    pub target: String,

    /// "md" (default, alias "markdown"), "json" or "txt".
    #[serde(default)]
    pub format: ExportFormat,
}

/// One exported analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportItem {
    pub url: String,
    pub analysis_result: String,
    pub has_screenshot: bool,
}

impl ExportItem {
    fn new(url: String, payload: &AnalysisPayload) -> Self {
        Self { url, analysis_result: payload.result.clone(), has_screenshot: payload.screenshot.is_some() }
    }
}

#[derive(Serialize)]
struct JsonExport<'a> {
    export_time: i64,
    export_time_str: String,
    total_results: usize,
    results: &'a [ExportItem],
}

/// Render `items` as a single document.
pub fn render_export(format: ExportFormat, items: &[ExportItem], exported_at: DateTime<Utc>) -> Result<String, Error> {
    let stamp = exported_at.format("%Y-%m-%d %H:%M:%S UTC").to_string();
    let mut out = String::new();

    match format {
        ExportFormat::Md => {
            let _ = write!(out, "# Web analysis export\n\nExported at: {stamp}\n\nResults: {}\n\n---\n\n", items.len());
            for (i, item) in items.iter().enumerate() {
                let _ = write!(out, "## {}. {}\n\n{}\n\n---\n\n", i + 1, item.url, item.analysis_result);
            }
        }
        ExportFormat::Json => {
            let export = JsonExport {
                export_time: exported_at.timestamp(),
                export_time_str: stamp,
                total_results: items.len(),
                results: items,
            };
            out = serde_json::to_string_pretty(&export).map_err(|e| Error::Serialize(e.to_string()))?;
        }
        ExportFormat::Txt => {
            let rule = "=".repeat(50);
            let _ = write!(out, "Web analysis export\nExported at: {stamp}\nResults: {}\n{rule}\n\n", items.len());
            for (i, item) in items.iter().enumerate() {
                let _ = write!(
                    out,
                    "{}. {}\n{}\n{}\n\n{rule}\n\n",
                    i + 1,
                    item.url,
                    "-".repeat(30),
                    item.analysis_result
                );
            }
        }
    }

    Ok(out)
}

/// Cached analysis for one URL, analyzing it first on a miss.
async fn single(state: &AppState, target: &str) -> Result<ExportItem, Error> {
    if !is_valid_url(target) {
        return Err(Error::InvalidUrl(target.to_string()));
    }
    let key = normalize(target, state.config.network.unified_domain).map_err(|e| Error::InvalidUrl(e.to_string()))?;

    if let Some(cache) = state.cache()
        && let Some(payload) = cache.get(&key).await
    {
        return Ok(ExportItem::new(key, &payload));
    }

    tracing::debug!(key, "export target not cached, analyzing");
    let pipeline = &state.pipeline;
    let result = state
        .dispatcher
        .dispatch(vec![key.clone()], |url| pipeline.process(url))
        .await
        .into_iter()
        .next()
        .ok_or_else(|| Error::InvalidInput(format!("{key} is already being analyzed")))?;

    if result.is_error() {
        return Err(Error::InvalidInput(result.result));
    }
    Ok(ExportItem {
        url: result.url,
        analysis_result: result.result,
        has_screenshot: result.screenshot.is_some(),
    })
}

/// Implementation of the web_cache_export tool.
pub async fn export_impl(state: &AppState, params: CacheExportParams) -> Result<CallToolResult, McpError> {
    let cache = require_cache(state)?;
    let target = params.target.trim();

    let items = if target.eq_ignore_ascii_case(ALL) {
        let items: Vec<ExportItem> = cache
            .valid_entries()
            .await
            .into_iter()
            .map(|(key, payload)| ExportItem::new(key, &payload))
            .collect();
        if items.is_empty() {
            return Err(Error::InvalidInput("no cached analysis results".into()).into());
        }
        items
    } else {
        vec![single(state, target).await?]
    };

    let document = render_export(params.format, &items, Utc::now())?;
    tracing::info!(count = items.len(), format = ?params.format, "exported analyses");
    Ok(CallToolResult::success(vec![Content::text(document)]))
}
