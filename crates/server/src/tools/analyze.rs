//! web_analyze tool implementation.
//!
//! Collects URLs from free text and/or an explicit list, admits the valid and
//! allowed ones, and runs the analysis pipeline over them in windows.

use std::collections::HashSet;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use linkdigest_client::{extract_urls, is_valid_url, normalize};
use linkdigest_core::{Error, PipelineResult, should_deliver};

use crate::state::AppState;

/// Input parameters for the web_analyze tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct WebAnalyzeParams {
    /// Free text to scan for http(s) links.
    #[serde(default)]
    pub text: Option<String>,

    /// URLs to analyze directly.
    #[serde(default)]
    pub urls: Vec<String>,
}

/// A candidate URL that was not analyzed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SkippedUrl {
    pub url: String,
    pub reason: String,
}

/// Output of the web_analyze tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WebAnalyzeOutput {
    /// False when there is nothing worth showing (every URL failed or none ran).
    pub deliver: bool,
    pub results: Vec<PipelineResult>,
    pub skipped: Vec<SkippedUrl>,
}

/// Turn raw candidates into unique, allowed cache keys.
fn admit(state: &AppState, candidates: Vec<String>) -> (Vec<String>, Vec<SkippedUrl>) {
    let unify_www = state.config.network.unified_domain;
    let mut admitted: Vec<String> = Vec::new();
    let mut skipped = Vec::new();

    for url in candidates {
        let url = url.trim().to_string();
        if !is_valid_url(&url) {
            skipped.push(SkippedUrl { url, reason: "invalid URL".into() });
            continue;
        }
        let key = match normalize(&url, unify_www) {
            Ok(key) => key,
            Err(e) => {
                skipped.push(SkippedUrl { url, reason: e.to_string() });
                continue;
            }
        };
        if !state.filter.is_allowed(&key) {
            skipped.push(SkippedUrl { url, reason: "domain not allowed".into() });
            continue;
        }
        if !admitted.contains(&key) {
            admitted.push(key);
        }
    }

    (admitted, skipped)
}

/// Implementation of the web_analyze tool.
pub async fn analyze_impl(state: &AppState, params: WebAnalyzeParams) -> Result<CallToolResult, McpError> {
    let mut candidates = params.urls;
    if let Some(text) = params.text.as_deref() {
        candidates.extend(extract_urls(text));
    }

    if candidates.is_empty() {
        return Err(Error::InvalidInput("no URLs given or found in text".into()).into());
    }

    let (admitted, mut skipped) = admit(state, candidates);
    tracing::debug!(admitted = admitted.len(), skipped = skipped.len(), "admitted URLs");

    let pipeline = &state.pipeline;
    let results = state.dispatcher.dispatch(admitted.clone(), |url| pipeline.process(url)).await;

    // The dispatcher yields nothing for URLs another call is already handling.
    let processed: HashSet<&str> = results.iter().map(|r| r.url.as_str()).collect();
    skipped.extend(
        admitted
            .into_iter()
            .filter(|key| !processed.contains(key.as_str()))
            .map(|url| SkippedUrl { url, reason: "already in progress".into() }),
    );

    let images: Vec<Content> = match state.pipeline.screenshot_mime() {
        Some(mime) => results
            .iter()
            .filter_map(|r| r.screenshot.as_ref())
            .map(|bytes| Content::image(BASE64.encode(bytes), mime))
            .collect(),
        None => Vec::new(),
    };

    let output = WebAnalyzeOutput { deliver: should_deliver(&results), results, skipped };
    let json = serde_json::to_string_pretty(&output).map_err(|e| Error::Serialize(e.to_string()))?;

    let mut content = vec![Content::text(json)];
    content.extend(images);
    Ok(CallToolResult::success(content))
}
