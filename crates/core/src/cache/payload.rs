//! Cached analysis payloads and their on-disk record shape.
//!
//! The screenshot is the single binary field. In memory it lives inline in
//! [`AnalysisPayload::screenshot`]; on disk it is moved to a side-file and the
//! JSON carries `has_screenshot: true` instead. A payload never holds both.

use std::collections::BTreeMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A link harvested from the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SectionLink {
    pub text: String,
    pub url: String,
}

/// Optional content categories extracted alongside the main text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedSections {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<SectionLink>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub code_blocks: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, String>,
}

impl ExtractedSections {
    pub fn is_empty(&self) -> bool {
        self.images.is_empty() && self.links.is_empty() && self.code_blocks.is_empty() && self.meta.is_empty()
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Result of analyzing one page, as stored in the cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisPayload {
    /// Normalized URL the analysis was produced for.
    pub url: String,
    /// Rendered analysis text.
    pub result: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sections: Option<ExtractedSections>,
    /// Screenshot bytes, present only in memory.
    #[serde(skip)]
    pub screenshot: Option<Bytes>,
    /// Marker that the screenshot lives in a side-file.
    #[serde(default, skip_serializing_if = "is_false")]
    pub has_screenshot: bool,
}

impl AnalysisPayload {
    pub fn new(url: impl Into<String>, result: impl Into<String>) -> Self {
        Self { url: url.into(), result: result.into(), ..Default::default() }
    }

    /// Split off the screenshot for a side-file, leaving the disk marker set.
    pub(crate) fn externalize(&self) -> (AnalysisPayload, Option<Bytes>) {
        let mut disk = self.clone();
        let blob = disk.screenshot.take();
        disk.has_screenshot = blob.is_some();
        (disk, blob)
    }

    /// Put side-file bytes back inline and clear the disk marker.
    pub(crate) fn reinstate(&mut self, blob: Bytes) {
        self.screenshot = Some(blob);
        self.has_screenshot = false;
    }
}

/// Primary file schema: `{ "url", "timestamp", "result", "content_hash"? }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheRecord {
    /// Cache key (normalized URL).
    pub url: String,
    /// Seconds since the Unix epoch when the entry was written.
    pub timestamp: f64,
    pub result: AnalysisPayload,
    /// Digest of the extracted text, restored into the content index on load.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
}

impl CacheRecord {
    pub fn new(
        key: impl Into<String>, created_at: DateTime<Utc>, result: AnalysisPayload, content_hash: Option<String>,
    ) -> Self {
        Self { url: key.into(), timestamp: created_at.timestamp_millis() as f64 / 1000.0, result, content_hash }
    }

    /// Write time, at millisecond precision.
    pub fn created_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis((self.timestamp * 1000.0).round() as i64).unwrap_or_default()
    }
}
