//! Unified error types for linkdigest.
//!
//! Storage errors split into read and write failures. Reads are recovered
//! locally by the entry store; writes reach the caller of `CacheManager::set`.
//! Collaborator failures are classified by [`FailureKind`] so the pipeline can
//! turn them into error-shaped results.

use std::path::PathBuf;

use rmcp::model::{ErrorCode, ErrorData as McpError};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Category of a failed pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The page could not be fetched.
    Network,
    /// The page was fetched but no content could be extracted.
    Parse,
    /// The language model call failed.
    Llm,
    /// Screenshot capture failed.
    Screenshot,
    /// Cache storage failed.
    Storage,
    /// Anything else.
    Internal,
}

impl FailureKind {
    /// Short human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            FailureKind::Network => "network error",
            FailureKind::Parse => "parse error",
            FailureKind::Llm => "analysis error",
            FailureKind::Screenshot => "screenshot error",
            FailureKind::Storage => "storage error",
            FailureKind::Internal => "internal error",
        }
    }
}

/// Unified error types for linkdigest.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., no URLs supplied).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// A cache file could not be written or removed.
    #[error("STORAGE_WRITE: {}: {source}", .path.display())]
    StorageWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A cache file could not be read or decoded.
    #[error("STORAGE_READ: {}: {reason}", .path.display())]
    StorageRead { path: PathBuf, reason: String },

    /// A record could not be serialized.
    #[error("SERIALIZE_FAILED: {0}")]
    Serialize(String),

    /// Network-level fetch failure.
    #[error("FETCH_FAILED: {0}")]
    FetchFailed(String),

    /// HTTP error response.
    #[error("HTTP_ERROR: {0}")]
    HttpError(String),

    /// Content extraction failed.
    #[error("EXTRACT_FAILED: {0}")]
    ExtractFailed(String),

    /// Language model call failed.
    #[error("LLM_FAILED: {0}")]
    LlmFailed(String),

    /// Screenshot capture failed.
    #[error("SCREENSHOT_FAILED: {0}")]
    ScreenshotFailed(String),

    /// Screenshot support was not compiled in.
    #[error("RENDER_DISABLED")]
    RenderDisabled,

    /// The resource pool was closed.
    #[error("POOL_CLOSED")]
    PoolClosed,
}

impl Error {
    /// Classify this error for an error-shaped pipeline result.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Error::FetchFailed(_) | Error::HttpError(_) | Error::InvalidUrl(_) => FailureKind::Network,
            Error::ExtractFailed(_) => FailureKind::Parse,
            Error::LlmFailed(_) => FailureKind::Llm,
            Error::ScreenshotFailed(_) | Error::RenderDisabled | Error::PoolClosed => FailureKind::Screenshot,
            Error::StorageWrite { .. } | Error::StorageRead { .. } | Error::Serialize(_) => FailureKind::Storage,
            Error::InvalidInput(_) => FailureKind::Internal,
        }
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let code = match &err {
            Error::InvalidInput(_) => -32602,
            Error::InvalidUrl(_) => -32003,
            Error::StorageWrite { .. } | Error::StorageRead { .. } | Error::Serialize(_) => -32002,
            Error::FetchFailed(_) => -32006,
            Error::HttpError(_) => -32008,
            Error::ExtractFailed(_) => -32000,
            Error::LlmFailed(_) => -32013,
            Error::RenderDisabled => -32011,
            Error::ScreenshotFailed(_) | Error::PoolClosed => -32012,
        };

        McpError { code: ErrorCode(code), message: err.to_string().into(), data: None }
    }
}
