//! Core types and shared functionality for linkdigest.
//!
//! This crate provides:
//! - Disk-backed entry store with binary side-files
//! - Cache manager with TTL, capacity eviction and content-hash lookup
//! - Batch dispatcher with in-flight deduplication and bounded concurrency
//! - The per-URL analysis pipeline and its collaborator traits
//! - Unified error types and configuration

pub mod cache;
pub mod clock;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod pipeline;
pub mod pool;

pub use cache::{AnalysisPayload, CacheManager, CacheSettings, CacheStats, EntryStore, ExtractedSections, SectionLink};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AppConfig, ConfigError, ScreenshotFormat};
pub use dispatch::{DispatchSettings, Dispatcher};
pub use error::{Error, FailureKind};
pub use pipeline::{
    AnalysisPipeline, Analyzer, ContentExtractor, ExtractedPage, PageFetcher, PipelineResult, ResultStatus, Screenshotter,
    should_deliver,
};
pub use pool::{Lease, ResourcePool};
