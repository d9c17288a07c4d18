//! File-backed cache for analysis results.
//!
//! This module provides:
//!
//! - [`EntryStore`]: one JSON file per key plus a binary side-file for screenshots
//! - [`CacheManager`]: TTL expiry, capacity eviction and a content-hash index
//! - Self-healing reads that remove corrupt files instead of failing

pub mod hash;
pub mod manager;
pub mod payload;
pub mod store;

pub use crate::Error;

pub use manager::{CacheManager, CacheSettings, CacheStats};
pub use payload::{AnalysisPayload, CacheRecord, ExtractedSections, SectionLink};
pub use store::EntryStore;
