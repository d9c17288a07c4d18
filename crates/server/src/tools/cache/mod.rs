//! Cache management tools.

pub mod clear;
pub mod delete;
pub mod export;
pub mod stats;

pub use clear::clear_impl;
pub use delete::{CacheDeleteParams, delete_impl};
pub use export::{CacheExportParams, export_impl};
pub use stats::stats_impl;

use linkdigest_core::{CacheManager, Error};

use crate::state::AppState;

fn require_cache(state: &AppState) -> Result<&CacheManager, Error> {
    state
        .cache()
        .ok_or_else(|| Error::InvalidInput("cache is disabled (set LINKDIGEST_CACHE__ENABLED=true)".into()))
}
