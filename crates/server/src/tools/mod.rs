//! MCP tool implementations.

pub mod analyze;
pub mod cache;

pub use analyze::{WebAnalyzeParams, analyze_impl};

#[cfg(test)]
pub(crate) mod test_support;
