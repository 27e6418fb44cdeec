// src/usage/mod.rs
// =============================================================================
// This module decides which CSS selectors the archived pages never use.
//
// Submodules:
// - stylesheet: selector extraction from CSS text
// - analyzer: the UsageAnalyzer seam and its scraper-based implementation
// - files: recursive listing of archived files
// - reducer: chunked analysis and the all-chunks-agree tally
// =============================================================================

mod analyzer;
mod files;
mod reducer;
mod stylesheet;

pub use analyzer::{DomUsageAnalyzer, UsageAnalyzer};
pub use reducer::reduce;
