// src/usage/reducer.rs
// =============================================================================
// Phase 2 of a run: decide which selectors are unused on every page.
//
// How it works:
// 1. List every archived page under html/ and every stylesheet under css/
// 2. Split the pages into chunks of `chunk_size` (the last one may be short)
// 3. Ask the analyzer, chunk by chunk, which selectors that chunk never uses
// 4. Count, per selector, how many chunks rejected it
// 5. Report a selector only if every chunk rejected it
//
// Step 5 is what makes chunking safe. A selector unused in one chunk may
// well be used by a page in another chunk; only a selector rejected by all
// chunks is unused across the whole site.
//
// An analyzer failure on any chunk aborts the reduction.
// =============================================================================

use anyhow::{Context, Result};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use super::analyzer::UsageAnalyzer;
use super::files::list_files;

/// Result of reducing a whole archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reduction {
    /// Selectors rejected by every chunk, in first-rejection order
    pub unused: Vec<String>,
    pub pages: usize,
    pub stylesheets: usize,
    pub chunks: usize,
}

/// Per-selector count of chunks that rejected it
///
/// Keeps first-rejection order so the report is stable between runs.
#[derive(Debug, Default)]
pub struct RejectionTally {
    counts: HashMap<String, usize>,
    order: Vec<String>,
    chunks: usize,
}

impl RejectionTally {
    /// Records one chunk's rejections; repeats within a chunk count once
    pub fn record_chunk<I>(&mut self, rejected: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.chunks += 1;

        let mut this_chunk = HashSet::new();
        for selector in rejected {
            if !this_chunk.insert(selector.clone()) {
                continue;
            }
            match self.counts.get_mut(&selector) {
                Some(count) => *count += 1,
                None => {
                    self.counts.insert(selector.clone(), 1);
                    self.order.push(selector);
                }
            }
        }
    }

    pub fn chunks(&self) -> usize {
        self.chunks
    }

    /// Selectors whose count equals the number of chunks recorded
    pub fn unanimous(&self) -> Vec<String> {
        self.order
            .iter()
            .filter(|selector| self.counts.get(*selector) == Some(&self.chunks))
            .cloned()
            .collect()
    }
}

/// Splits `items` into consecutive chunks of at most `size`
pub fn partition<T: Clone>(items: &[T], size: usize) -> Vec<Vec<T>> {
    items.chunks(size.max(1)).map(<[T]>::to_vec).collect()
}

/// Runs the analyzer over the archive chunk by chunk and keeps the
/// selectors every chunk rejected
pub fn reduce<A>(html_dir: &Path, css_dir: &Path, chunk_size: usize, analyzer: &A) -> Result<Reduction>
where
    A: UsageAnalyzer + ?Sized,
{
    let pages = list_files(html_dir, "html")?;
    let stylesheets = list_files(css_dir, "css")?;

    tracing::info!(
        pages = pages.len(),
        stylesheets = stylesheets.len(),
        chunk_size,
        "reducing selector usage"
    );

    let chunks: Vec<Vec<PathBuf>> = partition(&pages, chunk_size);
    let total = chunks.len();
    let mut tally = RejectionTally::default();

    for (index, chunk) in chunks.iter().enumerate() {
        let rejected = analyzer
            .rejected_selectors(chunk, &stylesheets)
            .with_context(|| format!("usage analysis failed on chunk {} of {}", index + 1, total))?;

        tracing::info!(
            chunk = index + 1,
            total,
            pages = chunk.len(),
            rejected = rejected.len(),
            "chunk analyzed"
        );

        tally.record_chunk(rejected);
    }

    Ok(Reduction {
        unused: tally.unanimous(),
        pages: pages.len(),
        stylesheets: stylesheets.len(),
        chunks: tally.chunks(),
    })
}
