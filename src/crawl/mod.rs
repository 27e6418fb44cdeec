// src/crawl/mod.rs
// =============================================================================
// This module handles phase 1 of a run: crawling.
//
// Submodules:
// - resolve: href -> absolute URL, URL -> archive path
// - http: shared client, text fetches, streamed downloads
// - sitemap: recursive sitemap walk
// - scanner: per-page fetch, stylesheet download, page archive
// - queue: bounded-concurrency job queue with a drain barrier
//
// crawl_site() ties them together: walk the sitemap, queue one scan per page
// URL, then wait for the queue to drain. When it returns, every archive file
// has been written and flushed.
// =============================================================================

mod http;
mod queue;
mod resolve;
mod scanner;
mod sitemap;

use anyhow::Result;
use reqwest::Client;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::context::RunContext;

pub use http::build_client;
use queue::FetchQueue;
use scanner::PageScanner;

/// Totals from a finished crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlOutcome {
    pub pages_discovered: usize,
    pub pages_archived: usize,
    pub pages_failed: usize,
    pub stylesheets: usize,
}

/// Walks the sitemap and scans every page it lists, `concurrency` at a time
///
/// Fails only when the sitemap walk fails; individual pages that cannot be
/// fetched are counted in `pages_failed`.
pub async fn crawl_site(
    ctx: Arc<RunContext>,
    client: Client,
    concurrency: usize,
) -> Result<CrawlOutcome> {
    let pages = sitemap::walk(&client, ctx.root_url.as_str()).await?;
    tracing::info!(pages = pages.len(), "sitemap walked");

    let scanner = PageScanner::new(client, ctx);
    let queue = FetchQueue::new(concurrency);

    for page in &pages {
        let scanner = scanner.clone();
        let page = page.clone();
        queue.add(async move {
            scanner.scan(&page).await;
        });
    }

    queue.drain().await;

    let stats = &scanner.stats;
    let outcome = CrawlOutcome {
        pages_discovered: pages.len(),
        pages_archived: stats.pages_archived.load(Ordering::Relaxed),
        pages_failed: stats.pages_failed.load(Ordering::Relaxed),
        stylesheets: stats.stylesheets.load(Ordering::Relaxed),
    };

    tracing::info!(?outcome, "crawl drained");
    Ok(outcome)
}
