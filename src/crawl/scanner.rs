// src/crawl/scanner.rs
// =============================================================================
// Scans one page: fetch it, download its whitelisted stylesheets, archive it.
//
// How it works:
// 1. Fetch the page body (failure = the page is skipped)
// 2. Collect <link rel="stylesheet" href="..."> in document order
// 3. Resolve each href against the page URL
// 4. Keep links whose pathname passes the whitelist
// 5. Claim the local asset path with create_new and stream the stylesheet in;
//    if the file already exists another page got there first, nothing to do
// 6. Append the page body to html/<page path>.html
//
// scan() never returns an error. Anything that goes wrong is logged and the
// page is reported as failed, so one bad page cannot stall the rest.
// =============================================================================

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use scraper::{Html, Selector};
use std::io::ErrorKind;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use url::Url;

use super::http::{download_to, fetch_text};
use super::resolve::{asset_archive_path, page_archive_path, resolve};
use crate::context::RunContext;

/// Counters shared by every scan job of a run
#[derive(Debug, Default)]
pub struct ScanStats {
    pub pages_archived: AtomicUsize,
    pub pages_failed: AtomicUsize,
    pub stylesheets: AtomicUsize,
}

impl ScanStats {
    pub fn record(&self, success: bool) {
        let counter = if success {
            &self.pages_archived
        } else {
            &self.pages_failed
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Everything a scan job needs, cheap to clone into each task
#[derive(Clone)]
pub struct PageScanner {
    pub client: Client,
    pub ctx: Arc<RunContext>,
    pub stats: Arc<ScanStats>,
}

/// What happened to one stylesheet link
#[derive(Debug, PartialEq, Eq)]
enum AssetOutcome {
    Downloaded,
    AlreadyPresent,
}

impl PageScanner {
    pub fn new(client: Client, ctx: Arc<RunContext>) -> Self {
        Self {
            client,
            ctx,
            stats: Arc::new(ScanStats::default()),
        }
    }

    /// Scans `page_url`; true when the page was archived
    pub async fn scan(&self, page_url: &str) -> bool {
        let success = match self.try_scan(page_url).await {
            Ok(()) => true,
            Err(e) => {
                let detail = format!("{:#}", e);
                tracing::warn!(url = %page_url, error = %detail, "page skipped");
                false
            }
        };

        self.stats.record(success);
        success
    }

    async fn try_scan(&self, page_url: &str) -> Result<()> {
        let url = Url::parse(page_url).with_context(|| format!("invalid page URL {}", page_url))?;

        let body = fetch_text(&self.client, url.as_str()).await?;

        for href in extract_stylesheet_hrefs(&body)? {
            let Some(asset_url) = resolve(&url, &href) else {
                tracing::debug!(page = %url, href = %href, "unresolvable stylesheet link");
                continue;
            };

            if !self.ctx.whitelist.matches(asset_url.path()) {
                tracing::debug!(asset = %asset_url, "stylesheet not whitelisted");
                continue;
            }

            match self.fetch_asset(&asset_url).await {
                Ok(Some(AssetOutcome::Downloaded)) => {
                    self.stats.stylesheets.fetch_add(1, Ordering::Relaxed);
                }
                Ok(Some(AssetOutcome::AlreadyPresent)) | Ok(None) => {}
                Err(e) => {
                    let detail = format!("{:#}", e);
                    tracing::warn!(asset = %asset_url, error = %detail, "stylesheet skipped");
                }
            }
        }

        let page_path = self.ctx.html_dir().join(page_archive_path(&url));
        append_page(&page_path, &body).await?;

        tracing::debug!(url = %url, path = %page_path.display(), "page archived");
        Ok(())
    }

    // Returns None when the URL maps to no file (a directory-like pathname).
    async fn fetch_asset(&self, asset_url: &Url) -> Result<Option<AssetOutcome>> {
        let Some(relative) = asset_archive_path(asset_url) else {
            return Ok(None);
        };
        let target = self.ctx.css_dir().join(relative);

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        // create_new is the existence check and the claim in one step, so two
        // pages sharing a stylesheet never both download it.
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&target).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Ok(Some(AssetOutcome::AlreadyPresent));
            }
            Err(e) => {
                return Err(e).with_context(|| format!("failed to create {}", target.display()))
            }
        };

        match download_to(&self.client, asset_url.as_str(), &mut file).await {
            Ok(bytes) => {
                tracing::debug!(asset = %asset_url, bytes, "stylesheet downloaded");
                Ok(Some(AssetOutcome::Downloaded))
            }
            Err(e) => {
                drop(file);
                // Leave no empty or truncated stylesheet behind for the reducer
                if let Err(remove_err) = tokio::fs::remove_file(&target).await {
                    tracing::warn!(path = %target.display(), error = %remove_err, "could not remove partial stylesheet");
                }
                Err(e)
            }
        }
    }
}

/// hrefs of stylesheet links in document order
///
/// A link counts when its rel token list contains "stylesheet" in any case,
/// so rel="alternate stylesheet" and rel="StyleSheet" are both picked up.
fn extract_stylesheet_hrefs(html: &str) -> Result<Vec<String>> {
    let document = Html::parse_document(html);
    let selector =
        Selector::parse("link[rel][href]").map_err(|e| anyhow!("invalid link selector: {:?}", e))?;

    let hrefs = document
        .select(&selector)
        .filter(|link| {
            link.value()
                .attr("rel")
                .is_some_and(|rel| rel.split_ascii_whitespace().any(|t| t.eq_ignore_ascii_case("stylesheet")))
        })
        .filter_map(|link| link.value().attr("href"))
        .map(str::to_string)
        .collect();

    Ok(hrefs)
}

/// Appends a page body to its archive file, creating parent directories
async fn append_page(path: &Path, body: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .with_context(|| format!("failed to open {}", path.display()))?;

    file.write_all(body.as_bytes())
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    file.flush().await?;

    Ok(())
}
