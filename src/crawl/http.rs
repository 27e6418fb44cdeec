// src/crawl/http.rs
// =============================================================================
// The HTTP side of the crawl.
//
// Key functionality:
// - One shared reqwest Client (connection pooling, timeout, user agent)
// - fetch_text: GET a sitemap or page, failing on non-2xx statuses
// - download_to: stream a stylesheet into a file that the caller has already
//   claimed, chunk by chunk, so large assets never sit fully in memory
//
// Rust concepts:
// - Streams: response.bytes_stream() yields the body piece by piece
// - StreamExt::next(): pulls the next chunk from the stream
// =============================================================================

use anyhow::{anyhow, Context, Result};
use futures::StreamExt;
use reqwest::Client;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

/// Builds the client every request in a run goes through
pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::limited(5))
        .user_agent(concat!("css-sweep/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")
}

/// Fetches a document body as text
pub async fn fetch_text(client: &Client, url: &str) -> Result<String> {
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("request to {} failed", url))?;

    if !response.status().is_success() {
        return Err(anyhow!("HTTP {} from {}", response.status(), url));
    }

    response
        .text()
        .await
        .with_context(|| format!("failed to read body of {}", url))
}

/// Streams the body of `url` into `file`
///
/// Returns the number of bytes written. The file is flushed before
/// returning so the write is complete once the future resolves.
pub async fn download_to(client: &Client, url: &str, file: &mut File) -> Result<u64> {
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("request to {} failed", url))?;

    if !response.status().is_success() {
        return Err(anyhow!("HTTP {} from {}", response.status(), url));
    }

    let mut written = 0u64;
    let mut body = response.bytes_stream();

    while let Some(chunk) = body.next().await {
        let chunk = chunk.with_context(|| format!("failed to read body of {}", url))?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    file.flush().await?;
    Ok(written)
}
