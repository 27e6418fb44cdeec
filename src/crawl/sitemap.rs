// src/crawl/sitemap.rs
// =============================================================================
// Flattens a sitemap (or a tree of sitemap indexes) into a list of page URLs.
//
// Sitemap formats:
// - Sitemap index: <sitemapindex><sitemap><loc>...</loc></sitemap>...
// - Leaf sitemap:  <urlset><url><loc>...</loc></url>...
//
// Nested sitemaps are walked one at a time, depth first. Every leaf <loc>
// is appended to a single accumulator shared by the whole recursion, so the
// result keeps document order and may contain the same page more than once
// when sitemaps overlap.
//
// Any fetch failure aborts the walk: a partial page list is never returned.
// =============================================================================

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;

use super::http::fetch_text;

/// Maximum nesting of sitemap indexes
const MAX_INDEX_DEPTH: usize = 8;

/// The <loc> entries found in one sitemap document
#[derive(Debug, Default, PartialEq)]
struct SitemapDocument {
    /// Nested sitemap URLs from <sitemap><loc>
    sitemaps: Vec<String>,
    /// Page URLs from <url><loc>
    pages: Vec<String>,
}

/// Walks the sitemap at `url` and returns every page URL it lists
pub async fn walk(client: &Client, url: &str) -> Result<Vec<String>> {
    let mut pages = Vec::new();
    let mut visited = HashSet::new();

    walk_into(client, url.to_string(), 0, &mut visited, &mut pages).await?;

    Ok(pages)
}

// Boxed so the async fn can call itself. `visited` only tracks sitemap
// documents, which keeps a cyclic index from looping forever.
fn walk_into<'a>(
    client: &'a Client,
    url: String,
    depth: usize,
    visited: &'a mut HashSet<String>,
    pages: &'a mut Vec<String>,
) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
    Box::pin(async move {
        if depth > MAX_INDEX_DEPTH {
            return Err(anyhow!(
                "sitemap index nesting exceeds {} levels at {}",
                MAX_INDEX_DEPTH,
                url
            ));
        }

        if !visited.insert(url.clone()) {
            tracing::debug!(url = %url, "sitemap already walked, skipping");
            return Ok(());
        }

        tracing::debug!(url = %url, depth, "fetching sitemap");

        let body = fetch_text(client, &url)
            .await
            .with_context(|| format!("failed to fetch sitemap {}", url))?;

        let document = parse_sitemap(&body)?;

        tracing::debug!(
            url = %url,
            nested = document.sitemaps.len(),
            pages = document.pages.len(),
            "parsed sitemap"
        );

        pages.extend(document.pages);

        for nested in document.sitemaps {
            walk_into(client, nested, depth + 1, visited, pages).await?;
        }

        Ok(())
    })
}

// The document is parsed with the HTML parser, which tolerates sloppy XML
// (missing declarations, stray whitespace, unknown namespaces). The Html
// value is dropped before this returns because it cannot cross an .await.
fn parse_sitemap(body: &str) -> Result<SitemapDocument> {
    let document = Html::parse_document(body);

    let sitemap_locs = Selector::parse("sitemap > loc")
        .map_err(|e| anyhow!("invalid sitemap selector: {:?}", e))?;
    let url_locs =
        Selector::parse("url > loc").map_err(|e| anyhow!("invalid sitemap selector: {:?}", e))?;

    let collect = |selector: &Selector| -> Vec<String> {
        document
            .select(selector)
            .map(|loc| loc.text().collect::<String>().trim().to_string())
            .filter(|loc| !loc.is_empty())
            .collect()
    };

    Ok(SitemapDocument {
        sitemaps: collect(&sitemap_locs),
        pages: collect(&url_locs),
    })
}
