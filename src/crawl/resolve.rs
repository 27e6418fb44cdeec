// src/crawl/resolve.rs
// =============================================================================
// Turns href values into absolute URLs and URLs into archive paths.
//
// Resolution rules:
//   ""                      -> None (no link)
//   "//cdn.example.com/x"   -> base scheme + href
//   "/x.css"                -> base scheme + host (+ port) + href
//   "https://other.com/x"   -> unchanged
//   "x.css", "../x.css"     -> joined against the base path
//
// Archive paths are derived purely from the URL pathname, so two concurrent
// jobs only ever share a file when they handle the same resource.
// =============================================================================

use std::path::{Component, PathBuf};
use url::Url;

/// Resolves an href found on `base` into a fully-qualified http(s) URL
///
/// Returns None for empty hrefs, unparsable values, non-http schemes
/// (data:, javascript:, mailto:) and results without a host.
pub fn resolve(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    let resolved = if let Some(rest) = href.strip_prefix("//") {
        // Protocol-relative: borrow the page's scheme
        Url::parse(&format!("{}://{}", base.scheme(), rest)).ok()?
    } else if href.starts_with('/') {
        // Root-relative: join keeps the base scheme, host and port
        base.join(href).ok()?
    } else {
        match Url::parse(href) {
            Ok(absolute) => absolute,
            // Plain relative path, resolved like a browser would
            Err(url::ParseError::RelativeUrlWithoutBase) => base.join(href).ok()?,
            Err(_) => return None,
        }
    };

    let has_host = resolved.host_str().is_some_and(|host| !host.is_empty());
    let is_http = matches!(resolved.scheme(), "http" | "https");

    if has_host && is_http {
        Some(resolved)
    } else {
        None
    }
}

/// Relative path of an archived page inside the html/ directory
///
/// "/" -> "index.html", "/docs/" -> "docs.html", "/docs" -> "docs.html"
pub fn page_archive_path(url: &Url) -> PathBuf {
    let trimmed = url.path().trim_matches('/');

    if trimmed.is_empty() {
        PathBuf::from("index.html")
    } else {
        PathBuf::from(format!("{}.html", trimmed))
    }
}

/// Relative path of a downloaded stylesheet inside the css/ directory
///
/// Mirrors the URL pathname and guarantees a ".css" extension. Returns None
/// when the pathname names a directory rather than a file.
pub fn asset_archive_path(url: &Url) -> Option<PathBuf> {
    let path = url.path();
    if path.ends_with('/') {
        return None;
    }

    let trimmed = path.trim_start_matches('/');
    if trimmed.is_empty() {
        return None;
    }

    let relative = if trimmed.ends_with(".css") {
        PathBuf::from(trimmed)
    } else {
        PathBuf::from(format!("{}.css", trimmed))
    };

    // url already collapses "." and ".." segments; this keeps odd
    // percent-decoded input from escaping the archive directory.
    if relative.is_absolute() || relative.components().any(|c| !is_plain(&c)) {
        return None;
    }

    Some(relative)
}

fn is_plain(component: &Component<'_>) -> bool {
    matches!(component, Component::Normal(_))
}
