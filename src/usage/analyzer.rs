// src/usage/analyzer.rs
// =============================================================================
// Decides which selectors a set of HTML files never uses.
//
// UsageAnalyzer is the seam the reducer talks to: given some HTML files and
// all stylesheets, return the selectors that match nothing. The default
// implementation, DomUsageAnalyzer, parses every page with `scraper` and
// runs each selector against each document.
//
// Matching uses the normalised form of each selector (stateful pseudo tokens
// removed, see stylesheet.rs). A selector that still does not parse is kept
// as "used" so it never ends up in the report.
// =============================================================================

use anyhow::{Context, Result};
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::path::PathBuf;

use super::stylesheet::{extract_selectors, StyleSelector};

/// Finds the selectors a group of pages does not use
pub trait UsageAnalyzer {
    /// Selectors from `css_files` matched by no element of any `html_files`
    fn rejected_selectors(&self, html_files: &[PathBuf], css_files: &[PathBuf])
        -> Result<Vec<String>>;
}

/// Matches selectors against parsed documents with `scraper`
#[derive(Debug, Default, Clone, Copy)]
pub struct DomUsageAnalyzer;

impl UsageAnalyzer for DomUsageAnalyzer {
    fn rejected_selectors(
        &self,
        html_files: &[PathBuf],
        css_files: &[PathBuf],
    ) -> Result<Vec<String>> {
        let selectors = read_selectors(css_files)?;

        let documents = html_files
            .iter()
            .map(|path| {
                let bytes = std::fs::read(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                Ok(Html::parse_document(&String::from_utf8_lossy(&bytes)))
            })
            .collect::<Result<Vec<_>>>()?;

        let rejected = selectors
            .into_iter()
            .filter(|selector| !is_used(selector, &documents))
            .map(|selector| selector.text)
            .collect();

        Ok(rejected)
    }
}

/// Distinct selectors of all stylesheets, in file then source order
fn read_selectors(css_files: &[PathBuf]) -> Result<Vec<StyleSelector>> {
    let mut seen = HashSet::new();
    let mut selectors = Vec::new();

    for path in css_files {
        let bytes =
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;

        for selector in extract_selectors(&String::from_utf8_lossy(&bytes)) {
            if seen.insert(selector.text.clone()) {
                selectors.push(selector);
            }
        }
    }

    Ok(selectors)
}

fn is_used(selector: &StyleSelector, documents: &[Html]) -> bool {
    let parsed = match Selector::parse(&selector.normalized) {
        Ok(parsed) => parsed,
        Err(_) => {
            tracing::debug!(
                selector = %selector.text,
                normalized = %selector.normalized,
                "unparsable selector kept"
            );
            return true;
        }
    };

    documents
        .iter()
        .any(|document| document.select(&parsed).next().is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_rejected_selectors() {
        let dir = tempfile::tempdir().unwrap();
        let page = dir.path().join("index.html");
        let css = dir.path().join("site.css");
        fs::write(
            &page,
            r#"<html><body><nav class="menu"><a href="/">Home</a></nav><p class="intro">Hi</p></body></html>"#,
        )
        .unwrap();
        fs::write(
            &css,
            ".menu a:hover { color: red }
             .intro, .outro { margin: 0 }
             .modal::before { content: '' }
             body > nav { display: flex }
             .weird:unknown-thing { }",
        )
        .unwrap();

        let rejected = DomUsageAnalyzer.rejected_selectors(&[page], &[css]).unwrap();
        assert_eq!(rejected, vec![".outro", ".modal::before"]);
    }

    #[test]
    fn test_rejected_across_several_pages() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.html");
        let b = dir.path().join("b.html");
        let css = dir.path().join("site.css");
        fs::write(&a, r#"<div class="only-a"></div>"#).unwrap();
        fs::write(&b, r#"<div class="only-b"></div>"#).unwrap();
        fs::write(&css, ".only-a {} .only-b {} .neither {}").unwrap();

        let rejected = DomUsageAnalyzer.rejected_selectors(&[a, b], &[css]).unwrap();
        assert_eq!(rejected, vec![".neither"]);
    }

    #[test]
    fn test_nested_and_escaped_selectors() {
        let dir = tempfile::tempdir().unwrap();
        let page = dir.path().join("index.html");
        let css = dir.path().join("site.css");
        fs::write(&page, r#"<div class="card"><h2 class="title">x</h2></div><p class="md:hover:x"></p>"#)
            .unwrap();
        fs::write(
            &css,
            r".card { color: red; .title { margin: 0 } .badge { margin: 0 } }
              .md\:hover\:x { } .md\:focus\:y { }",
        )
        .unwrap();

        let rejected = DomUsageAnalyzer.rejected_selectors(&[page], &[css]).unwrap();
        assert_eq!(rejected, vec![".card .badge", r".md\:focus\:y"]);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.html");
        assert!(DomUsageAnalyzer.rejected_selectors(&[missing], &[]).is_err());
    }
}
