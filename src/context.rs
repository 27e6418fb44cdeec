// src/context.rs
// =============================================================================
// Per-run state that every stage of the pipeline reads.
//
// A RunContext is created once in main, wrapped in an Arc and handed to every
// component. Nothing mutates it afterwards. It owns:
// - the root sitemap URL
// - the compiled stylesheet whitelist
// - the run directory <output>/<unix timestamp>/ and the paths inside it
//
// Layout of a run directory:
//   html/        archived page bodies
//   css/         downloaded stylesheets, mirroring their URL pathnames
//   report.txt   newline-delimited unused selectors
//   run.log      tracing output
// =============================================================================

use anyhow::{anyhow, Context, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use url::Url;

/// Ordered list of start-anchored patterns a stylesheet pathname must match
///
/// An empty list matches every pathname.
#[derive(Debug, Clone, Default)]
pub struct Whitelist {
    patterns: Vec<Regex>,
}

impl Whitelist {
    /// Builds a whitelist from the raw `--whitelist` value
    ///
    /// Each comma-separated token becomes `^token`. A missing value, a value
    /// with no usable tokens, or a `*` token means "match everything".
    pub fn parse(raw: Option<&str>) -> Result<Self> {
        let tokens: Vec<&str> = raw
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .collect();

        if tokens.is_empty() || tokens.contains(&"*") {
            return Ok(Self::match_all());
        }

        let patterns = tokens
            .into_iter()
            .map(|token| {
                Regex::new(&format!("^{}", token))
                    .with_context(|| format!("invalid whitelist pattern '{}'", token))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { patterns })
    }

    pub fn match_all() -> Self {
        Self::default()
    }

    /// True iff at least one pattern matches the pathname
    ///
    /// Patterns are tried against the pathname as-is and without its leading
    /// slash, so both "/static" and "static" select "/static/app.css".
    pub fn matches(&self, pathname: &str) -> bool {
        if self.patterns.is_empty() {
            return true;
        }

        let relative = pathname.strip_prefix('/').unwrap_or(pathname);
        self.patterns
            .iter()
            .any(|pattern| pattern.is_match(pathname) || pattern.is_match(relative))
    }
}

/// Immutable state for one invocation
#[derive(Debug)]
pub struct RunContext {
    pub root_url: Url,
    pub whitelist: Whitelist,
    pub timestamp: i64,
    run_dir: PathBuf,
}

impl RunContext {
    /// Creates a context keyed by the current unix time
    pub fn new(root_url: Url, whitelist: Whitelist, output_root: &Path) -> Self {
        Self::with_timestamp(root_url, whitelist, output_root, chrono::Utc::now().timestamp())
    }

    pub fn with_timestamp(
        root_url: Url,
        whitelist: Whitelist,
        output_root: &Path,
        timestamp: i64,
    ) -> Self {
        Self {
            root_url,
            whitelist,
            timestamp,
            run_dir: output_root.join(timestamp.to_string()),
        }
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn html_dir(&self) -> PathBuf {
        self.run_dir.join("html")
    }

    pub fn css_dir(&self) -> PathBuf {
        self.run_dir.join("css")
    }

    pub fn report_path(&self) -> PathBuf {
        self.run_dir.join("report.txt")
    }

    pub fn log_path(&self) -> PathBuf {
        self.run_dir.join("run.log")
    }

    /// Claims the run directory and creates its tree
    ///
    /// Fails when the run directory already exists, so two runs never share
    /// an archive.
    pub async fn prepare(&self) -> Result<()> {
        if let Some(output_root) = self.run_dir.parent() {
            tokio::fs::create_dir_all(output_root)
                .await
                .with_context(|| format!("failed to create {}", output_root.display()))?;
        }
        tokio::fs::create_dir(&self.run_dir)
            .await
            .with_context(|| format!("failed to create run directory {}", self.run_dir.display()))?;

        for dir in [self.html_dir(), self.css_dir()] {
            tokio::fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(())
    }

    /// Host of the root URL, used in progress output
    pub fn host(&self) -> Result<&str> {
        self.root_url
            .host_str()
            .ok_or_else(|| anyhow!("URL has no host: {}", self.root_url))
    }
}
