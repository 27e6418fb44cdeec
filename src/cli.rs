// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// We use the "derive" API: the CLI structure is a plain Rust struct and the
// #[arg(...)] attributes describe each flag. Every flag can also be supplied
// through a CSS_SWEEP_* environment variable.
//
// Validation that belongs to the argument itself (a root URL must have a
// host, numbers must be at least 1) happens here, before any work starts.
// =============================================================================

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::pipeline::PipelineOptions;

/// Default number of archived pages handed to the usage analyzer at once
pub const DEFAULT_CHUNK_SIZE: usize = 500;

#[derive(Parser, Debug)]
#[command(
    name = "css-sweep",
    version,
    about = "Find CSS selectors that no page of a website uses",
    long_about = "css-sweep walks a website's sitemap, archives every page and every \
                  whitelisted stylesheet, then reports the selectors that are unused on \
                  every single page."
)]
pub struct Cli {
    /// Root sitemap URL (e.g., https://example.com/sitemap.xml)
    #[arg(long, env = "CSS_SWEEP_URL", value_parser = parse_root_url)]
    pub url: Url,

    /// Comma-separated stylesheet path patterns, each anchored at the start
    ///
    /// Example: --whitelist /static,/assets/css
    /// Omitted or '*' means every stylesheet is downloaded.
    #[arg(long, env = "CSS_SWEEP_WHITELIST")]
    pub whitelist: Option<String>,

    /// Directory the timestamped run directory is created in
    #[arg(long, env = "CSS_SWEEP_OUTPUT", default_value = "output")]
    pub output: PathBuf,

    /// Number of pages analyzed together
    #[arg(long, env = "CSS_SWEEP_CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE,
          value_parser = parse_positive)]
    pub chunk_size: usize,

    /// Maximum number of pages fetched at the same time (default: CPU count)
    #[arg(long, env = "CSS_SWEEP_CONCURRENCY", value_parser = parse_positive)]
    pub concurrency: Option<usize>,

    /// Per-request HTTP timeout in seconds
    #[arg(long, env = "CSS_SWEEP_TIMEOUT", default_value_t = 30)]
    pub timeout: u64,

    /// Print a JSON summary instead of progress lines
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Folds the tuning flags into the options the pipeline runs with
    pub fn pipeline_options(&self) -> PipelineOptions {
        let concurrency = self.concurrency.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        });

        PipelineOptions {
            concurrency,
            chunk_size: self.chunk_size,
            timeout: Duration::from_secs(self.timeout),
        }
    }
}

// The root URL must be absolute and carry a host; "file:///sitemap.xml" or
// "example.com" (no scheme) are rejected before anything touches the network.
fn parse_root_url(value: &str) -> Result<Url, String> {
    let url = Url::parse(value).map_err(|e| format!("invalid URL '{}': {}", value, e))?;

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(format!("URL has no host: {}", value)),
    }
}

fn parse_positive(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}
