// src/report.rs
// =============================================================================
// Output of a run.
//
// - write_report: the newline-delimited list of unused selectors
// - RunSummary: the totals of a run, printed as a table or as JSON
// =============================================================================

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

/// Writes one selector per line to a fresh file at `path`
///
/// The data is flushed and synced to disk before this returns.
pub async fn write_report(path: &Path, selectors: &[String]) -> Result<()> {
    let file = File::create(path)
        .await
        .with_context(|| format!("failed to create report {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    for selector in selectors {
        writer.write_all(selector.as_bytes()).await?;
        writer.write_all(b"\n").await?;
    }

    writer
        .flush()
        .await
        .with_context(|| format!("failed to write report {}", path.display()))?;
    writer.get_ref().sync_all().await?;

    Ok(())
}

/// Totals of one run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub root_url: String,
    pub timestamp: i64,
    pub pages_discovered: usize,
    pub pages_archived: usize,
    pub pages_failed: usize,
    pub pages_analyzed: usize,
    pub stylesheets: usize,
    pub chunks: usize,
    pub unused_selectors: usize,
    pub report_path: PathBuf,
}

impl RunSummary {
    pub fn print(&self, json: bool) -> Result<()> {
        if json {
            println!("{}", serde_json::to_string_pretty(self)?);
        } else {
            self.print_table();
        }
        Ok(())
    }

    fn print_table(&self) {
        println!();
        println!("📊 Summary:");
        println!("   📄 Pages in sitemap: {}", self.pages_discovered);
        println!("   ✅ Archived: {}", self.pages_archived);
        println!("   ❌ Failed: {}", self.pages_failed);
        println!("   🔬 Analyzed: {}", self.pages_analyzed);
        println!("   🎨 Stylesheets: {}", self.stylesheets);
        println!("   🧩 Chunks: {}", self.chunks);
        println!("   🧹 Unused selectors: {}", self.unused_selectors);
        println!();
        println!("{}", self.report_path.display());
    }
}
