// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Parse command-line arguments using clap
// 2. Build the run context (root URL, whitelist, timestamped run directory)
// 3. Claim the run directory and start logging into it
// 4. Run the pipeline: crawl -> drain -> usage reduction -> report
// 5. Print the summary and exit (0 = report written, 1 = anything failed)
//
// On failure exactly one "Error: ..." line goes to stderr; the full error
// chain is in the run's log file.
// =============================================================================

mod cli;
mod context;
mod crawl;
mod logging;
mod pipeline;
mod report;
mod usage;

use anyhow::Result;
use clap::error::ErrorKind;
use clap::Parser;
use std::sync::Arc;

use cli::Cli;
use context::{RunContext, Whitelist};
use usage::DomUsageAnalyzer;

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            std::process::exit(code);
        }
    };

    let exit_code = match run(cli).await {
        Ok(()) => 0,
        Err(e) => {
            let detail = format!("{:#}", e);
            tracing::error!(error = %detail, "run failed");
            eprintln!("Error: {}", e);
            1
        }
    };

    std::process::exit(exit_code);
}

async fn run(cli: Cli) -> Result<()> {
    let whitelist = Whitelist::parse(cli.whitelist.as_deref())?;
    let options = cli.pipeline_options();
    let ctx = Arc::new(RunContext::new(cli.url.clone(), whitelist, &cli.output));

    ctx.prepare().await?;
    logging::init_logging(&ctx.log_path())?;
    tracing::info!(url = %ctx.root_url, ?options, "run started");

    if !cli.json {
        println!("🔍 Crawling sitemap of {}: {}", ctx.host()?, ctx.root_url);
        println!("📁 Output: {}", ctx.run_dir().display());
        println!("⚙️  Concurrency: {}, chunk size: {}", options.concurrency, options.chunk_size);
    }

    let summary = pipeline::run(ctx, &options, DomUsageAnalyzer).await?;
    summary.print(cli.json)?;

    Ok(())
}
