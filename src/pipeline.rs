// src/pipeline.rs
// =============================================================================
// One full run, start to finish.
//
// Phase 1 (concurrent): walk the sitemap, scan pages, archive pages and
//                       stylesheets. Returns only after the fetch queue drains.
// Phase 2 (sequential): reduce the archive to the selectors every chunk
//                       rejected, then write the report.
//
// Phase 2 never starts before phase 1 has drained: the reducer lists the
// archive directories and needs every file to be complete.
// =============================================================================

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use crate::context::RunContext;
use crate::crawl::{build_client, crawl_site};
use crate::report::{write_report, RunSummary};
use crate::usage::{reduce, UsageAnalyzer};

/// Tuning knobs for a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Pages scanned at the same time
    pub concurrency: usize,
    /// Pages per usage-analysis chunk
    pub chunk_size: usize,
    /// Per-request HTTP timeout
    pub timeout: Duration,
}

/// Runs crawl, reduction and report for `ctx`
///
/// The run directory must already be claimed with `RunContext::prepare`.
pub async fn run<A>(ctx: Arc<RunContext>, options: &PipelineOptions, analyzer: A) -> Result<RunSummary>
where
    A: UsageAnalyzer + Send + 'static,
{
    let client = build_client(options.timeout)?;
    let crawl = crawl_site(Arc::clone(&ctx), client, options.concurrency)
        .await
        .context("crawl failed")?;

    // Analysis is CPU-bound, keep it off the async workers
    let html_dir = ctx.html_dir();
    let css_dir = ctx.css_dir();
    let chunk_size = options.chunk_size;
    let reduction = tokio::task::spawn_blocking(move || {
        reduce(&html_dir, &css_dir, chunk_size, &analyzer)
    })
    .await
    .context("usage analysis task panicked")?
    .context("usage analysis failed")?;

    let report_path = ctx.report_path();
    write_report(&report_path, &reduction.unused).await?;

    tracing::info!(
        unused = reduction.unused.len(),
        report = %report_path.display(),
        "report written"
    );

    Ok(RunSummary {
        root_url: ctx.root_url.to_string(),
        timestamp: ctx.timestamp,
        pages_discovered: crawl.pages_discovered,
        pages_archived: crawl.pages_archived,
        pages_failed: crawl.pages_failed,
        pages_analyzed: reduction.pages,
        stylesheets: reduction.stylesheets,
        chunks: reduction.chunks,
        unused_selectors: reduction.unused.len(),
        report_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Whitelist;
    use crate::usage::DomUsageAnalyzer;
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn serve(server: &MockServer, at: &str, body: String) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    fn options() -> PipelineOptions {
        PipelineOptions {
            concurrency: 4,
            chunk_size: 500,
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_end_to_end_whitelisted_stylesheet() {
        let server = MockServer::start().await;
        let uri = server.uri();

        serve(
            &server,
            "/sitemap.xml",
            format!(
                "<urlset><url><loc>{uri}/a</loc></url><url><loc>{uri}/b</loc></url></urlset>"
            ),
        )
        .await;
        serve(
            &server,
            "/a",
            r#"<html><head><link rel="stylesheet" href="/static/a.css"></head>
               <body><div class="hero"><a class="cta" href="/b">Go</a></div></body></html>"#
                .to_string(),
        )
        .await;
        serve(
            &server,
            "/b",
            r#"<html><head><link rel="stylesheet" href="/theme/b.css"></head>
               <body><p class="note">Hello</p></body></html>"#
                .to_string(),
        )
        .await;
        serve(
            &server,
            "/static/a.css",
            ".hero { padding: 0 } .cta:hover { color: red } .note { margin: 0 }
             .sidebar { width: 10em } .footer-links a { color: gray }"
                .to_string(),
        )
        .await;
        serve(&server, "/theme/b.css", ".theme-only { color: blue }".to_string()).await;

        let output = tempfile::tempdir().unwrap();
        let root = Url::parse(&format!("{uri}/sitemap.xml")).unwrap();
        let whitelist = Whitelist::parse(Some("static")).unwrap();
        let ctx = Arc::new(RunContext::with_timestamp(root, whitelist, output.path(), 1234));

        ctx.prepare().await.unwrap();
        let summary = run(Arc::clone(&ctx), &options(), DomUsageAnalyzer).await.unwrap();

        let run_dir = output.path().join("1234");
        assert!(run_dir.join("css/static/a.css").exists());
        assert!(!run_dir.join("css/theme/b.css").exists());
        assert!(run_dir.join("html/a.html").exists());
        assert!(run_dir.join("html/b.html").exists());

        let report = std::fs::read_to_string(run_dir.join("report.txt")).unwrap();
        assert_eq!(report, ".sidebar\n.footer-links a\n");

        assert_eq!(summary.pages_discovered, 2);
        assert_eq!(summary.pages_archived, 2);
        assert_eq!(summary.pages_failed, 0);
        assert_eq!(summary.pages_analyzed, 2);
        assert_eq!(summary.stylesheets, 1);
        assert_eq!(summary.chunks, 1);
        assert_eq!(summary.unused_selectors, 2);
    }

    #[tokio::test]
    async fn test_failed_page_does_not_abort_run() {
        let server = MockServer::start().await;
        let uri = server.uri();

        serve(
            &server,
            "/sitemap.xml",
            format!(
                "<urlset><url><loc>{uri}/ok</loc></url><url><loc>{uri}/down</loc></url></urlset>"
            ),
        )
        .await;
        serve(&server, "/ok", "<p class=\"here\"></p>".to_string()).await;
        Mock::given(method("GET"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let output = tempfile::tempdir().unwrap();
        let root = Url::parse(&format!("{uri}/sitemap.xml")).unwrap();
        let ctx = Arc::new(RunContext::with_timestamp(
            root,
            Whitelist::match_all(),
            output.path(),
            1,
        ));

        ctx.prepare().await.unwrap();
        let summary = run(ctx, &options(), DomUsageAnalyzer).await.unwrap();
        assert_eq!(summary.pages_archived, 1);
        assert_eq!(summary.pages_failed, 1);
        assert!(summary.report_path.exists());
    }

    #[tokio::test]
    async fn test_sitemap_failure_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sitemap.xml"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let output = tempfile::tempdir().unwrap();
        let root = Url::parse(&format!("{}/sitemap.xml", server.uri())).unwrap();
        let ctx = Arc::new(RunContext::with_timestamp(
            root,
            Whitelist::match_all(),
            output.path(),
            1,
        ));

        ctx.prepare().await.unwrap();
        let result = run(Arc::clone(&ctx), &options(), DomUsageAnalyzer).await;
        assert!(result.is_err());
        assert!(!ctx.report_path().exists());
    }
}
