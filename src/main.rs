//! CLI entry point for the harvester tool.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use futures_util::future::join_all;
use harvester_core::{
    CatalogClient, ContentKind, DownloadEngine, HarvestConfig, HarvestOrchestrator, HttpClient,
    LinkListStore, RateGovernor, ResultSink,
};
use tracing::{debug, error, info, warn};

mod cli;

use cli::{Args, Command, DownloadArgs, HarvestArgs, LinksArgs, selected_kinds};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let config =
        HarvestConfig::load(args.config.as_deref()).context("failed to load configuration")?;

    match args.command {
        Command::Harvest(harvest) => run_harvest(&config, harvest).await,
        Command::Links(links) => run_links(&config, &links),
        Command::Download(download) => run_download(&config, download).await,
    }
}

async fn run_harvest(config: &HarvestConfig, args: HarvestArgs) -> Result<()> {
    let kinds = selected_kinds(&args.kinds);
    let max_pages = args.max_pages.unwrap_or(config.max_pages);

    // One governor for every kind: they share a single rate budget.
    let governor = Arc::new(RateGovernor::from_requests_per_minute(
        config.api.requests_per_minute,
    ));
    let catalog = Arc::new(
        CatalogClient::new(&config.api, governor).context("failed to create catalog client")?,
    );

    info!(kinds = ?kinds, max_pages, "starting harvest");

    let runs = kinds.iter().map(|kind| {
        let settings = config.kind(*kind);
        let catalog = Arc::clone(&catalog);
        async move {
            let mut orchestrator = HarvestOrchestrator::new(&settings, catalog, max_pages);
            (settings.kind, orchestrator.run().await)
        }
    });

    let mut failed: Vec<ContentKind> = Vec::new();
    for (kind, outcome) in join_all(runs).await {
        match outcome {
            Ok(report) => info!(
                kind = %kind,
                accepted = report.accepted,
                rejected = report.rejected,
                skipped = report.skipped,
                pages = report.pages_processed,
                "harvest complete"
            ),
            Err(e) => {
                error!(kind = %kind, "harvest failed: {:#}", anyhow::Error::new(e));
                failed.push(kind);
            }
        }
    }

    if !failed.is_empty() {
        let names: Vec<&str> = failed.iter().map(ContentKind::as_str).collect();
        bail!(
            "harvest failed for {}; re-run to resume from the failed page",
            names.join(", ")
        );
    }
    Ok(())
}

fn run_links(config: &HarvestConfig, args: &LinksArgs) -> Result<()> {
    let links_file = args
        .links_file
        .clone()
        .unwrap_or_else(|| config.downloads.links_file.clone());
    let store = LinkListStore::new(&links_file);

    let mut urls = Vec::new();
    for kind in selected_kinds(&args.kinds) {
        let sink = ResultSink::new(config.kind(kind).output_file);
        let records = sink
            .load()
            .with_context(|| format!("failed to read {kind} output"))?;
        urls.extend(records.into_iter().filter_map(|record| record.download_url));
    }

    let added = store
        .merge_urls(urls)
        .with_context(|| format!("failed to update link list {}", links_file.display()))?;
    info!(added, path = %links_file.display(), "link list updated");
    Ok(())
}

async fn run_download(config: &HarvestConfig, args: DownloadArgs) -> Result<()> {
    let links_file: PathBuf = args
        .links_file
        .unwrap_or_else(|| config.downloads.links_file.clone());
    let dest = args
        .dest
        .unwrap_or_else(|| config.downloads.destination_dir.clone());
    let concurrency = args
        .concurrency
        .map_or(config.downloads.concurrent_downloads, usize::from);

    let engine = DownloadEngine::new(concurrency)?;
    let client = Arc::new(
        HttpClient::new(config.downloads.timeout_secs)
            .context("failed to create download client")?,
    );
    let store = LinkListStore::new(&links_file);

    let links = engine.enumerate_links(&store)?;
    let pending = links.iter().filter(|link| !link.is_done()).count();
    info!(total = links.len(), pending, path = %links_file.display(), "link list loaded");

    let stats = engine
        .download_pending(&store, client, &dest)
        .await
        .context("download batch failed")?;

    info!(
        completed = stats.completed(),
        failed = stats.failed(),
        skipped = stats.skipped(),
        "Download complete"
    );

    if stats.failed() > 0 {
        warn!(
            failed = stats.failed(),
            "some downloads failed and remain pending; re-run to retry"
        );
    }
    Ok(())
}
