//! Offline cache maintenance: expiry sweep and pre-warming.
//!
//! Both are safe to run while the server is handling requests. The sweep
//! goes through the same metadata store as live resolutions, and pre-warm
//! uses the ordinary [`ImagePipeline::resolve`] path.

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::breeds::SourceDirectory;
use crate::cache::{ImageCache, SweepReport};
use crate::config::{Config, WarmConfig};
use crate::models::{BreedQuery, ImageOrigin, Species};
use crate::pipeline::ImagePipeline;
use crate::router::CompletionRouter;
use std::sync::Arc;

pub async fn run_sweep(cache: &ImageCache) -> Result<SweepReport> {
    cache.sweep(Utc::now()).await
}

/// Breeds to pre-warm: the `[warm]` list when set, otherwise the directory's
/// popular breeds. Names are canonicalized so they share cache files with
/// live requests.
pub fn warm_list(
    config: &WarmConfig,
    directory: &SourceDirectory,
    species: Option<Species>,
) -> Vec<BreedQuery> {
    if config.breeds.is_empty() {
        return directory.popular(species);
    }
    config
        .breeds
        .iter()
        .filter(|b| species.map_or(true, |s| s == b.species))
        .map(|b| directory.canonical_query(&b.name, b.species))
        .collect()
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct WarmReport {
    pub already_cached: Vec<String>,
    pub fetched: Vec<String>,
    pub placeholders: Vec<String>,
}

impl WarmReport {
    pub fn total(&self) -> usize {
        self.already_cached.len() + self.fetched.len() + self.placeholders.len()
    }
}

/// Resolve each breed in turn. Stops early, with a partial report, once
/// `cancel` fires.
pub async fn warm(
    pipeline: &ImagePipeline,
    queries: &[BreedQuery],
    cancel: &CancellationToken,
) -> WarmReport {
    let mut report = WarmReport::default();
    for query in queries {
        if cancel.is_cancelled() {
            info!(done = report.total(), remaining = queries.len() - report.total(), "pre-warm cancelled");
            break;
        }
        let reference = pipeline.resolve_with_cancel(query, cancel).await;
        let label = format!("{} {}", query.species, query.identity);
        match reference.origin {
            ImageOrigin::Cache => report.already_cached.push(label),
            ImageOrigin::Fetched => report.fetched.push(label),
            ImageOrigin::Placeholder => report.placeholders.push(label),
        }
    }
    info!(
        cached = report.already_cached.len(),
        fetched = report.fetched.len(),
        placeholders = report.placeholders.len(),
        "pre-warm finished"
    );
    report
}

/// Run the `cache sweep` command.
pub async fn sweep_command(config: &Config) -> Result<()> {
    let cache = ImageCache::from_config(&config.cache);
    let report = run_sweep(&cache).await?;
    println!(
        "Swept {}: {} expired, {} missing file(s), {} orphan file(s) removed.",
        config.cache.dir.display(),
        report.expired.len(),
        report.missing_files.len(),
        report.orphans.len()
    );
    for name in report.expired.iter().chain(&report.missing_files).chain(&report.orphans) {
        println!("  - {}", name);
    }
    Ok(())
}

/// Run the `cache warm` command. Ctrl-C stops after the current breed.
pub async fn warm_command(config: &Config, species: Option<Species>) -> Result<()> {
    let router = CompletionRouter::from_config(&config.providers)?;
    let directory = Arc::new(SourceDirectory::new());
    let queries = warm_list(&config.warm, &directory, species);
    let pipeline = ImagePipeline::from_config(config, router, directory)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    println!("Warming {} breed image(s)...", queries.len());
    let report = warm(&pipeline, &queries, &cancel).await;
    println!(
        "Done: {} fetched, {} already cached, {} placeholder(s).",
        report.fetched.len(),
        report.already_cached.len(),
        report.placeholders.len()
    );
    for name in &report.placeholders {
        println!("  no image: {}", name);
    }
    Ok(())
}
