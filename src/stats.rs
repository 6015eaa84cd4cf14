//! Cache statistics and health overview.
//!
//! Summarizes what is cached: entry counts by verification state, expired
//! entries waiting for a sweep, disk usage, and a per-source breakdown. Used
//! by `blens cache stats`.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::cache::{CacheMap, ImageCache};
use crate::config::Config;

/// Per-source breakdown of cached images.
#[derive(Debug, Default, PartialEq)]
struct SourceStats {
    entries: usize,
    verified: usize,
    rejected: usize,
    last_fetch: Option<DateTime<Utc>>,
}

/// Run the stats command: read the cache and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let cache = ImageCache::from_config(&config.cache);
    let now = Utc::now();
    let stats = cache.stats(now).await?;
    let map = cache.store().snapshot().await?;

    println!("Breed Lens — Image Cache Stats");
    println!("==============================");
    println!();
    println!("  Directory:   {}", config.cache.dir.display());
    println!("  On disk:     {}", format_bytes(stats.bytes_on_disk));
    println!("  TTL:         {} days", config.cache.ttl_days);
    println!();
    println!("  Entries:     {}", stats.entries);
    println!("  Verified:    {}", stats.verified);
    println!("  Unverified:  {}", stats.unverified);
    println!("  Rejected:    {}", stats.rejected);
    println!("  Expired:     {}", stats.expired);

    let by_source = per_source(&map);
    if !by_source.is_empty() {
        println!();
        println!("  By source:");
        println!(
            "  {:<20} {:>7} {:>9} {:>9}   {}",
            "SOURCE", "IMAGES", "VERIFIED", "REJECTED", "LAST FETCH"
        );
        println!("  {}", "-".repeat(70));

        for (source, s) in &by_source {
            let fetched = match s.last_fetch {
                Some(ts) => format_relative(ts, now),
                None => "never".to_string(),
            };
            println!(
                "  {:<20} {:>7} {:>9} {:>9}   {}",
                source, s.entries, s.verified, s.rejected, fetched
            );
        }
    }

    println!();
    Ok(())
}

fn per_source(map: &CacheMap) -> BTreeMap<String, SourceStats> {
    let mut out: BTreeMap<String, SourceStats> = BTreeMap::new();
    for entry in map.values() {
        let name = if entry.source_name.is_empty() {
            "unknown".to_string()
        } else {
            entry.source_name.clone()
        };
        let s = out.entry(name).or_default();
        s.entries += 1;
        match entry.verified {
            Some(true) => s.verified += 1,
            Some(false) => s.rejected += 1,
            None => {}
        }
        if s.last_fetch.map_or(true, |t| entry.fetched_at > t) {
            s.last_fetch = Some(entry.fetched_at);
        }
    }
    out
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a timestamp relative to `now` (e.g. "3 hours ago").
fn format_relative(ts: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = (now - ts).num_seconds();

    if delta < 0 {
        return ts.format("%Y-%m-%d %H:%M").to_string();
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        ts.format("%Y-%m-%d %H:%M").to_string()
    }
}
