//! Breed image cache: files on disk plus a metadata map.
//!
//! Each cached image lives at `{cache.dir}/{filename}` and has exactly one
//! [`CacheEntry`] in the metadata map, keyed by the same filename. The map is
//! behind the [`MetadataStore`] trait so the only shared mutable state has a
//! single, atomic read-modify-write entry point:
//!
//! - [`JsonFileStore`]: the production store, one JSON file next to the images.
//! - [`MemoryStore`]: for tests.
//!
//! Filenames are a pure function of species and breed identity, so
//! concurrent resolutions of one breed converge on the same file and entry
//! (last writer wins for that key; other keys are untouched).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::models::{BreedQuery, VerificationOutcome};

/// Extension of every cached image.
pub const CACHE_EXTENSION: &str = "jpg";

/// Files younger than this are never treated as orphans by the sweep; a
/// resolution may have written the file but not yet its entry.
const ORPHAN_GRACE_SECS: u64 = 60;

const MAX_SLUG_LEN: usize = 64;

/// Metadata for one cached image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fetched_at: DateTime<Utc>,
    pub source_url: String,
    #[serde(default)]
    pub source_name: String,
    /// Always `fetched_at + ttl`.
    pub expires_at: DateTime<Utc>,
    /// `None` until judged, then whether the image shows the named breed.
    #[serde(default)]
    pub verified: Option<bool>,
    #[serde(default)]
    pub verification_score: Option<u8>,
    #[serde(default)]
    pub verification_reasoning: Option<String>,
    #[serde(default)]
    pub verified_by: Option<String>,
}

impl CacheEntry {
    pub fn new(fetched_at: DateTime<Utc>, ttl: Duration, source_name: &str, source_url: &str) -> Self {
        Self {
            fetched_at,
            source_url: source_url.to_string(),
            source_name: source_name.to_string(),
            expires_at: fetched_at + ttl,
            verified: None,
            verification_score: None,
            verification_reasoning: None,
            verified_by: None,
        }
    }

    /// Expired from `expires_at` onward, inclusive.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

pub type CacheMap = BTreeMap<String, CacheEntry>;

/// Lowercase ASCII alphanumerics joined by single hyphens.
pub fn slugify(s: &str) -> String {
    let mut slug = String::with_capacity(s.len());
    for word in s
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        if !slug.is_empty() {
            slug.push('-');
        }
        slug.push_str(&word.to_ascii_lowercase());
    }
    slug
}

fn short_hash(s: &str) -> String {
    let digest = Sha256::digest(s.as_bytes());
    hex::encode(digest)[..12].to_string()
}

/// Deterministic cache filename for a breed: `{species}-{slug}.jpg`.
///
/// Identities with no usable characters fall back to a hash so that
/// distinct inputs never share a file. The result always satisfies
/// [`crate::assets::validate_token`].
pub fn cache_filename(query: &BreedQuery) -> String {
    let slug = slugify(&query.identity);
    let stem = if slug.is_empty() {
        short_hash(&query.identity)
    } else if slug.len() > MAX_SLUG_LEN {
        format!(
            "{}-{}",
            slug[..MAX_SLUG_LEN].trim_end_matches('-'),
            &short_hash(&query.identity)[..8]
        )
    } else {
        slug
    };
    format!("{}-{}.{}", query.species, stem, CACHE_EXTENSION)
}

/// Storage for the metadata map.
///
/// `modify` is the only write path: it loads the whole map, applies the
/// closure and stores the result as one atomic step with respect to other
/// `modify` calls on the same store.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn snapshot(&self) -> Result<CacheMap>;

    async fn modify(&self, f: &mut (dyn for<'m> FnMut(&'m mut CacheMap) + Send)) -> Result<()>;

    async fn get(&self, filename: &str) -> Result<Option<CacheEntry>> {
        Ok(self.snapshot().await?.get(filename).cloned())
    }
}

/// Metadata map persisted as a single JSON file.
///
/// Writes go to a temp file that is renamed over the original, so readers
/// never see a half-written map. A file that exists but does not parse is
/// never overwritten.
pub struct JsonFileStore {
    path: PathBuf,
    lock: tokio::sync::Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<CacheMap> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(|b| b.is_ascii_whitespace()) => Ok(CacheMap::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).with_context(|| {
                format!("Corrupt cache metadata file: {}", self.path.display())
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(CacheMap::new()),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", self.path.display())),
        }
    }
}

#[async_trait]
impl MetadataStore for JsonFileStore {
    async fn snapshot(&self) -> Result<CacheMap> {
        self.read().await
    }

    async fn modify(&self, f: &mut (dyn for<'m> FnMut(&'m mut CacheMap) + Send)) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut map = self.read().await?;
        f(&mut map);
        let json = serde_json::to_vec_pretty(&map)?;
        write_atomic(&self.path, &json).await
    }
}

/// In-memory metadata store for tests.
#[derive(Default)]
pub struct MemoryStore {
    map: RwLock<CacheMap>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for MemoryStore {
    async fn snapshot(&self) -> Result<CacheMap> {
        Ok(self
            .map
            .read()
            .map_err(|_| anyhow::anyhow!("metadata lock poisoned"))?
            .clone())
    }

    async fn modify(&self, f: &mut (dyn for<'m> FnMut(&'m mut CacheMap) + Send)) -> Result<()> {
        let mut map = self
            .map
            .write()
            .map_err(|_| anyhow::anyhow!("metadata lock poisoned"))?;
        f(&mut map);
        Ok(())
    }
}

/// Write `bytes` to `path` via a sibling temp file and rename.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    tokio::fs::create_dir_all(parent)
        .await
        .with_context(|| format!("Failed to create {}", parent.display()))?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("invalid cache path: {}", path.display()))?;
    let tmp = parent.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

    tokio::fs::write(&tmp, bytes)
        .await
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        bail!("Failed to move {} into place: {}", path.display(), e);
    }
    Ok(())
}

/// What one expiry sweep removed.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub expired: Vec<String>,
    pub missing_files: Vec<String>,
    pub orphans: Vec<String>,
}

impl SweepReport {
    pub fn total(&self) -> usize {
        self.expired.len() + self.missing_files.len() + self.orphans.len()
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub verified: usize,
    pub rejected: usize,
    pub unverified: usize,
    pub expired: usize,
    pub bytes_on_disk: u64,
}

/// The image directory together with its metadata store.
#[derive(Clone)]
pub struct ImageCache {
    dir: PathBuf,
    store: Arc<dyn MetadataStore>,
    ttl: Duration,
}

impl ImageCache {
    pub fn new(dir: impl Into<PathBuf>, store: Arc<dyn MetadataStore>, ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            store,
            ttl,
        }
    }

    /// Cache backed by the JSON metadata file configured in `[cache]`.
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(
            config.dir.clone(),
            Arc::new(JsonFileStore::new(config.metadata_path())),
            Duration::days(config.ttl_days),
        )
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn store(&self) -> &Arc<dyn MetadataStore> {
        &self.store
    }

    pub fn file_path(&self, filename: &str) -> PathBuf {
        self.dir.join(filename)
    }

    /// A live entry for `filename`: present, not expired, not rejected, and
    /// backed by a file. Store errors count as a miss.
    pub async fn lookup(&self, filename: &str, now: DateTime<Utc>) -> Option<CacheEntry> {
        let entry = match self.store.get(filename).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(e) => {
                warn!(filename, error = %e, "cache metadata unreadable; treating as miss");
                return None;
            }
        };
        if entry.is_expired(now) || entry.verified == Some(false) {
            return None;
        }
        if !tokio::fs::try_exists(self.file_path(filename))
            .await
            .unwrap_or(false)
        {
            debug!(filename, "cache entry without file; treating as miss");
            return None;
        }
        Some(entry)
    }

    /// Write the image file, then its entry (`verified = None`).
    pub async fn persist(
        &self,
        filename: &str,
        bytes: &[u8],
        source_name: &str,
        source_url: &str,
        now: DateTime<Utc>,
    ) -> Result<CacheEntry, CacheError> {
        let write_failed = |reason: String| CacheError::WriteFailed {
            filename: filename.to_string(),
            reason,
        };

        write_atomic(&self.file_path(filename), bytes)
            .await
            .map_err(|e| write_failed(e.to_string()))?;

        let entry = CacheEntry::new(now, self.ttl, source_name, source_url);
        let mut pending = Some(entry.clone());
        self.store
            .modify(&mut |map| {
                if let Some(entry) = pending.take() {
                    map.insert(filename.to_string(), entry);
                }
            })
            .await
            .map_err(|e| write_failed(e.to_string()))?;

        debug!(filename, source = source_name, "cached image");
        Ok(entry)
    }

    /// Fold a verification judgment into the entry, if it still exists.
    ///
    /// `verdict` is what the entry's `verified` flag becomes; an
    /// inconclusive judgment keeps its score and reasoning but stays `None`.
    pub async fn record_verification(
        &self,
        filename: &str,
        verdict: Option<bool>,
        outcome: &VerificationOutcome,
        provider: &str,
    ) -> Result<()> {
        self.store
            .modify(&mut |map| {
                if let Some(entry) = map.get_mut(filename) {
                    entry.verified = verdict;
                    entry.verification_score = Some(outcome.confidence);
                    entry.verification_reasoning = Some(outcome.reasoning.clone());
                    entry.verified_by = Some(provider.to_string());
                }
            })
            .await
    }

    /// Remove both the file and the entry. Missing pieces are not an error.
    pub async fn evict(&self, filename: &str) -> Result<()> {
        match tokio::fs::remove_file(self.file_path(filename)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e).with_context(|| format!("Failed to delete {}", filename)),
        }
        self.store
            .modify(&mut |map| {
                map.remove(filename);
            })
            .await
    }

    /// Remove expired entries (and their files), entries whose file is gone,
    /// and image files with no entry. Safe to run repeatedly and alongside
    /// live resolutions.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let present = self.image_files().await?;
        let mut report = SweepReport::default();

        self.store
            .modify(&mut |map| {
                report = SweepReport::default();
                map.retain(|filename, entry| {
                    if entry.is_expired(now) {
                        report.expired.push(filename.clone());
                        false
                    } else if !present.iter().any(|(f, _)| f == filename)
                        && !self.file_path(filename).exists()
                    {
                        // Listed before the lock; a resolution may have written it since.
                        report.missing_files.push(filename.clone());
                        false
                    } else {
                        true
                    }
                });
            })
            .await?;

        for filename in &report.expired {
            if let Err(e) = tokio::fs::remove_file(self.file_path(filename)).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(filename = %filename, error = %e, "failed to delete expired image");
                }
            }
        }

        let live = self.store.snapshot().await?;
        for (filename, age) in present {
            if live.contains_key(&filename) || report.expired.contains(&filename) {
                continue;
            }
            if age < std::time::Duration::from_secs(ORPHAN_GRACE_SECS) {
                continue;
            }
            match tokio::fs::remove_file(self.file_path(&filename)).await {
                Ok(()) => report.orphans.push(filename),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(filename = %filename, error = %e, "failed to delete orphan image"),
            }
        }

        info!(
            expired = report.expired.len(),
            missing_files = report.missing_files.len(),
            orphans = report.orphans.len(),
            "cache sweep finished"
        );
        Ok(report)
    }

    pub async fn stats(&self, now: DateTime<Utc>) -> Result<CacheStats> {
        let map = self.store.snapshot().await?;
        let mut stats = CacheStats {
            entries: map.len(),
            ..Default::default()
        };
        for entry in map.values() {
            match entry.verified {
                Some(true) => stats.verified += 1,
                Some(false) => stats.rejected += 1,
                None => stats.unverified += 1,
            }
            if entry.is_expired(now) {
                stats.expired += 1;
            }
        }
        for (filename, _) in self.image_files().await? {
            if let Ok(meta) = tokio::fs::metadata(self.file_path(&filename)).await {
                stats.bytes_on_disk += meta.len();
            }
        }
        Ok(stats)
    }

    /// Cached image files with their age. The metadata file and temp files
    /// never match.
    async fn image_files(&self) -> Result<Vec<(String, std::time::Duration)>> {
        let mut files = Vec::new();
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(files),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to list {}", self.dir.display()))
            }
        };
        while let Some(item) = dir.next_entry().await? {
            let name = item.file_name().to_string_lossy().to_string();
            if name.starts_with('.') || !name.ends_with(&format!(".{}", CACHE_EXTENSION)) {
                continue;
            }
            let meta = item.metadata().await?;
            if !meta.is_file() {
                continue;
            }
            let age = meta
                .modified()
                .ok()
                .and_then(|m| m.elapsed().ok())
                .unwrap_or_default();
            files.push((name, age));
        }
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Species;
    use tempfile::TempDir;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn file_cache(tmp: &TempDir) -> ImageCache {
        ImageCache::new(
            tmp.path(),
            Arc::new(JsonFileStore::new(tmp.path().join("cache-metadata.json"))),
            Duration::days(7),
        )
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Golden  Retriever!"), "golden-retriever");
        assert_eq!(slugify("St. Bernard"), "st-bernard");
        assert_eq!(slugify("Shih-Tzu"), "shih-tzu");
        assert_eq!(slugify("???"), "");
        assert_eq!(slugify("Évian Hound"), "vian-hound");
    }

    #[test]
    fn test_filename_is_deterministic_and_species_scoped() {
        let a = BreedQuery::new("golden-retriever", Species::Dog, "Golden Retriever");
        let b = BreedQuery::new("Golden Retriever", Species::Dog, "whatever");
        assert_eq!(cache_filename(&a), "dog-golden-retriever.jpg");
        assert_eq!(cache_filename(&a), cache_filename(&b));

        let c = BreedQuery::new("golden-retriever", Species::Cat, "x");
        assert_ne!(cache_filename(&a), cache_filename(&c));
    }

    #[test]
    fn test_filename_for_unsluggable_identity_uses_hash() {
        let a = BreedQuery::new("???", Species::Dog, "???");
        let b = BreedQuery::new("!!!", Species::Dog, "!!!");
        let fa = cache_filename(&a);
        assert!(fa.starts_with("dog-") && fa.ends_with(".jpg"));
        assert_eq!(fa.len(), "dog-".len() + 12 + ".jpg".len());
        assert_ne!(fa, cache_filename(&b));
    }

    #[test]
    fn test_long_identity_is_truncated_but_distinct() {
        let long_a = "a".repeat(200);
        let long_b = format!("{}b", "a".repeat(199));
        let fa = cache_filename(&BreedQuery::new(long_a, Species::Cat, ""));
        let fb = cache_filename(&BreedQuery::new(long_b, Species::Cat, ""));
        assert!(fa.len() < 90);
        assert_ne!(fa, fb);
    }

    #[test]
    fn test_expiry_is_exactly_ttl_and_inclusive() {
        let fetched = ts("2024-03-01T12:00:00Z");
        let entry = CacheEntry::new(fetched, Duration::days(7), "dog-catalog", "https://x/a.jpg");
        assert_eq!(entry.expires_at, ts("2024-03-08T12:00:00Z"));
        assert!(!entry.is_expired(ts("2024-03-08T11:59:59Z")));
        assert!(entry.is_expired(ts("2024-03-08T12:00:00Z")));
    }

    #[tokio::test]
    async fn test_persist_then_lookup() {
        let tmp = TempDir::new().unwrap();
        let cache = file_cache(&tmp);
        let now = ts("2024-03-01T00:00:00Z");

        let entry = cache
            .persist("dog-pug.jpg", b"jpeg", "dog-catalog", "https://x/pug.jpg", now)
            .await
            .unwrap();
        assert_eq!(entry.expires_at, now + Duration::days(7));
        assert_eq!(entry.verified, None);

        let hit = cache.lookup("dog-pug.jpg", now + Duration::days(6)).await;
        assert_eq!(hit, Some(entry.clone()));
        assert!(cache.lookup("dog-pug.jpg", entry.expires_at).await.is_none());

        // Persisted as JSON next to the image.
        let raw = std::fs::read_to_string(tmp.path().join("cache-metadata.json")).unwrap();
        let parsed: CacheMap = serde_json::from_str(&raw).unwrap();
        assert!(parsed.contains_key("dog-pug.jpg"));
    }

    #[tokio::test]
    async fn test_lookup_requires_backing_file() {
        let tmp = TempDir::new().unwrap();
        let cache = file_cache(&tmp);
        let now = Utc::now();
        cache.persist("dog-pug.jpg", b"x", "s", "u", now).await.unwrap();
        std::fs::remove_file(tmp.path().join("dog-pug.jpg")).unwrap();
        assert!(cache.lookup("dog-pug.jpg", now).await.is_none());
    }

    #[tokio::test]
    async fn test_rejected_entry_is_a_miss() {
        let tmp = TempDir::new().unwrap();
        let cache = file_cache(&tmp);
        let now = Utc::now();
        cache.persist("cat-manx.jpg", b"x", "s", "u", now).await.unwrap();
        cache
            .record_verification(
                "cat-manx.jpg",
                Some(false),
                &VerificationOutcome {
                    is_correct: false,
                    confidence: 90,
                    reasoning: "tailed cat".into(),
                },
                "seer",
            )
            .await
            .unwrap();
        let entry = cache.store().get("cat-manx.jpg").await.unwrap().unwrap();
        assert_eq!(entry.verified, Some(false));
        assert_eq!(entry.verified_by.as_deref(), Some("seer"));
        assert!(cache.lookup("cat-manx.jpg", now).await.is_none());
    }

    #[tokio::test]
    async fn test_evict_removes_file_and_entry() {
        let tmp = TempDir::new().unwrap();
        let cache = file_cache(&tmp);
        cache.persist("dog-pug.jpg", b"x", "s", "u", Utc::now()).await.unwrap();
        cache.evict("dog-pug.jpg").await.unwrap();
        assert!(!tmp.path().join("dog-pug.jpg").exists());
        assert!(cache.store().get("dog-pug.jpg").await.unwrap().is_none());
        // Evicting twice is fine.
        cache.evict("dog-pug.jpg").await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_writes_keep_every_key() {
        let tmp = TempDir::new().unwrap();
        let cache = file_cache(&tmp);
        let now = Utc::now();
        let mut handles = Vec::new();
        for i in 0..16 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                let name = format!("dog-breed-{}.jpg", i);
                cache.persist(&name, b"x", "s", "u", now).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(cache.store().snapshot().await.unwrap().len(), 16);
    }

    #[tokio::test]
    async fn test_corrupt_metadata_is_not_overwritten() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cache-metadata.json");
        std::fs::write(&path, "{ not json").unwrap();
        let cache = file_cache(&tmp);
        let err = cache
            .persist("dog-pug.jpg", b"x", "s", "u", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::WriteFailed { .. }));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
        assert!(cache.lookup("dog-pug.jpg", Utc::now()).await.is_none());
    }

    #[tokio::test]
    async fn test_sweep_removes_expired_missing_and_orphans() {
        let tmp = TempDir::new().unwrap();
        let cache = file_cache(&tmp);
        let old = Utc::now() - Duration::days(8);
        let fresh = Utc::now();

        cache.persist("dog-old.jpg", b"x", "s", "u", old).await.unwrap();
        cache.persist("dog-fresh.jpg", b"x", "s", "u", fresh).await.unwrap();
        cache.persist("dog-gone.jpg", b"x", "s", "u", fresh).await.unwrap();
        std::fs::remove_file(tmp.path().join("dog-gone.jpg")).unwrap();

        // An orphan old enough to be collected, and one still in its grace period.
        let orphan = tmp.path().join("dog-orphan.jpg");
        std::fs::write(&orphan, b"x").unwrap();
        let past = std::time::SystemTime::now() - std::time::Duration::from_secs(3600);
        std::fs::File::options()
            .write(true)
            .open(&orphan)
            .unwrap()
            .set_modified(past)
            .unwrap();
        std::fs::write(tmp.path().join("dog-new-orphan.jpg"), b"x").unwrap();

        let report = cache.sweep(Utc::now()).await.unwrap();
        assert_eq!(report.expired, vec!["dog-old.jpg"]);
        assert_eq!(report.missing_files, vec!["dog-gone.jpg"]);
        assert_eq!(report.orphans, vec!["dog-orphan.jpg"]);

        assert!(!tmp.path().join("dog-old.jpg").exists());
        assert!(tmp.path().join("dog-fresh.jpg").exists());
        assert!(tmp.path().join("dog-new-orphan.jpg").exists());
        assert!(tmp.path().join("cache-metadata.json").exists());

        let again = cache.sweep(Utc::now()).await.unwrap();
        assert_eq!(again.total(), 0);
    }

    /// Store that persists one fresh image the first time `modify` runs,
    /// the way a live resolution can between the directory listing and
    /// the sweep's write.
    struct InterleavedStore {
        inner: MemoryStore,
        dir: PathBuf,
        fired: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl MetadataStore for InterleavedStore {
        async fn snapshot(&self) -> Result<CacheMap> {
            self.inner.snapshot().await
        }

        async fn modify(&self, f: &mut (dyn for<'m> FnMut(&'m mut CacheMap) + Send)) -> Result<()> {
            if !self.fired.swap(true, std::sync::atomic::Ordering::SeqCst) {
                std::fs::write(self.dir.join("dog-fresh.jpg"), b"x")?;
                let entry = CacheEntry::new(Utc::now(), Duration::days(7), "s", "u");
                self.inner
                    .modify(&mut |map| {
                        map.insert("dog-fresh.jpg".to_string(), entry.clone());
                    })
                    .await?;
            }
            self.inner.modify(f).await
        }
    }

    #[tokio::test]
    async fn test_sweep_keeps_entry_persisted_during_sweep() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(InterleavedStore {
            inner: MemoryStore::new(),
            dir: tmp.path().to_path_buf(),
            fired: std::sync::atomic::AtomicBool::new(false),
        });
        let cache = ImageCache::new(tmp.path(), store.clone(), Duration::days(7));

        let report = cache.sweep(Utc::now()).await.unwrap();
        assert_eq!(report.total(), 0, "{:?}", report);
        assert!(tmp.path().join("dog-fresh.jpg").exists());
        assert!(store.get("dog-fresh.jpg").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_stats() {
        let store: Arc<dyn MetadataStore> = Arc::new(MemoryStore::new());
        let tmp = TempDir::new().unwrap();
        let cache = ImageCache::new(tmp.path(), store, Duration::days(7));
        let now = Utc::now();
        cache.persist("cat-a.jpg", b"1234", "s", "u", now).await.unwrap();
        cache.persist("cat-b.jpg", b"12", "s", "u", now - Duration::days(9)).await.unwrap();
        let ok = VerificationOutcome {
            is_correct: true,
            confidence: 95,
            reasoning: "yes".into(),
        };
        cache.record_verification("cat-a.jpg", Some(true), &ok, "p").await.unwrap();

        let stats = cache.stats(now).await.unwrap();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.verified, 1);
        assert_eq!(stats.unverified, 1);
        assert_eq!(stats.expired, 1);
        assert_eq!(stats.bytes_on_disk, 6);
    }
}
