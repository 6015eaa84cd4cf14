//! Image resolution pipeline.
//!
//! Turns a [`BreedQuery`] into a displayable [`ImageReference`]. Resolution
//! never fails: every path ends in a cached image, a freshly fetched image or
//! a species placeholder.
//!
//! # States
//!
//! ```text
//! CacheCheck ──hit──────────────────────────────────────────────▶ Accepted
//!     │ miss
//!     ▼
//! Fetching(start) ──exhausted / cancelled──────────────────────▶ Placeholder
//!     │ source i
//!     ▼
//! Persisting ──mode = off──────────────────────────────────────▶ Accepted
//!     │
//!     ▼
//! Verifying ──correct / inconclusive / unavailable─────────────▶ Accepted
//!     │ rejected
//!     ├── first rejection ──▶ RejectedRetryOnce ──▶ Fetching(i + 1)
//!     └── after a retry ────────────────────────────────────────▶ Placeholder
//! ```
//!
//! A rejected image is evicted (file and entry) before moving on. The retry
//! flag travels with the state, so a second rejection can only go to
//! `Placeholder`.
//!
//! In `background` verification mode the machine pauses after `Persisting`,
//! the caller gets the persisted image, and the rest runs on a spawned task.

use anyhow::Result;
use base64::Engine;
use chrono::Utc;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::breeds::SourceDirectory;
use crate::cache::{cache_filename, CacheEntry, ImageCache};
use crate::config::{Config, ServerConfig, VerificationConfig, VerificationMode};
use crate::error::FetchError;
use crate::models::{BreedQuery, ImageOrigin, ImageReference, SourceCandidate, Species};
use crate::router::CompletionRouter;
use crate::sources::FetchWaterfall;
use crate::verify;

#[derive(Debug)]
enum Stage {
    CacheCheck,
    Fetching {
        start: usize,
        retried: bool,
    },
    Persisting {
        index: usize,
        candidate: SourceCandidate,
        retried: bool,
    },
    Verifying {
        index: usize,
        candidate: SourceCandidate,
        reference: ImageReference,
        retried: bool,
    },
    RejectedRetryOnce {
        after: usize,
    },
    Accepted(ImageReference),
    Placeholder,
}

impl Stage {
    fn label(&self) -> &'static str {
        match self {
            Stage::CacheCheck => "cache_check",
            Stage::Fetching { .. } => "fetching",
            Stage::Persisting { .. } => "persisting",
            Stage::Verifying { .. } => "verifying",
            Stage::RejectedRetryOnce { .. } => "rejected_retry_once",
            Stage::Accepted(_) => "accepted",
            Stage::Placeholder => "placeholder",
        }
    }
}

/// Where [`ImagePipeline::drive`] stopped.
enum Driven {
    Done(ImageReference),
    /// Paused before verification; the reference is already usable.
    Paused(ImageReference, Stage),
}

#[derive(Clone)]
pub struct ImagePipeline {
    cache: ImageCache,
    waterfall: FetchWaterfall,
    router: CompletionRouter,
    verification: VerificationConfig,
    server: ServerConfig,
}

impl ImagePipeline {
    pub fn new(
        cache: ImageCache,
        waterfall: FetchWaterfall,
        router: CompletionRouter,
        verification: VerificationConfig,
        server: ServerConfig,
    ) -> Self {
        Self {
            cache,
            waterfall,
            router,
            verification,
            server,
        }
    }

    /// Pipeline over the configured cache directory and standard waterfall.
    pub fn from_config(
        config: &Config,
        router: CompletionRouter,
        directory: Arc<SourceDirectory>,
    ) -> Result<Self> {
        Ok(Self::new(
            ImageCache::from_config(&config.cache),
            FetchWaterfall::from_config(&config.sources, &config.images, directory)?,
            router,
            config.verification.clone(),
            config.server.clone(),
        ))
    }

    pub fn cache(&self) -> &ImageCache {
        &self.cache
    }

    pub fn waterfall(&self) -> &FetchWaterfall {
        &self.waterfall
    }

    /// This pipeline with background verification run inline, for callers
    /// that exit as soon as `resolve` returns.
    pub fn foreground(&self) -> Self {
        let mut this = self.clone();
        if this.verification.mode == VerificationMode::Background {
            this.verification.mode = VerificationMode::Inline;
        }
        this
    }

    pub async fn resolve(&self, query: &BreedQuery) -> ImageReference {
        self.resolve_with_cancel(query, &CancellationToken::new())
            .await
    }

    /// Resolve `query`, stopping further fallback attempts once `cancel` fires.
    pub async fn resolve_with_cancel(
        &self,
        query: &BreedQuery,
        cancel: &CancellationToken,
    ) -> ImageReference {
        let detach = self.verification.mode == VerificationMode::Background;
        match self.drive(query, Stage::CacheCheck, cancel, detach).await {
            Driven::Done(reference) => reference,
            Driven::Paused(reference, pending) => {
                let this = self.clone();
                let query = query.clone();
                tokio::spawn(async move {
                    let cancel = CancellationToken::new();
                    if let Driven::Done(final_ref) = this.drive(&query, pending, &cancel, false).await {
                        debug!(
                            breed = %query.identity,
                            origin = ?final_ref.origin,
                            verified = ?final_ref.verified,
                            "background verification finished"
                        );
                    }
                });
                reference
            }
        }
    }

    /// Run the state machine from `stage` until a terminal state, or until
    /// verification is reached when `detach` is set.
    async fn drive(
        &self,
        query: &BreedQuery,
        mut stage: Stage,
        cancel: &CancellationToken,
        detach: bool,
    ) -> Driven {
        let filename = cache_filename(query);

        loop {
            debug!(breed = %query.identity, stage = stage.label(), "pipeline step");
            stage = match stage {
                Stage::CacheCheck => match self.cache.lookup(&filename, Utc::now()).await {
                    Some(entry) => Stage::Accepted(self.cached_reference(&filename, &entry)),
                    None => Stage::Fetching {
                        start: 0,
                        retried: false,
                    },
                },

                Stage::Fetching { start, retried } => {
                    match self.waterfall.fetch_from(query, start, cancel).await {
                        Ok((index, candidate)) => Stage::Persisting {
                            index,
                            candidate,
                            retried,
                        },
                        Err(FetchError::Cancelled) => {
                            info!(breed = %query.identity, "resolution cancelled");
                            Stage::Placeholder
                        }
                        Err(e) => {
                            warn!(breed = %query.identity, species = %query.species, error = %e, "no image source succeeded");
                            Stage::Placeholder
                        }
                    }
                }

                Stage::Persisting {
                    index,
                    candidate,
                    retried,
                } => {
                    let reference = self.persist(&filename, &candidate).await;
                    match self.verification.mode {
                        VerificationMode::Off => Stage::Accepted(reference),
                        _ => {
                            let next = Stage::Verifying {
                                index,
                                candidate,
                                reference: reference.clone(),
                                retried,
                            };
                            if detach {
                                return Driven::Paused(reference, next);
                            }
                            next
                        }
                    }
                }

                Stage::Verifying {
                    index,
                    candidate,
                    mut reference,
                    retried,
                } => match verify::verify_image(&self.router, query, &candidate.bytes, cancel).await {
                    Ok((outcome, provider)) => {
                        let rejected =
                            verify::is_rejection(&outcome, self.verification.rejection_threshold);
                        let verdict = if rejected {
                            Some(false)
                        } else if outcome.is_correct {
                            Some(true)
                        } else {
                            None
                        };
                        if let Err(e) = self
                            .cache
                            .record_verification(&filename, verdict, &outcome, &provider)
                            .await
                        {
                            warn!(filename = %filename, error = %e, "failed to record verification");
                        }

                        if rejected {
                            warn!(
                                breed = %query.identity,
                                source = %candidate.source_name,
                                confidence = outcome.confidence,
                                reasoning = %outcome.reasoning,
                                "image rejected by verification"
                            );
                            if let Err(e) = self.cache.evict(&filename).await {
                                warn!(filename = %filename, error = %e, "failed to evict rejected image");
                            }
                            if retried {
                                Stage::Placeholder
                            } else {
                                Stage::RejectedRetryOnce { after: index }
                            }
                        } else {
                            reference.verified = verdict;
                            reference.verification_score = Some(outcome.confidence);
                            Stage::Accepted(reference)
                        }
                    }
                    Err(e) => {
                        info!(breed = %query.identity, reason = %e, "verification unavailable; keeping image unverified");
                        Stage::Accepted(reference)
                    }
                },

                Stage::RejectedRetryOnce { after } => Stage::Fetching {
                    start: after + 1,
                    retried: true,
                },

                Stage::Accepted(reference) => return Driven::Done(reference),

                Stage::Placeholder => return Driven::Done(self.placeholder(query)),
            };
        }
    }

    /// Write the candidate under `filename`. A failed write still yields a
    /// displayable reference, carrying the bytes inline.
    async fn persist(&self, filename: &str, candidate: &SourceCandidate) -> ImageReference {
        match self
            .cache
            .persist(
                filename,
                &candidate.bytes,
                &candidate.source_name,
                &candidate.origin_url,
                Utc::now(),
            )
            .await
        {
            Ok(_) => ImageReference {
                image_url: self.asset_url(filename),
                filename: Some(filename.to_string()),
                origin: ImageOrigin::Fetched,
                source: Some(candidate.source_name.clone()),
                verified: None,
                verification_score: None,
            },
            Err(e) => {
                warn!(error = %e, "serving uncached image");
                ImageReference {
                    image_url: format!(
                        "data:image/jpeg;base64,{}",
                        base64::engine::general_purpose::STANDARD.encode(&candidate.bytes)
                    ),
                    filename: None,
                    origin: ImageOrigin::Fetched,
                    source: Some(candidate.source_name.clone()),
                    verified: None,
                    verification_score: None,
                }
            }
        }
    }

    fn cached_reference(&self, filename: &str, entry: &CacheEntry) -> ImageReference {
        ImageReference {
            image_url: self.asset_url(filename),
            filename: Some(filename.to_string()),
            origin: ImageOrigin::Cache,
            source: Some(entry.source_name.clone()).filter(|s| !s.is_empty()),
            verified: entry.verified,
            verification_score: entry.verification_score,
        }
    }

    fn placeholder(&self, query: &BreedQuery) -> ImageReference {
        ImageReference {
            image_url: self.server.placeholder_for(query.species).to_string(),
            filename: None,
            origin: ImageOrigin::Placeholder,
            source: None,
            verified: None,
            verification_score: None,
        }
    }

    fn asset_url(&self, filename: &str) -> String {
        format!("{}/{}", self.server.asset_prefix.trim_end_matches('/'), filename)
    }
}

/// Run the resolve command: resolve one breed and print the reference.
pub async fn run_resolve(config: &Config, name: &str, species: Species) -> Result<()> {
    let router = CompletionRouter::from_config(&config.providers)?;
    let directory = Arc::new(SourceDirectory::new());
    let query = directory.canonical_query(name, species);
    let pipeline = ImagePipeline::from_config(config, router, directory)?.foreground();

    let reference = pipeline.resolve(&query).await;
    println!("{:<10} {} ({})", "Breed:", query.display_name, query.species);
    println!("{:<10} {:?}", "Origin:", reference.origin);
    println!("{:<10} {}", "Image:", reference.image_url);
    if let Some(ref filename) = reference.filename {
        println!("{:<10} {}", "File:", pipeline.cache().file_path(filename).display());
    }
    if let Some(ref source) = reference.source {
        println!("{:<10} {}", "Source:", source);
    }
    let verified = match (reference.verified, reference.verification_score) {
        (Some(true), Some(score)) => format!("yes ({}%)", score),
        (Some(false), _) => "rejected".to_string(),
        (_, Some(score)) => format!("unknown (inconclusive, {}%)", score),
        _ => "unknown".to_string(),
    };
    println!("{:<10} {}", "Verified:", verified);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::validate_token;
    use crate::cache::{MemoryStore, MetadataStore};
    use crate::config::ImageConfig;
    use crate::models::Species;
    use crate::providers::testing::{descriptor, ScriptedProvider};
    use crate::providers::{CompletionProvider, ProviderRegistry};
    use crate::sources::testing::FakeSource;
    use crate::sources::ImageSource;
    use tempfile::TempDir;

    const CORRECT: &str = r#"{"is_correct": true, "confidence": 96, "reasoning": "matches"}"#;
    const WRONG: &str = r#"{"is_correct": false, "confidence": 93, "reasoning": "different breed"}"#;
    const UNSURE: &str = r#"{"is_correct": false, "confidence": 40, "reasoning": "blurry"}"#;

    struct Harness {
        _tmp: TempDir,
        pipeline: ImagePipeline,
        store: Arc<dyn MetadataStore>,
    }

    fn harness(
        sources: Vec<Arc<FakeSource>>,
        seer: Option<Arc<ScriptedProvider>>,
        mode: VerificationMode,
    ) -> Harness {
        let tmp = TempDir::new().unwrap();
        let store: Arc<dyn MetadataStore> = Arc::new(MemoryStore::new());
        let cache = ImageCache::new(tmp.path(), store.clone(), chrono::Duration::days(7));
        let waterfall = FetchWaterfall::new(
            sources
                .into_iter()
                .map(|s| s as Arc<dyn ImageSource>)
                .collect(),
            ImageConfig::default(),
        );
        let providers: Vec<Arc<dyn CompletionProvider>> = seer
            .into_iter()
            .map(|p| p as Arc<dyn CompletionProvider>)
            .collect();
        let router = CompletionRouter::new(Arc::new(ProviderRegistry::from_providers(providers)));
        let pipeline = ImagePipeline::new(
            cache,
            waterfall,
            router,
            VerificationConfig {
                mode,
                rejection_threshold: 70,
            },
            ServerConfig::default(),
        );
        Harness {
            _tmp: tmp,
            pipeline,
            store,
        }
    }

    fn seer(answer: &str) -> Arc<ScriptedProvider> {
        Arc::new(ScriptedProvider::ok(descriptor("seer", 0, true), answer))
    }

    fn golden() -> BreedQuery {
        BreedQuery::from_name("Golden Retriever", Species::Dog)
    }

    #[tokio::test]
    async fn test_second_resolve_is_served_from_cache() {
        let a = Arc::new(FakeSource::ok("a"));
        let v = seer(CORRECT);
        let h = harness(vec![a.clone()], Some(v.clone()), VerificationMode::Inline);

        let first = h.pipeline.resolve(&golden()).await;
        assert_eq!(first.origin, ImageOrigin::Fetched);
        assert_eq!(first.filename.as_deref(), Some("dog-golden-retriever.jpg"));
        assert_eq!(first.image_url, "/cache/dog-golden-retriever.jpg");
        assert_eq!(first.verified, Some(true));
        assert_eq!(first.verification_score, Some(96));

        let second = h.pipeline.resolve(&golden()).await;
        assert_eq!(second.origin, ImageOrigin::Cache);
        assert_eq!(second.filename, first.filename);
        assert_eq!(second.verified, Some(true));
        assert_eq!(second.source.as_deref(), Some("a"));
        assert_eq!(a.calls(), 1);
        assert_eq!(v.calls(), 1);
    }

    #[tokio::test]
    async fn test_rejection_retries_exactly_once() {
        let a = Arc::new(FakeSource::ok("a"));
        let b = Arc::new(FakeSource::ok("b"));
        let c = Arc::new(FakeSource::ok("c"));
        let v = seer(WRONG);
        let h = harness(vec![a.clone(), b.clone(), c.clone()], Some(v.clone()), VerificationMode::Inline);

        let r = h.pipeline.resolve(&golden()).await;
        assert_eq!(r.origin, ImageOrigin::Placeholder);
        assert_eq!(r.image_url, "/static/placeholder-dog.svg");
        assert_eq!((a.calls(), b.calls(), c.calls()), (1, 1, 0));
        assert_eq!(v.calls(), 2);

        // Nothing left behind for the rejected images.
        assert!(h.store.snapshot().await.unwrap().is_empty());
        assert!(!h.pipeline.cache().file_path("dog-golden-retriever.jpg").exists());
    }

    #[tokio::test]
    async fn test_retry_uses_next_source_and_can_succeed() {
        let a = Arc::new(FakeSource::ok("a"));
        let b = Arc::new(FakeSource::ok("b"));
        let v = Arc::new(
            ScriptedProvider::ok(descriptor("seer", 0, true), CORRECT)
                .with_script(vec![Ok(WRONG.to_string())]),
        );
        let h = harness(vec![a.clone(), b.clone()], Some(v.clone()), VerificationMode::Inline);

        let r = h.pipeline.resolve(&golden()).await;
        assert_eq!(r.origin, ImageOrigin::Fetched);
        assert_eq!(r.source.as_deref(), Some("b"));
        assert_eq!(r.verified, Some(true));

        let entry = h.store.get("dog-golden-retriever.jpg").await.unwrap().unwrap();
        assert_eq!(entry.source_name, "b");
        assert_eq!(entry.verified_by.as_deref(), Some("seer"));
    }

    #[tokio::test]
    async fn test_rejection_with_no_further_source_gives_placeholder() {
        let a = Arc::new(FakeSource::ok("a"));
        let h = harness(vec![a.clone()], Some(seer(WRONG)), VerificationMode::Inline);
        let r = h.pipeline.resolve(&BreedQuery::from_name("Maine Coon", Species::Cat)).await;
        assert_eq!(r.origin, ImageOrigin::Placeholder);
        assert_eq!(r.image_url, "/static/placeholder-cat.svg");
        assert_eq!(a.calls(), 1);
    }

    #[tokio::test]
    async fn test_inconclusive_negative_is_kept_as_unknown() {
        let h = harness(vec![Arc::new(FakeSource::ok("a"))], Some(seer(UNSURE)), VerificationMode::Inline);
        let r = h.pipeline.resolve(&golden()).await;
        assert_eq!(r.origin, ImageOrigin::Fetched);
        assert_eq!(r.verified, None);
        assert_eq!(r.verification_score, Some(40));

        let entry = h.store.get("dog-golden-retriever.jpg").await.unwrap().unwrap();
        assert_eq!(entry.verified, None);
        assert_eq!(entry.verification_reasoning.as_deref(), Some("blurry"));
    }

    #[tokio::test]
    async fn test_unavailable_verification_leaves_entry_unknown() {
        // Only a text provider: no vision-capable backend.
        let text = Arc::new(ScriptedProvider::ok(descriptor("text", 0, false), CORRECT));
        let h = harness(vec![Arc::new(FakeSource::ok("a"))], Some(text.clone()), VerificationMode::Inline);
        let r = h.pipeline.resolve(&golden()).await;
        assert_eq!(r.origin, ImageOrigin::Fetched);
        assert_eq!(r.verified, None);
        assert_eq!(text.calls(), 0);

        let entry = h.store.get("dog-golden-retriever.jpg").await.unwrap().unwrap();
        assert_eq!(entry.verified, None);
        assert_eq!(entry.expires_at, entry.fetched_at + chrono::Duration::days(7));
    }

    #[tokio::test]
    async fn test_malformed_judgment_is_not_a_rejection() {
        let h = harness(
            vec![Arc::new(FakeSource::ok("a"))],
            Some(seer("I think it's a dog.")),
            VerificationMode::Inline,
        );
        let r = h.pipeline.resolve(&golden()).await;
        assert_eq!(r.origin, ImageOrigin::Fetched);
        assert_eq!(r.verified, None);
    }

    #[tokio::test]
    async fn test_obscure_breed_falls_through_to_generative_source() {
        let catalog = Arc::new(FakeSource::failing("dog-catalog"));
        let stock = Arc::new(FakeSource::failing("unsplash"));
        let generated = Arc::new(FakeSource::ok("pollinations"));
        let h = harness(
            vec![catalog.clone(), stock.clone(), generated.clone()],
            Some(seer(CORRECT)),
            VerificationMode::Inline,
        );

        let r = h.pipeline.resolve(&BreedQuery::from_name("Kooikerhondje", Species::Dog)).await;
        assert_eq!(r.source.as_deref(), Some("pollinations"));
        assert_eq!(r.filename.as_deref(), Some("dog-kooikerhondje.jpg"));

        let other = h.pipeline.resolve(&BreedQuery::from_name("Lagotto Romagnolo", Species::Dog)).await;
        assert_ne!(other.filename, r.filename);

        let map = h.store.snapshot().await.unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["dog-kooikerhondje.jpg"].source_name, "pollinations");
        assert_eq!(catalog.calls(), 2);
    }

    #[tokio::test]
    async fn test_any_breed_string_resolves_to_something() {
        let inputs = [
            "",
            "   ",
            "../../etc/passwd",
            "🐶🐱",
            "Robert'); DROP TABLE breeds;--",
            "a very long breed name that keeps going and going well past any sensible limit for a filename",
            "Golden Retriever",
        ];
        for species in [Species::Dog, Species::Cat] {
            let empty = harness(vec![Arc::new(FakeSource::failing("a"))], None, VerificationMode::Inline);
            let full = harness(vec![Arc::new(FakeSource::ok("a"))], None, VerificationMode::Inline);
            for input in inputs {
                let q = BreedQuery::from_name(input, species);

                let r = empty.pipeline.resolve(&q).await;
                assert_eq!(r.origin, ImageOrigin::Placeholder);
                assert!(!r.image_url.is_empty());

                let r = full.pipeline.resolve(&q).await;
                assert!(!r.image_url.is_empty());
                let filename = r.filename.expect("fetched image is cached");
                assert!(validate_token(&filename).is_ok(), "{filename}");
            }
        }
    }

    #[tokio::test]
    async fn test_verification_off_skips_vision() {
        let v = seer(WRONG);
        let h = harness(vec![Arc::new(FakeSource::ok("a"))], Some(v.clone()), VerificationMode::Off);
        let r = h.pipeline.resolve(&golden()).await;
        assert_eq!(r.origin, ImageOrigin::Fetched);
        assert_eq!(v.calls(), 0);
    }

    #[tokio::test]
    async fn test_background_verification_completes_later() {
        let v = Arc::new(
            ScriptedProvider::ok(descriptor("seer", 0, true), CORRECT)
                .with_delay(std::time::Duration::from_millis(50)),
        );
        let h = harness(vec![Arc::new(FakeSource::ok("a"))], Some(v.clone()), VerificationMode::Background);

        let r = h.pipeline.resolve(&golden()).await;
        assert_eq!(r.origin, ImageOrigin::Fetched);
        assert_eq!(r.verified, None);

        let mut verified = None;
        for _ in 0..100 {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            verified = h
                .store
                .get("dog-golden-retriever.jpg")
                .await
                .unwrap()
                .and_then(|e| e.verified);
            if verified.is_some() {
                break;
            }
        }
        assert_eq!(verified, Some(true));
        assert_eq!(v.calls(), 1);
    }

    #[tokio::test]
    async fn test_foreground_finishes_background_verification_before_returning() {
        let v = Arc::new(
            ScriptedProvider::ok(descriptor("seer", 0, true), CORRECT)
                .with_delay(std::time::Duration::from_millis(50)),
        );
        let h = harness(vec![Arc::new(FakeSource::ok("a"))], Some(v.clone()), VerificationMode::Background);

        let r = h.pipeline.foreground().resolve(&golden()).await;
        assert_eq!(r.verified, Some(true));
        assert_eq!(v.calls(), 1);
        let entry = h.store.get("dog-golden-retriever.jpg").await.unwrap().unwrap();
        assert_eq!(entry.verified, Some(true));
    }

    #[tokio::test]
    async fn test_cancelled_resolution_fetches_nothing() {
        let a = Arc::new(FakeSource::ok("a"));
        let h = harness(vec![a.clone()], None, VerificationMode::Inline);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let r = h.pipeline.resolve_with_cancel(&golden(), &cancel).await;
        assert_eq!(r.origin, ImageOrigin::Placeholder);
        assert_eq!(a.calls(), 0);
    }

    #[tokio::test]
    async fn test_cache_write_failure_still_returns_image() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();

        let mut h = harness(vec![Arc::new(FakeSource::ok("a"))], None, VerificationMode::Inline);
        h.pipeline.cache = ImageCache::new(
            blocker.join("images"),
            h.store.clone(),
            chrono::Duration::days(7),
        );

        let r = h.pipeline.resolve(&golden()).await;
        assert_eq!(r.origin, ImageOrigin::Fetched);
        assert!(r.image_url.starts_with("data:image/jpeg;base64,"));
        assert_eq!(r.filename, None);
        assert!(h.store.snapshot().await.unwrap().is_empty());
    }
}
