//! Image sources and the fetch waterfall.
//!
//! A breed image is fetched from the first source in a fixed order that
//! returns usable bytes:
//!
//! 1. the species catalog ([`DogCatalogSource`] or [`CatCatalogSource`]),
//! 2. stock photos ([`UnsplashSource`], [`PexelsSource`]), each only when
//!    its access key is set,
//! 3. generative backends ([`OpenAiImageSource`], [`PollinationsSource`]) in
//!    configured order.
//!
//! Every candidate is normalized (see [`crate::imaging`]) before it counts;
//! bytes that do not decode are that source's failure and the waterfall
//! moves on.
//!
//! [`FetchWaterfall::fetch_from`] takes a start index and reports the index
//! that succeeded, so a corrective retry can resume strictly after the
//! source whose image was rejected.

mod catalog;
mod generative;
mod stock;

pub use catalog::{CatCatalogSource, DogCatalogSource};
pub use generative::{generation_prompt, OpenAiImageSource, PollinationsSource};
pub use stock::{search_phrase, PexelsSource, UnsplashSource};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::breeds::SourceDirectory;
use crate::config::{ImageConfig, SourcesConfig};
use crate::error::FetchError;
use crate::imaging;
use crate::models::{BreedQuery, SourceCandidate, Species};

/// Largest image body accepted from any source.
pub(crate) const MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;

/// One external place breed images can come from.
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Stable name recorded in cache entries and logs.
    fn name(&self) -> &str;

    /// Whether this source can serve the species at all.
    fn supports(&self, _species: Species) -> bool {
        true
    }

    /// Fetch raw image bytes for `query`.
    async fn fetch(&self, query: &BreedQuery) -> Result<SourceCandidate>;
}

/// Ordered list of image sources.
#[derive(Clone)]
pub struct FetchWaterfall {
    sources: Vec<Arc<dyn ImageSource>>,
    images: ImageConfig,
}

impl FetchWaterfall {
    pub fn new(sources: Vec<Arc<dyn ImageSource>>, images: ImageConfig) -> Self {
        Self { sources, images }
    }

    /// Build the standard waterfall from `[sources]`.
    pub fn from_config(
        config: &SourcesConfig,
        images: &ImageConfig,
        directory: Arc<SourceDirectory>,
    ) -> Result<Self> {
        let timeout = Duration::from_secs(config.download_timeout_secs);
        let mut sources: Vec<Arc<dyn ImageSource>> = vec![
            Arc::new(DogCatalogSource::new(
                &config.dog_catalog_url,
                directory.clone(),
                timeout,
            )?),
            Arc::new(CatCatalogSource::new(
                &config.cat_catalog_url,
                env_key(&config.cat_api_key_env),
                directory,
                timeout,
            )?),
        ];

        match env_key(&config.unsplash_key_env) {
            Some(key) => sources.push(Arc::new(UnsplashSource::new(&config.unsplash_url, key, timeout)?)),
            None => debug!(env = %config.unsplash_key_env, "Unsplash key not set; source disabled"),
        }
        match env_key(&config.pexels_key_env) {
            Some(key) => sources.push(Arc::new(PexelsSource::new(&config.pexels_url, key, timeout)?)),
            None => debug!(env = %config.pexels_key_env, "Pexels key not set; source disabled"),
        }

        for g in &config.generative {
            let timeout = Duration::from_secs(g.timeout_secs);
            match g.kind.as_str() {
                "openai" => {
                    let var = g.api_key_env.as_deref().unwrap_or("OPENAI_API_KEY");
                    match env_key(var) {
                        Some(key) => sources.push(Arc::new(OpenAiImageSource::new(
                            g.base_url.as_deref(),
                            g.model.as_deref(),
                            key,
                            timeout,
                        )?)),
                        None => debug!(env = %var, "OpenAI image key not set; source disabled"),
                    }
                }
                "pollinations" => sources.push(Arc::new(PollinationsSource::new(
                    g.base_url.as_deref(),
                    g.model.as_deref(),
                    timeout,
                )?)),
                other => bail!("Unknown generative source: {}", other),
            }
        }

        Ok(Self::new(sources, images.clone()))
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }

    /// Try sources in order starting at `start`, returning the index that
    /// produced a normalized candidate.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Exhausted`] with one entry per failed source, in order
    ///   (empty when no source at or after `start` supports the species).
    /// - [`FetchError::Cancelled`] when `cancel` fires; observed between
    ///   sources and during an in-flight fetch.
    pub async fn fetch_from(
        &self,
        query: &BreedQuery,
        start: usize,
        cancel: &CancellationToken,
    ) -> Result<(usize, SourceCandidate), FetchError> {
        let mut failures = Vec::new();

        for (index, source) in self.sources.iter().enumerate().skip(start) {
            if !source.supports(query.species) {
                continue;
            }
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }

            let attempt = tokio::select! {
                _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                r = self.attempt(source.as_ref(), query) => r,
            };

            match attempt {
                Ok(candidate) => {
                    info!(
                        source = source.name(),
                        breed = %query.identity,
                        species = %query.species,
                        confidence = candidate.match_confidence,
                        "image source succeeded"
                    );
                    return Ok((index, candidate));
                }
                Err(e) => {
                    warn!(
                        source = source.name(),
                        breed = %query.identity,
                        error = %e,
                        "image source failed, trying next"
                    );
                    failures.push(FetchError::SourceFetchFailed {
                        source_name: source.name().to_string(),
                        reason: format!("{:#}", e),
                    });
                }
            }
        }

        Err(FetchError::Exhausted(failures))
    }

    async fn attempt(&self, source: &dyn ImageSource, query: &BreedQuery) -> Result<SourceCandidate> {
        let mut candidate = source.fetch(query).await?;
        let raw = std::mem::take(&mut candidate.bytes);
        candidate.bytes = imaging::normalize_blocking(raw, self.images.clone())
            .await
            .context("unusable image")?;
        Ok(candidate)
    }
}

/// Value of an environment variable holding a credential, if set and non-empty.
pub(crate) fn env_key(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|k| !k.trim().is_empty())
}

pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("breed-lens/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// GET a JSON document, failing on non-2xx.
pub(crate) async fn get_json(request: reqwest::RequestBuilder) -> Result<serde_json::Value> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        bail!("HTTP {}", status);
    }
    response.json().await.context("malformed JSON")
}

/// Download an image body, failing on non-2xx, empty or oversized bodies.
pub(crate) async fn download(client: &reqwest::Client, url: &str) -> Result<Vec<u8>> {
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("download failed: {}", url))?;
    let status = response.status();
    if !status.is_success() {
        bail!("image download HTTP {}", status);
    }
    let bytes = read_capped(response, MAX_IMAGE_BYTES).await?;
    if bytes.is_empty() {
        bail!("empty image body");
    }
    Ok(bytes)
}

/// Read a response body, giving up as soon as it exceeds `limit` bytes.
pub(crate) async fn read_capped(mut response: reqwest::Response, limit: usize) -> Result<Vec<u8>> {
    if let Some(len) = response.content_length() {
        if len > limit as u64 {
            bail!("image too large: {} bytes", len);
        }
    }
    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        if body.len() + chunk.len() > limit {
            bail!("image too large: over {} bytes", limit);
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}
