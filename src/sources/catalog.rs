//! Species catalogs: dog.ceo for dogs, TheCatAPI for cats.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::{download, get_json, http_client, ImageSource};
use crate::breeds::{CatalogMatch, SourceDirectory};
use crate::models::{BreedQuery, SourceCandidate, Species};

fn catalog_key(directory: &SourceDirectory, query: &BreedQuery) -> Result<CatalogMatch> {
    directory
        .lookup(query)
        .ok_or_else(|| anyhow!("no catalog key matches '{}'", query.display_name))
}

/// Random breed photo from the dog.ceo API.
///
/// `GET {base}/breed/{parent}/{sub}/images/random` answers
/// `{"message": "<image url>", "status": "success"}`.
pub struct DogCatalogSource {
    client: reqwest::Client,
    base_url: String,
    directory: Arc<SourceDirectory>,
}

impl DogCatalogSource {
    pub fn new(base_url: &str, directory: Arc<SourceDirectory>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            directory,
        })
    }
}

#[async_trait]
impl ImageSource for DogCatalogSource {
    fn name(&self) -> &str {
        "dog-catalog"
    }

    fn supports(&self, species: Species) -> bool {
        species == Species::Dog
    }

    async fn fetch(&self, query: &BreedQuery) -> Result<SourceCandidate> {
        let matched = catalog_key(&self.directory, query)?;
        let url = format!("{}/breed/{}/images/random", self.base_url, matched.key);
        let json = get_json(self.client.get(&url)).await?;

        if json.get("status").and_then(|s| s.as_str()) != Some("success") {
            bail!("dog catalog returned status {}", json["status"]);
        }
        let image_url = json
            .get("message")
            .and_then(|m| m.as_str())
            .ok_or_else(|| anyhow!("dog catalog response missing image url"))?;

        let bytes = download(&self.client, image_url).await?;
        Ok(SourceCandidate {
            source_name: self.name().to_string(),
            bytes,
            origin_url: image_url.to_string(),
            match_confidence: matched.confidence,
        })
    }
}

/// Breed photo from TheCatAPI.
///
/// `GET {base}/images/search?breed_ids={id}&limit=1` answers a list of
/// `{"url": ...}` objects. The API key is optional.
pub struct CatCatalogSource {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    directory: Arc<SourceDirectory>,
}

impl CatCatalogSource {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        directory: Arc<SourceDirectory>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            directory,
        })
    }
}

#[async_trait]
impl ImageSource for CatCatalogSource {
    fn name(&self) -> &str {
        "cat-catalog"
    }

    fn supports(&self, species: Species) -> bool {
        species == Species::Cat
    }

    async fn fetch(&self, query: &BreedQuery) -> Result<SourceCandidate> {
        let matched = catalog_key(&self.directory, query)?;
        let mut request = self
            .client
            .get(format!("{}/images/search", self.base_url))
            .query(&[("breed_ids", matched.key.as_str()), ("limit", "1")]);
        if let Some(ref key) = self.api_key {
            request = request.header("x-api-key", key);
        }
        let json = get_json(request).await?;

        let image_url = json
            .as_array()
            .and_then(|items| items.first())
            .and_then(|item| item.get("url"))
            .and_then(|u| u.as_str())
            .ok_or_else(|| anyhow!("cat catalog has no image for '{}'", matched.key))?;

        let bytes = download(&self.client, image_url).await?;
        Ok(SourceCandidate {
            source_name: self.name().to_string(),
            bytes,
            origin_url: image_url.to_string(),
            match_confidence: matched.confidence,
        })
    }
}
