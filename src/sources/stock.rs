//! Stock photo search: Unsplash and Pexels.
//!
//! Both take the first search hit for `"{breed} {species}"`. Match
//! confidence is fixed at 50: a keyword search says little about the breed.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::time::Duration;

use super::{download, get_json, http_client, ImageSource};
use crate::models::{BreedQuery, SourceCandidate};

const STOCK_CONFIDENCE: u8 = 50;

/// Search phrase for stock photo APIs, e.g. `Golden Retriever dog`.
pub fn search_phrase(query: &BreedQuery) -> String {
    let name = if query.display_name.trim().is_empty() {
        query.identity.replace('-', " ")
    } else {
        query.display_name.trim().to_string()
    };
    format!("{} {}", name, query.species)
}

pub struct UnsplashSource {
    client: reqwest::Client,
    base_url: String,
    access_key: String,
}

impl UnsplashSource {
    pub fn new(base_url: &str, access_key: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_key,
        })
    }
}

#[async_trait]
impl ImageSource for UnsplashSource {
    fn name(&self) -> &str {
        "unsplash"
    }

    async fn fetch(&self, query: &BreedQuery) -> Result<SourceCandidate> {
        let phrase = search_phrase(query);
        let json = get_json(
            self.client
                .get(format!("{}/search/photos", self.base_url))
                .query(&[
                    ("query", phrase.as_str()),
                    ("per_page", "1"),
                    ("content_filter", "high"),
                ])
                .header("Authorization", format!("Client-ID {}", self.access_key))
                .header("Accept-Version", "v1"),
        )
        .await?;

        let image_url = json["results"]
            .get(0)
            .and_then(|r| r["urls"]["regular"].as_str())
            .ok_or_else(|| anyhow!("no Unsplash results for '{}'", phrase))?;

        Ok(SourceCandidate {
            source_name: self.name().to_string(),
            bytes: download(&self.client, image_url).await?,
            origin_url: image_url.to_string(),
            match_confidence: STOCK_CONFIDENCE,
        })
    }
}

pub struct PexelsSource {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl PexelsSource {
    pub fn new(base_url: &str, api_key: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl ImageSource for PexelsSource {
    fn name(&self) -> &str {
        "pexels"
    }

    async fn fetch(&self, query: &BreedQuery) -> Result<SourceCandidate> {
        let phrase = search_phrase(query);
        let json = get_json(
            self.client
                .get(format!("{}/search", self.base_url))
                .query(&[("query", phrase.as_str()), ("per_page", "1")])
                .header("Authorization", &self.api_key),
        )
        .await?;

        let photo = json["photos"]
            .get(0)
            .ok_or_else(|| anyhow!("no Pexels results for '{}'", phrase))?;
        let image_url = photo["src"]["large"]
            .as_str()
            .or_else(|| photo["src"]["original"].as_str())
            .ok_or_else(|| anyhow!("Pexels result without image url"))?;

        Ok(SourceCandidate {
            source_name: self.name().to_string(),
            bytes: download(&self.client, image_url).await?,
            origin_url: image_url.to_string(),
            match_confidence: STOCK_CONFIDENCE,
        })
    }
}
