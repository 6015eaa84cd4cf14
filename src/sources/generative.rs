//! Generative image backends, the last resort of the waterfall.
//!
//! These always produce *something* for any breed name, which is why they
//! sit after the catalogs and stock photos. Their output is verified like
//! any other image.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use base64::Engine;
use std::time::Duration;

use super::{download, http_client, ImageSource};
use crate::models::{BreedQuery, SourceCandidate};

const GENERATED_CONFIDENCE: u8 = 30;

/// Text-to-image prompt for a breed portrait.
pub fn generation_prompt(query: &BreedQuery) -> String {
    let name = if query.display_name.trim().is_empty() {
        query.identity.replace('-', " ")
    } else {
        query.display_name.trim().to_string()
    };
    format!(
        "A realistic, high quality photograph of a purebred {} {}, full body, natural light, plain background, no text",
        name, query.species
    )
}

/// OpenAI Images API (`POST {base}/images/generations`, `b64_json` response).
pub struct OpenAiImageSource {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl OpenAiImageSource {
    pub fn new(
        base_url: Option<&str>,
        model: Option<&str>,
        api_key: String,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url
                .unwrap_or("https://api.openai.com/v1")
                .trim_end_matches('/')
                .to_string(),
            model: model.unwrap_or("dall-e-3").to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl ImageSource for OpenAiImageSource {
    fn name(&self) -> &str {
        "openai-images"
    }

    async fn fetch(&self, query: &BreedQuery) -> Result<SourceCandidate> {
        let url = format!("{}/images/generations", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "prompt": generation_prompt(query),
            "n": 1,
            "size": "1024x1024",
            "response_format": "b64_json",
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("image generation HTTP {}: {}", status, text.chars().take(200).collect::<String>());
        }
        let json: serde_json::Value = response.json().await.context("malformed JSON")?;

        let b64 = json["data"]
            .get(0)
            .and_then(|d| d["b64_json"].as_str())
            .ok_or_else(|| anyhow!("image generation response missing data[0].b64_json"))?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(b64)
            .context("invalid base64 image")?;

        Ok(SourceCandidate {
            source_name: self.name().to_string(),
            bytes,
            origin_url: url,
            match_confidence: GENERATED_CONFIDENCE,
        })
    }
}

/// Pollinations (`GET {base}/prompt/{prompt}`); keyless, returns the image directly.
pub struct PollinationsSource {
    client: reqwest::Client,
    base_url: String,
    model: Option<String>,
}

impl PollinationsSource {
    pub fn new(base_url: Option<&str>, model: Option<&str>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url
                .unwrap_or("https://image.pollinations.ai")
                .trim_end_matches('/')
                .to_string(),
            model: model.map(|m| m.to_string()),
        })
    }

    fn url_for(&self, query: &BreedQuery) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .with_context(|| format!("invalid pollinations url: {}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("pollinations url cannot be a base: {}", self.base_url))?
            .pop_if_empty()
            .push("prompt")
            .push(&generation_prompt(query));
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("width", "768")
                .append_pair("height", "768")
                .append_pair("nologo", "true");
            if let Some(ref model) = self.model {
                pairs.append_pair("model", model);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl ImageSource for PollinationsSource {
    fn name(&self) -> &str {
        "pollinations"
    }

    async fn fetch(&self, query: &BreedQuery) -> Result<SourceCandidate> {
        let url = self.url_for(query)?;
        let bytes = download(&self.client, url.as_str()).await?;
        Ok(SourceCandidate {
            source_name: self.name().to_string(),
            bytes,
            origin_url: url.to_string(),
            match_confidence: GENERATED_CONFIDENCE,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Species;
    use wiremock::matchers::{body_partial_json, header, method, path, path_regex, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn otterhound() -> BreedQuery {
        BreedQuery::new("otterhound", Species::Dog, "Otterhound")
    }

    #[test]
    fn test_prompt_names_breed_and_species() {
        let p = generation_prompt(&otterhound());
        assert!(p.contains("Otterhound dog"));
    }

    #[tokio::test]
    async fn test_openai_images_decodes_b64() {
        let server = MockServer::start().await;
        let encoded = base64::engine::general_purpose::STANDARD.encode([7u8, 8, 9]);
        Mock::given(method("POST"))
            .and(path("/images/generations"))
            .and(header("Authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({ "response_format": "b64_json" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "created": 1,
                "data": [ { "b64_json": encoded } ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let source = OpenAiImageSource::new(
            Some(&server.uri()),
            None,
            "sk-test".into(),
            Duration::from_secs(5),
        )
        .unwrap();
        let candidate = source.fetch(&otterhound()).await.unwrap();
        assert_eq!(candidate.bytes, vec![7u8, 8, 9]);
        assert_eq!(candidate.match_confidence, GENERATED_CONFIDENCE);
    }

    #[tokio::test]
    async fn test_openai_images_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("content policy"))
            .mount(&server)
            .await;
        let source = OpenAiImageSource::new(
            Some(&server.uri()),
            None,
            "sk-test".into(),
            Duration::from_secs(5),
        )
        .unwrap();
        let err = source.fetch(&otterhound()).await.unwrap_err();
        assert!(err.to_string().contains("content policy"));
    }

    #[tokio::test]
    async fn test_pollinations_fetches_prompt_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/prompt/A%20realistic.*Otterhound%20dog"))
            .and(query_param("nologo", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![4u8, 2]))
            .expect(1)
            .mount(&server)
            .await;

        let source = PollinationsSource::new(Some(&server.uri()), None, Duration::from_secs(5)).unwrap();
        let candidate = source.fetch(&otterhound()).await.unwrap();
        assert_eq!(candidate.bytes, vec![4u8, 2]);
        assert!(candidate.origin_url.contains("/prompt/"));
    }
}
