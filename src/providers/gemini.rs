//! Google Gemini `generateContent` backend.
//!
//! Gemini only takes inline image data, so remote image URLs are downloaded
//! and base64-encoded before the call (the download shares the provider
//! timeout).

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

use super::{
    base64_encode, http_client, image_bytes, non_empty, send_json, CompletionProvider,
    ProviderDescriptor,
};
use crate::models::CompletionRequest;

pub struct GeminiProvider {
    descriptor: ProviderDescriptor,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(descriptor: ProviderDescriptor, api_key: Option<String>) -> Result<Self> {
        let client = http_client(descriptor.timeout())?;
        Ok(Self {
            descriptor,
            api_key,
            client,
        })
    }
}

pub(crate) fn build_payload(prompt: &str, image: Option<(&str, &[u8])>) -> Value {
    let mut parts = vec![json!({ "text": prompt })];
    if let Some((mime, bytes)) = image {
        parts.push(json!({
            "inline_data": { "mime_type": mime, "data": base64_encode(bytes) }
        }));
    }
    json!({ "contents": [{ "role": "user", "parts": parts }] })
}

/// Extract the text parts of `candidates[0].content.parts`.
pub(crate) fn parse_response(json: &Value) -> Option<String> {
    let parts = json
        .get("candidates")?
        .as_array()?
        .first()?
        .get("content")?
        .get("parts")?
        .as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

#[async_trait]
impl CompletionProvider for GeminiProvider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("{}: API key not set", self.descriptor.name))?;

        let image = match &request.image {
            Some(image) => Some(image_bytes(&self.client, image).await?),
            None => None,
        };
        let body = build_payload(
            &request.prompt,
            image.as_ref().map(|(m, b)| (m.as_str(), b.as_slice())),
        );

        let req = self
            .client
            .post(format!(
                "{}/models/{}:generateContent",
                self.descriptor.base_url,
                self.descriptor.model_for(request)
            ))
            .header("x-goog-api-key", api_key)
            .json(&body);

        let json = send_json(&self.descriptor.name, req).await?;
        non_empty(&self.descriptor.name, parse_response(&json))
    }
}
