//! Anthropic Messages API backend.
//!
//! Calls `POST {base_url}/messages` with the `x-api-key` and
//! `anthropic-version` headers. Images are sent as an `image` content block
//! placed before the text, using a `url` or `base64` source.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

use super::{base64_encode, http_client, non_empty, send_json, CompletionProvider, ProviderDescriptor};
use crate::models::{CompletionRequest, ImageInput};

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    descriptor: ProviderDescriptor,
    api_key: Option<String>,
    max_tokens: u32,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(descriptor: ProviderDescriptor, api_key: Option<String>, max_tokens: u32) -> Result<Self> {
        let client = http_client(descriptor.timeout())?;
        Ok(Self {
            descriptor,
            api_key,
            max_tokens,
            client,
        })
    }
}

pub(crate) fn build_payload(model: &str, max_tokens: u32, request: &CompletionRequest) -> Value {
    let mut content = Vec::new();
    if let Some(image) = &request.image {
        let source = match image {
            ImageInput::Url(url) => json!({ "type": "url", "url": url }),
            ImageInput::Inline { mime, bytes } => json!({
                "type": "base64",
                "media_type": mime,
                "data": base64_encode(bytes),
            }),
        };
        content.push(json!({ "type": "image", "source": source }));
    }
    content.push(json!({ "type": "text", "text": request.prompt }));

    json!({
        "model": model,
        "max_tokens": max_tokens,
        "messages": [{ "role": "user", "content": content }],
    })
}

/// Concatenate every `text` block of the response `content` array.
pub(crate) fn parse_response(json: &Value) -> Option<String> {
    let blocks = json.get("content")?.as_array()?;
    let text: Vec<&str> = blocks
        .iter()
        .filter(|b| b.get("type").and_then(|t| t.as_str()) == Some("text"))
        .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
        .collect();
    if text.is_empty() {
        None
    } else {
        Some(text.join(""))
    }
}

#[async_trait]
impl CompletionProvider for AnthropicProvider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("{}: API key not set", self.descriptor.name))?;
        let body = build_payload(self.descriptor.model_for(request), self.max_tokens, request);

        let req = self
            .client
            .post(format!("{}/messages", self.descriptor.base_url))
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&body);

        let json = send_json(&self.descriptor.name, req).await?;
        non_empty(&self.descriptor.name, parse_response(&json))
    }
}
