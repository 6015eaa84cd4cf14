//! Completion backend for a local Ollama instance.
//!
//! Calls `POST /api/chat` with `stream: false` on the configured URL
//! (default: `http://localhost:11434`). Requires a pulled model
//! (e.g. `ollama pull llama3.2`, or `llava` for vision).

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

use super::{
    base64_encode, http_client, image_bytes, non_empty, send_json, CompletionProvider,
    ProviderDescriptor,
};
use crate::models::CompletionRequest;

pub struct OllamaProvider {
    descriptor: ProviderDescriptor,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(descriptor: ProviderDescriptor) -> Result<Self> {
        let client = http_client(descriptor.timeout())?;
        Ok(Self { descriptor, client })
    }
}

pub(crate) fn build_payload(model: &str, prompt: &str, image: Option<&[u8]>) -> Value {
    let mut message = json!({ "role": "user", "content": prompt });
    if let Some(bytes) = image {
        message["images"] = json!([base64_encode(bytes)]);
    }
    json!({
        "model": model,
        "stream": false,
        "messages": [message],
    })
}

pub(crate) fn parse_response(json: &Value) -> Option<String> {
    json.get("message")?
        .get("content")?
        .as_str()
        .map(|s| s.to_string())
}

#[async_trait]
impl CompletionProvider for OllamaProvider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let image = match &request.image {
            Some(image) => Some(image_bytes(&self.client, image).await?.1),
            None => None,
        };
        let body = build_payload(
            self.descriptor.model_for(request),
            &request.prompt,
            image.as_deref(),
        );

        let req = self
            .client
            .post(format!("{}/api/chat", self.descriptor.base_url))
            .header("Content-Type", "application/json")
            .json(&body);

        let json = send_json(&self.descriptor.name, req)
            .await
            .map_err(|e| {
                anyhow::anyhow!(
                    "Ollama error (is Ollama running at {}?): {}",
                    self.descriptor.base_url,
                    e
                )
            })?;
        non_empty(&self.descriptor.name, parse_response(&json))
    }
}
