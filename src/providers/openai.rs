//! OpenAI-compatible chat completions backend.
//!
//! Calls `POST {base_url}/chat/completions`. Works for OpenAI itself and the
//! many services that mirror its API (Groq, OpenRouter, Mistral, DeepSeek,
//! Together). Vision requests send an `image_url` content part, either the
//! remote URL or a `data:` URL built from inline bytes.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

use super::{base64_encode, http_client, non_empty, send_json, CompletionProvider, ProviderDescriptor};
use crate::models::{CompletionRequest, ImageInput};

pub struct OpenAiProvider {
    descriptor: ProviderDescriptor,
    api_key: Option<String>,
    max_tokens: u32,
    client: reqwest::Client,
}

impl OpenAiProvider {
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

/// Build the `/chat/completions` request body.
pub(crate) fn build_payload(model: &str, max_tokens: u32, request: &CompletionRequest) -> Value {
    let content = match &request.image {
        None => json!(request.prompt),
        Some(image) => {
            let url = match image {
                ImageInput::Url(url) => url.clone(),
                ImageInput::Inline { mime, bytes } => {
                    format!("data:{};base64,{}", mime, base64_encode(bytes))
                }
            };
            json!([
                { "type": "text", "text": request.prompt },
                { "type": "image_url", "image_url": { "url": url } }
            ])
        }
    };

    json!({
        "model": model,
        "max_tokens": max_tokens,
        "messages": [{ "role": "user", "content": content }],
    })
}

/// Extract `choices[0].message.content`.
pub(crate) fn parse_response(json: &Value) -> Option<String> {
    json.get("choices")?
        .as_array()?
        .first()?
        .get("message")?
        .get("content")?
        .as_str()
        .map(|s| s.to_string())
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let model = self.descriptor.model_for(request);
        let body = build_payload(model, self.max_tokens, request);

        let mut req = self
            .client
            .post(format!("{}/chat/completions", self.descriptor.base_url))
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let json = send_json(&self.descriptor.name, req).await?;
        non_empty(&self.descriptor.name, parse_response(&json))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_payload_is_plain_string() {
        let body = build_payload("gpt-4o-mini", 100, &CompletionRequest::text("Are pugs loud?"));
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["content"], "Are pugs loud?");
    }

    #[test]
    fn test_inline_image_becomes_data_url() {
        let req = CompletionRequest::vision(
            "Is this a pug?",
            ImageInput::Inline {
                mime: "image/jpeg".into(),
                bytes: vec![1, 2, 3],
            },
        );
        let body = build_payload("gpt-4o", 100, &req);
        let url = body["messages"][0]["content"][1]["image_url"]["url"]
            .as_str()
            .unwrap();
        assert_eq!(url, "data:image/jpeg;base64,AQID");
    }

    #[test]
    fn test_parse_response() {
        let json = json!({"choices": [{"message": {"role": "assistant", "content": "Yes."}}]});
        assert_eq!(parse_response(&json).as_deref(), Some("Yes."));
        assert_eq!(parse_response(&json!({"choices": []})), None);
    }
}
