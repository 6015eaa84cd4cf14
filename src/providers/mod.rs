//! Completion provider abstraction and the provider registry.
//!
//! Defines the [`CompletionProvider`] trait and concrete implementations:
//! - **[`OpenAiProvider`]**: any OpenAI-compatible `/chat/completions` endpoint (OpenAI, Groq, OpenRouter, Mistral, …).
//! - **[`AnthropicProvider`]**: the Anthropic Messages API.
//! - **[`GeminiProvider`]**: Google `generateContent`.
//! - **[`OllamaProvider`]**: a local Ollama instance's `/api/chat`; needs no credential.
//!
//! # Provider Selection
//!
//! [`ProviderRegistry::from_config`] builds one provider per `[[providers]]`
//! entry and orders them by priority. A provider whose API key environment
//! variable is unset is still loaded, but marked `credential_present = false`
//! so the router skips it. The registry is never mutated after construction.
//!
//! ```rust
//! # use breed_lens::providers::ProviderRegistry;
//! let registry = ProviderRegistry::from_config(&[]).unwrap();
//! assert_eq!(registry.eligible(false).count(), 0);
//! ```

mod anthropic;
mod gemini;
mod ollama;
mod openai;

pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

use anyhow::{bail, Result};
use async_trait::async_trait;
use base64::Engine;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::config::{Config, ProviderConfig};
use crate::models::{CompletionRequest, ImageInput};
use crate::sources::{read_capped, MAX_IMAGE_BYTES};

/// Static description of one configured backend.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderDescriptor {
    pub name: String,
    pub kind: String,
    pub credential_present: bool,
    pub supports_vision: bool,
    pub base_url: String,
    pub model: String,
    pub vision_model: Option<String>,
    pub timeout_ms: u64,
    pub priority_rank: u32,
}

impl ProviderDescriptor {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Model to use for `request`: the vision model when an image is attached.
    pub fn model_for(&self, request: &CompletionRequest) -> &str {
        match (&request.image, &self.vision_model) {
            (Some(_), Some(vm)) => vm,
            _ => &self.model,
        }
    }
}

/// A text/vision completion backend.
///
/// Implementations translate a [`CompletionRequest`] into their own wire
/// format and return the answer text. Any error means "this provider failed";
/// the router decides what happens next.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn descriptor(&self) -> &ProviderDescriptor;

    fn name(&self) -> &str {
        &self.descriptor().name
    }

    fn supports_text(&self) -> bool {
        true
    }

    fn supports_vision(&self) -> bool {
        self.descriptor().supports_vision
    }

    /// Run one completion. Must not retry internally.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

/// Ordered, read-only list of completion providers.
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn CompletionProvider>>,
}

impl ProviderRegistry {
    /// Build the registry from `[[providers]]` config entries.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown provider kinds or if an HTTP client
    /// cannot be built. Missing credentials are not an error.
    pub fn from_config(configs: &[ProviderConfig]) -> Result<Self> {
        let mut providers: Vec<Arc<dyn CompletionProvider>> = Vec::with_capacity(configs.len());
        for (index, cfg) in configs.iter().enumerate() {
            let provider = create_provider(cfg, index as u32)?;
            if !provider.descriptor().credential_present {
                warn!(
                    provider = %cfg.name,
                    env = cfg.api_key_env.as_deref().unwrap_or("<none>"),
                    "provider credential missing; provider is ineligible"
                );
            }
            providers.push(provider);
        }
        Ok(Self::from_providers(providers))
    }

    /// Build a registry from already-constructed providers, ordered by
    /// `priority_rank` (ties keep their given order).
    pub fn from_providers(mut providers: Vec<Arc<dyn CompletionProvider>>) -> Self {
        providers.sort_by_key(|p| p.descriptor().priority_rank);
        Self { providers }
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn providers(&self) -> &[Arc<dyn CompletionProvider>] {
        &self.providers
    }

    /// Providers a request may use, in priority order.
    pub fn eligible(
        &self,
        requires_vision: bool,
    ) -> impl Iterator<Item = &Arc<dyn CompletionProvider>> + '_ {
        self.providers.iter().filter(move |p| {
            p.descriptor().credential_present
                && p.supports_text()
                && (!requires_vision || p.supports_vision())
        })
    }

    pub fn descriptors(&self) -> Vec<ProviderDescriptor> {
        self.providers
            .iter()
            .map(|p| p.descriptor().clone())
            .collect()
    }
}

/// Create the provider for one config entry.
///
/// # Supported Kinds
///
/// | Config Value | Provider | Default base URL |
/// |-------------|----------|------------------|
/// | `"openai"` | [`OpenAiProvider`] | `https://api.openai.com/v1` |
/// | `"anthropic"` | [`AnthropicProvider`] | `https://api.anthropic.com/v1` |
/// | `"gemini"` | [`GeminiProvider`] | `https://generativelanguage.googleapis.com/v1beta` |
/// | `"ollama"` | [`OllamaProvider`] | `http://localhost:11434` |
pub fn create_provider(cfg: &ProviderConfig, position: u32) -> Result<Arc<dyn CompletionProvider>> {
    let api_key = cfg
        .api_key_env
        .as_deref()
        .and_then(|var| std::env::var(var).ok())
        .filter(|k| !k.trim().is_empty());

    let default_base = match cfg.kind.as_str() {
        "openai" => "https://api.openai.com/v1",
        "anthropic" => "https://api.anthropic.com/v1",
        "gemini" => "https://generativelanguage.googleapis.com/v1beta",
        "ollama" => "http://localhost:11434",
        other => bail!("Unknown provider kind: {}", other),
    };

    let descriptor = ProviderDescriptor {
        name: cfg.name.clone(),
        kind: cfg.kind.clone(),
        credential_present: api_key.is_some() || cfg.kind == "ollama",
        supports_vision: cfg.vision_model.is_some(),
        base_url: cfg
            .base_url
            .clone()
            .unwrap_or_else(|| default_base.to_string())
            .trim_end_matches('/')
            .to_string(),
        model: cfg.model.clone(),
        vision_model: cfg.vision_model.clone(),
        timeout_ms: cfg.timeout_secs * 1000,
        priority_rank: cfg.priority.unwrap_or(position),
    };

    let provider: Arc<dyn CompletionProvider> = match cfg.kind.as_str() {
        "openai" => Arc::new(OpenAiProvider::new(descriptor, api_key, cfg.max_tokens)?),
        "anthropic" => Arc::new(AnthropicProvider::new(descriptor, api_key, cfg.max_tokens)?),
        "gemini" => Arc::new(GeminiProvider::new(descriptor, api_key)?),
        "ollama" => Arc::new(OllamaProvider::new(descriptor)?),
        other => bail!("Unknown provider kind: {}", other),
    };
    Ok(provider)
}

/// Print the provider chain in routing order. Used by `blens providers`.
pub fn list_providers(config: &Config) -> Result<()> {
    let registry = ProviderRegistry::from_config(&config.providers)?;

    if registry.is_empty() {
        println!("No providers configured. Add [[providers]] entries to the config file.");
        return Ok(());
    }

    println!(
        "{:<4} {:<16} {:<10} {:<8} {:<7} {:<8} MODEL",
        "RANK", "PROVIDER", "KIND", "KEY", "VISION", "TIMEOUT"
    );
    for p in registry.providers() {
        let d = p.descriptor();
        println!(
            "{:<4} {:<16} {:<10} {:<8} {:<7} {:<8} {}",
            d.priority_rank,
            d.name,
            d.kind,
            if d.credential_present { "ok" } else { "missing" },
            if d.supports_vision { "yes" } else { "no" },
            format!("{}s", d.timeout_ms / 1000),
            match d.vision_model {
                Some(ref v) => format!("{} (vision: {})", d.model, v),
                None => d.model.clone(),
            }
        );
    }

    let text = registry.eligible(false).count();
    let vision = registry.eligible(true).count();
    println!();
    println!("{} eligible for text, {} for vision", text, vision);
    Ok(())
}

pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

/// Send a prepared request and return the JSON body of a 2xx response.
///
/// Non-2xx statuses become errors carrying the (truncated) response body.
pub(crate) async fn send_json(
    provider: &str,
    request: reqwest::RequestBuilder,
) -> Result<serde_json::Value> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        bail!("{} API error {}: {}", provider, status, truncate(&body_text, 300));
    }
    let json: serde_json::Value = response
        .json()
        .await
        .map_err(|e| anyhow::anyhow!("{} returned malformed JSON: {}", provider, e))?;
    Ok(json)
}

/// Resolve an image to `(mime, bytes)`, downloading remote URLs.
///
/// Used by backends that only accept inline image data.
pub(crate) async fn image_bytes(
    client: &reqwest::Client,
    image: &ImageInput,
) -> Result<(String, Vec<u8>)> {
    match image {
        ImageInput::Inline { mime, bytes } => Ok((mime.clone(), bytes.clone())),
        ImageInput::Url(url) => {
            let response = client.get(url).send().await?;
            if !response.status().is_success() {
                bail!("image download failed: HTTP {}", response.status());
            }
            let mime = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("image/jpeg")
                .to_string();
            let bytes = read_capped(response, MAX_IMAGE_BYTES).await?;
            Ok((mime, bytes))
        }
    }
}

pub(crate) fn base64_encode(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Answers must carry some text to count as a success.
pub(crate) fn non_empty(provider: &str, text: Option<String>) -> Result<String> {
    match text {
        Some(t) if !t.trim().is_empty() => Ok(t.trim().to_string()),
        Some(_) => bail!("{} returned an empty answer", provider),
        None => bail!("Invalid {} response: missing answer text", provider),
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-process providers with call counters for router and pipeline tests.

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    pub fn descriptor(name: &str, rank: u32, vision: bool) -> ProviderDescriptor {
        ProviderDescriptor {
            name: name.to_string(),
            kind: "fake".to_string(),
            credential_present: true,
            supports_vision: vision,
            base_url: "http://fake".to_string(),
            model: "fake-model".to_string(),
            vision_model: vision.then(|| "fake-vision".to_string()),
            timeout_ms: 1000,
            priority_rank: rank,
        }
    }

    /// Replays scripted answers; `Err` entries simulate failures.
    pub struct ScriptedProvider {
        pub descriptor: ProviderDescriptor,
        pub calls: AtomicUsize,
        answers: Mutex<Vec<std::result::Result<String, String>>>,
        fallback: std::result::Result<String, String>,
        delay: Option<Duration>,
    }

    impl ScriptedProvider {
        pub fn ok(descriptor: ProviderDescriptor, answer: &str) -> Self {
            Self::new(descriptor, Ok(answer.to_string()))
        }

        pub fn failing(descriptor: ProviderDescriptor, reason: &str) -> Self {
            Self::new(descriptor, Err(reason.to_string()))
        }

        fn new(descriptor: ProviderDescriptor, fallback: std::result::Result<String, String>) -> Self {
            Self {
                descriptor,
                calls: AtomicUsize::new(0),
                answers: Mutex::new(Vec::new()),
                fallback,
                delay: None,
            }
        }

        /// Answers returned (in order) before falling back to the default.
        pub fn with_script(self, script: Vec<std::result::Result<String, String>>) -> Self {
            *self.answers.lock().unwrap() = script.into_iter().rev().collect();
            self
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CompletionProvider for ScriptedProvider {
        fn descriptor(&self) -> &ProviderDescriptor {
            &self.descriptor
        }

        async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let next = self.answers.lock().unwrap().pop();
            match next.unwrap_or_else(|| self.fallback.clone()) {
                Ok(answer) => Ok(answer),
                Err(reason) => Err(anyhow::anyhow!(reason)),
            }
        }
    }
}
