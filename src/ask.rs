//! Breed question answering on top of the [`CompletionRouter`].
//!
//! [`ask`] never fails: router errors are logged and turned into a clearly
//! marked degraded answer so the presentation layer always has text to show.

use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::warn;

use crate::config::Config;
use crate::error::RouterError;
use crate::models::{CompletionRequest, ImageInput, Species};
use crate::router::CompletionRouter;

/// Answer shown when no provider could produce one.
pub const DEGRADED_ANSWER: &str =
    "Sorry, the breed assistant is unavailable right now. Please try again in a moment.";

#[derive(Debug, Clone, Deserialize)]
pub struct AskRequest {
    pub question: String,
    #[serde(default)]
    pub breed: Option<String>,
    #[serde(default)]
    pub species: Option<Species>,
    #[serde(default)]
    pub use_vision: bool,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AskResponse {
    pub answer: String,
    pub provider_used: Option<String>,
    pub attempted_chain: Vec<String>,
    pub elapsed_ms: u64,
    pub degraded: bool,
}

/// Build the prompt sent to providers, prefixed with breed context when given.
pub fn build_prompt(req: &AskRequest) -> String {
    let mut prompt = String::new();
    match (&req.breed, req.species) {
        (Some(breed), Some(species)) => {
            prompt.push_str(&format!("Context: the user is asking about the {} {} breed.\n", breed, species));
        }
        (Some(breed), None) => {
            prompt.push_str(&format!("Context: the user is asking about the {} breed.\n", breed));
        }
        (None, Some(species)) => {
            prompt.push_str(&format!("Context: the user is asking about {}s.\n", species));
        }
        (None, None) => {}
    }
    prompt.push_str("Answer concisely and accurately as a pet breed expert.\n\n");
    prompt.push_str(req.question.trim());
    prompt
}

pub async fn ask(router: &CompletionRouter, req: &AskRequest) -> AskResponse {
    let started = Instant::now();
    let prompt = build_prompt(req);
    let request = match (&req.image_url, req.use_vision) {
        (Some(url), _) => CompletionRequest::vision(prompt, ImageInput::Url(url.clone())),
        (None, true) => CompletionRequest {
            prompt,
            image: None,
            requires_vision: true,
        },
        (None, false) => CompletionRequest::text(prompt),
    };

    match router.complete(&request).await {
        Ok(result) => AskResponse {
            answer: result.answer,
            provider_used: Some(result.provider_used),
            attempted_chain: result.attempted_chain,
            elapsed_ms: result.elapsed_ms,
            degraded: false,
        },
        Err(e) => {
            warn!(error = %e, "answering with degraded message");
            let attempted_chain = match &e {
                RouterError::AllProvidersFailed(f) | RouterError::Cancelled(f) => {
                    f.iter().map(|f| f.provider.clone()).collect()
                }
                RouterError::NoProvidersConfigured => Vec::new(),
            };
            AskResponse {
                answer: DEGRADED_ANSWER.to_string(),
                provider_used: None,
                attempted_chain,
                elapsed_ms: started.elapsed().as_millis() as u64,
                degraded: true,
            }
        }
    }
}

/// Run the ask command: route one question and print the answer.
pub async fn run_ask(config: &Config, req: AskRequest) -> anyhow::Result<()> {
    let router = CompletionRouter::from_config(&config.providers)?;
    let resp = ask(&router, &req).await;

    println!("{}", resp.answer);
    println!();
    match resp.provider_used {
        Some(ref provider) => println!(
            "— {} in {}ms (tried: {})",
            provider,
            resp.elapsed_ms,
            resp.attempted_chain.join(" → ")
        ),
        None if resp.attempted_chain.is_empty() => println!("— no eligible provider"),
        None => println!("— all providers failed (tried: {})", resp.attempted_chain.join(" → ")),
    }
    Ok(())
}
