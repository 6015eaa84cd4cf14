//! Core data models used throughout Breed Lens.
//!
//! These types flow between the completion router, the image pipeline and
//! the HTTP surface. None of them are persisted except through
//! [`CacheEntry`](crate::cache::CacheEntry).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Animal species a breed belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Species {
    Dog,
    Cat,
}

impl Species {
    pub fn as_str(&self) -> &'static str {
        match self {
            Species::Dog => "dog",
            Species::Cat => "cat",
        }
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Species {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dog" | "dogs" => Ok(Species::Dog),
            "cat" | "cats" => Ok(Species::Cat),
            other => anyhow::bail!("unknown species '{}': expected dog or cat", other),
        }
    }
}

/// Image attached to a completion request.
#[derive(Debug, Clone)]
pub enum ImageInput {
    /// Publicly reachable image URL.
    Url(String),
    /// Raw image bytes with their MIME type.
    Inline { mime: String, bytes: Vec<u8> },
}

/// A single prompt routed through the [`CompletionRouter`](crate::router::CompletionRouter).
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub image: Option<ImageInput>,
    pub requires_vision: bool,
}

impl CompletionRequest {
    /// Text-only request.
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            image: None,
            requires_vision: false,
        }
    }

    /// Vision request about `image`.
    pub fn vision(prompt: impl Into<String>, image: ImageInput) -> Self {
        Self {
            prompt: prompt.into(),
            image: Some(image),
            requires_vision: true,
        }
    }
}

/// Successful routed completion.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionResult {
    pub answer: String,
    pub provider_used: String,
    /// Every provider tried during this call, in order, ending with `provider_used`.
    pub attempted_chain: Vec<String>,
    pub elapsed_ms: u64,
}

/// Input to the image pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreedQuery {
    /// Stable identity token, e.g. `golden-retriever`.
    pub identity: String,
    pub species: Species,
    /// Name shown to users and used in prompts/searches.
    pub display_name: String,
}

impl BreedQuery {
    pub fn new(identity: impl Into<String>, species: Species, display_name: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            species,
            display_name: display_name.into(),
        }
    }

    /// Build a query from a free-text breed name, deriving the identity token.
    ///
    /// Names with no ASCII letters or digits keep their raw text as identity
    /// so they still map to distinct cache files.
    pub fn from_name(name: &str, species: Species) -> Self {
        let slug = crate::cache::slugify(name);
        let identity = if slug.is_empty() {
            name.trim().to_string()
        } else {
            slug
        };
        Self::new(identity, species, name.trim())
    }
}

/// Image bytes returned by one source of the fetch waterfall.
#[derive(Debug, Clone)]
pub struct SourceCandidate {
    pub source_name: String,
    pub bytes: Vec<u8>,
    pub origin_url: String,
    /// Key-matching confidence (0-100). Says nothing about whether the image is correct.
    pub match_confidence: u8,
}

/// Parsed vision judgment about a cached image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub is_correct: bool,
    pub confidence: u8,
    pub reasoning: String,
}

/// Where a resolved image reference came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageOrigin {
    Cache,
    Fetched,
    Placeholder,
}

/// What the image pipeline hands back to callers. Always displayable.
#[derive(Debug, Clone, Serialize)]
pub struct ImageReference {
    pub image_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    pub origin: ImageOrigin,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub verified: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_score: Option<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_species_parse() {
        assert_eq!("Dog".parse::<Species>().unwrap(), Species::Dog);
        assert_eq!(" cats ".parse::<Species>().unwrap(), Species::Cat);
        assert!("hamster".parse::<Species>().is_err());
    }

    #[test]
    fn test_query_from_name_derives_identity() {
        let q = BreedQuery::from_name("  Golden Retriever ", Species::Dog);
        assert_eq!(q.identity, "golden-retriever");
        assert_eq!(q.display_name, "Golden Retriever");
    }

    #[test]
    fn test_vision_request_flags() {
        let req = CompletionRequest::vision("what is this?", ImageInput::Url("http://x/y.jpg".into()));
        assert!(req.requires_vision);
        assert!(req.image.is_some());
        assert!(!CompletionRequest::text("hi").requires_vision);
    }
}
