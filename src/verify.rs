//! Vision verification of cached breed images.
//!
//! The image is sent inline through the [`CompletionRouter`] with a prompt
//! that asks for a strict JSON judgment:
//!
//! ```json
//! {"is_correct": true, "confidence": 92, "reasoning": "Golden coat, feathered tail."}
//! ```
//!
//! Anything short of a well-formed judgment (no vision provider, all
//! providers failing, unparsable answer) is [`VerificationError::Unavailable`],
//! which callers treat as "unknown" and never as a rejection.

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{RouterError, VerificationError};
use crate::models::{BreedQuery, CompletionRequest, ImageInput, VerificationOutcome};
use crate::router::CompletionRouter;

/// Prompt asking whether the attached image shows `query`'s breed.
pub fn verification_prompt(query: &BreedQuery) -> String {
    format!(
        "You are checking a photo for a pet breed encyclopedia.\n\
         Does this image show a {name} ({species})?\n\
         Judge only the animal's breed, not photo quality. Mixed breeds, other breeds, \
         other species, drawings of unrelated subjects and images without an animal are incorrect.\n\
         Reply with JSON only, no other text:\n\
         {{\"is_correct\": true or false, \"confidence\": 0-100, \"reasoning\": \"one short sentence\"}}",
        name = query.display_name.trim(),
        species = query.species,
    )
}

/// Parse a judgment from a model answer.
///
/// Accepts the first JSON object in the text (code fences and chatter
/// around it are ignored), `isCorrect` as an alias, and confidence as a
/// number or numeric string, clamped to 0..=100. Values in 0..=1 are read as
/// fractions.
pub fn parse_judgment(answer: &str) -> Result<VerificationOutcome, VerificationError> {
    let object = first_json_object(answer)
        .ok_or_else(|| unavailable("no JSON object in judgment"))?;
    let value: Value = serde_json::from_str(object)
        .map_err(|e| unavailable(&format!("malformed judgment JSON: {}", e)))?;

    let is_correct = value
        .get("is_correct")
        .or_else(|| value.get("isCorrect"))
        .and_then(as_bool)
        .ok_or_else(|| unavailable("judgment missing is_correct"))?;

    let confidence = value
        .get("confidence")
        .and_then(as_number)
        .ok_or_else(|| unavailable("judgment missing confidence"))?;
    let confidence = if confidence > 0.0 && confidence < 1.0 {
        confidence * 100.0
    } else {
        confidence
    };

    let reasoning = value
        .get("reasoning")
        .and_then(|r| r.as_str())
        .unwrap_or_default()
        .trim()
        .to_string();

    Ok(VerificationOutcome {
        is_correct,
        confidence: confidence.round().clamp(0.0, 100.0) as u8,
        reasoning,
    })
}

/// A judgment rejects the image only when it is negative and more
/// confident than `threshold`.
pub fn is_rejection(outcome: &VerificationOutcome, threshold: u8) -> bool {
    !outcome.is_correct && outcome.confidence > threshold
}

/// Ask the router to judge `jpeg` and return the outcome with the provider
/// that produced it.
pub async fn verify_image(
    router: &CompletionRouter,
    query: &BreedQuery,
    jpeg: &[u8],
    cancel: &CancellationToken,
) -> Result<(VerificationOutcome, String), VerificationError> {
    let request = CompletionRequest::vision(
        verification_prompt(query),
        ImageInput::Inline {
            mime: "image/jpeg".to_string(),
            bytes: jpeg.to_vec(),
        },
    );

    let result = router
        .complete_with_cancel(&request, cancel)
        .await
        .map_err(|e| match e {
            RouterError::NoProvidersConfigured => unavailable("no vision-capable provider"),
            other => unavailable(&other.to_string()),
        })?;

    let outcome = parse_judgment(&result.answer).inspect_err(|e| {
        debug!(provider = %result.provider_used, error = %e, answer = %result.answer, "unparsable judgment");
    })?;
    info!(
        breed = %query.identity,
        provider = %result.provider_used,
        is_correct = outcome.is_correct,
        confidence = outcome.confidence,
        "image verified"
    );
    Ok((outcome, result.provider_used))
}

fn unavailable(reason: &str) -> VerificationError {
    VerificationError::Unavailable(reason.to_string())
}

fn first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

fn as_bool(v: &Value) -> Option<bool> {
    match v {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Species;
    use crate::providers::testing::{descriptor, ScriptedProvider};
    use crate::providers::{CompletionProvider, ProviderRegistry};
    use std::sync::Arc;

    fn router_answering(answer: &str) -> CompletionRouter {
        let p: Arc<dyn CompletionProvider> =
            Arc::new(ScriptedProvider::ok(descriptor("seer", 0, true), answer));
        CompletionRouter::new(Arc::new(ProviderRegistry::from_providers(vec![p])))
    }

    fn pug() -> BreedQuery {
        BreedQuery::new("pug", Species::Dog, "Pug")
    }

    #[test]
    fn test_parse_plain_json() {
        let o = parse_judgment(r#"{"is_correct": false, "confidence": 88, "reasoning": "That is a beagle."}"#)
            .unwrap();
        assert!(!o.is_correct);
        assert_eq!(o.confidence, 88);
        assert_eq!(o.reasoning, "That is a beagle.");
    }

    #[test]
    fn test_parse_fenced_with_alias_and_string_confidence() {
        let answer = "Sure!\n```json\n{\"isCorrect\": \"true\", \"confidence\": \"95%\", \"reasoning\": \"Flat face {typical}\"}\n```";
        let o = parse_judgment(answer).unwrap();
        assert!(o.is_correct);
        assert_eq!(o.confidence, 95);
        assert_eq!(o.reasoning, "Flat face {typical}");
    }

    #[test]
    fn test_parse_clamps_and_scales_confidence() {
        assert_eq!(parse_judgment(r#"{"is_correct": true, "confidence": 250}"#).unwrap().confidence, 100);
        assert_eq!(parse_judgment(r#"{"is_correct": true, "confidence": -3}"#).unwrap().confidence, 0);
        assert_eq!(parse_judgment(r#"{"is_correct": true, "confidence": 0.9}"#).unwrap().confidence, 90);
    }

    #[test]
    fn test_malformed_judgments_are_unavailable() {
        for answer in [
            "It looks like a pug to me.",
            r#"{"confidence": 90}"#,
            r#"{"is_correct": true}"#,
            r#"{"is_correct": maybe, "confidence": 90}"#,
        ] {
            assert!(
                matches!(parse_judgment(answer), Err(VerificationError::Unavailable(_))),
                "{answer}"
            );
        }
    }

    #[test]
    fn test_rejection_threshold_is_strict() {
        let judged = |is_correct, confidence| VerificationOutcome {
            is_correct,
            confidence,
            reasoning: String::new(),
        };
        assert!(is_rejection(&judged(false, 71), 70));
        assert!(!is_rejection(&judged(false, 70), 70));
        assert!(!is_rejection(&judged(true, 100), 70));
    }

    #[test]
    fn test_prompt_mentions_breed() {
        let p = verification_prompt(&pug());
        assert!(p.contains("a Pug (dog)"));
        assert!(p.contains("\"is_correct\""));
    }

    #[tokio::test]
    async fn test_verify_image_through_router() {
        let router = router_answering(r#"{"is_correct": true, "confidence": 97, "reasoning": "pug"}"#);
        let (outcome, provider) = verify_image(&router, &pug(), b"jpeg", &CancellationToken::new())
            .await
            .unwrap();
        assert!(outcome.is_correct);
        assert_eq!(provider, "seer");
    }

    #[tokio::test]
    async fn test_no_vision_provider_is_unavailable() {
        let text_only: Arc<dyn CompletionProvider> =
            Arc::new(ScriptedProvider::ok(descriptor("text", 0, false), "{}"));
        let router = CompletionRouter::new(Arc::new(ProviderRegistry::from_providers(vec![text_only])));
        let err = verify_image(&router, &pug(), b"jpeg", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no vision-capable provider"));
    }
}
