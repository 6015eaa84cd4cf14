//! Cascading completion router.
//!
//! Tries eligible providers strictly one at a time, in ascending priority,
//! and returns the first well-formed answer. Provider failures (timeouts,
//! transport errors, non-2xx statuses, malformed bodies) are recorded and
//! the next provider is tried; they never escape individually.
//!
//! ```text
//! request ──▶ [A] ──fail──▶ [B] ──ok──▶ CompletionResult { provider_used: B, attempted_chain: [A, B] }
//!                                       [C] never called
//! ```
//!
//! Attempts are sequential on purpose: a paid backend is only billed when
//! every cheaper one ahead of it has failed. Worst-case latency is the sum
//! of the attempted timeouts.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ProviderConfig;
use crate::error::{ProviderFailure, RouterError};
use crate::models::{CompletionRequest, CompletionResult};
use crate::providers::ProviderRegistry;

#[derive(Clone)]
pub struct CompletionRouter {
    registry: Arc<ProviderRegistry>,
}

impl CompletionRouter {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self { registry }
    }

    pub fn from_config(providers: &[ProviderConfig]) -> anyhow::Result<Self> {
        Ok(Self::new(Arc::new(ProviderRegistry::from_config(providers)?)))
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Whether any provider could serve a vision request.
    pub fn has_vision(&self) -> bool {
        self.registry.eligible(true).next().is_some()
    }

    pub async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResult, RouterError> {
        self.complete_with_cancel(request, &CancellationToken::new())
            .await
    }

    /// Route `request` through the provider chain.
    ///
    /// `cancel` is checked before every attempt, and an in-flight attempt is
    /// abandoned as soon as it fires.
    ///
    /// # Errors
    ///
    /// - [`RouterError::NoProvidersConfigured`] when no provider is eligible
    ///   (no credential, or no vision support for a vision request). No
    ///   network call is made.
    /// - [`RouterError::AllProvidersFailed`] with one reason per attempt, in order.
    /// - [`RouterError::Cancelled`] when `cancel` fires.
    pub async fn complete_with_cancel(
        &self,
        request: &CompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<CompletionResult, RouterError> {
        let needs_vision = request.requires_vision || request.image.is_some();
        let eligible: Vec<_> = self.registry.eligible(needs_vision).collect();
        if eligible.is_empty() {
            debug!(vision = needs_vision, "no eligible completion providers");
            return Err(RouterError::NoProvidersConfigured);
        }

        let started = Instant::now();
        let mut chain = Vec::with_capacity(eligible.len());
        let mut failures = Vec::new();

        for provider in eligible {
            if cancel.is_cancelled() {
                return Err(RouterError::Cancelled(failures));
            }

            let name = provider.name().to_string();
            let timeout = provider.descriptor().timeout();
            chain.push(name.clone());
            let attempt_started = Instant::now();

            let outcome = tokio::select! {
                _ = cancel.cancelled() => {
                    failures.push(ProviderFailure { provider: name, reason: "cancelled".to_string() });
                    return Err(RouterError::Cancelled(failures));
                }
                r = tokio::time::timeout(timeout, provider.complete(request)) => r,
            };

            let reason = match outcome {
                Ok(Ok(answer)) => {
                    let elapsed_ms = started.elapsed().as_millis() as u64;
                    info!(
                        provider = %name,
                        attempts = chain.len(),
                        elapsed_ms,
                        "completion succeeded"
                    );
                    return Ok(CompletionResult {
                        answer,
                        provider_used: name,
                        attempted_chain: chain,
                        elapsed_ms,
                    });
                }
                Ok(Err(e)) => e.to_string(),
                Err(_) => format!("timed out after {}ms", timeout.as_millis()),
            };

            warn!(
                provider = %name,
                elapsed_ms = attempt_started.elapsed().as_millis() as u64,
                reason = %reason,
                "provider failed, falling back"
            );
            failures.push(ProviderFailure {
                provider: name,
                reason,
            });
        }

        Err(RouterError::AllProvidersFailed(failures))
    }
}
