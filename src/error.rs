//! Typed failures for the router, fetch waterfall, verification and asset shim.
//!
//! Most of these never reach a caller: provider and source failures are
//! folded into the next fallback step, and the pipeline degrades to a
//! placeholder. They exist so those decisions are explicit and loggable.

use thiserror::Error;

/// One provider's failure inside a routed call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFailure {
    pub provider: String,
    pub reason: String,
}

impl std::fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.provider, self.reason)
    }
}

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("no providers configured")]
    NoProvidersConfigured,

    #[error("all providers failed: {}", join_failures(.0))]
    AllProvidersFailed(Vec<ProviderFailure>),

    #[error("request cancelled after {} attempt(s)", .0.len())]
    Cancelled(Vec<ProviderFailure>),
}

fn join_failures(failures: &[ProviderFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("source {source_name} failed: {reason}")]
    SourceFetchFailed { source_name: String, reason: String },

    #[error("all image sources exhausted ({} tried)", .0.len())]
    Exhausted(Vec<FetchError>),

    #[error("fetch cancelled")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("verification unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache write failed for {filename}: {reason}")]
    WriteFailed { filename: String, reason: String },
}

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("invalid filename token")]
    InvalidFilenameToken,

    #[error("image not found")]
    ImageNotFound,

    #[error("asset read failed: {0}")]
    Io(#[from] std::io::Error),
}
