//! Cached image serving.
//!
//! `GET {asset_prefix}/{token}` serves files written by the pipeline after
//! startup. The token is checked before any filesystem access: ASCII
//! letters, digits and hyphens, followed by `.jpg`. Errors map to 400
//! (invalid token) and 404 (no such file) in [`crate::server`].

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use std::path::Path;
use tokio_util::io::ReaderStream;

use crate::cache::CACHE_EXTENSION;
use crate::error::AssetError;

/// Cached files never change under a given name.
pub const ASSET_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

const MAX_TOKEN_LEN: usize = 128;

/// Accept `[A-Za-z0-9-]+\.jpg` and nothing else.
pub fn validate_token(token: &str) -> Result<&str, AssetError> {
    if token.len() > MAX_TOKEN_LEN {
        return Err(AssetError::InvalidFilenameToken);
    }
    let stem = token
        .strip_suffix(CACHE_EXTENSION)
        .and_then(|s| s.strip_suffix('.'))
        .ok_or(AssetError::InvalidFilenameToken)?;
    if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
        return Err(AssetError::InvalidFilenameToken);
    }
    Ok(token)
}

/// Open a cached image for streaming.
pub async fn open(dir: &Path, token: &str) -> Result<(tokio::fs::File, u64), AssetError> {
    let token = validate_token(token)?;
    let file = match tokio::fs::File::open(dir.join(token)).await {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(AssetError::ImageNotFound),
        Err(e) => return Err(e.into()),
    };
    let meta = file.metadata().await?;
    if !meta.is_file() {
        return Err(AssetError::ImageNotFound);
    }
    Ok((file, meta.len()))
}

/// The image at `token` as an HTTP response with immutable cache headers.
pub async fn serve(dir: &Path, token: &str) -> Result<Response, AssetError> {
    let (file, len) = open(dir, token).await?;
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("image/jpeg")),
            (header::CACHE_CONTROL, HeaderValue::from_static(ASSET_CACHE_CONTROL)),
            (header::CONTENT_LENGTH, HeaderValue::from(len)),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response())
}
