//! HTTP server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/ask` | Answer a breed question through the provider chain |
//! | `POST` | `/api/breed-image` | Resolve a breed to an image reference |
//! | `GET`  | `{asset_prefix}/{token}` | Serve a cached image (default prefix `/cache`) |
//! | `GET`  | `/api/providers` | Provider registry and image source status |
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/static/*` | Static files from `[server].static_dir`, when set |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `internal` (500).
//! Upstream provider and image source failures never surface here: `/api/ask`
//! degrades to a marked fallback answer and `/api/breed-image` to a
//! placeholder.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser frontend on
//! another origin can call the API.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::info;

use crate::ask::{ask, AskRequest, AskResponse};
use crate::assets;
use crate::breeds::SourceDirectory;
use crate::config::Config;
use crate::error::AssetError;
use crate::models::{ImageReference, Species};
use crate::pipeline::ImagePipeline;
use crate::providers::{ProviderDescriptor, ProviderRegistry};
use crate::router::CompletionRouter;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub router: CompletionRouter,
    pub pipeline: ImagePipeline,
    pub directory: Arc<SourceDirectory>,
}

impl AppState {
    /// Build the provider registry, directory and pipeline from `config`.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let registry = ProviderRegistry::from_config(&config.providers)?;
        let router = CompletionRouter::new(Arc::new(registry));
        let directory = Arc::new(SourceDirectory::new());
        let pipeline = ImagePipeline::from_config(config, router.clone(), directory.clone())?;
        Ok(Self {
            config: Arc::new(config.clone()),
            router,
            pipeline,
            directory,
        })
    }
}

/// The full route table over `state`.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let asset_route = format!(
        "{}/{{token}}",
        state.config.server.asset_prefix.trim_end_matches('/')
    );

    let mut router = Router::new()
        .route("/api/ask", post(handle_ask))
        .route("/api/breed-image", post(handle_breed_image))
        .route("/api/providers", get(handle_providers))
        .route("/health", get(handle_health))
        .route(&asset_route, get(handle_asset));

    if let Some(ref dir) = state.config.server.static_dir {
        router = router.nest_service("/static", ServeDir::new(dir));
    }

    router.layer(cors).with_state(state)
}

/// Starts the HTTP server on `[server].bind` and runs until Ctrl-C.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let state = AppState::from_config(config)?;
    let eligible = state.router.registry().eligible(false).count();
    let vision = state.router.has_vision();

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(
        bind = %config.server.bind,
        providers = eligible,
        vision,
        image_sources = state.pipeline.waterfall().len(),
        "server listening"
    );
    println!("Breed Lens listening on http://{}", config.server.bind);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"not_found"`).
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

impl From<AssetError> for AppError {
    fn from(e: AssetError) -> Self {
        match e {
            AssetError::InvalidFilenameToken => bad_request(e.to_string()),
            AssetError::ImageNotFound => not_found(e.to_string()),
            AssetError::Io(ref io) => {
                tracing::warn!(error = %io, "failed to read cached image");
                internal(e.to_string())
            }
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /api/ask ============

async fn handle_ask(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    if req.question.trim().is_empty() {
        return Err(bad_request("question must not be empty"));
    }
    Ok(Json(ask(&state.router, &req).await))
}

// ============ POST /api/breed-image ============

#[derive(Debug, Deserialize)]
struct BreedImageRequest {
    /// Breed name or identity token.
    breed: String,
    species: Species,
    #[serde(default)]
    display_name: Option<String>,
}

/// Handler for `POST /api/breed-image`.
///
/// Known names and aliases are mapped to their canonical identity first, so
/// "Sheltie" and "Shetland Sheepdog" share one cache file.
async fn handle_breed_image(
    State(state): State<AppState>,
    Json(req): Json<BreedImageRequest>,
) -> Result<Json<ImageReference>, AppError> {
    if req.breed.trim().is_empty() {
        return Err(bad_request("breed must not be empty"));
    }
    let mut query = state.directory.canonical_query(&req.breed, req.species);
    if let Some(name) = req.display_name.filter(|n| !n.trim().is_empty()) {
        query.display_name = name.trim().to_string();
    }
    Ok(Json(state.pipeline.resolve(&query).await))
}

// ============ GET {asset_prefix}/{token} ============

async fn handle_asset(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Response, AppError> {
    Ok(assets::serve(state.pipeline.cache().dir(), &token).await?)
}

// ============ GET /api/providers ============

#[derive(Serialize)]
struct ProvidersResponse {
    providers: Vec<ProviderDescriptor>,
    text_ready: bool,
    vision_ready: bool,
    image_sources: Vec<String>,
}

async fn handle_providers(State(state): State<AppState>) -> Json<ProvidersResponse> {
    let registry = state.router.registry();
    Json(ProvidersResponse {
        providers: registry.descriptors(),
        text_ready: registry.eligible(false).next().is_some(),
        vision_ready: state.router.has_vision(),
        image_sources: state.pipeline.waterfall().names(),
    })
}
