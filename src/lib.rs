//! # Breed Lens
//!
//! Pet breed question answering over a chain of fallback LLM backends, with
//! a self-healing breed image cache.
//!
//! Breed Lens routes each question through an ordered list of completion
//! providers until one answers, and resolves breed names to photographs
//! through a waterfall of image sources. Fetched images are normalized to
//! JPEG, cached on disk for seven days and checked by a vision model; a
//! wrong image is evicted and replaced once from the next source.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  Providers   │──▶│   Router     │──▶│  Ask / Vision │
//! │ OpenAI/...   │   │  (fallback)  │   │   judgment    │
//! └──────────────┘   └──────────────┘   └──────┬───────┘
//!                                              │
//! ┌──────────────┐   ┌──────────────┐   ┌──────▼───────┐
//! │ Image sources│──▶│  Waterfall   │──▶│   Pipeline    │──▶ cache dir
//! │ catalogs/... │   │              │   │ (state mach.) │
//! └──────────────┘   └──────────────┘   └──────┬───────┘
//!                                              │
//!                        ┌─────────────────────┤
//!                        ▼                     ▼
//!                   ┌──────────┐          ┌──────────┐
//!                   │   CLI    │          │   HTTP   │
//!                   │ (blens)  │          │  (axum)  │
//!                   └──────────┘          └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! blens providers                       # show the completion chain
//! blens ask "Do beagles shed a lot?"    # answer through the chain
//! blens resolve "Sheltie" --species dog # resolve one breed image
//! blens cache warm                      # pre-fetch popular breeds
//! blens serve                           # start the HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Typed errors for routing, fetching and serving |
//! | [`providers`] | Completion provider trait and backends |
//! | [`router`] | Ordered fallback across providers |
//! | [`ask`] | Breed question answering |
//! | [`breeds`] | Breed directory: aliases and source keys |
//! | [`sources`] | Image sources and the fetch waterfall |
//! | [`imaging`] | Decode, resize and re-encode to JPEG |
//! | [`cache`] | Image files and metadata store |
//! | [`verify`] | Vision verification prompt and judgment parsing |
//! | [`pipeline`] | Breed image resolution state machine |
//! | [`assets`] | Serving cached images over HTTP |
//! | [`maintenance`] | Cache sweep and pre-warm |
//! | [`stats`] | Cache statistics |
//! | [`server`] | HTTP server |

pub mod ask;
pub mod assets;
pub mod breeds;
pub mod cache;
pub mod config;
pub mod error;
pub mod imaging;
pub mod maintenance;
pub mod models;
pub mod pipeline;
pub mod providers;
pub mod router;
pub mod server;
pub mod sources;
pub mod stats;
pub mod verify;
