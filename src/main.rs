//! # Breed Lens CLI (`blens`)
//!
//! The `blens` binary answers breed questions, resolves breed images, runs
//! cache maintenance and starts the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! blens --config ./config/blens.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `blens serve` | Start the HTTP server |
//! | `blens ask "<question>"` | Answer a question through the provider chain |
//! | `blens resolve <breed>` | Resolve a breed to a cached image |
//! | `blens providers` | List configured providers in fallback order |
//! | `blens cache sweep` | Remove expired entries, missing files and orphans |
//! | `blens cache warm` | Pre-fetch images for popular or configured breeds |
//! | `blens cache stats` | Show cache statistics |
//! | `blens completions <shell>` | Print a shell completion script |
//!
//! Log verbosity follows `RUST_LOG` (default `info`); logs go to stderr.

use breed_lens::ask::{run_ask, AskRequest};
use breed_lens::config::{self, Config};
use breed_lens::models::Species;
use breed_lens::{maintenance, pipeline, providers, server, stats};
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Breed Lens: pet breed answers from fallback LLM backends, with verified
/// breed images.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/blens.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "blens",
    about = "Breed Lens — pet breed Q&A with fallback LLM providers and a verified image cache",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/blens.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server on `[server].bind`.
    Serve,

    /// Ask a breed question.
    ///
    /// Providers are tried in configured order; the first answer wins.
    Ask {
        question: String,

        /// Breed the question is about, added as context.
        #[arg(long)]
        breed: Option<String>,

        /// Species the question is about (`dog` or `cat`).
        #[arg(long)]
        species: Option<Species>,

        /// Only route to vision-capable providers.
        #[arg(long)]
        vision: bool,

        /// Image URL to send along with the question. Implies `--vision`.
        #[arg(long)]
        image: Option<String>,
    },

    /// Resolve a breed to an image and print where it came from.
    Resolve {
        /// Breed name or alias (e.g. "Sheltie").
        name: String,

        #[arg(long, default_value = "dog")]
        species: Species,
    },

    /// List configured completion providers in fallback order.
    Providers,

    /// Image cache maintenance.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Print a shell completion script to stdout.
    Completions {
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Remove expired entries, entries whose file is gone, and unreferenced files.
    Sweep,

    /// Pre-fetch images so first requests hit the cache.
    Warm {
        /// Only warm breeds of this species.
        #[arg(long)]
        species: Option<Species>,
    },

    /// Show cache statistics.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Commands that don't require config
    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "blens", &mut std::io::stdout());
        return Ok(());
    }

    // Maintenance only needs the cache directory, which has a default.
    let cfg = match cli.command {
        Commands::Cache {
            action: CacheAction::Sweep | CacheAction::Stats,
        } => config::load_config(&cli.config).unwrap_or_else(|_| Config::minimal()),
        _ => config::load_config(&cli.config)?,
    };

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Ask {
            question,
            breed,
            species,
            vision,
            image,
        } => {
            let req = AskRequest {
                question,
                breed,
                species,
                use_vision: vision || image.is_some(),
                image_url: image,
            };
            run_ask(&cfg, req).await?;
        }
        Commands::Resolve { name, species } => {
            pipeline::run_resolve(&cfg, &name, species).await?;
        }
        Commands::Providers => {
            providers::list_providers(&cfg)?;
        }
        Commands::Cache { action } => match action {
            CacheAction::Sweep => maintenance::sweep_command(&cfg).await?,
            CacheAction::Warm { species } => maintenance::warm_command(&cfg, species).await?,
            CacheAction::Stats => stats::run_stats(&cfg).await?,
        },
        Commands::Completions { .. } => {}
    }

    Ok(())
}
