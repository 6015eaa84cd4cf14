use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::models::Species;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub images: ImageConfig,
    #[serde(default)]
    pub verification: VerificationConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub warm: WarmConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_asset_prefix")]
    pub asset_prefix: String,
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
    #[serde(default = "default_placeholder_dog")]
    pub placeholder_dog: String,
    #[serde(default = "default_placeholder_cat")]
    pub placeholder_cat: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            asset_prefix: default_asset_prefix(),
            static_dir: None,
            placeholder_dog: default_placeholder_dog(),
            placeholder_cat: default_placeholder_cat(),
        }
    }
}

impl ServerConfig {
    pub fn placeholder_for(&self, species: Species) -> &str {
        match species {
            Species::Dog => &self.placeholder_dog,
            Species::Cat => &self.placeholder_cat,
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7340".to_string()
}
fn default_asset_prefix() -> String {
    "/cache".to_string()
}
fn default_placeholder_dog() -> String {
    "/static/placeholder-dog.svg".to_string()
}
fn default_placeholder_cat() -> String {
    "/static/placeholder-cat.svg".to_string()
}

/// One completion backend entry from `[[providers]]`.
#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    pub name: String,
    /// Wire protocol: `openai`, `anthropic`, `gemini`, or `ollama`.
    pub kind: String,
    #[serde(default)]
    pub base_url: Option<String>,
    pub model: String,
    /// Model used for vision requests. Its presence marks the provider vision-capable.
    #[serde(default)]
    pub vision_model: Option<String>,
    /// Environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
    /// Lower runs first. Defaults to list position.
    #[serde(default)]
    pub priority: Option<u32>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_provider_timeout() -> u64 {
    20
}
fn default_max_tokens() -> u32 {
    1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_metadata_file")]
    pub metadata_file: String,
    #[serde(default = "default_ttl_days")]
    pub ttl_days: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            metadata_file: default_metadata_file(),
            ttl_days: default_ttl_days(),
        }
    }
}

impl CacheConfig {
    pub fn metadata_path(&self) -> PathBuf {
        self.dir.join(&self.metadata_file)
    }
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./data/breed-images")
}
fn default_metadata_file() -> String {
    "cache-metadata.json".to_string()
}
fn default_ttl_days() -> i64 {
    7
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImageConfig {
    #[serde(default = "default_max_dimension")]
    pub max_dimension: u32,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            max_dimension: default_max_dimension(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

fn default_max_dimension() -> u32 {
    800
}
fn default_jpeg_quality() -> u8 {
    85
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VerificationMode {
    Inline,
    Background,
    Off,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VerificationConfig {
    #[serde(default = "default_verification_mode")]
    pub mode: VerificationMode,
    /// A negative judgment rejects the image only when its confidence is above this.
    #[serde(default = "default_rejection_threshold")]
    pub rejection_threshold: u8,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            mode: default_verification_mode(),
            rejection_threshold: default_rejection_threshold(),
        }
    }
}

fn default_verification_mode() -> VerificationMode {
    VerificationMode::Inline
}
fn default_rejection_threshold() -> u8 {
    70
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourcesConfig {
    #[serde(default = "default_dog_catalog_url")]
    pub dog_catalog_url: String,
    #[serde(default = "default_cat_catalog_url")]
    pub cat_catalog_url: String,
    #[serde(default = "default_cat_api_key_env")]
    pub cat_api_key_env: String,
    #[serde(default = "default_unsplash_url")]
    pub unsplash_url: String,
    #[serde(default = "default_unsplash_key_env")]
    pub unsplash_key_env: String,
    #[serde(default = "default_pexels_url")]
    pub pexels_url: String,
    #[serde(default = "default_pexels_key_env")]
    pub pexels_key_env: String,
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,
    #[serde(default = "default_generative")]
    pub generative: Vec<GenerativeConfig>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            dog_catalog_url: default_dog_catalog_url(),
            cat_catalog_url: default_cat_catalog_url(),
            cat_api_key_env: default_cat_api_key_env(),
            unsplash_url: default_unsplash_url(),
            unsplash_key_env: default_unsplash_key_env(),
            pexels_url: default_pexels_url(),
            pexels_key_env: default_pexels_key_env(),
            download_timeout_secs: default_download_timeout(),
            generative: default_generative(),
        }
    }
}

fn default_dog_catalog_url() -> String {
    "https://dog.ceo/api".to_string()
}
fn default_cat_catalog_url() -> String {
    "https://api.thecatapi.com/v1".to_string()
}
fn default_cat_api_key_env() -> String {
    "CAT_API_KEY".to_string()
}
fn default_unsplash_url() -> String {
    "https://api.unsplash.com".to_string()
}
fn default_unsplash_key_env() -> String {
    "UNSPLASH_ACCESS_KEY".to_string()
}
fn default_pexels_url() -> String {
    "https://api.pexels.com/v1".to_string()
}
fn default_pexels_key_env() -> String {
    "PEXELS_API_KEY".to_string()
}
fn default_download_timeout() -> u64 {
    15
}
fn default_generative() -> Vec<GenerativeConfig> {
    vec![
        GenerativeConfig {
            kind: "openai".to_string(),
            base_url: None,
            model: None,
            api_key_env: None,
            timeout_secs: default_generative_timeout(),
        },
        GenerativeConfig {
            kind: "pollinations".to_string(),
            base_url: None,
            model: None,
            api_key_env: None,
            timeout_secs: default_generative_timeout(),
        },
    ]
}

/// One generative image backend from `[[sources.generative]]`.
#[derive(Debug, Deserialize, Clone)]
pub struct GenerativeConfig {
    /// `openai` or `pollinations`.
    pub kind: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_generative_timeout")]
    pub timeout_secs: u64,
}

fn default_generative_timeout() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct WarmConfig {
    /// Explicit pre-warm list. Empty means the built-in popular breeds.
    #[serde(default)]
    pub breeds: Vec<WarmBreed>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WarmBreed {
    pub name: String,
    pub species: Species,
}

impl Config {
    /// A config with no providers and default everything else.
    ///
    /// Used by commands that can run without a config file.
    pub fn minimal() -> Self {
        Self {
            server: ServerConfig::default(),
            providers: Vec::new(),
            cache: CacheConfig::default(),
            images: ImageConfig::default(),
            verification: VerificationConfig::default(),
            sources: SourcesConfig::default(),
            warm: WarmConfig::default(),
        }
    }
}

const PROVIDER_KINDS: &[&str] = &["openai", "anthropic", "gemini", "ollama"];
const GENERATIVE_KINDS: &[&str] = &["openai", "pollinations"];

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    // Validate providers
    let mut seen = std::collections::HashSet::new();
    for p in &config.providers {
        if p.name.trim().is_empty() {
            anyhow::bail!("providers.name must not be empty");
        }
        if !seen.insert(p.name.as_str()) {
            anyhow::bail!("duplicate provider name: '{}'", p.name);
        }
        if !PROVIDER_KINDS.contains(&p.kind.as_str()) {
            anyhow::bail!(
                "Unknown provider kind '{}' for '{}'. Must be openai, anthropic, gemini, or ollama.",
                p.kind,
                p.name
            );
        }
        if p.timeout_secs == 0 {
            anyhow::bail!("providers.timeout_secs must be > 0 (provider '{}')", p.name);
        }
    }

    let prefix = config.server.asset_prefix.trim_end_matches('/');
    if !config.server.asset_prefix.starts_with('/') || prefix.is_empty() {
        anyhow::bail!("server.asset_prefix must start with '/' and name a path, e.g. \"/cache\"");
    }

    // Validate cache
    if config.cache.ttl_days <= 0 {
        anyhow::bail!("cache.ttl_days must be > 0");
    }

    // Validate images
    if config.images.max_dimension == 0 {
        anyhow::bail!("images.max_dimension must be > 0");
    }
    if !(1..=100).contains(&config.images.jpeg_quality) {
        anyhow::bail!("images.jpeg_quality must be in [1, 100]");
    }

    if config.verification.rejection_threshold > 100 {
        anyhow::bail!("verification.rejection_threshold must be in [0, 100]");
    }

    for g in &config.sources.generative {
        if !GENERATIVE_KINDS.contains(&g.kind.as_str()) {
            anyhow::bail!(
                "Unknown generative source '{}'. Must be openai or pollinations.",
                g.kind
            );
        }
    }

    Ok(config)
}
