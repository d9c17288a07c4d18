//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (LINKDIGEST_*, nested keys split on `__`)
//! 2. TOML config file (if LINKDIGEST_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::cache::CacheSettings;
use crate::dispatch::DispatchSettings;

mod validation;

pub use validation::ConfigError;

/// Cache location, limits and preload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Directory holding cache files.
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: u64,

    /// Load the most recent entries into memory at startup.
    #[serde(default)]
    pub preload_enabled: bool,

    #[serde(default = "default_preload_count")]
    pub preload_count: usize,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./linkdigest-cache")
}

fn default_max_entries() -> usize {
    100
}

fn default_ttl_minutes() -> u64 {
    1440
}

fn default_preload_count() -> usize {
    20
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: default_cache_dir(),
            max_entries: default_max_entries(),
            ttl_minutes: default_ttl_minutes(),
            preload_enabled: false,
            preload_count: default_preload_count(),
        }
    }
}

/// HTTP fetching and batch scheduling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Extracted text is truncated to this many characters.
    #[serde(default = "default_max_content_length")]
    pub max_content_length: usize,

    /// Extra attempts after a failed fetch.
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    #[serde(default = "default_true")]
    pub dynamic_concurrency: bool,

    #[serde(default)]
    pub priority_scheduling: bool,

    /// Treat `www.example.com` and `example.com` as the same page.
    #[serde(default = "default_true")]
    pub unified_domain: bool,

    /// Permit fetching loopback, private and link-local addresses.
    #[serde(default)]
    pub allow_private_hosts: bool,
}

fn default_user_agent() -> String {
    "linkdigest/0.1".into()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_content_length() -> usize {
    10_000
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    2_000
}

fn default_max_concurrency() -> usize {
    5
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_content_length: default_max_content_length(),
            retry_count: default_retry_count(),
            retry_delay_ms: default_retry_delay_ms(),
            max_concurrency: default_max_concurrency(),
            dynamic_concurrency: true,
            priority_scheduling: false,
            unified_domain: true,
            allow_private_hosts: false,
        }
    }
}

impl NetworkConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Host substring filters.
///
/// Set via LINKDIGEST_DOMAINS__ALLOWLIST / LINKDIGEST_DOMAINS__BLOCKLIST
/// or the `[domains]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomainConfig {
    #[serde(default)]
    pub allowlist: Vec<String>,

    #[serde(default)]
    pub blocklist: Vec<String>,
}

/// Optional content categories collected alongside the main text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractConfig {
    #[serde(default)]
    pub images: bool,

    #[serde(default)]
    pub links: bool,

    #[serde(default)]
    pub code_blocks: bool,

    /// `<meta>` description, keywords, author and Open Graph tags.
    #[serde(default)]
    pub meta: bool,
}

impl ExtractConfig {
    pub fn any(&self) -> bool {
        self.images || self.links || self.code_blocks || self.meta
    }
}

/// OpenAI-compatible chat completion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_llm_model")]
    pub model: String,

    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,
}

fn default_llm_base_url() -> String {
    "http://localhost:11434/v1".into()
}

fn default_llm_model() -> String {
    "llama3.1".into()
}

fn default_llm_max_tokens() -> u32 {
    1024
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: default_llm_base_url(),
            api_key: None,
            model: default_llm_model(),
            max_tokens: default_llm_max_tokens(),
        }
    }
}

/// Image encoding for screenshots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreenshotFormat {
    #[default]
    Png,
    Jpeg,
}

impl ScreenshotFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ScreenshotFormat::Png => "image/png",
            ScreenshotFormat::Jpeg => "image/jpeg",
        }
    }
}

/// Headless browser screenshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenshotConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,

    #[serde(default)]
    pub full_page: bool,

    /// Delay after navigation before capturing.
    #[serde(default = "default_wait_ms")]
    pub wait_ms: u64,

    #[serde(default)]
    pub format: ScreenshotFormat,

    /// JPEG quality, ignored for PNG.
    #[serde(default = "default_quality")]
    pub quality: u8,

    /// Maximum concurrent browser instances.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

fn default_width() -> u32 {
    1280
}

fn default_height() -> u32 {
    720
}

fn default_wait_ms() -> u64 {
    2_000
}

fn default_quality() -> u8 {
    80
}

fn default_pool_size() -> usize {
    2
}

fn default_idle_timeout_secs() -> u64 {
    300
}

impl Default for ScreenshotConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            width: default_width(),
            height: default_height(),
            full_page: false,
            wait_ms: default_wait_ms(),
            format: ScreenshotFormat::Png,
            quality: default_quality(),
            pool_size: default_pool_size(),
            idle_timeout_secs: default_idle_timeout_secs(),
        }
    }
}

impl ScreenshotConfig {
    pub fn wait(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

fn default_true() -> bool {
    true
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (LINKDIGEST_*)
/// 2. TOML config file (if LINKDIGEST_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub domains: DomainConfig,

    #[serde(default)]
    pub extract: ExtractConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub screenshot: ScreenshotConfig,
}

impl AppConfig {
    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `LINKDIGEST_`
    /// 2. TOML file from `LINKDIGEST_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("LINKDIGEST_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("LINKDIGEST_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        Self::extract(figment)
    }

    /// Build a configuration from a TOML document layered over defaults.
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        Self::extract(Figment::from(Serialized::defaults(Self::default())).merge(Toml::string(toml)))
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Typed cache limits.
    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            max_entries: self.cache.max_entries,
            ttl: Duration::from_secs(self.cache.ttl_minutes * 60),
            preload_enabled: self.cache.preload_enabled,
            preload_count: self.cache.preload_count,
        }
    }

    /// Typed scheduling knobs.
    pub fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            max_concurrency: self.network.max_concurrency,
            dynamic_concurrency: self.network.dynamic_concurrency,
            priority_scheduling: self.network.priority_scheduling,
        }
    }
}
