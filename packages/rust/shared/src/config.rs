//! Application configuration for mdigest.
//!
//! User config lives at `~/.mdigest/mdigest.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{DigestError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "mdigest.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".mdigest";

// ---------------------------------------------------------------------------
// Config structs (matching mdigest.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Generation service settings.
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Batch processing settings.
    #[serde(default)]
    pub processing: ProcessingConfig,

    /// Rendering backend settings.
    #[serde(default)]
    pub render: RenderConfig,

    /// Progress stream settings.
    #[serde(default)]
    pub progress: ProgressConfig,
}

/// `[generation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Base URL of the chat-completions compatible endpoint.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model (or bot) identifier sent with every request.
    #[serde(default)]
    pub model_id: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Per-request timeout in seconds. A timeout is reported as an item error.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model_id: String::new(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "https://ark.cn-beijing.volces.com/api/v3/bots".into()
}
fn default_api_key_env() -> String {
    "MDIGEST_API_KEY".into()
}
fn default_timeout_secs() -> u64 {
    300
}

/// `[processing]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Items per batch, which is also the concurrency cap inside a batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Directory for generated Markdown and PDF files.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_batch_size() -> usize {
    10
}
fn default_output_dir() -> String {
    "output".into()
}

/// `[render]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Path to the `wkhtmltopdf` executable.
    #[serde(default = "default_wkhtmltopdf")]
    pub wkhtmltopdf_path: String,

    /// Document title; the render date is appended.
    #[serde(default = "default_title")]
    pub title: String,

    /// Page size passed to the backend.
    #[serde(default = "default_page_size")]
    pub page_size: String,

    /// Margin applied to all four sides.
    #[serde(default = "default_margin")]
    pub margin: String,

    /// Whether the backend generates an outline (bookmarks).
    #[serde(default = "default_true")]
    pub outline: bool,

    /// Maximum heading depth included in the outline.
    #[serde(default = "default_outline_depth")]
    pub outline_depth: u8,

    /// Right-hand footer template.
    #[serde(default = "default_footer_right")]
    pub footer_right: String,

    /// Footer font size in points.
    #[serde(default = "default_footer_font_size")]
    pub footer_font_size: u8,

    /// Space between footer and content in millimetres.
    #[serde(default = "default_footer_spacing")]
    pub footer_spacing: u8,

    /// Whether internal anchor links are honored in the output.
    #[serde(default = "default_true")]
    pub internal_links: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            wkhtmltopdf_path: default_wkhtmltopdf(),
            title: default_title(),
            page_size: default_page_size(),
            margin: default_margin(),
            outline: true,
            outline_depth: default_outline_depth(),
            footer_right: default_footer_right(),
            footer_font_size: default_footer_font_size(),
            footer_spacing: default_footer_spacing(),
            internal_links: true,
        }
    }
}

fn default_wkhtmltopdf() -> String {
    "wkhtmltopdf".into()
}
fn default_title() -> String {
    "AI News Summary".into()
}
fn default_page_size() -> String {
    "A4".into()
}
fn default_margin() -> String {
    "20mm".into()
}
fn default_true() -> bool {
    true
}
fn default_outline_depth() -> u8 {
    3
}
fn default_footer_right() -> String {
    "[page]/[topage]".into()
}
fn default_footer_font_size() -> u8 {
    9
}
fn default_footer_spacing() -> u8 {
    5
}

/// `[progress]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressConfig {
    /// How long a finished task stays resolvable for late subscribers.
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,

    /// Keep-alive interval of the server-push stream.
    #[serde(default = "default_keepalive_ms")]
    pub keepalive_ms: u64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            retention_secs: default_retention_secs(),
            keepalive_ms: default_keepalive_ms(),
        }
    }
}

fn default_retention_secs() -> u64 {
    60
}
fn default_keepalive_ms() -> u64 {
    1000
}

// ---------------------------------------------------------------------------
// Dispatch config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime dispatch configuration, validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Items per batch and concurrency cap within a batch. Always `>= 1`.
    pub batch_size: usize,
}

impl DispatchConfig {
    /// Build a validated dispatch config. A zero batch size is a configuration
    /// error, not a per-task failure.
    pub fn new(batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(DigestError::config("batch_size must be at least 1"));
        }
        Ok(Self { batch_size })
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.mdigest/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| DigestError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.mdigest/mdigest.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DigestError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| DigestError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| DigestError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| DigestError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| DigestError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check everything the generation service needs before any task starts:
/// a parseable base URL, a model id and a non-empty API key env var.
///
/// Returns the API key on success.
pub fn validate_generation(config: &AppConfig) -> Result<String> {
    let generation = &config.generation;

    Url::parse(&generation.base_url).map_err(|e| {
        DigestError::config(format!("invalid generation base_url '{}': {e}", generation.base_url))
    })?;

    if generation.model_id.trim().is_empty() {
        return Err(DigestError::config(
            "generation model_id is not set. Add `model_id` under [generation] in mdigest.toml",
        ));
    }

    let var_name = &generation.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(DigestError::config(format!(
            "API key not found. Set the {var_name} environment variable."
        ))),
    }
}
