//! Configuration management for mdfig.
//!
//! Parses `mdfig.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! String configuration values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `render.kroki_url`
//! - `render.chrome_bin`
//! - `render.mermaid_url`
//! - `output.image_base`

mod expand;

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "mdfig.toml";

/// Public Kroki instance used when the kroki backend has no URL configured.
const DEFAULT_KROKI_URL: &str = "https://kroki.io";

/// Upper bound for `style.font_size`.
const MAX_FONT_SIZE: u32 = 200;

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override rendering backend.
    pub backend: Option<RenderBackend>,
    /// Override Kroki URL.
    pub kroki_url: Option<String>,
    /// Override browser executable.
    pub chrome_bin: Option<PathBuf>,
    /// Override image output directory.
    pub image_dir: Option<PathBuf>,
    /// Override image link prefix.
    pub image_base: Option<String>,
    /// Override unterminated block policy.
    pub unterminated: Option<UnterminatedPolicy>,
}

/// Image rendering backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderBackend {
    /// Headless Chrome/Chromium.
    #[default]
    Browser,
    /// Kroki HTTP service.
    Kroki,
}

/// Handling of a diagram block with no closing fence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnterminatedPolicy {
    /// Drop the block and warn.
    #[default]
    Discard,
    /// Fail the run.
    Error,
}

/// Application configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Diagram style.
    pub style: StyleConfig,
    /// Render configuration (paths are relative strings from TOML).
    render: RenderConfigRaw,
    /// Output configuration (paths are relative strings from TOML).
    output: OutputConfigRaw,

    /// Resolved render configuration (set after loading).
    #[serde(skip)]
    pub render_resolved: RenderConfig,
    /// Resolved output configuration (set after loading).
    #[serde(skip)]
    pub output_resolved: OutputConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

/// Diagram style configuration.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StyleConfig {
    /// Page and diagram background color.
    pub background_color: String,
    /// Primary node fill color.
    pub node_color: String,
    /// Font family for diagram text.
    pub font_family: String,
    /// Font size in pixels.
    pub font_size: u32,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            background_color: "white".to_owned(),
            node_color: "#1f78b4".to_owned(),
            font_family: "Arial, sans-serif".to_owned(),
            font_size: 14,
        }
    }
}

/// Raw render configuration as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RenderConfigRaw {
    backend: Option<RenderBackend>,
    kroki_url: Option<String>,
    chrome_bin: Option<String>,
    mermaid_url: Option<String>,
    timeout_secs: Option<u64>,
    window_width: Option<u32>,
    window_height: Option<u32>,
    settle_ms: Option<u64>,
}

/// Resolved render configuration.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Selected backend.
    pub backend: RenderBackend,
    /// Kroki server URL (used by the kroki backend).
    pub kroki_url: String,
    /// Explicit browser executable; detected when `None`.
    pub chrome_bin: Option<PathBuf>,
    /// Mermaid module URL; the renderer default when `None`.
    pub mermaid_url: Option<String>,
    /// Per-diagram render timeout.
    pub timeout: Duration,
    /// Browser viewport width in pixels.
    pub window_width: u32,
    /// Browser viewport height in pixels.
    pub window_height: u32,
    /// Time the page script gets before capture.
    pub settle: Duration,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            backend: RenderBackend::default(),
            kroki_url: DEFAULT_KROKI_URL.to_owned(),
            chrome_bin: None,
            mermaid_url: None,
            timeout: Duration::from_secs(30),
            window_width: 1280,
            window_height: 960,
            settle: Duration::from_millis(1000),
        }
    }
}

/// Raw output configuration as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct OutputConfigRaw {
    image_dir: Option<String>,
    image_base: Option<String>,
    unterminated: Option<UnterminatedPolicy>,
}

/// Resolved output configuration with absolute paths.
#[derive(Debug, Clone, Default)]
pub struct OutputConfig {
    /// Image directory; next to the output document when `None`.
    pub image_dir: Option<PathBuf>,
    /// Link prefix written into image tags; the image directory relative to
    /// the output document when `None`.
    pub image_base: Option<String>,
    /// Unterminated block policy.
    pub unterminated: UnterminatedPolicy,
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`render.kroki_url`").
        field: String,
        /// Error message (e.g., "${`KROKI_URL`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

/// Require a URL field to use http:// or https:// scheme.
fn require_http_url(url: &str, field: &str) -> Result<(), ConfigError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "{field} must start with http:// or https://"
        )));
    }
    Ok(())
}

/// Require a numeric field to be greater than zero.
fn require_positive(value: u64, field: &str) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Validation(format!(
            "{field} must be greater than 0"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `mdfig.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, and the
    /// result is validated once they are in place.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails,
    /// or the merged configuration is invalid.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }

        config.validate()?;
        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(backend) = settings.backend {
            self.render_resolved.backend = backend;
        }
        if let Some(kroki_url) = &settings.kroki_url {
            self.render_resolved.kroki_url.clone_from(kroki_url);
        }
        if let Some(chrome_bin) = &settings.chrome_bin {
            self.render_resolved.chrome_bin = Some(chrome_bin.clone());
        }
        if let Some(image_dir) = &settings.image_dir {
            self.output_resolved.image_dir = Some(image_dir.clone());
        }
        if let Some(image_base) = &settings.image_base {
            self.output_resolved.image_base = Some(image_base.clone());
        }
        if let Some(unterminated) = settings.unterminated {
            self.output_resolved.unterminated = unterminated;
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        // Expand environment variables before path resolution
        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Called by [`Config::load`] after CLI settings are applied, so the
    /// Kroki URL is only checked when the kroki backend is actually selected.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_style()?;
        self.validate_render()?;
        Ok(())
    }

    /// Validate style configuration.
    fn validate_style(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.style.background_color, "style.background_color")?;
        require_non_empty(&self.style.node_color, "style.node_color")?;
        require_non_empty(&self.style.font_family, "style.font_family")?;

        if !(1..=MAX_FONT_SIZE).contains(&self.style.font_size) {
            return Err(ConfigError::Validation(format!(
                "style.font_size must be between 1 and {MAX_FONT_SIZE}"
            )));
        }

        Ok(())
    }

    /// Validate render configuration.
    fn validate_render(&self) -> Result<(), ConfigError> {
        let render = &self.render_resolved;

        if render.backend == RenderBackend::Kroki {
            require_non_empty(&render.kroki_url, "render.kroki_url")?;
            require_http_url(&render.kroki_url, "render.kroki_url")?;
        }
        if let Some(url) = &render.mermaid_url {
            require_non_empty(url, "render.mermaid_url")?;
        }

        require_positive(render.timeout.as_secs(), "render.timeout_secs")?;
        require_positive(u64::from(render.window_width), "render.window_width")?;
        require_positive(u64::from(render.window_height), "render.window_height")?;

        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        let render = &mut self.render;
        if let Some(url) = &render.kroki_url {
            render.kroki_url = Some(expand::expand_env(url, "render.kroki_url")?);
        }
        if let Some(bin) = &render.chrome_bin {
            render.chrome_bin = Some(expand::expand_env(bin, "render.chrome_bin")?);
        }
        if let Some(url) = &render.mermaid_url {
            render.mermaid_url = Some(expand::expand_env(url, "render.mermaid_url")?);
        }

        if let Some(base) = &self.output.image_base {
            self.output.image_base = Some(expand::expand_env(base, "output.image_base")?);
        }

        Ok(())
    }

    /// Resolve raw sections against the config file's directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        let defaults = RenderConfig::default();
        let render = &self.render;

        self.render_resolved = RenderConfig {
            backend: render.backend.unwrap_or_default(),
            kroki_url: render.kroki_url.clone().unwrap_or(defaults.kroki_url),
            chrome_bin: render.chrome_bin.as_deref().map(|bin| resolve_program(config_dir, bin)),
            mermaid_url: render.mermaid_url.clone(),
            timeout: render.timeout_secs.map_or(defaults.timeout, Duration::from_secs),
            window_width: render.window_width.unwrap_or(defaults.window_width),
            window_height: render.window_height.unwrap_or(defaults.window_height),
            settle: render.settle_ms.map_or(defaults.settle, Duration::from_millis),
        };

        self.output_resolved = OutputConfig {
            image_dir: self.output.image_dir.as_deref().map(|dir| config_dir.join(dir)),
            image_base: self.output.image_base.clone(),
            unterminated: self.output.unterminated.unwrap_or_default(),
        };
    }
}

/// Resolve a program path: bare names stay as-is for `PATH` lookup,
/// relative paths with a directory component resolve against `base`.
fn resolve_program(base: &Path, program: &str) -> PathBuf {
    let path = Path::new(program);
    if path.is_absolute() || path.components().count() == 1 {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
