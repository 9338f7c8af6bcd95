//! Configuration management for SiteKit.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration.
///
/// This is loaded from `~/.config/sitekit/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Backend REST API settings
    pub api: ApiConfig,
    /// Web font loading settings
    pub fonts: FontConfig,
    /// CMS live preview settings
    pub preview: PreviewConfig,
    /// Theme application settings
    pub theme: ThemeConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit path, falling back to defaults if
    /// the file does not exist.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            tracing::debug!("Loading config from {}", path.display());
            let contents = fs::read_to_string(path)?;
            let config: Self = toml::from_str(&contents)?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `SITEKIT_API_BASE_URL`: Override the backend base URL
    /// - `VITE_API_BASE_URL`: Legacy name for the base URL (lower precedence)
    /// - `SITEKIT_FONT_TIMEOUT_MS`: Override the font readiness timeout
    /// - `SITEKIT_PREVIEW_ENABLED`: Enable or disable the preview overlay (true/false)
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup function.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("SITEKIT_API_BASE_URL").or_else(|| lookup("VITE_API_BASE_URL"))
        {
            tracing::debug!("Override api.base_url from env: {}", url);
            self.api.base_url = url;
        }

        if let Some(val) = lookup("SITEKIT_FONT_TIMEOUT_MS") {
            if let Ok(ms) = val.parse() {
                self.fonts.ready_timeout_ms = ms;
                tracing::debug!("Override fonts.ready_timeout_ms from env: {}", ms);
            }
        }

        if let Some(val) = lookup("SITEKIT_PREVIEW_ENABLED") {
            if let Ok(enabled) = val.parse() {
                self.preview.enabled = enabled;
                tracing::debug!("Override preview.enabled from env: {}", enabled);
            }
        }
    }

    /// Check values that would otherwise fail late at request time.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "api.base_url".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.preview.frame_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "preview.frame_interval_ms".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to an explicit path.
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        let config_dir = path.parent().ok_or_else(|| ConfigError::InvalidValue {
            field: "config_path".to_string(),
            reason: "no parent directory".to_string(),
        })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/sitekit/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("com", "sitekit", "sitekit").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }
}

/// Backend REST API settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the CMS backend, without a trailing slash
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// User agent string
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: 30,
            user_agent: format!("SiteKit/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ApiConfig {
    /// Base URL with any trailing slash removed.
    #[must_use]
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

/// Web font loading settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontConfig {
    /// Primary stylesheet CDN (fontsource packages)
    pub primary_cdn: String,
    /// Fallback stylesheet provider (Google Fonts CSS2 API)
    pub fallback_cdn: String,
    /// Weights requested from the fallback provider
    pub weights: Vec<u16>,
    /// Upper bound on waiting for fonts before declaring them ready
    pub ready_timeout_ms: u64,
    /// Extra family names treated as system fonts (never fetched)
    pub extra_system_fonts: Vec<String>,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            primary_cdn: "https://cdn.jsdelivr.net/npm/@fontsource".to_string(),
            fallback_cdn: "https://fonts.googleapis.com/css2".to_string(),
            weights: vec![400, 500, 600, 700],
            ready_timeout_ms: 5000,
            extra_system_fonts: Vec::new(),
        }
    }
}

/// CMS live preview settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Whether the preview overlay is attached to resolvers
    pub enabled: bool,
    /// Interval of the frame queue driver in milliseconds
    pub frame_interval_ms: u64,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            frame_interval_ms: 16,
        }
    }
}

/// Theme application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeConfig {
    /// Id of the style block holding light/dark variables
    pub style_element_id: String,
    /// Also apply a `font-size` theme variable to the root element
    pub apply_root_font_size: bool,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            style_element_id: "tweakcn-theme-styles".to_string(),
            apply_root_font_size: true,
        }
    }
}
