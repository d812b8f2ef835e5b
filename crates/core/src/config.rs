//! Viewer configuration
//!
//! Settings can come from a TOML file, from environment variables or be
//! built programmatically. Every source is validated before use.

use pageview_cache::DEFAULT_CAPACITY;
use pageview_render::TargetResolution;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Environment variable overriding [`ViewerConfig::max_live_textures`].
pub const ENV_MAX_TEXTURES: &str = "PAGEVIEW_MAX_TEXTURES";
/// Environment variable overriding [`ViewerConfig::raster_dpi`].
pub const ENV_RASTER_DPI: &str = "PAGEVIEW_RASTER_DPI";
/// Environment variable overriding [`ViewerConfig::background_color`], as `r,g,b,a`.
pub const ENV_BACKGROUND: &str = "PAGEVIEW_BACKGROUND";

/// Highest accepted rasterization resolution.
pub const MAX_RASTER_DPI: f32 = 1200.0;

/// Configuration for one viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewerConfig {
    /// Maximum number of page textures alive at once
    pub max_live_textures: usize,
    /// Resolution pages are rasterized at, in dots per inch
    pub raster_dpi: f32,
    /// Clear color of every frame, RGBA in `0.0..=1.0`
    pub background_color: [f32; 4],
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            max_live_textures: DEFAULT_CAPACITY,
            raster_dpi: 220.0,
            background_color: [0.0, 0.0, 0.0, 0.0],
        }
    }
}

impl ViewerConfig {
    /// Sets the maximum number of live textures.
    pub fn with_max_live_textures(mut self, count: usize) -> Self {
        self.max_live_textures = count;
        self
    }

    /// Sets the rasterization resolution.
    pub fn with_raster_dpi(mut self, dpi: f32) -> Self {
        self.raster_dpi = dpi;
        self
    }

    /// Sets the frame clear color.
    pub fn with_background_color(mut self, rgba: [f32; 4]) -> Self {
        self.background_color = rgba;
        self
    }

    /// Resolution handed to the rasterization worker.
    pub fn resolution(&self) -> TargetResolution {
        TargetResolution::uniform(self.raster_dpi)
    }

    /// Check every value is usable.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] naming the first bad key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_live_textures == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_live_textures".into(),
                reason: "must be at least 1".into(),
            });
        }
        if !(self.raster_dpi.is_finite() && self.raster_dpi > 0.0 && self.raster_dpi <= MAX_RASTER_DPI)
        {
            return Err(ConfigError::InvalidValue {
                key: "raster_dpi".into(),
                reason: format!("must be in (0, {MAX_RASTER_DPI}], got {}", self.raster_dpi),
            });
        }
        if self.background_color.iter().any(|c| !(0.0..=1.0).contains(c)) {
            return Err(ConfigError::InvalidValue {
                key: "background_color".into(),
                reason: "components must be in 0.0..=1.0".into(),
            });
        }
        Ok(())
    }

    /// Loads configuration from environment variables on top of the defaults.
    ///
    /// Environment variables:
    /// - `PAGEVIEW_MAX_TEXTURES`: maximum live textures (default: 50)
    /// - `PAGEVIEW_RASTER_DPI`: rasterization DPI (default: 220)
    /// - `PAGEVIEW_BACKGROUND`: clear color as `r,g,b,a` (default: `0,0,0,0`)
    ///
    /// # Errors
    /// Returns an error if any environment variable contains an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    /// Apply any `PAGEVIEW_*` environment variables to this configuration.
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Ok(val) = std::env::var(ENV_MAX_TEXTURES) {
            self.max_live_textures = val
                .trim()
                .parse::<usize>()
                .map_err(|e| ConfigError::invalid(ENV_MAX_TEXTURES, e))?;
        }

        if let Ok(val) = std::env::var(ENV_RASTER_DPI) {
            self.raster_dpi =
                val.trim().parse::<f32>().map_err(|e| ConfigError::invalid(ENV_RASTER_DPI, e))?;
        }

        if let Ok(val) = std::env::var(ENV_BACKGROUND) {
            self.background_color = parse_rgba(&val)
                .ok_or_else(|| ConfigError::invalid(ENV_BACKGROUND, "expected r,g,b,a"))?;
        }

        self.validate()?;
        Ok(self)
    }

    /// Parses configuration from a TOML string. Missing keys keep their
    /// defaults.
    ///
    /// ```
    /// use pageview_core::ViewerConfig;
    ///
    /// let config = ViewerConfig::from_toml_str("max_live_textures = 8").unwrap();
    /// assert_eq!(config.max_live_textures, 8);
    /// assert_eq!(config.raster_dpi, 220.0);
    /// ```
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&contents)
    }

    /// Saves configuration to a TOML file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)?;
        fs::write(path.as_ref(), toml)?;
        Ok(())
    }
}

fn parse_rgba(value: &str) -> Option<[f32; 4]> {
    let mut rgba = [0.0; 4];
    let mut parts = value.split(',');
    for slot in &mut rgba {
        *slot = parts.next()?.trim().parse().ok()?;
    }
    parts.next().is_none().then_some(rgba)
}

/// Errors that can occur during configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

impl ConfigError {
    fn invalid(key: &str, reason: impl std::fmt::Display) -> Self {
        ConfigError::InvalidValue { key: key.to_string(), reason: reason.to_string() }
    }
}
