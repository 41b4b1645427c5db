//! Rendering configuration
//!
//! Markers substituted for placeholders that cannot be rendered, and whether
//! parsed templates are memoized. Loadable from TOML:
//!
//! ```toml
//! [markers]
//! unresolved = "{unknownPath:{raw}}"
//! null = "{null:{raw}}"
//! invalid = "{invalid value}"
//!
//! [cache]
//! templates = true
//! ```

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::registry::INVALID;

/// Hole in marker formats replaced by the placeholder's call names
pub const RAW_HOLE: &str = "{raw}";

/// Errors that can occur when loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Configuration options for rendering templates
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    /// Output when no arm of a placeholder has a path
    pub unresolved_marker: String,

    /// Output when every resolved arm produced no value
    pub null_marker: String,

    /// Replaces the output of a display that returned the invalid sentinel
    pub invalid_marker: String,

    /// Whether parsed templates are cached by their text
    pub cache_templates: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            unresolved_marker: "{unknownPath:{raw}}".to_string(),
            null_marker: "{null:{raw}}".to_string(),
            invalid_marker: INVALID.to_string(),
            cache_templates: true,
        }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlConfig {
    markers: Option<TomlMarkers>,
    cache: Option<TomlCache>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlMarkers {
    unresolved: Option<String>,
    null: Option<String>,
    invalid: Option<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlCache {
    templates: Option<bool>,
}

impl RenderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string; missing keys keep their defaults
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let parsed: TomlConfig = toml::from_str(content)?;
        let mut config = Self::default();

        if let Some(markers) = parsed.markers {
            if let Some(unresolved) = markers.unresolved {
                config.unresolved_marker = unresolved;
            }
            if let Some(null) = markers.null {
                config.null_marker = null;
            }
            if let Some(invalid) = markers.invalid {
                config.invalid_marker = invalid;
            }
        }
        if let Some(templates) = parsed.cache.and_then(|c| c.templates) {
            config.cache_templates = templates;
        }

        Ok(config)
    }

    pub fn with_unresolved_marker(mut self, marker: impl Into<String>) -> Self {
        self.unresolved_marker = marker.into();
        self
    }

    pub fn with_null_marker(mut self, marker: impl Into<String>) -> Self {
        self.null_marker = marker.into();
        self
    }

    pub fn with_invalid_marker(mut self, marker: impl Into<String>) -> Self {
        self.invalid_marker = marker.into();
        self
    }

    pub fn with_cache_templates(mut self, cache: bool) -> Self {
        self.cache_templates = cache;
        self
    }

    /// The unresolved marker for a placeholder with the given call names
    pub fn unresolved(&self, raw: &str) -> String {
        self.unresolved_marker.replace(RAW_HOLE, raw)
    }

    /// The null marker for a placeholder with the given call names
    pub fn null(&self, raw: &str) -> String {
        self.null_marker.replace(RAW_HOLE, raw)
    }
}
