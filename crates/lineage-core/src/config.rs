//! # Configuration
//!
//! `LineageConfig` describes the repository layout and the tunable bounds of
//! a compile. It is read from TOML; every key is optional and falls back to
//! the defaults in [`crate::primitives`].
//!
//! ```toml
//! [layout]
//! pandas = "pandas"
//! export = "export/redpanda.json"
//!
//! [validation]
//! litter_tolerance_days = 2
//!
//! [history]
//! recent_window_seconds = 604800
//! ```

use crate::primitives;
use crate::{Category, LineageError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory names of each record category, plus the export path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub zoos: String,
    pub wild: String,
    pub pandas: String,
    pub media: String,
    pub links: String,
    pub export: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            zoos: primitives::ZOO_DIR.to_string(),
            wild: primitives::WILD_DIR.to_string(),
            pandas: primitives::PANDA_DIR.to_string(),
            media: primitives::MEDIA_DIR.to_string(),
            links: primitives::LINK_DIR.to_string(),
            export: primitives::EXPORT_PATH.to_string(),
        }
    }
}

impl LayoutConfig {
    /// Directory holding the records of a category.
    #[must_use]
    pub fn dir(&self, category: Category) -> &str {
        match category {
            Category::ManagedLocation => &self.zoos,
            Category::WildLocation => &self.wild,
            Category::Animal => &self.pandas,
            Category::Media => &self.media,
            Category::Link => &self.links,
        }
    }

    /// Category owning a repository-relative path, by its first component.
    #[must_use]
    pub fn category_of(&self, path: &str) -> Option<Category> {
        let first = path.trim_start_matches("./").split('/').next()?;
        Category::LOAD_ORDER
            .into_iter()
            .find(|category| self.dir(*category) == first)
    }
}

/// Validation bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub litter_tolerance_days: i64,
    pub max_name_length: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            litter_tolerance_days: primitives::LITTER_TOLERANCE_DAYS,
            max_name_length: primitives::MAX_NAME_LENGTH,
        }
    }
}

/// Version-control history settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub recent_window_seconds: i64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            recent_window_seconds: primitives::RECENT_WINDOW_SECONDS,
        }
    }
}

/// The media provider whose URIs carry an upload-order code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub prefix: String,
    pub shorthand: String,
    pub alphabet: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            prefix: primitives::PROVIDER_PREFIX.to_string(),
            shorthand: primitives::PROVIDER_SHORTHAND.to_string(),
            alphabet: primitives::PROVIDER_ALPHABET.to_string(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineageConfig {
    pub layout: LayoutConfig,
    pub validation: ValidationConfig,
    pub history: HistoryConfig,
    pub provider: ProviderConfig,
}

impl LineageConfig {
    /// Parse configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, LineageError> {
        let config: Self =
            toml::from_str(text).map_err(|e| LineageError::Config(e.to_string()))?;
        config.check()?;
        Ok(config)
    }

    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self, LineageError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            LineageError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Load `path` if it exists, otherwise use defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, LineageError> {
        if path.is_file() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Absolute export path for a repository root.
    #[must_use]
    pub fn export_path(&self, root: &Path) -> PathBuf {
        root.join(&self.layout.export)
    }

    fn check(&self) -> Result<(), LineageError> {
        if self.validation.litter_tolerance_days < 0 {
            return Err(LineageError::Config(
                "validation.litter_tolerance_days must not be negative".to_string(),
            ));
        }
        if self.history.recent_window_seconds <= 0 {
            return Err(LineageError::Config(
                "history.recent_window_seconds must be positive".to_string(),
            ));
        }
        if self.provider.alphabet.is_empty() {
            return Err(LineageError::Config(
                "provider.alphabet must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
