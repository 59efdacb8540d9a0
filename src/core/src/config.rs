use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{LayerError, Result};
use crate::log::LogConfig;

/// Environment variable overriding the configured store root.
pub const ROOT_ENV: &str = "STRATA_ROOT";

/// Layer store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding one subdirectory per layer
    pub root: PathBuf,

    /// Names of the areas inside a layer directory
    pub layout: LayoutConfig,

    /// Permission bits for directories the store creates
    pub dir_mode: u32,

    /// Logging configuration
    pub log: LogConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            layout: LayoutConfig::default(),
            dir_mode: 0o750,
            log: LogConfig::default(),
        }
    }
}

impl StoreConfig {
    /// Configuration rooted at `root` with the standard layout.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Load configuration from a YAML or JSON file, chosen by extension.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| LayerError::io("read config file", path, e))?;

        let config: StoreConfig = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&data)?,
            Some("json") => serde_json::from_str(&data)?,
            other => {
                return Err(LayerError::ConfigError(format!(
                    "unsupported config format {:?} for {} (expected .yaml, .yml or .json)",
                    other.unwrap_or(""),
                    path.display()
                )))
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Apply `STRATA_ROOT` if it is set and non-empty.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(root) = std::env::var(ROOT_ENV) {
            if !root.is_empty() {
                self.root = PathBuf::from(root);
            }
        }
        self
    }

    /// Reject layouts whose area names collide or are not plain names.
    pub fn validate(&self) -> Result<()> {
        if self.root.as_os_str().is_empty() {
            return Err(LayerError::ConfigError("root must not be empty".to_string()));
        }

        let names = self.layout.area_names();
        for (i, name) in names.iter().enumerate() {
            if name.is_empty() || name.contains('/') || *name == "." || *name == ".." {
                return Err(LayerError::ConfigError(format!(
                    "invalid layer area name '{}'",
                    name
                )));
            }
            if names[i + 1..].contains(name) {
                return Err(LayerError::ConfigError(format!(
                    "duplicate layer area name '{}'",
                    name
                )));
            }
        }

        if self.layout.whiteout_prefix.is_empty() || self.layout.whiteout_prefix.contains('/') {
            return Err(LayerError::ConfigError(format!(
                "invalid whiteout prefix '{}'",
                self.layout.whiteout_prefix
            )));
        }

        Ok(())
    }
}

/// Fixed names of the areas inside every layer directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// One entry per child layer naming this layer as parent
    pub link_dir: String,

    /// Files and whiteouts owned by the layer
    pub diff_dir: String,

    /// Single symlink to the parent layer, empty for roots
    pub parent_dir: String,

    /// One entry per active holder
    pub ref_dir: String,

    /// Materialized ancestry, read-write layers only
    pub work_dir: String,

    /// Name prefix marking a deleted path
    pub whiteout_prefix: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            link_dir: "link".to_string(),
            diff_dir: "diff".to_string(),
            parent_dir: "parent".to_string(),
            ref_dir: "refs".to_string(),
            work_dir: "work".to_string(),
            whiteout_prefix: ".wh.".to_string(),
        }
    }
}

impl LayoutConfig {
    /// Areas every layer has, in creation order.
    pub fn base_areas(&self) -> [&str; 4] {
        [
            self.link_dir.as_str(),
            self.diff_dir.as_str(),
            self.parent_dir.as_str(),
            self.ref_dir.as_str(),
        ]
    }

    fn area_names(&self) -> [&str; 5] {
        [
            self.link_dir.as_str(),
            self.diff_dir.as_str(),
            self.parent_dir.as_str(),
            self.ref_dir.as_str(),
            self.work_dir.as_str(),
        ]
    }
}

/// Default store root (~/.strata/layers).
pub fn default_root() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".strata"))
        .unwrap_or_else(|| PathBuf::from(".strata"))
        .join("layers")
}
