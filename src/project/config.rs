//! Configuration handling
//!
//! Policy knobs live in `texbundle.toml` at the source root, falling back to
//! a user-level `~/.config/texbundle/config.toml`. Every field has a
//! default, so both files are optional and may be partial.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::pipeline::{assets, MacroPolicy, PipelineOptions};

/// File name of the project-level configuration.
pub const PROJECT_CONFIG: &str = "texbundle.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Downgrade missing inclusion targets to warnings.
    pub best_effort: bool,

    /// Tie-break for duplicate macro definitions ("final" or "first").
    pub macro_policy: MacroPolicy,

    /// Prune package imports whose name never occurs in the body. Turning
    /// this off keeps every unique import.
    pub prune_unused_packages: bool,

    /// Reflow and re-indent the merged document.
    pub reformat: bool,

    /// Probe order for extensionless image references.
    pub image_extensions: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            best_effort: false,
            macro_policy: MacroPolicy::default(),
            prune_unused_packages: true,
            reformat: true,
            image_extensions: assets::IMAGE_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

impl Config {
    /// Loads the configuration for a project: the project file if present,
    /// else the user-level file, else defaults.
    pub fn load(source_root: &Path) -> Result<Self> {
        let project_path = source_root.join(PROJECT_CONFIG);
        if project_path.is_file() {
            return Self::from_file(&project_path);
        }
        if let Some(user_path) = Self::user_config_path() {
            if user_path.is_file() {
                return Self::from_file(&user_path);
            }
        }
        Ok(Self::default())
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    /// Location of the user-level configuration file.
    pub fn user_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "texbundle")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Converts the configuration into pipeline options.
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            best_effort: self.best_effort,
            macro_policy: self.macro_policy,
            prune_unused_packages: self.prune_unused_packages,
            image_extensions: self.image_extensions.clone(),
        }
    }
}
