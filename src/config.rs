//! Engine configuration and an optional layered loader for embedders.
//!
//! The engine only consumes a `GitConfig` value. Applications that want
//! file-based settings can use `ConfigLoader`, which merges (highest
//! priority first):
//! 1. Local override: `.git/branchbin/config.toml` (per-repo, per-user)
//! 2. User global: `~/.config/branchbin/config.toml` (personal defaults)
//! 3. Built-in defaults
//!
//! Configuration uses TOML format for readability.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default age in days past which a branch counts as stale
pub const DEFAULT_STALE_DAYS: u32 = 30;

/// Default trash retention period in days
pub const DEFAULT_TRASH_TTL_DAYS: u32 = 90;

/// Branch names protected from trash by default
pub const DEFAULT_EXCLUDED_BRANCHES: &[&str] = &["main", "master", "trunk", "develop", "release", "staging"];

/// Branches tried, in order, when no compare branch is configured
pub const COMPARE_BRANCH_CANDIDATES: &[&str] = &["main", "master"];

fn default_stale_days() -> u32 {
    DEFAULT_STALE_DAYS
}

fn default_trash_ttl_days() -> u32 {
    DEFAULT_TRASH_TTL_DAYS
}

fn default_excluded_branches() -> Vec<String> {
    DEFAULT_EXCLUDED_BRANCHES.iter().map(|s| s.to_string()).collect()
}

/// Per-session engine settings. Immutable once handed to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitConfig {
    /// A branch is stale when its last commit is strictly older than this many days
    #[serde(default = "default_stale_days")]
    pub stale_days_threshold: u32,

    /// Trash entries strictly older than this many days are swept
    #[serde(default = "default_trash_ttl_days")]
    pub trash_ttl_days: u32,

    /// Branch that merged/ahead/behind are computed against (None = main, then master)
    #[serde(default)]
    pub merge_compare_branch: Option<String>,

    /// Names never eligible for trash
    #[serde(default = "default_excluded_branches")]
    pub excluded_branches: Vec<String>,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            stale_days_threshold: DEFAULT_STALE_DAYS,
            trash_ttl_days: DEFAULT_TRASH_TTL_DAYS,
            merge_compare_branch: None,
            excluded_branches: default_excluded_branches(),
        }
    }
}

impl GitConfig {
    /// Check whether a branch name is protected
    pub fn is_excluded(&self, name: &str) -> bool {
        self.excluded_branches.iter().any(|b| b == name)
    }
}

/// One config file layer. Unset keys fall through to the next layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stale_days_threshold: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trash_ttl_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_compare_branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excluded_branches: Option<Vec<String>>,
}

impl ConfigFile {
    /// Apply this layer's set keys over `base`
    fn apply(&self, base: &mut GitConfig) {
        if let Some(days) = self.stale_days_threshold {
            base.stale_days_threshold = days;
        }
        if let Some(days) = self.trash_ttl_days {
            base.trash_ttl_days = days;
        }
        if let Some(branch) = &self.merge_compare_branch {
            base.merge_compare_branch = Some(branch.clone());
        }
        if let Some(excluded) = &self.excluded_branches {
            base.excluded_branches = excluded.clone();
        }
    }
}

/// Loads `GitConfig` from the user and repo-local TOML layers.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    user_path: Option<PathBuf>,
    local_path: PathBuf,
}

impl ConfigLoader {
    /// Loader for a repository, given its `.git` directory
    pub fn for_git_dir(git_dir: &Path) -> Self {
        Self {
            user_path: Self::user_config_path().ok(),
            local_path: Self::local_config_path(git_dir),
        }
    }

    /// Loader with explicit layer paths
    pub fn with_paths(user_path: Option<PathBuf>, local_path: PathBuf) -> Self {
        Self { user_path, local_path }
    }

    /// Get path to user config: ~/.config/branchbin/config.toml
    pub fn user_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Could not determine user config directory")?;
        Ok(config_dir.join("branchbin").join("config.toml"))
    }

    /// Get path to local config: .git/branchbin/config.toml
    pub fn local_config_path(git_dir: &Path) -> PathBuf {
        git_dir.join("branchbin").join("config.toml")
    }

    /// Load configuration from all layers, merging with priority:
    /// local > user > defaults
    pub fn load(&self) -> GitConfig {
        let mut config = GitConfig::default();

        if let Some(user_path) = &self.user_path {
            Self::load_layer(user_path).apply(&mut config);
        }
        Self::load_layer(&self.local_path).apply(&mut config);

        config
    }

    /// Load one layer, treating missing or invalid files as empty
    fn load_layer(path: &Path) -> ConfigFile {
        match Self::load_toml_file(path) {
            Ok(layer) => layer,
            Err(e) => {
                eprintln!("Warning: Config file {:?} is invalid ({:#}), using defaults", path, e);
                ConfigFile::default()
            }
        }
    }

    fn load_toml_file(path: &Path) -> Result<ConfigFile> {
        if !path.exists() {
            return Ok(ConfigFile::default());
        }

        let content = fs::read_to_string(path).context("Failed to read config file")?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    /// Save the local layer to .git/branchbin/config.toml
    pub fn save_local(&self, layer: &ConfigFile) -> Result<()> {
        Self::save_layer(&self.local_path, layer)
    }

    /// Save the user layer to ~/.config/branchbin/config.toml
    pub fn save_user(&self, layer: &ConfigFile) -> Result<()> {
        let path = self
            .user_path
            .as_ref()
            .context("Could not determine user config directory")?;
        Self::save_layer(path, layer)
    }

    fn save_layer(path: &Path, layer: &ConfigFile) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(layer).context("Failed to serialize config")?;

        // Atomic write
        let temp_path = path.with_extension("toml.tmp");
        fs::write(&temp_path, content).context("Failed to write config file")?;
        fs::rename(&temp_path, path).context("Failed to finalize config file")?;

        Ok(())
    }
}
