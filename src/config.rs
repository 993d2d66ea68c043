//! Engine configuration: cache root, parallelism, default hook timeout, and
//! default remote branch name. Loadable from a TOML file under the
//! workspace's engine-metadata directory; the teacher repository has no
//! config file of its own, so this follows the TOML-config convention used
//! elsewhere in the retrieved corpus.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::JiriError;
use crate::paths;

/// Engine-wide configuration for a single reconciliation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root directory under which per-remote cache repositories live.
    pub cache_root: PathBuf,

    /// Maximum number of projects updated concurrently.
    pub parallelism: usize,

    /// Default per-hook timeout, in seconds, when a hook does not specify
    /// its own.
    pub default_hook_timeout_secs: u64,

    /// Remote branch name assumed when a project or import does not name
    /// one explicitly.
    pub default_remote_branch: String,

    /// Rebase every tracking branch, not just the current one, during an
    /// update.
    pub rebase_all: bool,

    /// Additionally rebase branches that have no tracking ref, when
    /// `rebase_all` is set.
    pub rebase_untracked: bool,

    /// Remove projects absent from the desired set (subject to the
    /// dirty-delete guard).
    pub gc: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_root: PathBuf::from(paths::ENGINE_META_DIR).join(paths::CACHE_DIR_NAME),
            parallelism: default_parallelism(),
            default_hook_timeout_secs: 300,
            default_remote_branch: jiri_manifest::DEFAULT_REMOTE_BRANCH.to_string(),
            rebase_all: false,
            rebase_untracked: false,
            gc: false,
        }
    }
}

fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl Config {
    /// Path to this workspace's config file, whether or not it exists yet.
    pub fn path(workspace_root: &Path) -> PathBuf {
        paths::engine_meta_dir(workspace_root).join(paths::CONFIG_FILE_NAME)
    }

    /// Loads the config file for `workspace_root`, falling back to defaults
    /// (with `cache_root` anchored under the workspace) if none exists.
    pub fn load(workspace_root: &Path) -> Result<Self, JiriError> {
        let path = Self::path(workspace_root);
        let mut config = if path.is_file() {
            let text = fs::read_to_string(&path)?;
            toml::from_str(&text)?
        } else {
            Self::default()
        };
        if config.cache_root.is_relative() {
            config.cache_root = workspace_root.join(&config.cache_root);
        }
        Ok(config)
    }

    /// Writes this config to `workspace_root`'s config file, creating the
    /// engine metadata directory if needed.
    pub fn save(&self, workspace_root: &Path) -> Result<(), JiriError> {
        let path = Self::path(workspace_root);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml::to_string_pretty(self)?)?;
        Ok(())
    }
}
