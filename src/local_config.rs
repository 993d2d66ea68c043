//! Per-project local configuration: `ignore`, `no-update`, `no-rebase`.
//! Stored as TOML inside the project's VCS metadata directory, read during
//! discovery and honored by the planner and executor.

use std::path::Path;

use jiri_vcs::VcsPort;
use serde::{Deserialize, Serialize};

use crate::error::JiriError;
use crate::paths;

/// Per-project flags that freeze or restrict how the engine treats a
/// project, independent of manifest contents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    /// Never create, move, update, rebase, or delete this project.
    pub ignore: bool,
    /// Fetch into the cache but never advance this project's working tree.
    pub no_update: bool,
    /// Skip rebasing this project's branches even when their tracking ref
    /// has advanced.
    pub no_rebase: bool,
}

impl LocalConfig {
    /// Reads the local config for a project already materialized at
    /// `project_path`, defaulting to all-false if no descriptor is present.
    pub fn read(vcs: &dyn VcsPort, project_path: &Path) -> Result<Self, JiriError> {
        match vcs.read_metadata_file(project_path, paths::LOCAL_CONFIG_FILE)? {
            Some(text) => Ok(toml::from_str(&text)?),
            None => Ok(Self::default()),
        }
    }

    /// Writes this local config into the project's VCS metadata directory.
    pub fn write(&self, vcs: &dyn VcsPort, project_path: &Path) -> Result<(), JiriError> {
        let text = toml::to_string_pretty(self)?;
        vcs.write_metadata_file(project_path, paths::LOCAL_CONFIG_FILE, &text)?;
        Ok(())
    }
}
