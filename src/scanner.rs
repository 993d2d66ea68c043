//! Local discovery: identifies which projects already exist on disk, either
//! by trusting the last-known snapshot (FAST) or by walking the workspace
//! (FULL).

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use jiri_manifest::{ProjectKey, ResolvedProject};
use jiri_vcs::VcsPort;
use serde::{Deserialize, Serialize};

use crate::error::JiriError;
use crate::local_config::LocalConfig;
use crate::paths;
use crate::snapshot;

/// A small identity record the executor writes into a project's VCS
/// metadata directory at creation time, so the scanner can recover a
/// project's full identity from disk alone, independent of the current
/// manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProjectDescriptor {
    name: String,
    remote: String,
    remote_branch: String,
    revision: Option<String>,
    gerrit_host: Option<String>,
    git_hooks: Option<String>,
    history_depth: Option<u32>,
    /// Set by the planner when another project's path is nested under this
    /// one; lets the scanner descend into an otherwise-leaf project.
    #[serde(default)]
    has_nested_children: bool,
}

impl ProjectDescriptor {
    fn from_resolved(project: &ResolvedProject, has_nested_children: bool) -> Self {
        Self {
            name: project.name.clone(),
            remote: project.remote.clone(),
            remote_branch: project.remote_branch.clone(),
            revision: project.revision.clone(),
            gerrit_host: project.gerrit_host.clone(),
            git_hooks: project.git_hooks.clone(),
            history_depth: project.history_depth,
            has_nested_children,
        }
    }

    /// Whether the scanner should descend beneath this project's root
    /// looking for further nested projects.
    fn is_leaf(&self) -> bool {
        self.history_depth.is_none() && !self.has_nested_children
    }

    fn into_resolved(self, path: std::path::PathBuf) -> ResolvedProject {
        ResolvedProject {
            name: self.name,
            path,
            remote: self.remote,
            remote_branch: self.remote_branch,
            revision: self.revision,
            gerrit_host: self.gerrit_host,
            git_hooks: self.git_hooks,
            history_depth: self.history_depth,
        }
    }
}

/// Writes the project descriptor the scanner will later read back. Called by
/// the executor after every create, update, or move, so a project whose
/// nested-children status changes stays discoverable by a later full scan.
pub fn write_descriptor(vcs: &dyn VcsPort, project: &ResolvedProject, has_nested_children: bool) -> Result<(), JiriError> {
    let descriptor = ProjectDescriptor::from_resolved(project, has_nested_children);
    let text = toml::to_string_pretty(&descriptor)?;
    vcs.write_metadata_file(&project.path, paths::PROJECT_DESCRIPTOR_FILE, &text)?;
    Ok(())
}

/// A project discovered on disk, with its local configuration flags.
#[derive(Debug, Clone)]
pub struct LocalProject {
    pub project: ResolvedProject,
    pub local_config: LocalConfig,
}

/// Discovery strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Trust the last-known snapshot; only fall back to [`ScanMode::Full`]
    /// if any of its projects are missing from disk.
    Fast,
    /// Walk the workspace root from scratch.
    Full,
}

/// Discovers the projects currently materialized under `workspace_root`.
pub fn scan(
    mode: ScanMode,
    workspace_root: &Path,
    vcs: &dyn VcsPort,
) -> Result<BTreeMap<ProjectKey, LocalProject>, JiriError> {
    if mode == ScanMode::Fast {
        if let Some(snapshot) = snapshot::read_latest(workspace_root)? {
            if snapshot.projects.values().all(|p| p.path.exists()) {
                let mut discovered = BTreeMap::new();
                for (key, project) in snapshot.projects {
                    let local_config = LocalConfig::read(vcs, &project.path)?;
                    discovered.insert(key, LocalProject { project, local_config });
                }
                return Ok(discovered);
            }
        }
    }

    let mut discovered = BTreeMap::new();
    walk(workspace_root, workspace_root, vcs, &mut discovered)?;
    Ok(discovered)
}

fn walk(
    dir: &Path,
    workspace_root: &Path,
    vcs: &dyn VcsPort,
    discovered: &mut BTreeMap<ProjectKey, LocalProject>,
) -> Result<(), JiriError> {
    if dir == paths::engine_meta_dir(workspace_root) {
        return Ok(());
    }

    if let Some(text) = vcs.read_metadata_file(dir, paths::PROJECT_DESCRIPTOR_FILE)? {
        let descriptor: ProjectDescriptor = toml::from_str(&text)?;
        // No declared history depth and no known nested children: this
        // project is a leaf, don't walk beneath it.
        let is_leaf = descriptor.is_leaf();
        let project = descriptor.into_resolved(dir.to_path_buf());
        let local_config = LocalConfig::read(vcs, dir)?;
        discovered.insert(project.key(), LocalProject { project, local_config });
        if is_leaf {
            return Ok(());
        }
    }

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() && path.file_name().map(|n| n != ".git").unwrap_or(true) {
            walk(&path, workspace_root, vcs, discovered)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiri_vcs::{CloneSource, FakeVcs};
    use tempfile::tempdir;

    fn fake_project(
        vcs: &FakeVcs,
        workspace: &Path,
        name: &str,
        remote: &str,
        rel_path: &str,
        has_nested_children: bool,
    ) -> ResolvedProject {
        vcs.set_remote_branch(remote, "master", "c1");
        let cache = workspace.join(".cache").join(name);
        let dest = workspace.join(rel_path);
        vcs.fetch_into_cache(remote, &cache, "master", None).unwrap();
        vcs.clone_from_cache(&cache, &dest, CloneSource::Alternates).unwrap();
        fs::create_dir_all(&dest).unwrap();

        let project = ResolvedProject {
            name: name.to_string(),
            path: dest,
            remote: remote.to_string(),
            remote_branch: "master".to_string(),
            revision: None,
            gerrit_host: None,
            git_hooks: None,
            history_depth: None,
        };
        write_descriptor(vcs, &project, has_nested_children).unwrap();
        project
    }

    #[test]
    fn full_scan_finds_nested_projects() {
        let dir = tempdir().unwrap();
        let vcs = FakeVcs::new();

        fake_project(&vcs, dir.path(), "outer", "https://example.com/outer", "outer", true);
        fake_project(
            &vcs,
            dir.path(),
            "inner",
            "https://example.com/inner",
            "outer/inner",
            false,
        );

        let discovered = scan(ScanMode::Full, dir.path(), &vcs).unwrap();
        assert_eq!(discovered.len(), 2);
    }

    #[test]
    fn leaf_project_is_not_descended_into() {
        let dir = tempdir().unwrap();
        let vcs = FakeVcs::new();

        // "outer" declares no nested children, so a project placed beneath
        // it on disk (simulating e.g. a vendored checkout) must not be
        // picked up by a full scan.
        fake_project(&vcs, dir.path(), "outer", "https://example.com/outer", "outer", false);
        fake_project(
            &vcs,
            dir.path(),
            "inner",
            "https://example.com/inner",
            "outer/inner",
            false,
        );

        let discovered = scan(ScanMode::Full, dir.path(), &vcs).unwrap();
        assert_eq!(discovered.len(), 1);
    }

    #[test]
    fn fast_scan_falls_back_to_full_when_snapshot_project_missing() {
        let dir = tempdir().unwrap();
        let vcs = FakeVcs::new();
        fake_project(&vcs, dir.path(), "a", "https://example.com/a", "a", false);

        // No snapshot history exists yet, so FAST must fall back to FULL.
        let discovered = scan(ScanMode::Fast, dir.path(), &vcs).unwrap();
        assert_eq!(discovered.len(), 1);
    }
}
