//! Snapshot service: the snapshot format is simply the manifest format, with
//! every project's revision pinned to the commit its working tree was
//! actually left at. This lets a snapshot be fed back in as a fully
//! deterministic desired state.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use jiri_manifest::{Manifest, ProjectKey, ProjectSpec};

use crate::error::JiriError;
use crate::manifest_loader::LoadedManifest;
use crate::paths;

/// Builds the pinned-revision manifest for a consolidated project set,
/// given each project's actually-checked-out commit.
fn build_snapshot(
    loaded: &LoadedManifest,
    actual_revisions: &HashMap<ProjectKey, String>,
    workspace_root: &Path,
) -> Manifest {
    let projects = loaded
        .projects
        .values()
        .map(|project| {
            let path = project
                .path
                .strip_prefix(workspace_root)
                .unwrap_or(&project.path)
                .to_string_lossy()
                .into_owned();
            ProjectSpec {
                name: project.name.clone(),
                path,
                remote: project.remote.clone(),
                remote_branch: Some(project.remote_branch.clone()),
                revision: actual_revisions.get(&project.key()).cloned(),
                gerrit_host: project.gerrit_host.clone(),
                git_hooks: project.git_hooks.clone(),
                history_depth: project.history_depth,
            }
        })
        .collect();

    Manifest {
        imports: Vec::new(),
        local_imports: Vec::new(),
        projects,
        hooks: loaded.hooks.clone(),
    }
}

/// Writes the consolidated manifest, pinned to `actual_revisions`, to an
/// arbitrary filesystem path.
pub fn create_snapshot(
    loaded: &LoadedManifest,
    actual_revisions: &HashMap<ProjectKey, String>,
    workspace_root: &Path,
    path: &Path,
) -> Result<(), JiriError> {
    let manifest = build_snapshot(loaded, actual_revisions, workspace_root);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, manifest.to_xml_string()?)?;
    Ok(())
}

/// Writes a timestamped snapshot into the workspace's update-history
/// directory and repoints the "latest" pointer at it.
pub fn write_update_history_snapshot(
    workspace_root: &Path,
    loaded: &LoadedManifest,
    actual_revisions: &HashMap<ProjectKey, String>,
    timestamp: &str,
) -> Result<PathBuf, JiriError> {
    let dir = paths::update_history_dir(workspace_root);
    fs::create_dir_all(&dir)?;

    let snapshot_path = dir.join(timestamp);
    create_snapshot(loaded, actual_revisions, workspace_root, &snapshot_path)?;

    fs::write(dir.join(paths::LATEST_POINTER_NAME), timestamp)?;
    Ok(snapshot_path)
}

/// Filesystem-safe RFC3339-derived timestamp suitable for naming an
/// update-history snapshot (`:` is not valid in a Windows file name).
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339().replace(':', "-")
}

/// Reads the workspace's most recent update-history snapshot, if any.
pub fn read_latest(workspace_root: &Path) -> Result<Option<LoadedManifest>, JiriError> {
    let dir = paths::update_history_dir(workspace_root);
    let pointer_path = dir.join(paths::LATEST_POINTER_NAME);
    if !pointer_path.is_file() {
        return Ok(None);
    }

    let name = fs::read_to_string(&pointer_path)?;
    let snapshot_path = dir.join(name.trim());
    if !snapshot_path.is_file() {
        return Ok(None);
    }

    Ok(Some(read_manifest_as_loaded(&snapshot_path, workspace_root)?))
}

/// Reads a standalone manifest file (no import resolution) as a desired
/// state, for `jiri` snapshot checkout.
pub fn checkout_snapshot_source(source_path: &Path, workspace_root: &Path) -> Result<LoadedManifest, JiriError> {
    read_manifest_as_loaded(source_path, workspace_root)
}

fn read_manifest_as_loaded(path: &Path, workspace_root: &Path) -> Result<LoadedManifest, JiriError> {
    let manifest = Manifest::from_xml_str(&fs::read_to_string(path)?)?;
    let mut projects = BTreeMap::new();
    for project in &manifest.projects {
        let resolved = project.resolve(workspace_root);
        projects.insert(resolved.key(), resolved);
    }
    Ok(LoadedManifest {
        projects,
        hooks: manifest.hooks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_loaded(workspace_root: &Path) -> LoadedManifest {
        let manifest = Manifest::from_xml_str(
            r#"<manifest><project name="a" path="a" remote="https://example.com/a"/></manifest>"#,
        )
        .unwrap();
        let mut projects = BTreeMap::new();
        for project in &manifest.projects {
            let resolved = project.resolve(workspace_root);
            projects.insert(resolved.key(), resolved);
        }
        LoadedManifest {
            projects,
            hooks: Vec::new(),
        }
    }

    #[test]
    fn snapshot_pins_every_project_to_its_actual_revision() {
        let dir = tempdir().unwrap();
        let loaded = sample_loaded(dir.path());
        let key = loaded.projects.keys().next().unwrap().clone();
        let mut revisions = HashMap::new();
        revisions.insert(key, "deadbeef".to_string());

        let snapshot_path = dir.path().join("snap.xml");
        create_snapshot(&loaded, &revisions, dir.path(), &snapshot_path).unwrap();

        let manifest = Manifest::from_xml_str(&fs::read_to_string(&snapshot_path).unwrap()).unwrap();
        assert_eq!(manifest.projects[0].revision.as_deref(), Some("deadbeef"));
    }

    #[test]
    fn update_history_writes_timestamped_file_and_latest_pointer() {
        let dir = tempdir().unwrap();
        let loaded = sample_loaded(dir.path());
        let key = loaded.projects.keys().next().unwrap().clone();
        let mut revisions = HashMap::new();
        revisions.insert(key, "c1".to_string());

        let written = write_update_history_snapshot(dir.path(), &loaded, &revisions, "2026-01-01T00-00-00").unwrap();
        assert!(written.is_file());

        let latest = read_latest(dir.path()).unwrap().expect("a snapshot exists");
        assert_eq!(latest.projects.len(), 1);
    }

    #[test]
    fn read_latest_without_any_history_returns_none() {
        let dir = tempdir().unwrap();
        assert!(read_latest(dir.path()).unwrap().is_none());
    }
}
