//! Library entry point: wires the manifest loader, scanner, planner,
//! executor, hook runner, and snapshot service into the two operations a
//! caller actually needs -- bring the workspace up to date, and inspect the
//! plan without touching anything.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use jiri_vcs::VcsPort;
use tracing::{info, info_span, warn};

use crate::config::Config;
use crate::error::JiriError;
use crate::executor::{Executor, ProjectOutcome};
use crate::manifest_loader::ManifestLoader;
use crate::paths;
use crate::planner::{self, Operation};
use crate::scanner::{self, ScanMode};
use crate::snapshot;

/// Everything a single `update` run produced.
#[derive(Debug)]
pub struct UpdateReport {
    pub outcomes: Vec<ProjectOutcome>,
    pub snapshot_path: PathBuf,
}

/// Reconciles the workspace at `workspace_root` against its root manifest:
/// loads and resolves imports, scans for what already exists, plans the
/// difference, executes it, runs post-update hooks, then snapshots the
/// result actually reached.
pub fn update(workspace_root: &Path, vcs: &dyn VcsPort, config: &Config, scan_mode: ScanMode) -> Result<UpdateReport, JiriError> {
    let _span = info_span!("update", workspace = %workspace_root.display()).entered();

    let root_manifest_path = workspace_root.join(paths::ROOT_MANIFEST_FILE);
    let loader = ManifestLoader::new(vcs, config.cache_root.clone(), workspace_root.to_path_buf());
    let desired = loader.load(&root_manifest_path)?;
    info!(projects = desired.projects.len(), "loaded consolidated manifest");

    let local = scanner::scan(scan_mode, workspace_root, vcs)?;
    info!(found = local.len(), "scanned local projects");

    let ops = planner::plan(&desired.projects, &local, config.gc, vcs)?;
    info!(operations = ops.len(), "planned reconciliation");

    let executor = Executor::new(vcs, config);
    let outcomes = executor.run(ops);

    let failed = outcomes.iter().filter(|o| matches!(o, ProjectOutcome::Failed { .. })).count();
    for outcome in &outcomes {
        if let ProjectOutcome::Failed { project, error, .. } = outcome {
            warn!(project = %project, error = %error, "project failed to reconcile");
        }
    }

    let actual_revisions = revisions_from_outcomes(&desired, &outcomes);
    let timestamp = snapshot::now_timestamp();
    let snapshot_path = snapshot::write_update_history_snapshot(workspace_root, &desired, &actual_revisions, &timestamp)?;

    if failed > 0 {
        return Err(JiriError::PartialUpdate { failed, total: outcomes.len() });
    }

    hooks_from_outcomes(&desired, &outcomes, config)?;

    Ok(UpdateReport { outcomes, snapshot_path })
}

/// Computes the reconciliation plan without executing it, for inspection
/// (`jiri status`-style tooling).
pub fn plan_only(workspace_root: &Path, vcs: &dyn VcsPort, config: &Config, scan_mode: ScanMode) -> Result<Vec<Operation>, JiriError> {
    let root_manifest_path = workspace_root.join(paths::ROOT_MANIFEST_FILE);
    let loader = ManifestLoader::new(vcs, config.cache_root.clone(), workspace_root.to_path_buf());
    let desired = loader.load(&root_manifest_path)?;
    let local = scanner::scan(scan_mode, workspace_root, vcs)?;
    planner::plan(&desired.projects, &local, config.gc, vcs)
}

fn hooks_from_outcomes(
    desired: &crate::manifest_loader::LoadedManifest,
    outcomes: &[ProjectOutcome],
    config: &Config,
) -> Result<(), JiriError> {
    let reconciled: std::collections::BTreeSet<&str> = outcomes
        .iter()
        .filter_map(|o| match o {
            ProjectOutcome::Reconciled { project, .. } => Some(project.as_str()),
            _ => None,
        })
        .collect();

    let projects = desired
        .projects
        .iter()
        .filter(|(key, _)| reconciled.contains(key.name.as_str()))
        .map(|(key, project)| (key.clone(), project.clone()))
        .collect();

    crate::hooks::run_hooks(&desired.hooks, &projects, Duration::from_secs(config.default_hook_timeout_secs))
}

fn revisions_from_outcomes(
    desired: &crate::manifest_loader::LoadedManifest,
    outcomes: &[ProjectOutcome],
) -> HashMap<jiri_manifest::ProjectKey, String> {
    outcomes
        .iter()
        .filter_map(|o| match o {
            ProjectOutcome::Reconciled { project, revision, .. } => Some((project, revision)),
            _ => None,
        })
        .filter_map(|(name, revision)| {
            desired
                .projects
                .keys()
                .find(|key| &key.name == name)
                .map(|key| (key.clone(), revision.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiri_vcs::FakeVcs;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn update_materializes_a_single_project_manifest() {
        let dir = tempdir().unwrap();
        let vcs = FakeVcs::new();
        vcs.set_remote_branch("https://example.com/a", "master", "c1");

        fs::write(
            dir.path().join(paths::ROOT_MANIFEST_FILE),
            r#"<manifest><project name="a" path="a" remote="https://example.com/a"/></manifest>"#,
        )
        .unwrap();

        let mut config = Config::default();
        config.cache_root = dir.path().join(".jiri_root/cache");
        config.parallelism = 1;

        let report = update(dir.path(), &vcs, &config, ScanMode::Full).unwrap();
        assert_eq!(report.outcomes.len(), 1);
        assert!(matches!(report.outcomes[0], ProjectOutcome::Reconciled { .. }));
        assert!(report.snapshot_path.is_file());
    }

    #[test]
    fn second_update_is_a_no_op_when_nothing_changed() {
        let dir = tempdir().unwrap();
        let vcs = FakeVcs::new();
        vcs.set_remote_branch("https://example.com/a", "master", "c1");

        fs::write(
            dir.path().join(paths::ROOT_MANIFEST_FILE),
            r#"<manifest><project name="a" path="a" remote="https://example.com/a"/></manifest>"#,
        )
        .unwrap();

        let mut config = Config::default();
        config.cache_root = dir.path().join(".jiri_root/cache");
        config.parallelism = 1;

        update(dir.path(), &vcs, &config, ScanMode::Full).unwrap();
        let second = update(dir.path(), &vcs, &config, ScanMode::Fast).unwrap();

        assert_eq!(second.outcomes.len(), 1);
        match &second.outcomes[0] {
            ProjectOutcome::Reconciled { revision, .. } => assert_eq!(revision, "c1"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    #[cfg(unix)]
    fn hook_failure_is_propagated_as_fatal() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let vcs = FakeVcs::new();
        vcs.set_remote_branch("https://example.com/a", "master", "c1");

        let project_path = dir.path().join("a");
        fs::create_dir_all(&project_path).unwrap();
        let script_path = project_path.join("fail.sh");
        fs::write(&script_path, "#!/bin/sh\nexit 1\n").unwrap();
        fs::set_permissions(&script_path, fs::Permissions::from_mode(0o755)).unwrap();

        fs::write(
            dir.path().join(paths::ROOT_MANIFEST_FILE),
            r#"<manifest>
  <project name="a" path="a" remote="https://example.com/a"/>
  <hook name="post" action="fail.sh" project="a"/>
</manifest>"#,
        )
        .unwrap();

        let mut config = Config::default();
        config.cache_root = dir.path().join(".jiri_root/cache");
        config.parallelism = 1;

        let err = update(dir.path(), &vcs, &config, ScanMode::Full).unwrap_err();
        assert!(matches!(err, JiriError::HookFailure { .. }));
    }

    #[test]
    #[cfg(unix)]
    fn failed_project_skips_hooks() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let vcs = FakeVcs::new();
        vcs.set_remote_branch("https://example.com/a", "master", "c1");
        // "b"'s remote is never registered with the fake, so its
        // reconciliation fails and the run becomes a partial update.

        let project_a_path = dir.path().join("a");
        fs::create_dir_all(&project_a_path).unwrap();
        let marker = project_a_path.join("marker");
        let script_path = project_a_path.join("touch.sh");
        fs::write(&script_path, format!("#!/bin/sh\ntouch {}\n", marker.display())).unwrap();
        fs::set_permissions(&script_path, fs::Permissions::from_mode(0o755)).unwrap();

        fs::write(
            dir.path().join(paths::ROOT_MANIFEST_FILE),
            r#"<manifest>
  <project name="a" path="a" remote="https://example.com/a"/>
  <project name="b" path="b" remote="https://example.com/b"/>
  <hook name="post" action="touch.sh" project="a"/>
</manifest>"#,
        )
        .unwrap();

        let mut config = Config::default();
        config.cache_root = dir.path().join(".jiri_root/cache");
        config.parallelism = 1;

        let err = update(dir.path(), &vcs, &config, ScanMode::Full).unwrap_err();
        assert!(matches!(err, JiriError::PartialUpdate { failed: 1, .. }));
        assert!(!marker.exists());
    }
}
