//! Executor: carries out a planned operation list against the working
//! copies on disk, bounded by a worker pool, with per-remote fetches
//! serialized so two projects sharing a remote never race on the same
//! cache.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use jiri_manifest::ResolvedProject;
use jiri_vcs::{CheckoutTarget, CloneSource, VcsPort};
use rayon::prelude::*;
use tracing::{info, info_span, warn};

use crate::config::Config;
use crate::error::JiriError;
use crate::local_config::LocalConfig;
use crate::paths;
use crate::planner::{NullReason, Operation};
use crate::refs;
use crate::scanner;

/// Result of reconciling a single project.
#[derive(Debug, Clone)]
pub enum ProjectOutcome {
    /// The project was created, moved, or updated, and now sits at
    /// `revision`.
    Reconciled { project: String, path: PathBuf, revision: String },
    /// The project was deleted.
    Deleted { project: String, path: PathBuf },
    /// A rebase onto the tracking ref's new tip hit a conflict; the branch
    /// was left unchanged. Non-fatal on its own.
    RebaseConflict { project: String, path: PathBuf },
    /// No mutation happened (ignored, not garbage collected, or a dirty
    /// descendant protected it).
    Skipped { path: PathBuf, reason: NullReason },
    /// Something about this project failed; the run as a whole is a
    /// partial failure, but every other project's outcome still holds.
    Failed { project: String, path: PathBuf, error: String },
}

/// Shared state across a single executor run: the VCS port, engine config,
/// and one lock per remote URL so cache writes from different projects on
/// the same remote never interleave.
pub struct Executor<'a> {
    vcs: &'a dyn VcsPort,
    config: &'a Config,
    remote_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<'a> Executor<'a> {
    pub fn new(vcs: &'a dyn VcsPort, config: &'a Config) -> Self {
        Self {
            vcs,
            config,
            remote_locks: Mutex::new(HashMap::new()),
        }
    }

    fn lock_for_remote(&self, remote: &str) -> Arc<Mutex<()>> {
        let mut locks = self.remote_locks.lock().unwrap();
        locks.entry(remote.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    /// Executes every operation in `ops`, respecting the ancestors-first /
    /// descendants-first ordering the planner already applied. Operations at
    /// the same nesting depth run concurrently, bounded by
    /// `config.parallelism`; a barrier separates each depth so a child's
    /// path always exists before it is touched.
    pub fn run(&self, ops: Vec<Operation>) -> Vec<ProjectOutcome> {
        let (build, delete, null) = partition(ops);

        let mut outcomes = Vec::new();
        for batch in group_by_depth(build) {
            outcomes.extend(self.run_batch(batch, |op| self.execute_build(op)));
        }
        for batch in group_by_depth(delete) {
            outcomes.extend(self.run_batch(batch, |op| self.execute_delete(op)));
        }
        for op in null {
            outcomes.push(skip(op));
        }
        outcomes
    }

    fn run_batch(
        &self,
        batch: Vec<Operation>,
        execute: impl Fn(Operation) -> ProjectOutcome + Sync,
    ) -> Vec<ProjectOutcome> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.parallelism.max(1))
            .build()
            .expect("failed to build executor worker pool");
        pool.install(|| batch.into_par_iter().map(execute).collect())
    }

    fn execute_build(&self, op: Operation) -> ProjectOutcome {
        match op {
            Operation::Create { project, has_nested_children } => {
                let name = project.name.clone();
                let path = project.path.clone();
                match self.update_project(&project, LocalConfig::default(), true, None, has_nested_children) {
                    Ok(UpdateResult::Revision(revision)) => ProjectOutcome::Reconciled { project: name, path, revision },
                    Ok(UpdateResult::RebaseConflict) => ProjectOutcome::RebaseConflict { project: name, path },
                    Err(e) => ProjectOutcome::Failed { project: name, path, error: e.to_string() },
                }
            }
            Operation::Update { project, local_config, has_nested_children } => {
                let name = project.name.clone();
                let path = project.path.clone();
                match self.update_project(&project, local_config, false, None, has_nested_children) {
                    Ok(UpdateResult::Revision(revision)) => ProjectOutcome::Reconciled { project: name, path, revision },
                    Ok(UpdateResult::RebaseConflict) => ProjectOutcome::RebaseConflict { project: name, path },
                    Err(e) => ProjectOutcome::Failed { project: name, path, error: e.to_string() },
                }
            }
            Operation::Move { from, project, local_config, has_nested_children } => {
                let name = project.name.clone();
                let path = project.path.clone();
                if let Err(e) = self.vcs.move_repository(&from, &project.path) {
                    return ProjectOutcome::Failed { project: name, path, error: e.to_string() };
                }
                match self.update_project(&project, local_config, false, Some(&from), has_nested_children) {
                    Ok(UpdateResult::Revision(revision)) => ProjectOutcome::Reconciled { project: name, path, revision },
                    Ok(UpdateResult::RebaseConflict) => ProjectOutcome::RebaseConflict { project: name, path },
                    Err(e) => ProjectOutcome::Failed { project: name, path, error: e.to_string() },
                }
            }
            Operation::Delete { .. } | Operation::Null { .. } => {
                unreachable!("build batch only contains Create/Update/Move")
            }
        }
    }

    fn execute_delete(&self, op: Operation) -> ProjectOutcome {
        match op {
            Operation::Delete { project } => {
                let _span = info_span!("deleting project", project = %project.name).entered();
                let result = std::fs::remove_dir_all(&project.path);
                if result.is_ok() || !project.path.exists() {
                    ProjectOutcome::Deleted { project: project.name, path: project.path }
                } else {
                    ProjectOutcome::Failed {
                        project: project.name,
                        path: project.path,
                        error: result.unwrap_err().to_string(),
                    }
                }
            }
            _ => unreachable!("delete batch only contains Delete"),
        }
    }

    /// The full per-project reconciliation procedure: ensure the cache is
    /// current, materialize or fetch the working tree, determine and reach
    /// the target commit, optionally rebase other tracking branches, then
    /// leave the project's sentinel files and identity descriptor up to
    /// date.
    fn update_project(
        &self,
        project: &ResolvedProject,
        local_config: LocalConfig,
        is_new: bool,
        _moved_from: Option<&PathBuf>,
        has_nested_children: bool,
    ) -> Result<UpdateResult, JiriError> {
        let _span = info_span!("reconciling project", project = %project.name, path = %project.path.display()).entered();

        let cache_path = paths::cache_path_for(&self.config.cache_root, &project.remote);
        {
            let lock = self.lock_for_remote(&project.remote);
            let _guard = lock.lock().unwrap();
            self.vcs.fetch_into_cache(
                &project.remote,
                &cache_path,
                &project.remote_branch,
                project.revision.as_deref(),
            )?;
        }

        if is_new {
            info!("materializing new project from cache");
            let source = if project.is_shallow() { CloneSource::Full } else { CloneSource::Alternates };
            self.vcs.clone_from_cache(&cache_path, &project.path, source)?;
        } else {
            self.vcs.fetch_updates(&project.path, &project.remote_branch)?;
        }

        let target = match &project.revision {
            Some(pinned) => pinned.clone(),
            None => self.vcs.resolve_ref(&project.path, &format!("origin/{}", project.remote_branch))?,
        };

        let mut rebase_conflicted = false;
        if !local_config.no_update {
            let mut state = self.vcs.project_state(&project.path)?;
            // A pinned revision means this project's disposition is detached
            // HEAD; no pinned revision means it tracks `remote_branch`. When
            // the working tree's current disposition disagrees, switch it
            // before reconciling the target commit.
            let desired_detached = project.revision.is_some();

            if desired_detached {
                if state.is_detached() {
                    self.vcs.reset_hard_preserving_worktree(&project.path, &target)?;
                } else {
                    self.vcs.checkout(&project.path, &CheckoutTarget::Detached(target.clone()))?;
                }
            } else {
                if state.is_detached() {
                    self.vcs.checkout(&project.path, &CheckoutTarget::Branch(project.remote_branch.clone()))?;
                    state = self.vcs.project_state(&project.path)?;
                }
                if let Some(current) = state.branch(&state.current_branch) {
                    if current.reference.revision != target && !local_config.no_rebase {
                        match self.vcs.rebase_onto(&project.path, &state.current_branch, &target)? {
                            jiri_vcs::RebaseOutcome::Conflict => rebase_conflicted = true,
                            _ => {}
                        }
                    }
                }
            }

            if self.config.rebase_all && !local_config.no_rebase {
                self.rebase_other_branches(project, &state, &target)?;
            }
        }

        let actual_commit = self.vcs.current_revision(&project.path)?;
        let target_reference = project.revision.clone().unwrap_or_else(|| format!("origin/{}", project.remote_branch));
        refs::write_sentinels(self.vcs, &project.path, &target_reference, &actual_commit)?;
        self.vcs.ensure_ignored(&project.path, paths::ENGINE_META_DIR)?;

        scanner::write_descriptor(self.vcs, project, has_nested_children)?;

        if rebase_conflicted {
            warn!("rebase hit a conflict, branch left unchanged");
            return Ok(UpdateResult::RebaseConflict);
        }

        Ok(UpdateResult::Revision(actual_commit))
    }

    /// Rebases every other tracking branch onto its own tracking ref's tip
    /// (rebase-all mode). Branches without a tracking ref are rebased onto
    /// the project's own target commit, but only when `rebase_untracked` is
    /// also set.
    fn rebase_other_branches(
        &self,
        project: &ResolvedProject,
        state: &jiri_vcs::ProjectState,
        target: &str,
    ) -> Result<(), JiriError> {
        for branch in &state.branches {
            if branch.is_head {
                continue;
            }
            let onto = match &branch.tracking {
                Some(tracking) => tracking.revision.clone(),
                None if self.config.rebase_untracked => target.to_string(),
                None => continue,
            };
            if branch.reference.revision == onto {
                continue;
            }
            self.vcs.rebase_onto(&project.path, &branch.reference.name, &onto)?;
        }
        Ok(())
    }
}

enum UpdateResult {
    Revision(String),
    RebaseConflict,
}

fn skip(op: Operation) -> ProjectOutcome {
    match op {
        Operation::Null { path, reason } => ProjectOutcome::Skipped { path, reason },
        _ => unreachable!("null batch only contains Null"),
    }
}

fn partition(ops: Vec<Operation>) -> (Vec<Operation>, Vec<Operation>, Vec<Operation>) {
    let mut build = Vec::new();
    let mut delete = Vec::new();
    let mut null = Vec::new();
    for op in ops {
        match op {
            Operation::Delete { .. } => delete.push(op),
            Operation::Null { .. } => null.push(op),
            other => build.push(other),
        }
    }
    (build, delete, null)
}

/// Groups a depth-sorted operation list into batches of equal path depth,
/// preserving the input order.
fn group_by_depth(ops: Vec<Operation>) -> Vec<Vec<Operation>> {
    let mut batches: Vec<Vec<Operation>> = Vec::new();
    let mut current_depth = None;
    for op in ops {
        let depth = op.path().components().count();
        if current_depth != Some(depth) {
            batches.push(Vec::new());
            current_depth = Some(depth);
        }
        batches.last_mut().unwrap().push(op);
    }
    batches
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiri_vcs::FakeVcs;
    use tempfile::tempdir;

    fn project(name: &str, path: PathBuf, remote: &str) -> ResolvedProject {
        ResolvedProject {
            name: name.to_string(),
            path,
            remote: remote.to_string(),
            remote_branch: "master".to_string(),
            revision: None,
            gerrit_host: None,
            git_hooks: None,
            history_depth: None,
        }
    }

    #[test]
    fn create_materializes_and_reports_revision() {
        let dir = tempdir().unwrap();
        let vcs = FakeVcs::new();
        vcs.set_remote_branch("https://example.com/a", "master", "c1");
        let mut config = Config::default();
        config.cache_root = dir.path().join("cache");
        config.parallelism = 1;

        let p = project("a", dir.path().join("a"), "https://example.com/a");
        let executor = Executor::new(&vcs, &config);
        let outcomes = executor.run(vec![Operation::Create { project: p.clone(), has_nested_children: false }]);

        assert_eq!(outcomes.len(), 1);
        match &outcomes[0] {
            ProjectOutcome::Reconciled { revision, .. } => assert_eq!(revision, "c1"),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(refs::sentinels_consistent(&vcs, &p.path).unwrap());
    }

    #[test]
    fn delete_removes_the_working_tree() {
        let dir = tempdir().unwrap();
        let vcs = FakeVcs::new();
        vcs.set_remote_branch("https://example.com/a", "master", "c1");
        let mut config = Config::default();
        config.cache_root = dir.path().join("cache");
        config.parallelism = 1;

        let p = project("a", dir.path().join("a"), "https://example.com/a");
        std::fs::create_dir_all(&p.path).unwrap();

        let executor = Executor::new(&vcs, &config);
        let outcomes = executor.run(vec![Operation::Delete { project: p.clone() }]);

        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes[0], ProjectOutcome::Deleted { .. }));
        assert!(!p.path.exists());
    }

    #[test]
    fn null_operation_is_reported_without_touching_disk() {
        let dir = tempdir().unwrap();
        let vcs = FakeVcs::new();
        let config = Config::default();
        let executor = Executor::new(&vcs, &config);

        let marker = dir.path().join("untouched");
        std::fs::create_dir_all(&marker).unwrap();
        let outcomes = executor.run(vec![Operation::Null { path: marker.clone(), reason: NullReason::Ignored }]);

        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes[0], ProjectOutcome::Skipped { reason: NullReason::Ignored, .. }));
        assert!(marker.exists());
    }

    #[test]
    fn no_update_flag_skips_advancing_the_working_tree() {
        let dir = tempdir().unwrap();
        let vcs = FakeVcs::new();
        vcs.set_remote_branch("https://example.com/a", "master", "c1");
        let mut config = Config::default();
        config.cache_root = dir.path().join("cache");
        config.parallelism = 1;

        let p = project("a", dir.path().join("a"), "https://example.com/a");
        let executor = Executor::new(&vcs, &config);
        executor.run(vec![Operation::Create { project: p.clone(), has_nested_children: false }]);

        vcs.set_remote_branch("https://example.com/a", "master", "c2");
        let local_config = LocalConfig { no_update: true, ..Default::default() };
        let outcomes = executor.run(vec![Operation::Update {
            project: p.clone(),
            local_config,
            has_nested_children: false,
        }]);

        match &outcomes[0] {
            ProjectOutcome::Reconciled { revision, .. } => assert_eq!(revision, "c1"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn nested_projects_execute_without_path_ordering_failures() {
        let dir = tempdir().unwrap();
        let vcs = FakeVcs::new();
        vcs.set_remote_branch("https://example.com/outer", "master", "c1");
        vcs.set_remote_branch("https://example.com/inner", "master", "c1");
        let mut config = Config::default();
        config.cache_root = dir.path().join("cache");
        config.parallelism = 2;

        let outer = project("outer", dir.path().join("outer"), "https://example.com/outer");
        let inner = project("inner", dir.path().join("outer/inner"), "https://example.com/inner");

        let executor = Executor::new(&vcs, &config);
        let outcomes = executor.run(vec![
            Operation::Create { project: outer, has_nested_children: true },
            Operation::Create { project: inner, has_nested_children: false },
        ]);

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| matches!(o, ProjectOutcome::Reconciled { .. })));
    }
}
