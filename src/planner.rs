//! Planner: joins desired projects against locally discovered projects and
//! emits a topologically ordered list of per-project operations.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use jiri_manifest::{ProjectKey, ResolvedProject};
use jiri_vcs::VcsPort;

use crate::error::JiriError;
use crate::local_config::LocalConfig;
use crate::scanner::LocalProject;

/// Why a project was left untouched this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullReason {
    /// The project is marked `ignore`.
    Ignored,
    /// The project is absent from the desired set, but garbage collection
    /// was not requested.
    NotGarbageCollected,
    /// The project (or a nested descendant) has uncommitted or untracked
    /// changes, so its planned deletion was downgraded.
    DirtyDescendant,
}

/// A single per-project action the executor will carry out.
#[derive(Debug, Clone)]
pub enum Operation {
    Create {
        project: ResolvedProject,
        /// Whether another project's path will live nested under this
        /// one once this run completes, so the scanner knows to descend
        /// into it on a later walk even if it has no history depth of
        /// its own.
        has_nested_children: bool,
    },
    Update {
        project: ResolvedProject,
        local_config: LocalConfig,
        has_nested_children: bool,
    },
    Move {
        from: PathBuf,
        project: ResolvedProject,
        local_config: LocalConfig,
        has_nested_children: bool,
    },
    Delete {
        project: ResolvedProject,
    },
    Null {
        path: PathBuf,
        reason: NullReason,
    },
}

impl Operation {
    /// The path this operation's execution revolves around; `Move`'s
    /// destination for ordering purposes (moves are ordered like creates).
    pub fn path(&self) -> &Path {
        match self {
            Operation::Create { project, .. } => &project.path,
            Operation::Update { project, .. } => &project.path,
            Operation::Move { project, .. } => &project.path,
            Operation::Delete { project } => &project.path,
            Operation::Null { path, .. } => path,
        }
    }
}

/// Joins `desired` (from the manifest loader) with `local` (from the
/// scanner) by [`ProjectKey`] and emits the ordered operation list.
pub fn plan(
    desired: &BTreeMap<ProjectKey, ResolvedProject>,
    local: &BTreeMap<ProjectKey, LocalProject>,
    gc: bool,
    vcs: &dyn VcsPort,
) -> Result<Vec<Operation>, JiriError> {
    let keys: BTreeSet<&ProjectKey> = desired.keys().chain(local.keys()).collect();

    let surviving_paths: Vec<PathBuf> = keys
        .iter()
        .filter_map(|key| surviving_path(key, desired, local, gc))
        .collect();
    let nested = paths_with_nested_children(&surviving_paths);

    let mut ops = Vec::new();
    let mut delete_candidates: Vec<PathBuf> = Vec::new();

    for key in keys {
        match (desired.get(key), local.get(key)) {
            (Some(d), None) => ops.push(Operation::Create {
                has_nested_children: nested.contains(&d.path),
                project: d.clone(),
            }),
            (None, Some(l)) => {
                if l.local_config.ignore {
                    ops.push(Operation::Null {
                        path: l.project.path.clone(),
                        reason: NullReason::Ignored,
                    });
                } else if gc {
                    delete_candidates.push(l.project.path.clone());
                    ops.push(Operation::Delete {
                        project: l.project.clone(),
                    });
                } else {
                    ops.push(Operation::Null {
                        path: l.project.path.clone(),
                        reason: NullReason::NotGarbageCollected,
                    });
                }
            }
            (Some(d), Some(l)) => {
                if l.local_config.ignore {
                    ops.push(Operation::Null {
                        path: l.project.path.clone(),
                        reason: NullReason::Ignored,
                    });
                } else if l.project.path == d.path {
                    ops.push(Operation::Update {
                        has_nested_children: nested.contains(&d.path),
                        project: d.clone(),
                        local_config: l.local_config,
                    });
                } else {
                    ops.push(Operation::Move {
                        from: l.project.path.clone(),
                        has_nested_children: nested.contains(&d.path),
                        project: d.clone(),
                        local_config: l.local_config,
                    });
                }
            }
            (None, None) => unreachable!("key came from one of the two maps"),
        }
    }

    downgrade_dirty_deletes(&mut ops, &delete_candidates, vcs)?;

    Ok(topo_order(ops))
}

/// The path a project will occupy once this run completes, or `None` if it
/// is being deleted (garbage collected and not protected by `ignore`).
fn surviving_path(
    key: &ProjectKey,
    desired: &BTreeMap<ProjectKey, ResolvedProject>,
    local: &BTreeMap<ProjectKey, LocalProject>,
    gc: bool,
) -> Option<PathBuf> {
    match (desired.get(key), local.get(key)) {
        (Some(d), _) => Some(d.path.clone()),
        (None, Some(l)) => {
            if l.local_config.ignore || !gc {
                Some(l.project.path.clone())
            } else {
                None
            }
        }
        (None, None) => None,
    }
}

/// Every path in `paths` that will have at least one other surviving
/// project nested strictly beneath it; used so the scanner knows which
/// leaves to descend into even without a declared history depth.
fn paths_with_nested_children(paths: &[PathBuf]) -> HashSet<PathBuf> {
    paths
        .iter()
        .filter(|p| paths.iter().any(|other| other != *p && other.starts_with(p)))
        .cloned()
        .collect()
}

/// A delete candidate is downgraded to [`NullReason::DirtyDescendant`] if it
/// or any nested delete candidate beneath it has uncommitted or untracked
/// changes; this preserves the whole ancestor chain above a dirty project.
fn downgrade_dirty_deletes(
    ops: &mut [Operation],
    delete_candidates: &[PathBuf],
    vcs: &dyn VcsPort,
) -> Result<(), JiriError> {
    let mut dirty: HashSet<PathBuf> = HashSet::new();
    for path in delete_candidates {
        let state = vcs.project_state(path)?;
        if !state.is_clean() {
            dirty.insert(path.clone());
        }
    }
    if dirty.is_empty() {
        return Ok(());
    }

    let protect: HashSet<&PathBuf> = delete_candidates
        .iter()
        .filter(|candidate| dirty.iter().any(|d| d.starts_with(candidate)))
        .collect();

    for op in ops.iter_mut() {
        if let Operation::Delete { project } = op {
            if protect.contains(&project.path) {
                *op = Operation::Null {
                    path: project.path.clone(),
                    reason: NullReason::DirtyDescendant,
                };
            }
        }
    }

    Ok(())
}

/// Orders operations so that ancestor paths are created/moved before nested
/// descendants, and descendants are deleted before their ancestors. `Null`
/// operations perform no mutation, so their relative order is immaterial.
fn topo_order(ops: Vec<Operation>) -> Vec<Operation> {
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

    build.sort_by_key(|op| (depth(op.path()), op.path().to_path_buf()));
    delete.sort_by(|a, b| depth(b.path()).cmp(&depth(a.path())).then_with(|| a.path().cmp(b.path())));

    let mut out = build;
    out.extend(delete);
    out.extend(null);
    out
}

fn depth(path: &Path) -> usize {
    path.components().count()
}
