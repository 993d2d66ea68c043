//! An in-memory [`VcsPort`] double. Drives the engine's own test suite so it
//! never needs a real `git` binary, a real clone, or network access.
//!
//! Commits are opaque strings the test supplies (`"c1"`, `"c2"`, ...); no
//! actual object graph is modeled beyond "which commit does this ref point
//! at" and "is this commit an ancestor of that one", the latter tracked
//! explicitly via [`FakeVcs::mark_descendant`] since the fake has no real DAG.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::VcsError;
use crate::port::VcsPort;
use crate::types::{BranchState, CheckoutTarget, CloneSource, ProjectState, ReferenceState, RebaseOutcome};

#[derive(Debug, Default, Clone)]
struct CacheState {
    remote_url: String,
    branches: HashMap<String, String>,
    last_fetched_branch: Option<String>,
}

#[derive(Debug, Default, Clone)]
struct RepoState {
    origin_cache: PathBuf,
    /// local branch name -> commit
    branches: HashMap<String, String>,
    /// local branch name -> last-fetched remote-tracking commit
    tracking: HashMap<String, String>,
    current_branch: Option<String>,
    detached_commit: Option<String>,
    uncommitted: bool,
    untracked: HashSet<String>,
    ignored: HashSet<String>,
    metadata: HashMap<String, String>,
    cherry_pick: bool,
    force_conflict: bool,
}

#[derive(Debug, Default)]
struct State {
    /// remote URL -> branch -> commit
    remotes: HashMap<String, HashMap<String, String>>,
    /// ancestry pairs recorded via `mark_descendant(ancestor, descendant)`
    descendants: HashSet<(String, String)>,
    caches: HashMap<PathBuf, CacheState>,
    repos: HashMap<PathBuf, RepoState>,
    /// (remote url, commit) -> file path -> content
    remote_files: HashMap<(String, String), HashMap<String, String>>,
}

/// Cloneable handle to a shared in-memory VCS fixture.
#[derive(Debug, Default, Clone)]
pub struct FakeVcs(Arc<Mutex<State>>);

impl FakeVcs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets (creating if absent) a remote branch's tip commit.
    pub fn set_remote_branch(&self, remote_url: &str, branch: &str, commit: &str) {
        let mut state = self.0.lock().unwrap();
        state
            .remotes
            .entry(remote_url.to_string())
            .or_default()
            .insert(branch.to_string(), commit.to_string());
    }

    /// Seeds the file content readable via [`VcsPort::read_file_at_ref`] for
    /// `remote_url` at `commit`.
    pub fn set_remote_file(&self, remote_url: &str, commit: &str, file_path: &str, content: &str) {
        let mut state = self.0.lock().unwrap();
        state
            .remote_files
            .entry((remote_url.to_string(), commit.to_string()))
            .or_default()
            .insert(file_path.to_string(), content.to_string());
    }

    /// Records that `descendant` contains `ancestor` in its history, so
    /// fast-forward detection in [`VcsPort::rebase_onto`] works for fakes.
    pub fn mark_descendant(&self, ancestor: &str, descendant: &str) {
        let mut state = self.0.lock().unwrap();
        state
            .descendants
            .insert((ancestor.to_string(), descendant.to_string()));
    }

    pub fn mark_dirty(&self, repo: &Path) {
        let mut state = self.0.lock().unwrap();
        if let Some(r) = state.repos.get_mut(repo) {
            r.uncommitted = true;
        }
    }

    pub fn mark_untracked(&self, repo: &Path, file: &str) {
        let mut state = self.0.lock().unwrap();
        if let Some(r) = state.repos.get_mut(repo) {
            r.untracked.insert(file.to_string());
        }
    }

    pub fn set_will_conflict(&self, repo: &Path, conflict: bool) {
        let mut state = self.0.lock().unwrap();
        if let Some(r) = state.repos.get_mut(repo) {
            r.force_conflict = conflict;
        }
    }

    pub fn set_cherry_pick_in_progress(&self, repo: &Path, in_progress: bool) {
        let mut state = self.0.lock().unwrap();
        if let Some(r) = state.repos.get_mut(repo) {
            r.cherry_pick = in_progress;
        }
    }

    pub fn branch_commit(&self, repo: &Path, branch: &str) -> Option<String> {
        let state = self.0.lock().unwrap();
        state.repos.get(repo)?.branches.get(branch).cloned()
    }

    pub fn repo_exists(&self, repo: &Path) -> bool {
        self.0.lock().unwrap().repos.contains_key(repo)
    }

    fn is_ancestor(state: &State, ancestor: &str, descendant: &str) -> bool {
        ancestor == descendant || state.descendants.contains(&(ancestor.to_string(), descendant.to_string()))
    }
}

impl VcsPort for FakeVcs {
    fn fetch_into_cache(
        &self,
        remote_url: &str,
        cache_path: &Path,
        branch: &str,
        _revision: Option<&str>,
    ) -> Result<(), VcsError> {
        let mut state = self.0.lock().unwrap();
        let commit = state
            .remotes
            .get(remote_url)
            .and_then(|b| b.get(branch))
            .cloned()
            .ok_or_else(|| VcsError::UnknownRemote(remote_url.to_string()))?;

        let cache = state.caches.entry(cache_path.to_path_buf()).or_default();
        cache.remote_url = remote_url.to_string();
        cache.branches.insert(branch.to_string(), commit);
        cache.last_fetched_branch = Some(branch.to_string());
        Ok(())
    }

    fn clone_from_cache(
        &self,
        cache_path: &Path,
        dest: &Path,
        _source: CloneSource,
    ) -> Result<(), VcsError> {
        let mut state = self.0.lock().unwrap();
        let cache = state
            .caches
            .get(cache_path)
            .cloned()
            .ok_or_else(|| VcsError::UnknownRepository(cache_path.to_path_buf()))?;
        let branch = cache
            .last_fetched_branch
            .clone()
            .ok_or_else(|| VcsError::UnknownRepository(cache_path.to_path_buf()))?;
        let commit = cache.branches.get(&branch).cloned().unwrap_or_default();

        let mut repo = RepoState {
            origin_cache: cache_path.to_path_buf(),
            ..Default::default()
        };
        repo.branches.insert(branch.clone(), commit.clone());
        repo.tracking.insert(branch.clone(), commit);
        repo.current_branch = Some(branch);

        state.repos.insert(dest.to_path_buf(), repo);
        Ok(())
    }

    fn move_repository(&self, from: &Path, to: &Path) -> Result<(), VcsError> {
        let mut state = self.0.lock().unwrap();
        if state.repos.contains_key(to) {
            return Err(VcsError::DestinationNotEmpty(to.to_path_buf()));
        }
        let repo = state
            .repos
            .remove(from)
            .ok_or_else(|| VcsError::UnknownRepository(from.to_path_buf()))?;
        state.repos.insert(to.to_path_buf(), repo);
        Ok(())
    }

    fn fetch_updates(&self, repo: &Path, branch: &str) -> Result<(), VcsError> {
        let mut state = self.0.lock().unwrap();
        let origin_cache = state
            .repos
            .get(repo)
            .ok_or_else(|| VcsError::UnknownRepository(repo.to_path_buf()))?
            .origin_cache
            .clone();
        let commit = state
            .caches
            .get(&origin_cache)
            .and_then(|c| c.branches.get(branch))
            .cloned();
        if let Some(commit) = commit {
            if let Some(r) = state.repos.get_mut(repo) {
                r.tracking.insert(branch.to_string(), commit);
            }
        }
        Ok(())
    }

    fn checkout(&self, repo: &Path, target: &CheckoutTarget) -> Result<(), VcsError> {
        let mut state = self.0.lock().unwrap();
        let r = state
            .repos
            .get_mut(repo)
            .ok_or_else(|| VcsError::UnknownRepository(repo.to_path_buf()))?;
        match target {
            CheckoutTarget::Branch(name) => {
                if !r.branches.contains_key(name) {
                    return Err(VcsError::UnknownReference(name.clone(), repo.to_path_buf()));
                }
                r.current_branch = Some(name.clone());
                r.detached_commit = None;
            }
            CheckoutTarget::Detached(commit) => {
                r.current_branch = None;
                r.detached_commit = Some(commit.clone());
            }
        }
        Ok(())
    }

    fn reset_hard_preserving_worktree(&self, repo: &Path, commit: &str) -> Result<(), VcsError> {
        let mut state = self.0.lock().unwrap();
        let r = state
            .repos
            .get_mut(repo)
            .ok_or_else(|| VcsError::UnknownRepository(repo.to_path_buf()))?;
        if let Some(branch) = r.current_branch.clone() {
            r.branches.insert(branch, commit.to_string());
        } else {
            r.detached_commit = Some(commit.to_string());
        }
        // uncommitted/untracked are deliberately left untouched: that is the
        // whole point of "preserving".
        Ok(())
    }

    fn rebase_onto(&self, repo: &Path, branch: &str, onto: &str) -> Result<RebaseOutcome, VcsError> {
        let onto_commit = self.resolve_ref(repo, onto)?;
        let mut state = self.0.lock().unwrap();
        let r = state
            .repos
            .get_mut(repo)
            .ok_or_else(|| VcsError::UnknownRepository(repo.to_path_buf()))?;
        let branch_commit = r
            .branches
            .get(branch)
            .cloned()
            .ok_or_else(|| VcsError::UnknownReference(branch.to_string(), repo.to_path_buf()))?;

        if branch_commit == onto_commit {
            return Ok(RebaseOutcome::UpToDate);
        }

        if r.force_conflict {
            return Ok(RebaseOutcome::Conflict);
        }

        let outcome = if Self::is_ancestor(&state, &branch_commit, &onto_commit) {
            RebaseOutcome::FastForwarded
        } else {
            RebaseOutcome::Rebased
        };

        let r = state.repos.get_mut(repo).expect("checked above");
        r.branches.insert(branch.to_string(), onto_commit);
        Ok(outcome)
    }

    fn cherry_pick_in_progress(&self, repo: &Path) -> Result<bool, VcsError> {
        let state = self.0.lock().unwrap();
        Ok(state
            .repos
            .get(repo)
            .ok_or_else(|| VcsError::UnknownRepository(repo.to_path_buf()))?
            .cherry_pick)
    }

    fn project_state(&self, repo: &Path) -> Result<ProjectState, VcsError> {
        let state = self.0.lock().unwrap();
        let r = state
            .repos
            .get(repo)
            .ok_or_else(|| VcsError::UnknownRepository(repo.to_path_buf()))?;

        let branches = r
            .branches
            .iter()
            .map(|(name, commit)| BranchState {
                is_head: r.current_branch.as_deref() == Some(name.as_str()),
                reference: ReferenceState {
                    name: name.clone(),
                    revision: commit.clone(),
                },
                tracking: r.tracking.get(name).map(|commit| ReferenceState {
                    name: format!("origin/{name}"),
                    revision: commit.clone(),
                }),
            })
            .collect();

        Ok(ProjectState {
            branches,
            current_branch: r.current_branch.clone().unwrap_or_default(),
            has_uncommitted: r.uncommitted,
            has_untracked: !r.untracked.is_empty(),
        })
    }

    fn current_revision(&self, repo: &Path) -> Result<String, VcsError> {
        let state = self.0.lock().unwrap();
        let r = state
            .repos
            .get(repo)
            .ok_or_else(|| VcsError::UnknownRepository(repo.to_path_buf()))?;
        if let Some(branch) = &r.current_branch {
            Ok(r.branches.get(branch).cloned().unwrap_or_default())
        } else {
            Ok(r.detached_commit.clone().unwrap_or_default())
        }
    }

    fn resolve_ref(&self, repo: &Path, reference: &str) -> Result<String, VcsError> {
        let state = self.0.lock().unwrap();
        let r = state
            .repos
            .get(repo)
            .ok_or_else(|| VcsError::UnknownRepository(repo.to_path_buf()))?;

        if reference == "HEAD" {
            drop(state);
            return self.current_revision(repo);
        }
        if let Some(commit) = r.branches.get(reference) {
            return Ok(commit.clone());
        }
        if let Some(name) = reference.strip_prefix("origin/") {
            if let Some(commit) = r.tracking.get(name) {
                return Ok(commit.clone());
            }
        }
        // Otherwise assume the caller already passed a literal commit.
        Ok(reference.to_string())
    }

    fn read_file_at_ref(&self, repo: &Path, reference: &str, file_path: &str) -> Result<String, VcsError> {
        let state = self.0.lock().unwrap();
        let cache = state
            .caches
            .get(repo)
            .ok_or_else(|| VcsError::UnknownRepository(repo.to_path_buf()))?;
        let commit = cache
            .branches
            .get(reference)
            .cloned()
            .unwrap_or_else(|| reference.to_string());

        state
            .remote_files
            .get(&(cache.remote_url.clone(), commit))
            .and_then(|files| files.get(file_path))
            .cloned()
            .ok_or_else(|| VcsError::UnknownReference(file_path.to_string(), repo.to_path_buf()))
    }

    fn ensure_ignored(&self, repo: &Path, entry: &str) -> Result<(), VcsError> {
        let mut state = self.0.lock().unwrap();
        let r = state
            .repos
            .get_mut(repo)
            .ok_or_else(|| VcsError::UnknownRepository(repo.to_path_buf()))?;
        r.ignored.insert(entry.to_string());
        Ok(())
    }

    fn write_metadata_file(&self, repo: &Path, name: &str, content: &str) -> Result<(), VcsError> {
        let mut state = self.0.lock().unwrap();
        let r = state
            .repos
            .get_mut(repo)
            .ok_or_else(|| VcsError::UnknownRepository(repo.to_path_buf()))?;
        r.metadata.insert(name.to_string(), content.to_string());
        Ok(())
    }

    fn read_metadata_file(&self, repo: &Path, name: &str) -> Result<Option<String>, VcsError> {
        let state = self.0.lock().unwrap();
        let r = state
            .repos
            .get(repo)
            .ok_or_else(|| VcsError::UnknownRepository(repo.to_path_buf()))?;
        Ok(r.metadata.get(name).cloned())
    }
}
