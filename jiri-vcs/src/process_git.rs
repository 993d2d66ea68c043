//! A [`VcsPort`] backed by shelling out to the `git` binary for working-tree
//! porcelain (checkout, reset, rebase, stash, status) that `gix` does not
//! expose, composed with [`crate::gix_cache`] for the cache's bare-mirror
//! bootstrap.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, warn};

use crate::error::VcsError;
use crate::gix_cache;
use crate::port::VcsPort;
use crate::types::{BranchState, CheckoutTarget, CloneSource, ProjectState, ReferenceState, RebaseOutcome};

/// The default `VcsPort` implementation: bare-mirror caches managed with
/// `gix`, working trees managed with the `git` CLI.
#[derive(Debug, Default, Clone, Copy)]
pub struct GitVcs;

fn git(repo: &Path) -> Command {
    let mut cmd = Command::new("git");
    cmd.current_dir(repo);
    cmd
}

fn run(mut cmd: Command, label: &str) -> Result<String, VcsError> {
    let output = cmd.output()?;
    if !output.status.success() {
        return Err(VcsError::CommandFailed(
            label.to_string(),
            output.status,
            String::from_utf8_lossy(&output.stderr).into_owned(),
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn status_of(mut cmd: Command) -> std::io::Result<bool> {
    cmd.stdout(std::process::Stdio::null());
    cmd.stderr(std::process::Stdio::null());
    Ok(cmd.status()?.success())
}

fn git_dir(repo: &Path) -> Result<PathBuf, VcsError> {
    let raw = run(
        git(repo).args(["rev-parse", "--git-dir"]),
        "rev-parse --git-dir",
    )?;
    let path = PathBuf::from(raw);
    Ok(if path.is_absolute() {
        path
    } else {
        repo.join(path)
    })
}

impl VcsPort for GitVcs {
    fn fetch_into_cache(
        &self,
        remote_url: &str,
        cache_path: &Path,
        branch: &str,
        revision: Option<&str>,
    ) -> Result<(), VcsError> {
        gix_cache::ensure_cache(remote_url, cache_path)?;

        let mut cmd = git(cache_path);
        cmd.args(["fetch", "--prune", "origin", branch]);
        run(cmd, "fetch --prune")?;

        if let Some(rev) = revision {
            // Best-effort: if the pinned revision isn't reachable from the
            // tracked branch (e.g. it lives on another ref), fetch it
            // directly so it is present in the cache's object store.
            let have = status_of(git(cache_path).args(["cat-file", "-e", rev]))?;
            if !have {
                let _ = run(git(cache_path).args(["fetch", "origin", rev]), "fetch revision");
            }
        }

        Ok(())
    }

    fn clone_from_cache(
        &self,
        cache_path: &Path,
        dest: &Path,
        source: CloneSource,
    ) -> Result<(), VcsError> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }

        let cache_str = cache_path.to_string_lossy().into_owned();
        let dest_str = dest.to_string_lossy().into_owned();

        let mut cmd = Command::new("git");
        match source {
            CloneSource::Alternates => {
                cmd.args(["clone", "--shared", &cache_str, &dest_str]);
            }
            CloneSource::Full => {
                cmd.args(["clone", "--reference", &cache_str, "--dissociate", &cache_str, &dest_str]);
            }
        }
        run(cmd, "clone")?;
        Ok(())
    }

    fn move_repository(&self, from: &Path, to: &Path) -> Result<(), VcsError> {
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)?;
        }
        if to.exists() && fs::read_dir(to)?.next().is_some() {
            return Err(VcsError::DestinationNotEmpty(to.to_path_buf()));
        }
        fs::rename(from, to)?;
        Ok(())
    }

    fn fetch_updates(&self, repo: &Path, branch: &str) -> Result<(), VcsError> {
        run(
            git(repo).args(["fetch", "--prune", "origin", branch]),
            "fetch --prune",
        )?;
        Ok(())
    }

    fn checkout(&self, repo: &Path, target: &CheckoutTarget) -> Result<(), VcsError> {
        match target {
            CheckoutTarget::Branch(name) => {
                run(git(repo).args(["checkout", name]), "checkout branch")?;
            }
            CheckoutTarget::Detached(commit) => {
                run(
                    git(repo).args(["checkout", "--detach", commit]),
                    "checkout detached",
                )?;
            }
        }
        Ok(())
    }

    fn reset_hard_preserving_worktree(&self, repo: &Path, commit: &str) -> Result<(), VcsError> {
        let stash_out = run(
            git(repo).args([
                "stash",
                "push",
                "--include-untracked",
                "--message",
                "jiri: preserving local changes across reset",
            ]),
            "stash push",
        )?;
        let stashed = !stash_out.contains("No local changes to save");

        run(git(repo).args(["reset", "--hard", commit]), "reset --hard")?;

        if stashed {
            run(git(repo).args(["stash", "pop"]), "stash pop")?;
        }

        Ok(())
    }

    fn rebase_onto(&self, repo: &Path, branch: &str, onto: &str) -> Result<RebaseOutcome, VcsError> {
        let branch_rev = self.resolve_ref(repo, branch)?;
        let onto_rev = self.resolve_ref(repo, onto)?;

        if branch_rev == onto_rev {
            return Ok(RebaseOutcome::UpToDate);
        }

        let is_ancestor = status_of(git(repo).args([
            "merge-base",
            "--is-ancestor",
            &branch_rev,
            &onto_rev,
        ]))?;

        if is_ancestor {
            let head_branch = self.project_state(repo)?.current_branch;
            if head_branch == branch {
                // branch is checked out: move the index/working tree too, not
                // just the ref.
                self.reset_hard_preserving_worktree(repo, &onto_rev)?;
            } else {
                run(
                    git(repo).args(["update-ref", &format!("refs/heads/{branch}"), &onto_rev]),
                    "fast-forward update-ref",
                )?;
            }
            return Ok(RebaseOutcome::FastForwarded);
        }

        let succeeded = status_of(git(repo).args(["rebase", &onto_rev, branch]))?;
        if succeeded {
            Ok(RebaseOutcome::Rebased)
        } else {
            warn!(repo = ?repo, branch, onto, "rebase conflict, aborting");
            let _ = status_of(git(repo).args(["rebase", "--abort"]));
            Ok(RebaseOutcome::Conflict)
        }
    }

    fn cherry_pick_in_progress(&self, repo: &Path) -> Result<bool, VcsError> {
        let dir = git_dir(repo)?;
        Ok(dir.join("CHERRY_PICK_HEAD").exists()
            || dir.join("REBASE_HEAD").exists()
            || dir.join("rebase-merge").exists()
            || dir.join("rebase-apply").exists())
    }

    fn project_state(&self, repo: &Path) -> Result<ProjectState, VcsError> {
        let current_branch = match run(
            git(repo).args(["symbolic-ref", "--short", "-q", "HEAD"]),
            "symbolic-ref",
        ) {
            Ok(name) => name,
            Err(_) => String::new(),
        };

        let refs_raw = run(
            git(repo).args([
                "for-each-ref",
                "--format=%(refname:short)|%(objectname)|%(upstream:short)|%(upstream:track)",
                "refs/heads/",
            ]),
            "for-each-ref",
        )?;

        let mut branches = Vec::new();
        for line in refs_raw.lines().filter(|l| !l.is_empty()) {
            let mut parts = line.splitn(4, '|');
            let name = parts.next().unwrap_or_default().to_string();
            let revision = parts.next().unwrap_or_default().to_string();
            let upstream = parts.next().unwrap_or_default();
            let tracking = if upstream.is_empty() {
                None
            } else {
                let upstream_rev = run(git(repo).args(["rev-parse", upstream]), "rev-parse upstream")
                    .unwrap_or_default();
                Some(ReferenceState {
                    name: upstream.to_string(),
                    revision: upstream_rev,
                })
            };
            branches.push(BranchState {
                is_head: name == current_branch,
                reference: ReferenceState { name, revision },
                tracking,
            });
        }

        let status_raw = run(
            git(repo).args(["status", "--porcelain=v1", "--untracked-files=all"]),
            "status",
        )?;
        let mut has_uncommitted = false;
        let mut has_untracked = false;
        for line in status_raw.lines() {
            if line.starts_with("??") {
                has_untracked = true;
            } else if !line.is_empty() {
                has_uncommitted = true;
            }
        }

        debug!(repo = ?repo, branches = branches.len(), has_uncommitted, has_untracked, "scanned project state");

        Ok(ProjectState {
            branches,
            current_branch,
            has_uncommitted,
            has_untracked,
        })
    }

    fn current_revision(&self, repo: &Path) -> Result<String, VcsError> {
        run(git(repo).args(["rev-parse", "HEAD"]), "rev-parse HEAD")
    }

    fn resolve_ref(&self, repo: &Path, reference: &str) -> Result<String, VcsError> {
        run(git(repo).args(["rev-parse", reference]), "rev-parse").map_err(|e| match e {
            VcsError::CommandFailed(_, status, stderr) => {
                VcsError::CommandFailed(format!("resolve-ref({reference})"), status, stderr)
            }
            other => other,
        })
    }

    fn read_file_at_ref(&self, repo: &Path, reference: &str, file_path: &str) -> Result<String, VcsError> {
        run(
            git(repo).arg("show").arg(format!("{reference}:{file_path}")),
            "show",
        )
    }

    fn ensure_ignored(&self, repo: &Path, entry: &str) -> Result<(), VcsError> {
        let dir = git_dir(repo)?;
        let info_dir = dir.join("info");
        fs::create_dir_all(&info_dir)?;
        let exclude_path = info_dir.join("exclude");

        let existing = fs::read_to_string(&exclude_path).unwrap_or_default();
        if existing.lines().any(|l| l.trim() == entry) {
            return Ok(());
        }

        let mut updated = existing;
        if !updated.is_empty() && !updated.ends_with('\n') {
            updated.push('\n');
        }
        updated.push_str(entry);
        updated.push('\n');
        fs::write(&exclude_path, updated)?;
        Ok(())
    }

    fn write_metadata_file(&self, repo: &Path, name: &str, content: &str) -> Result<(), VcsError> {
        let dir = git_dir(repo)?;
        fs::write(dir.join(name), content)?;
        Ok(())
    }

    fn read_metadata_file(&self, repo: &Path, name: &str) -> Result<Option<String>, VcsError> {
        let dir = git_dir(repo)?;
        match fs::read_to_string(dir.join(name)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
