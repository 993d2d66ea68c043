use std::path::Path;

use crate::error::VcsError;
use crate::types::{CheckoutTarget, CloneSource, ProjectState, RebaseOutcome};

/// Abstract capability interface to a distributed version-control system.
///
/// All filesystem mutation on project repositories flows through this
/// trait. Implementations must be substitutable: the engine's own test
/// suite runs exclusively against [`crate::fake::FakeVcs`].
pub trait VcsPort: Send + Sync {
    /// Creates (or reuses) the append-only cache repository for `remote_url`
    /// at `cache_path` and fetches `branch` (and `revision`, if given) into
    /// it. No working tree is materialized.
    ///
    /// Callers are responsible for serializing calls to this method per
    /// `cache_path` (single-writer discipline); implementations may assume
    /// they are never called concurrently for the same cache path.
    fn fetch_into_cache(
        &self,
        remote_url: &str,
        cache_path: &Path,
        branch: &str,
        revision: Option<&str>,
    ) -> Result<(), VcsError>;

    /// Materializes a working tree at `dest` from the cache at
    /// `cache_path`, either by linking objects via alternates or by copying
    /// them fully.
    fn clone_from_cache(
        &self,
        cache_path: &Path,
        dest: &Path,
        source: CloneSource,
    ) -> Result<(), VcsError>;

    /// Moves a working tree (and its VCS metadata) from `from` to `to`.
    /// `to`'s parent must exist; `to` itself must not exist or must be
    /// empty.
    fn move_repository(&self, from: &Path, to: &Path) -> Result<(), VcsError>;

    /// Fetches remote updates for an existing working tree, through the
    /// cache, without altering the working tree itself.
    fn fetch_updates(&self, repo: &Path, branch: &str) -> Result<(), VcsError>;

    /// Checks the working tree out to `target`, preserving any uncommitted
    /// or untracked files (no destructive clean).
    fn checkout(&self, repo: &Path, target: &CheckoutTarget) -> Result<(), VcsError>;

    /// Resets the current branch (or detached HEAD) hard to `commit`,
    /// preserving uncommitted and untracked files.
    fn reset_hard_preserving_worktree(&self, repo: &Path, commit: &str) -> Result<(), VcsError>;

    /// Rebases `branch` onto `onto`. Returns [`RebaseOutcome::Conflict`]
    /// (and aborts, leaving `branch` unchanged) rather than erroring, since a
    /// conflict is an expected, non-fatal per-project outcome.
    fn rebase_onto(&self, repo: &Path, branch: &str, onto: &str) -> Result<RebaseOutcome, VcsError>;

    /// A cherry-pick or rebase is currently in progress in this repository.
    fn cherry_pick_in_progress(&self, repo: &Path) -> Result<bool, VcsError>;

    /// Full branch/tracking/dirty/untracked snapshot of a working tree.
    fn project_state(&self, repo: &Path) -> Result<ProjectState, VcsError>;

    /// The commit HEAD currently resolves to.
    fn current_revision(&self, repo: &Path) -> Result<String, VcsError>;

    /// Resolves an arbitrary reference (branch, tag, or revision) to a
    /// commit hash.
    fn resolve_ref(&self, repo: &Path, reference: &str) -> Result<String, VcsError>;

    /// Reads a single file's content as it exists at `reference`, without
    /// materializing a working tree. Used to read a manifest file straight
    /// out of a remote import's cache repository.
    fn read_file_at_ref(&self, repo: &Path, reference: &str, file_path: &str) -> Result<String, VcsError>;

    /// Idempotently ensures `entry` is present in the repository's ignore
    /// file (`info/exclude` for git).
    fn ensure_ignored(&self, repo: &Path, entry: &str) -> Result<(), VcsError>;

    /// Writes `content` to a file inside the repository's VCS metadata
    /// directory (used for the `JIRI_HEAD`/`JIRI_LAST_BASE` sentinel files
    /// and the local-config descriptor).
    fn write_metadata_file(&self, repo: &Path, name: &str, content: &str) -> Result<(), VcsError>;

    /// Reads a file from the repository's VCS metadata directory, if
    /// present.
    fn read_metadata_file(&self, repo: &Path, name: &str) -> Result<Option<String>, VcsError>;
}
