use std::path::PathBuf;

/// A named reference and the commit it currently resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceState {
    pub name: String,
    pub revision: String,
}

/// A local branch, plus the remote-tracking reference it follows (if any).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchState {
    pub reference: ReferenceState,
    pub tracking: Option<ReferenceState>,
    pub is_head: bool,
}

/// The full state of a project's working tree, as reported by the VCS port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectState {
    pub branches: Vec<BranchState>,
    /// Empty when HEAD is detached.
    pub current_branch: String,
    pub has_uncommitted: bool,
    pub has_untracked: bool,
}

impl ProjectState {
    pub fn is_detached(&self) -> bool {
        self.current_branch.is_empty()
    }

    pub fn is_clean(&self) -> bool {
        !self.has_uncommitted && !self.has_untracked
    }

    pub fn branch(&self, name: &str) -> Option<&BranchState> {
        self.branches.iter().find(|b| b.reference.name == name)
    }
}

/// What a checkout should leave the working tree pointed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutTarget {
    Branch(String),
    Detached(String),
}

/// Outcome of attempting to bring a branch up to date with its tracking ref.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebaseOutcome {
    /// The branch already pointed at `onto`.
    UpToDate,
    /// The branch was fast-forwarded without rewriting any commits.
    FastForwarded,
    /// The branch's commits were replayed on top of `onto`.
    Rebased,
    /// The rebase hit a conflict and was aborted; the branch is unchanged.
    Conflict,
}

/// Where a clone's objects come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloneSource {
    /// Link to the cache's object store via an alternates file; the cache
    /// must outlive this working tree.
    Alternates,
    /// A full, independent copy of the objects (required for shallow
    /// projects, or when independent clones were requested).
    Full,
}

pub type RepoPath = PathBuf;
