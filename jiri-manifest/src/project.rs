use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Name of the remote-tracking branch used whenever a project (or an
/// import) does not specify one of its own.
pub const DEFAULT_REMOTE_BRANCH: &str = "master";

/// The literal revision spelling that means "track the remote branch tip" --
/// equivalent to the attribute being absent entirely. Dropped on write.
pub const HEAD_REVISION: &str = "HEAD";

/// A `<project>` element exactly as it appears in a manifest file.
///
/// See [`ResolvedProject`] for the entity used once defaults have been
/// applied and the path made absolute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSpec {
    /// Unique project name. Together with `remote` this forms the project's
    /// [`ProjectKey`].
    #[serde(rename = "@name")]
    pub name: String,

    /// Path, relative to the workspace root, where the working tree should
    /// live.
    #[serde(rename = "@path")]
    pub path: String,

    /// Git URL this project is cloned from.
    #[serde(rename = "@remote")]
    pub remote: String,

    /// Branch of `remote` this project tracks. Absence means
    /// [`DEFAULT_REMOTE_BRANCH`].
    #[serde(rename = "@remote-branch", skip_serializing_if = "Option::is_none")]
    pub remote_branch: Option<String>,

    /// Pinned revision. Absence (or the literal `HEAD`) means "track the tip
    /// of `remote_branch`".
    #[serde(rename = "@revision", skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,

    /// Hostname of the Gerrit server this project uploads reviews to.
    #[serde(rename = "@gerrit-host", skip_serializing_if = "Option::is_none")]
    pub gerrit_host: Option<String>,

    /// Path, relative to the project, of a directory containing git hooks to
    /// install into the project's `.git/hooks`.
    #[serde(rename = "@git-hooks", skip_serializing_if = "Option::is_none")]
    pub git_hooks: Option<String>,

    /// When present and nonzero, this project is fetched shallow to this
    /// depth rather than cloned with full history.
    #[serde(rename = "@historydepth", skip_serializing_if = "Option::is_none")]
    pub history_depth: Option<u32>,
}

impl ProjectSpec {
    /// Normalizes a just-parsed project so that default-equivalent spellings
    /// ("master", "HEAD") collapse to `None`, matching the representation
    /// produced when the attribute is simply absent. This is what makes
    /// parse -> serialize -> parse idempotent.
    pub fn normalize_defaults(&mut self) {
        if self.remote_branch.as_deref() == Some(DEFAULT_REMOTE_BRANCH) {
            self.remote_branch = None;
        }
        if self.revision.as_deref() == Some(HEAD_REVISION) {
            self.revision = None;
        }
    }

    /// Resolves this element against a workspace root, applying defaults and
    /// making `path` absolute.
    pub fn resolve(&self, workspace_root: &Path) -> ResolvedProject {
        ResolvedProject {
            name: self.name.clone(),
            path: workspace_root.join(&self.path),
            remote: self.remote.clone(),
            remote_branch: self
                .remote_branch
                .clone()
                .unwrap_or_else(|| DEFAULT_REMOTE_BRANCH.to_string()),
            revision: self
                .revision
                .clone()
                .filter(|r| r != HEAD_REVISION),
            gerrit_host: self.gerrit_host.clone(),
            git_hooks: self.git_hooks.clone(),
            history_depth: self.history_depth.filter(|d| *d != 0),
        }
    }
}

/// The canonical identity of a project: stable across path or name-prefix
/// rewrites as long as (name, remote) do not change.
///
/// Ordered so that iteration over a `BTreeMap<ProjectKey, _>` is
/// deterministic across runs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProjectKey {
    pub name: String,
    pub remote: String,
}

impl ProjectKey {
    pub fn new(name: impl Into<String>, remote: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            remote: remote.into(),
        }
    }
}

/// A project after default application and path resolution: the entity the
/// scanner, planner, and executor actually operate on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedProject {
    pub name: String,
    pub path: PathBuf,
    pub remote: String,
    pub remote_branch: String,
    pub revision: Option<String>,
    pub gerrit_host: Option<String>,
    pub git_hooks: Option<String>,
    pub history_depth: Option<u32>,
}

impl ResolvedProject {
    pub fn key(&self) -> ProjectKey {
        ProjectKey::new(self.name.clone(), self.remote.clone())
    }

    /// Whether this project is shallow-fetched rather than fully cloned.
    pub fn is_shallow(&self) -> bool {
        self.history_depth.is_some()
    }
}
