//! Version-control abstraction used by the engine to manipulate per-project
//! working trees and their shared caches.
//!
//! [`GitVcs`] is the production implementation (bare-mirror caches via
//! `gix`, working-tree porcelain via the `git` CLI); [`fake::FakeVcs`] is an
//! in-memory double the rest of the workspace tests against.

pub mod error;
pub mod fake;
pub mod gix_cache;
pub mod port;
pub mod process_git;
pub mod types;

pub use error::VcsError;
pub use fake::FakeVcs;
pub use port::VcsPort;
pub use process_git::GitVcs;
pub use types::{BranchState, CheckoutTarget, CloneSource, ProjectState, RebaseOutcome, ReferenceState, RepoPath};
