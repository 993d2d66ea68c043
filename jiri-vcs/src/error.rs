use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Errors surfaced by a [`crate::VcsPort`] implementation.
#[derive(Debug, Error)]
pub enum VcsError {
    #[error("git {0} exited with {1}: {2}")]
    CommandFailed(String, ExitStatus, String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    GixUrlParse(#[from] gix::url::parse::Error),

    #[error(transparent)]
    GixClone(#[from] gix::clone::Error),

    #[error(transparent)]
    GixFetch(#[from] gix::clone::fetch::Error),

    #[error(transparent)]
    GixCheckout(#[from] gix::clone::checkout::main_worktree::Error),

    #[error(transparent)]
    GixOpen(#[from] gix::open::Error),

    #[error(transparent)]
    GixRemoteFind(#[from] gix::remote::find::existing::Error),

    #[error("rebase of {branch} onto {onto} hit a conflict in {repo}")]
    RebaseConflict {
        repo: PathBuf,
        branch: String,
        onto: String,
    },

    #[error("no such project repository at {0}")]
    UnknownRepository(PathBuf),

    #[error("move destination {0} already exists and is not empty")]
    DestinationNotEmpty(PathBuf),

    #[error("no such remote {0}")]
    UnknownRemote(String),

    #[error("reference {0} does not exist in {1}")]
    UnknownReference(String, PathBuf),
}
