use std::path::PathBuf;

use clap::Args;
use jiri_vcs::GitVcs;
use tracing::info;

use crate::config::Config;
use crate::engine;
use crate::error::JiriError;
use crate::scanner::ScanMode;

/// Reconcile the workspace's local projects against its consolidated
/// manifest.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Workspace root to synchronize. Defaults to the current directory.
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Skip the snapshot fast path and walk the whole workspace tree.
    #[arg(long)]
    pub full_scan: bool,
}

pub fn run_sync(args: SyncArgs) -> Result<(), JiriError> {
    let root = args.root.unwrap_or_else(|| PathBuf::from("."));
    let config = Config::load(&root)?;
    let vcs = GitVcs::default();
    let mode = if args.full_scan { ScanMode::Full } else { ScanMode::Fast };

    let report = engine::update(&root, &vcs, &config, mode)?;
    info!(projects = report.outcomes.len(), snapshot = %report.snapshot_path.display(), "sync complete");
    Ok(())
}
