pub mod init;
pub mod sync;

use self::{init::InitArgs, sync::SyncArgs};
use clap::Subcommand;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Initialize a workspace against a root manifest
    Init(InitArgs),

    /// Reconcile the workspace against its consolidated manifest
    Sync(SyncArgs),
}
