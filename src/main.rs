use clap::Parser;
use miette::Result;

use jiri::command::{init::run_init, sync::run_sync, Command};

/// Reconciles a workspace of git repositories against a multi-project
/// manifest.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    match args.command {
        Command::Init(args) => run_init(args)?,
        Command::Sync(args) => run_sync(args)?,
    }

    Ok(())
}
