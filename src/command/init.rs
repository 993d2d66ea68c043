use std::fs;
use std::path::PathBuf;

use clap::Args;
use jiri_manifest::{Import, Manifest};
use tracing::info;

use crate::config::Config;
use crate::error::JiriError;
use crate::paths;

/// Initialize a workspace in the current (or given) directory against a
/// remote-hosted root manifest.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Git URL hosting the root manifest.
    pub manifest_url: String,

    /// Path to the manifest file, relative to the root of `manifest_url`.
    #[arg(short = 'm', long, default_value = "manifest.xml")]
    pub manifest_file: String,

    /// Branch of `manifest_url` to track. Defaults to the workspace-standard
    /// default branch.
    #[arg(short = 'b', long)]
    pub manifest_branch: Option<String>,

    /// Workspace root to initialize. Defaults to the current directory.
    #[arg(long)]
    pub root: Option<PathBuf>,
}

pub fn run_init(args: InitArgs) -> Result<(), JiriError> {
    let root = args.root.unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&root)?;

    let manifest = Manifest {
        imports: vec![Import {
            manifest: args.manifest_file,
            name: "manifest".to_string(),
            remote: args.manifest_url,
            remote_branch: args.manifest_branch,
            root: None,
        }],
        ..Manifest::default()
    };

    let path = root.join(paths::ROOT_MANIFEST_FILE);
    fs::write(&path, manifest.to_xml_string()?)?;
    info!(path = %path.display(), "wrote root manifest");

    Config::default().save(&root)?;
    Ok(())
}
