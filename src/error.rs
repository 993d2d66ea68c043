use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error surface for the reconciliation engine.
#[derive(Debug, Error, Diagnostic)]
pub enum JiriError {
    #[error(transparent)]
    #[diagnostic(code(jiri::manifest))]
    Manifest(#[from] jiri_manifest::ManifestError),

    #[error("import cycle detected: {0}")]
    #[diagnostic(code(jiri::manifest_loader::import_cycle))]
    ImportCycle(String),

    #[error("failed to fetch import {import}")]
    #[diagnostic(code(jiri::manifest_loader::import_fetch))]
    ImportFetch {
        import: String,
        #[source]
        source: jiri_vcs::VcsError,
    },

    #[error("hook {hook} references unknown project {project}")]
    #[diagnostic(code(jiri::manifest_loader::invalid_hook))]
    InvalidHook { hook: String, project: String },

    #[error("projects {a} and {b} both resolve to path {path}")]
    #[diagnostic(code(jiri::manifest_loader::project_path_conflict))]
    ProjectPathConflict { path: PathBuf, a: String, b: String },

    #[error(transparent)]
    #[diagnostic(code(jiri::vcs))]
    Vcs(#[from] jiri_vcs::VcsError),

    #[error(transparent)]
    #[diagnostic(code(jiri::io))]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    #[diagnostic(code(jiri::config::parse))]
    TomlParse(#[from] toml::de::Error),

    #[error(transparent)]
    #[diagnostic(code(jiri::config::serialize))]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("hook {hook} on project {project} failed: {reason}")]
    #[diagnostic(code(jiri::hooks::failure))]
    HookFailure {
        hook: String,
        project: String,
        reason: String,
    },

    #[error("{failed} of {total} projects failed to update")]
    #[diagnostic(code(jiri::executor::partial_update))]
    PartialUpdate { failed: usize, total: usize },
}
