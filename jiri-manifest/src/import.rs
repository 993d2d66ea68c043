use serde::{Deserialize, Serialize};

/// A remote-repository-hosted manifest import.
///
/// Causes a nested manifest load: the named remote is fetched (or reused from
/// the cache) at `remote_branch`, and the manifest file at `manifest` inside
/// it is read and recursively resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Import {
    /// Path to the manifest file, relative to the root of the imported repo.
    #[serde(rename = "@manifest")]
    pub manifest: String,

    /// A short name for this import, used only for diagnostics.
    #[serde(rename = "@name")]
    pub name: String,

    /// Git URL of the repository hosting the imported manifest.
    #[serde(rename = "@remote")]
    pub remote: String,

    /// Branch of `remote` to fetch. Defaults to the workspace-standard
    /// default branch when absent.
    #[serde(rename = "@manifest-branch", skip_serializing_if = "Option::is_none")]
    pub remote_branch: Option<String>,

    /// Path prefix prepended to every project imported transitively through
    /// this import.
    #[serde(rename = "@root", skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
}

/// A same-checkout, file-local manifest import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalImport {
    /// Path to the manifest file, relative to the including manifest.
    #[serde(rename = "@file")]
    pub file: String,
}
