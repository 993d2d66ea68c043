//! Filesystem layout constants and path helpers for the workspace's
//! engine-metadata directory and per-remote cache.

use std::path::{Path, PathBuf};

/// The root manifest file, directly under the workspace root.
pub const ROOT_MANIFEST_FILE: &str = ".jiri_manifest";

/// Engine metadata directory, directly under the workspace root. This is
/// the name added to every project's VCS ignore file.
pub const ENGINE_META_DIR: &str = ".jiri_root";

/// Cache directory name, under the engine metadata directory.
pub const CACHE_DIR_NAME: &str = "cache";

/// Update-history directory name, under the engine metadata directory.
pub const UPDATE_HISTORY_DIR_NAME: &str = "update_history";

/// The "latest" pointer file name, under the update-history directory.
pub const LATEST_POINTER_NAME: &str = "latest";

/// Config file name, under the engine metadata directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Sentinel file naming the reference the manifest pinned a project to.
pub const JIRI_HEAD_FILE: &str = "JIRI_HEAD";

/// Sentinel file naming the actual commit a project's working tree was left at.
pub const JIRI_LAST_BASE_FILE: &str = "JIRI_LAST_BASE";

/// Local-config descriptor file name, inside a project's VCS metadata
/// directory.
pub const LOCAL_CONFIG_FILE: &str = "jiri_local_config.toml";

/// Project identity descriptor file name, inside a project's VCS metadata
/// directory; lets the scanner recover a project's name/remote from disk
/// alone.
pub const PROJECT_DESCRIPTOR_FILE: &str = "jiri_project_descriptor.toml";

/// Engine metadata directory for a given workspace root.
pub fn engine_meta_dir(workspace_root: &Path) -> PathBuf {
    workspace_root.join(ENGINE_META_DIR)
}

/// Cache root for a given workspace root.
pub fn cache_root(workspace_root: &Path) -> PathBuf {
    engine_meta_dir(workspace_root).join(CACHE_DIR_NAME)
}

/// Update-history directory for a given workspace root.
pub fn update_history_dir(workspace_root: &Path) -> PathBuf {
    engine_meta_dir(workspace_root).join(UPDATE_HISTORY_DIR_NAME)
}

/// Per-remote cache path: one mirror repository per unique remote URL,
/// named by a filesystem-safe slug of the URL.
pub fn cache_path_for(cache_root: &Path, remote_url: &str) -> PathBuf {
    cache_root.join(slugify(remote_url))
}

fn slugify(remote_url: &str) -> String {
    remote_url
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_is_filesystem_safe() {
        let slug = slugify("https://example.com/foo/bar.git");
        assert!(slug.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
    }

    #[test]
    fn cache_path_is_stable_for_same_remote() {
        let root = Path::new("/cache");
        assert_eq!(
            cache_path_for(root, "https://example.com/a"),
            cache_path_for(root, "https://example.com/a")
        );
        assert_ne!(
            cache_path_for(root, "https://example.com/a"),
            cache_path_for(root, "https://example.com/b")
        );
    }
}
