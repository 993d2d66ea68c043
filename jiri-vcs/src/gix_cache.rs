//! Bare-mirror cache management, backed by `gix`.
//!
//! The cache holds one append-only bare-mirror repository per unique remote
//! URL; working trees are cloned or linked from it via [`crate::process_git`]
//! and plain `git`. `gix` is used only for the cache's own clone/fetch
//! bootstrap, mirroring how the teacher repository uses it in its `init`
//! command.

use std::path::Path;

use tracing::info;

use crate::error::VcsError;

/// Clones `remote_url` as a bare mirror into `cache_path`, if it does not
/// already exist there.
pub fn ensure_cache(remote_url: &str, cache_path: &Path) -> Result<(), VcsError> {
    if cache_path.join("HEAD").is_file() {
        return Ok(());
    }

    std::fs::create_dir_all(cache_path)?;
    gix::interrupt::init_handler(|| {}).ok();

    let url = gix::url::parse(remote_url.into())?;
    info!(remote = remote_url, path = ?cache_path, "cloning bare mirror into cache");

    let mut prepare = gix::prepare_clone_bare(url, cache_path)?;
    prepare.fetch_only(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)?;

    Ok(())
}
