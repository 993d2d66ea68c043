//! Reference-file manager: writes the two sentinel files that record, per
//! project, what the engine last reconciled it to.

use std::path::Path;

use jiri_vcs::VcsPort;

use crate::error::JiriError;
use crate::paths;

/// Writes `JIRI_HEAD` (the reference the manifest pinned to) and
/// `JIRI_LAST_BASE` (the commit actually reached) into `project_path`'s VCS
/// metadata directory.
pub fn write_sentinels(
    vcs: &dyn VcsPort,
    project_path: &Path,
    target_reference: &str,
    actual_commit: &str,
) -> Result<(), JiriError> {
    vcs.write_metadata_file(project_path, paths::JIRI_HEAD_FILE, target_reference)?;
    vcs.write_metadata_file(project_path, paths::JIRI_LAST_BASE_FILE, actual_commit)?;
    Ok(())
}

/// Reads back both sentinel files, if present.
pub fn read_sentinels(vcs: &dyn VcsPort, project_path: &Path) -> Result<Option<(String, String)>, JiriError> {
    let head = vcs.read_metadata_file(project_path, paths::JIRI_HEAD_FILE)?;
    let last_base = vcs.read_metadata_file(project_path, paths::JIRI_LAST_BASE_FILE)?;
    Ok(head.zip(last_base))
}

/// Whether `JIRI_HEAD` resolves to the same commit recorded in
/// `JIRI_LAST_BASE`.
pub fn sentinels_consistent(vcs: &dyn VcsPort, project_path: &Path) -> Result<bool, JiriError> {
    match read_sentinels(vcs, project_path)? {
        Some((head_reference, last_base)) => {
            let resolved = vcs.resolve_ref(project_path, &head_reference)?;
            Ok(resolved == last_base)
        }
        None => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiri_vcs::{CloneSource, FakeVcs};
    use std::path::PathBuf;

    fn cloned_project(vcs: &FakeVcs) -> PathBuf {
        vcs.set_remote_branch("https://example.com/a", "master", "c1");
        let cache = PathBuf::from("/cache/a");
        let dest = PathBuf::from("/ws/a");
        vcs.fetch_into_cache("https://example.com/a", &cache, "master", None).unwrap();
        vcs.clone_from_cache(&cache, &dest, CloneSource::Alternates).unwrap();
        dest
    }

    #[test]
    fn write_then_read_round_trips() {
        let vcs = FakeVcs::new();
        let dest = cloned_project(&vcs);

        write_sentinels(&vcs, &dest, "origin/master", "c1").unwrap();
        let (head, base) = read_sentinels(&vcs, &dest).unwrap().unwrap();
        assert_eq!(head, "origin/master");
        assert_eq!(base, "c1");
    }

    #[test]
    fn consistent_when_head_resolves_to_last_base() {
        let vcs = FakeVcs::new();
        let dest = cloned_project(&vcs);

        write_sentinels(&vcs, &dest, "master", "c1").unwrap();
        assert!(sentinels_consistent(&vcs, &dest).unwrap());
    }

    #[test]
    fn inconsistent_when_head_resolves_elsewhere() {
        let vcs = FakeVcs::new();
        let dest = cloned_project(&vcs);

        write_sentinels(&vcs, &dest, "master", "stale-commit").unwrap();
        assert!(!sentinels_consistent(&vcs, &dest).unwrap());
    }

    #[test]
    fn missing_sentinels_are_not_consistent() {
        let vcs = FakeVcs::new();
        let dest = cloned_project(&vcs);
        assert!(!sentinels_consistent(&vcs, &dest).unwrap());
    }
}
