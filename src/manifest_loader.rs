//! Transitive manifest resolution: follows file-local and remote imports,
//! detects cycles via an explicit frame-stack, and merges projects and hooks
//! last-wins into a single consolidated result.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use jiri_manifest::{Hook, Manifest, ProjectKey, ResolvedProject, DEFAULT_REMOTE_BRANCH};
use jiri_vcs::VcsPort;

use crate::error::JiriError;
use crate::paths;

/// The consolidated result of resolving a root manifest and all of its
/// imports.
#[derive(Debug, Clone, Default)]
pub struct LoadedManifest {
    pub projects: BTreeMap<ProjectKey, ResolvedProject>,
    pub hooks: Vec<Hook>,
}

/// The identity of a manifest currently being resolved, used both to read
/// its text and to detect import cycles (two equal locations on the active
/// resolution stack simultaneously is a cycle).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ManifestLocation {
    /// A manifest file on the local filesystem, identified by absolute path.
    Local(PathBuf),
    /// A manifest file inside a fetched remote, identified by the remote
    /// URL, the branch it was fetched at, and its repo-relative path.
    Remote {
        remote: String,
        reference: String,
        manifest_path: String,
        cache_path: PathBuf,
    },
}

impl ManifestLocation {
    fn display(&self) -> String {
        match self {
            Self::Local(path) => path.display().to_string(),
            Self::Remote {
                remote,
                reference,
                manifest_path,
                ..
            } => format!("{remote}@{reference}:{manifest_path}"),
        }
    }

    /// The location of a manifest named `file`, included by this one.
    fn sibling(&self, file: &str) -> Self {
        match self {
            Self::Local(path) => {
                let dir = path.parent().unwrap_or_else(|| Path::new(""));
                Self::Local(dir.join(file))
            }
            Self::Remote {
                remote,
                reference,
                manifest_path,
                cache_path,
            } => {
                let dir = Path::new(manifest_path).parent().unwrap_or_else(|| Path::new(""));
                let joined = dir.join(file);
                Self::Remote {
                    remote: remote.clone(),
                    reference: reference.clone(),
                    manifest_path: joined.to_string_lossy().replace('\\', "/"),
                    cache_path: cache_path.clone(),
                }
            }
        }
    }
}

#[derive(Debug, Default)]
struct LoadState {
    stack: HashSet<ManifestLocation>,
    chain: Vec<ManifestLocation>,
    projects: BTreeMap<ProjectKey, ResolvedProject>,
    hooks: HashMap<(String, String), Hook>,
}

/// Resolves a root manifest and its transitive imports into a
/// [`LoadedManifest`].
pub struct ManifestLoader<'a> {
    vcs: &'a dyn VcsPort,
    cache_root: PathBuf,
    workspace_root: PathBuf,
}

impl<'a> ManifestLoader<'a> {
    pub fn new(vcs: &'a dyn VcsPort, cache_root: PathBuf, workspace_root: PathBuf) -> Self {
        Self {
            vcs,
            cache_root,
            workspace_root,
        }
    }

    /// Loads and fully resolves `root_manifest_path`.
    pub fn load(&self, root_manifest_path: &Path) -> Result<LoadedManifest, JiriError> {
        let mut state = LoadState::default();
        let root = ManifestLocation::Local(root_manifest_path.to_path_buf());
        self.resolve(root, PathBuf::new(), &mut state)?;

        for (project_name, hook) in state.hooks.values().map(|h| (h.project.clone(), h)) {
            if !state.projects.keys().any(|k| k.name == project_name) {
                return Err(JiriError::InvalidHook {
                    hook: hook.name.clone(),
                    project: project_name,
                });
            }
        }

        let mut by_path: HashMap<PathBuf, String> = HashMap::new();
        for project in state.projects.values() {
            if let Some(existing) = by_path.insert(project.path.clone(), project.name.clone()) {
                if existing != project.name {
                    return Err(JiriError::ProjectPathConflict {
                        path: project.path.clone(),
                        a: existing,
                        b: project.name.clone(),
                    });
                }
            }
        }

        Ok(LoadedManifest {
            projects: state.projects,
            hooks: state.hooks.into_values().collect(),
        })
    }

    fn resolve(
        &self,
        location: ManifestLocation,
        root_prefix: PathBuf,
        state: &mut LoadState,
    ) -> Result<(), JiriError> {
        if !state.stack.insert(location.clone()) {
            state.chain.push(location.clone());
            let cycle = state
                .chain
                .iter()
                .map(ManifestLocation::display)
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(JiriError::ImportCycle(cycle));
        }
        state.chain.push(location.clone());

        let text = self.read_text(&location)?;
        let manifest = Manifest::from_xml_str(&text)?;

        for local_import in &manifest.local_imports {
            let nested = location.sibling(&local_import.file);
            self.resolve(nested, root_prefix.clone(), state)?;
        }

        for import in &manifest.imports {
            let branch = import
                .remote_branch
                .clone()
                .unwrap_or_else(|| DEFAULT_REMOTE_BRANCH.to_string());
            let cache_path = paths::cache_path_for(&self.cache_root, &import.remote);
            self.vcs
                .fetch_into_cache(&import.remote, &cache_path, &branch, None)
                .map_err(|source| JiriError::ImportFetch {
                    import: import.name.clone(),
                    source,
                })?;

            let nested_prefix = match &import.root {
                Some(root) => root_prefix.join(root),
                None => root_prefix.clone(),
            };
            let nested = ManifestLocation::Remote {
                remote: import.remote.clone(),
                reference: branch,
                manifest_path: import.manifest.clone(),
                cache_path,
            };
            self.resolve(nested, nested_prefix, state)?;
        }

        for project in &manifest.projects {
            let mut project = project.clone();
            project.path = root_prefix.join(&project.path).to_string_lossy().into_owned();
            let resolved = project.resolve(&self.workspace_root);
            state.projects.insert(resolved.key(), resolved);
        }

        for hook in &manifest.hooks {
            state.hooks.insert(hook.key(), hook.clone());
        }

        state.chain.pop();
        state.stack.remove(&location);
        Ok(())
    }

    fn read_text(&self, location: &ManifestLocation) -> Result<String, JiriError> {
        match location {
            ManifestLocation::Local(path) => Ok(fs::read_to_string(path)?),
            ManifestLocation::Remote {
                reference,
                manifest_path,
                cache_path,
                ..
            } => Ok(self.vcs.read_file_at_ref(cache_path, reference, manifest_path)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiri_vcs::FakeVcs;
    use std::fs;
    use tempfile::tempdir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn loads_projects_and_hooks_from_a_single_manifest() {
        let dir = tempdir().unwrap();
        let root = write(
            dir.path(),
            "root.xml",
            r#"<manifest>
  <project name="a" path="a" remote="https://example.com/a"/>
  <hook name="gen" action="scripts/gen.sh" project="a"/>
</manifest>"#,
        );

        let vcs = FakeVcs::new();
        let loader = ManifestLoader::new(&vcs, dir.path().join("cache"), dir.path().to_path_buf());
        let loaded = loader.load(&root).unwrap();

        assert_eq!(loaded.projects.len(), 1);
        assert_eq!(loaded.hooks.len(), 1);
    }

    #[test]
    fn local_import_is_resolved_relative_to_including_manifest() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        write(
            &dir.path().join("sub"),
            "included.xml",
            r#"<manifest><project name="b" path="b" remote="https://example.com/b"/></manifest>"#,
        );
        let root = write(
            dir.path(),
            "root.xml",
            r#"<manifest><localimport file="sub/included.xml"/></manifest>"#,
        );

        let vcs = FakeVcs::new();
        let loader = ManifestLoader::new(&vcs, dir.path().join("cache"), dir.path().to_path_buf());
        let loaded = loader.load(&root).unwrap();

        assert_eq!(loaded.projects.len(), 1);
        assert!(loaded.projects.values().any(|p| p.name == "b"));
    }

    #[test]
    fn later_import_overwrites_earlier_for_same_project_key() {
        let dir = tempdir().unwrap();
        write(
            dir.path(),
            "base.xml",
            r#"<manifest><project name="a" path="a-old" remote="https://example.com/a"/></manifest>"#,
        );
        let root = write(
            dir.path(),
            "root.xml",
            r#"<manifest>
  <localimport file="base.xml"/>
  <project name="a" path="a-new" remote="https://example.com/a"/>
</manifest>"#,
        );

        let vcs = FakeVcs::new();
        let loader = ManifestLoader::new(&vcs, dir.path().join("cache"), dir.path().to_path_buf());
        let loaded = loader.load(&root).unwrap();

        assert_eq!(loaded.projects.len(), 1);
        let project = loaded
            .projects
            .values()
            .find(|p| p.name == "a")
            .expect("project a present");
        assert_eq!(project.path, dir.path().join("a-new"));
    }

    #[test]
    fn direct_local_cycle_is_rejected() {
        let dir = tempdir().unwrap();
        write(
            dir.path(),
            "a.xml",
            r#"<manifest><localimport file="b.xml"/></manifest>"#,
        );
        let root = write(
            dir.path(),
            "b.xml",
            r#"<manifest><localimport file="a.xml"/></manifest>"#,
        );

        let vcs = FakeVcs::new();
        let loader = ManifestLoader::new(&vcs, dir.path().join("cache"), dir.path().to_path_buf());
        let err = loader.load(&root).unwrap_err();
        assert!(matches!(err, JiriError::ImportCycle(_)));
    }

    #[test]
    fn mixed_remote_and_local_cycle_is_rejected() {
        // root -> remote1/A -> remote2/B -> local C -> remote1/D -> local A (cycle back to A)
        let dir = tempdir().unwrap();
        let vcs = FakeVcs::new();

        vcs.set_remote_branch("remote1", "master", "r1c1");
        vcs.set_remote_branch("remote2", "master", "r2c1");

        vcs.set_remote_file(
            "remote1",
            "r1c1",
            "A.xml",
            r#"<manifest><import manifest="B.xml" name="b" remote="remote2"/></manifest>"#,
        );
        vcs.set_remote_file(
            "remote2",
            "r2c1",
            "B.xml",
            r#"<manifest><localimport file="C.xml"/></manifest>"#,
        );
        vcs.set_remote_file(
            "remote2",
            "r2c1",
            "C.xml",
            r#"<manifest><import manifest="D.xml" name="d" remote="remote1"/></manifest>"#,
        );
        vcs.set_remote_file(
            "remote1",
            "r1c1",
            "D.xml",
            r#"<manifest><localimport file="A.xml"/></manifest>"#,
        );

        let root = write(
            dir.path(),
            "root.xml",
            r#"<manifest><import manifest="A.xml" name="a" remote="remote1"/></manifest>"#,
        );

        let loader = ManifestLoader::new(&vcs, dir.path().join("cache"), dir.path().to_path_buf());
        let err = loader.load(&root).unwrap_err();
        assert!(matches!(err, JiriError::ImportCycle(_)));
    }

    #[test]
    fn hook_referencing_missing_project_is_rejected() {
        let dir = tempdir().unwrap();
        let root = write(
            dir.path(),
            "root.xml",
            r#"<manifest><hook name="gen" action="scripts/gen.sh" project="missing"/></manifest>"#,
        );

        let vcs = FakeVcs::new();
        let loader = ManifestLoader::new(&vcs, dir.path().join("cache"), dir.path().to_path_buf());
        let err = loader.load(&root).unwrap_err();
        assert!(matches!(err, JiriError::InvalidHook { .. }));
    }

    #[test]
    fn conflicting_paths_for_distinct_projects_are_rejected() {
        let dir = tempdir().unwrap();
        let root = write(
            dir.path(),
            "root.xml",
            r#"<manifest>
  <project name="a" path="shared" remote="https://example.com/a"/>
  <project name="b" path="shared" remote="https://example.com/b"/>
</manifest>"#,
        );

        let vcs = FakeVcs::new();
        let loader = ManifestLoader::new(&vcs, dir.path().join("cache"), dir.path().to_path_buf());
        let err = loader.load(&root).unwrap_err();
        assert!(matches!(err, JiriError::ProjectPathConflict { .. }));
    }

    #[test]
    fn load_is_idempotent_through_a_round_trip() {
        let dir = tempdir().unwrap();
        let root = write(
            dir.path(),
            "root.xml",
            r#"<manifest><project name="a" path="a" remote="https://example.com/a" remote-branch="master" revision="HEAD"/></manifest>"#,
        );

        let vcs = FakeVcs::new();
        let loader = ManifestLoader::new(&vcs, dir.path().join("cache"), dir.path().to_path_buf());
        let first = loader.load(&root).unwrap();

        let rewritten = Manifest::from_xml_str(&fs::read_to_string(&root).unwrap())
            .unwrap()
            .to_xml_string()
            .unwrap();
        let root2 = write(dir.path(), "root2.xml", &rewritten);
        let second = loader.load(&root2).unwrap();

        assert_eq!(first.projects, second.projects);
    }
}
