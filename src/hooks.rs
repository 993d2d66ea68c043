//! Post-update hook runner. Hooks execute after every project reaches its
//! reconciled state, in manifest declaration order; the first failure or
//! timeout aborts the remaining hooks.

use std::collections::BTreeMap;
use std::process::{Command, Stdio};
use std::time::Duration;

use jiri_manifest::{Hook, ProjectKey, ResolvedProject};
use tracing::{info, info_span, warn};
use wait_timeout::ChildExt;

use crate::error::JiriError;

/// Runs every hook in `hooks` against the now-reconciled `projects`, in
/// order, stopping at the first failure.
pub fn run_hooks(
    hooks: &[Hook],
    projects: &BTreeMap<ProjectKey, ResolvedProject>,
    default_timeout: Duration,
) -> Result<(), JiriError> {
    for hook in hooks {
        run_one(hook, projects, default_timeout)?;
    }
    Ok(())
}

fn run_one(
    hook: &Hook,
    projects: &BTreeMap<ProjectKey, ResolvedProject>,
    timeout: Duration,
) -> Result<(), JiriError> {
    let project = projects
        .values()
        .find(|p| p.name == hook.project)
        .ok_or_else(|| JiriError::InvalidHook {
            hook: hook.name.clone(),
            project: hook.project.clone(),
        })?;

    let _span = info_span!("hook", name = %hook.name, project = %project.name).entered();
    let script = project.path.join(&hook.action);
    info!(script = %script.display(), "running hook");

    let mut child = Command::new(&script)
        .current_dir(&project.path)
        .stdin(Stdio::null())
        .spawn()
        .map_err(|e| JiriError::HookFailure {
            hook: hook.name.clone(),
            project: project.name.clone(),
            reason: e.to_string(),
        })?;

    let outcome = child.wait_timeout(timeout).map_err(|e| JiriError::HookFailure {
        hook: hook.name.clone(),
        project: project.name.clone(),
        reason: e.to_string(),
    })?;

    match outcome {
        Some(status) if status.success() => Ok(()),
        Some(status) => Err(JiriError::HookFailure {
            hook: hook.name.clone(),
            project: project.name.clone(),
            reason: format!("exited with {status}"),
        }),
        None => {
            warn!("hook timed out, killing");
            let _ = child.kill();
            let _ = child.wait();
            Err(JiriError::HookFailure {
                hook: hook.name.clone(),
                project: project.name.clone(),
                reason: format!("timed out after {timeout:?}"),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn write_script(dir: &std::path::Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        }
        path
    }

    fn project(name: &str, path: PathBuf) -> ResolvedProject {
        ResolvedProject {
            name: name.to_string(),
            path,
            remote: format!("https://example.com/{name}"),
            remote_branch: "master".to_string(),
            revision: None,
            gerrit_host: None,
            git_hooks: None,
            history_depth: None,
        }
    }

    #[test]
    #[cfg(unix)]
    fn successful_hook_runs_to_completion() {
        let dir = tempdir().unwrap();
        write_script(dir.path(), "ok.sh", "#!/bin/sh\nexit 0\n");

        let p = project("a", dir.path().to_path_buf());
        let mut projects = BTreeMap::new();
        projects.insert(p.key(), p);

        let hook = Hook {
            name: "post-sync".to_string(),
            action: "ok.sh".to_string(),
            project: "a".to_string(),
        };

        run_hooks(&[hook], &projects, Duration::from_secs(5)).unwrap();
    }

    #[test]
    #[cfg(unix)]
    fn failing_hook_is_reported() {
        let dir = tempdir().unwrap();
        write_script(dir.path(), "fail.sh", "#!/bin/sh\nexit 1\n");

        let p = project("a", dir.path().to_path_buf());
        let mut projects = BTreeMap::new();
        projects.insert(p.key(), p);

        let hook = Hook {
            name: "post-sync".to_string(),
            action: "fail.sh".to_string(),
            project: "a".to_string(),
        };

        let err = run_hooks(&[hook], &projects, Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, JiriError::HookFailure { .. }));
    }

    #[test]
    #[cfg(unix)]
    fn timed_out_hook_is_killed_and_reported() {
        let dir = tempdir().unwrap();
        write_script(dir.path(), "slow.sh", "#!/bin/sh\nsleep 5\n");

        let p = project("a", dir.path().to_path_buf());
        let mut projects = BTreeMap::new();
        projects.insert(p.key(), p);

        let hook = Hook {
            name: "post-sync".to_string(),
            action: "slow.sh".to_string(),
            project: "a".to_string(),
        };

        let err = run_hooks(&[hook], &projects, Duration::from_millis(50)).unwrap_err();
        assert!(matches!(err, JiriError::HookFailure { .. }));
    }

    #[test]
    fn hook_referencing_unknown_project_is_rejected() {
        let hook = Hook {
            name: "post-sync".to_string(),
            action: "ok.sh".to_string(),
            project: "missing".to_string(),
        };
        let err = run_hooks(&[hook], &BTreeMap::new(), Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, JiriError::InvalidHook { .. }));
    }
}
