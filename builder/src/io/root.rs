//! Project root resolution.
//!
//! The project root is the parent of the directory holding the orchestrator
//! crate, so the build behaves the same no matter where it is invoked from.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::BuildError;

/// Directory of the orchestrator crate, fixed at compile time.
pub fn orchestrator_dir() -> &'static Path {
    Path::new(env!("CARGO_MANIFEST_DIR"))
}

/// Resolve the project root as the parent of `orchestrator_dir`.
pub fn resolve_project_root(orchestrator_dir: &Path) -> Result<PathBuf, BuildError> {
    let parent = orchestrator_dir
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .ok_or_else(|| BuildError::PathResolution {
            orchestrator_dir: orchestrator_dir.to_path_buf(),
            reason: "orchestrator directory has no parent".to_string(),
        })?;
    let root = check_root(orchestrator_dir, parent)?;
    debug!(root = %root.display(), "resolved project root");
    Ok(root)
}

/// Validate an explicitly chosen project root (`--project-root`).
pub fn explicit_project_root(root: &Path) -> Result<PathBuf, BuildError> {
    check_root(root, root)
}

/// Canonicalize `candidate` and require a readable, writable directory.
fn check_root(origin: &Path, candidate: &Path) -> Result<PathBuf, BuildError> {
    let fail = |reason: String| BuildError::PathResolution {
        orchestrator_dir: origin.to_path_buf(),
        reason,
    };

    let root = fs::canonicalize(candidate)
        .map_err(|err| fail(format!("{}: {err}", candidate.display())))?;
    let metadata =
        fs::metadata(&root).map_err(|err| fail(format!("{}: {err}", root.display())))?;
    if !metadata.is_dir() {
        return Err(fail(format!("{} is not a directory", root.display())));
    }
    fs::read_dir(&root).map_err(|err| fail(format!("{} is not readable: {err}", root.display())))?;
    // Mode bits alone miss ownership and ACLs; create and drop a scratch file.
    tempfile::tempfile_in(&root)
        .map_err(|err| fail(format!("{} is not writable: {err}", root.display())))?;
    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_parent_of_orchestrator_dir() {
        let temp = tempfile::tempdir().expect("tempdir");
        let project = temp.path().join("frontend");
        let scripts = project.join("builder");
        fs::create_dir_all(&scripts).expect("mkdir");

        let root = resolve_project_root(&scripts).expect("resolve");
        assert_eq!(root, fs::canonicalize(&project).expect("canonicalize"));
    }

    #[test]
    fn root_ignores_dot_segments() {
        let temp = tempfile::tempdir().expect("tempdir");
        let project = temp.path().join("frontend");
        fs::create_dir_all(project.join("builder")).expect("mkdir");
        fs::create_dir_all(project.join("other")).expect("mkdir");

        let indirect = project.join("other").join("..").join("builder");
        let root = resolve_project_root(&indirect).expect("resolve");
        assert_eq!(root, fs::canonicalize(&project).expect("canonicalize"));
    }

    #[test]
    fn missing_parent_is_path_resolution_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let ghost = temp.path().join("gone").join("builder");

        let err = resolve_project_root(&ghost).unwrap_err();
        assert!(matches!(err, BuildError::PathResolution { .. }));
    }

    #[test]
    fn bare_relative_dir_has_no_parent() {
        let err = resolve_project_root(Path::new("builder")).unwrap_err();
        assert!(err.to_string().contains("no parent"));
    }

    #[test]
    fn explicit_root_must_be_directory() {
        let temp = tempfile::tempdir().expect("tempdir");
        let file = temp.path().join("main.js");
        fs::write(&file, "").expect("write");

        let err = explicit_project_root(&file).unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }

    #[cfg(unix)]
    #[test]
    fn unwritable_root_is_path_resolution_error() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().expect("tempdir");
        let locked = temp.path().join("frontend");
        fs::create_dir_all(&locked).expect("mkdir");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).expect("chmod");

        // Privileged users write through mode bits; nothing to assert then.
        let privileged = tempfile::tempfile_in(&locked).is_ok();
        let result = explicit_project_root(&locked);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).expect("chmod back");
        if privileged {
            return;
        }

        let err = result.unwrap_err();
        assert!(matches!(err, BuildError::PathResolution { .. }));
        assert!(err.to_string().contains("not writable"));
    }

    #[test]
    fn writable_root_leaves_no_scratch_files() {
        let temp = tempfile::tempdir().expect("tempdir");
        explicit_project_root(temp.path()).expect("resolve");
        let leftovers = fs::read_dir(temp.path()).expect("read").count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn compiled_orchestrator_dir_has_a_parent() {
        let root = resolve_project_root(orchestrator_dir()).expect("resolve");
        assert!(root.join("builder").is_dir());
    }
}
