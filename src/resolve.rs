//! Application reference resolution.
//!
//! Turns a caller-supplied reference into a usable on-disk directory. A
//! reference naming an expanded directory is returned verbatim; a reference
//! naming a packed archive is unpacked into a freshly created temporary
//! workspace that the returned [`ResolvedApp`] owns and releases.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::extract::unpack;

/// Capability for creating uniquely-named extraction workspaces.
///
/// The resolver never touches the process-wide temp directory directly;
/// tests substitute a provider rooted in a fixture directory (or one that
/// always fails) to exercise the resolver without global side effects.
pub trait WorkspaceProvider {
    /// Create a fresh, uniquely-named, empty directory and hand over
    /// ownership of it.
    fn create_workspace(&self) -> io::Result<PathBuf>;
}

/// Default provider: a `dockerapp-` prefixed directory under the system
/// temp location.
#[derive(Debug, Default)]
pub struct TempWorkspaces;

impl WorkspaceProvider for TempWorkspaces {
    fn create_workspace(&self) -> io::Result<PathBuf> {
        let dir = tempfile::Builder::new().prefix("dockerapp-").tempdir()?;
        // Ownership moves to the ResolvedApp guard, which handles removal.
        Ok(dir.keep())
    }
}

/// A resolved application directory plus the cleanup duty that came with it.
///
/// For directory references this is a plain path and [`release`] is a no-op.
/// For archive references it owns the temporary workspace holding the
/// unpacked content; dropping the guard releases the workspace, so it cannot
/// leak on early returns.
///
/// [`release`]: ResolvedApp::release
#[derive(Debug)]
pub struct ResolvedApp {
    path: PathBuf,
    workspace: Option<PathBuf>,
}

impl ResolvedApp {
    /// The directory holding the application's expanded content.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the content lives in a temporary workspace owned by this
    /// guard rather than at the caller's original reference.
    pub fn is_temporary(&self) -> bool {
        self.workspace.is_some()
    }

    /// Remove the temporary workspace, if this resolution created one.
    ///
    /// Idempotent and infallible: a second call is a no-op, as is releasing
    /// a workspace an external actor already removed.
    pub fn release(&mut self) {
        if let Some(workspace) = self.workspace.take() {
            tracing::debug!("releasing workspace '{}'", workspace.display());
            let _ = fs::remove_dir_all(&workspace);
        }
    }
}

impl Drop for ResolvedApp {
    fn drop(&mut self) {
        self.release();
    }
}

/// Resolve `reference` to a usable application directory, unpacking into a
/// system temp workspace when the reference names a packed archive.
pub fn resolve(reference: &str) -> Result<ResolvedApp> {
    resolve_with(reference, &TempWorkspaces)
}

/// [`resolve`] with an explicit workspace capability.
///
/// The lookup order is: the reference verbatim, then the candidate derived
/// by appending the package extension. An existing directory is returned
/// as-is; an existing regular file is treated as a packed archive. When both
/// lookups fail, the error names both tried paths.
pub fn resolve_with(reference: &str, workspaces: &dyn WorkspaceProvider) -> Result<ResolvedApp> {
    let verbatim = Path::new(reference);
    let (path, metadata) = match fs::metadata(verbatim) {
        Ok(metadata) => (verbatim.to_path_buf(), metadata),
        Err(first) => {
            let candidate = crate::dir_name_from_app_name(reference);
            match fs::metadata(&candidate) {
                Ok(metadata) => (candidate, metadata),
                Err(_) => {
                    return Err(Error::NotFound {
                        reference: verbatim.to_path_buf(),
                        candidate,
                        source: first,
                    });
                }
            }
        }
    };

    if metadata.is_dir() {
        tracing::debug!("'{}' is already an application directory", path.display());
        return Ok(ResolvedApp {
            path,
            workspace: None,
        });
    }

    // A regular file: treat it as a packed application archive.
    let workspace = workspaces.create_workspace().map_err(Error::Workspace)?;
    tracing::debug!(
        "unpacking '{}' into workspace '{}'",
        path.display(),
        workspace.display()
    );
    if let Err(err) = unpack(&path, &workspace) {
        let _ = fs::remove_dir_all(&workspace);
        return Err(err);
    }

    Ok(ResolvedApp {
        path: workspace.clone(),
        workspace: Some(workspace),
    })
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use tempfile::tempdir;

    /// Provider rooted in a test fixture directory, recording every
    /// workspace it hands out.
    struct RootedWorkspaces {
        root: PathBuf,
        created: RefCell<Vec<PathBuf>>,
    }

    impl RootedWorkspaces {
        fn new(root: &Path) -> Self {
            Self {
                root: root.to_path_buf(),
                created: RefCell::new(Vec::new()),
            }
        }

        fn created(&self) -> Vec<PathBuf> {
            self.created.borrow().clone()
        }
    }

    impl WorkspaceProvider for RootedWorkspaces {
        fn create_workspace(&self) -> io::Result<PathBuf> {
            let dir = tempfile::Builder::new()
                .prefix("ws-")
                .tempdir_in(&self.root)?
                .keep();
            self.created.borrow_mut().push(dir.clone());
            Ok(dir)
        }
    }

    /// Provider that always fails, for the workspace-creation error path.
    struct BrokenWorkspaces;

    impl WorkspaceProvider for BrokenWorkspaces {
        fn create_workspace(&self) -> io::Result<PathBuf> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
        }
    }

    fn packed_app(dir: &Path) -> PathBuf {
        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Directory);
        header.set_size(0);
        header.set_mode(0o755);
        builder
            .append_data(&mut header, "app/", io::empty())
            .unwrap();
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_size(5);
        header.set_mode(0o644);
        builder
            .append_data(&mut header, "app/metadata.txt", &b"hello"[..])
            .unwrap();
        let path = dir.join("myapp.dockerapp");
        fs::write(&path, builder.into_inner().unwrap()).unwrap();
        path
    }

    #[test]
    fn directory_reference_resolves_verbatim() {
        let tmp = tempdir().unwrap();
        let app_dir = tmp.path().join("myapp.dockerapp");
        fs::create_dir(&app_dir).unwrap();
        fs::write(app_dir.join("metadata.txt"), b"hello").unwrap();

        let workspaces = RootedWorkspaces::new(tmp.path());
        let mut resolved =
            resolve_with(app_dir.to_str().unwrap(), &workspaces).expect("resolve dir");
        assert_eq!(resolved.path(), app_dir);
        assert!(!resolved.is_temporary());

        // Release must not touch the caller's directory.
        resolved.release();
        assert!(app_dir.join("metadata.txt").exists());
        assert!(workspaces.created().is_empty());
    }

    #[test]
    fn candidate_extension_is_applied() {
        let tmp = tempdir().unwrap();
        let app_dir = tmp.path().join("myapp.dockerapp");
        fs::create_dir(&app_dir).unwrap();

        let short = tmp.path().join("myapp");
        let workspaces = RootedWorkspaces::new(tmp.path());
        let resolved = resolve_with(short.to_str().unwrap(), &workspaces).expect("resolve short");
        assert_eq!(resolved.path(), app_dir);
        assert!(!resolved.is_temporary());
    }

    #[test]
    fn missing_reference_is_not_found_and_creates_nothing() {
        let tmp = tempdir().unwrap();
        let missing = tmp.path().join("myapp");
        let workspaces = RootedWorkspaces::new(tmp.path());

        let err = resolve_with(missing.to_str().unwrap(), &workspaces).unwrap_err();
        match err {
            Error::NotFound {
                reference,
                candidate,
                ..
            } => {
                assert_eq!(reference, missing);
                assert_eq!(candidate, tmp.path().join("myapp.dockerapp"));
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
        assert!(workspaces.created().is_empty());
    }

    #[test]
    fn archive_reference_unpacks_into_one_workspace() {
        let tmp = tempdir().unwrap();
        let archive = packed_app(tmp.path());
        let workspaces = RootedWorkspaces::new(tmp.path());

        let resolved = resolve_with(archive.to_str().unwrap(), &workspaces).expect("resolve");
        assert!(resolved.is_temporary());
        assert_eq!(workspaces.created().len(), 1);
        assert_eq!(resolved.path(), workspaces.created()[0]);
        assert_eq!(
            fs::read(resolved.path().join("app/metadata.txt")).unwrap(),
            b"hello"
        );
    }

    #[test]
    fn release_removes_workspace_and_is_idempotent() {
        let tmp = tempdir().unwrap();
        let archive = packed_app(tmp.path());
        let workspaces = RootedWorkspaces::new(tmp.path());

        let mut resolved = resolve_with(archive.to_str().unwrap(), &workspaces).expect("resolve");
        let workspace = resolved.path().to_path_buf();
        assert!(workspace.exists());

        resolved.release();
        assert!(!workspace.exists());
        // Second invocation must be a quiet no-op.
        resolved.release();
        assert!(!workspace.exists());
    }

    #[test]
    fn release_survives_external_removal() {
        let tmp = tempdir().unwrap();
        let archive = packed_app(tmp.path());
        let workspaces = RootedWorkspaces::new(tmp.path());

        let mut resolved = resolve_with(archive.to_str().unwrap(), &workspaces).expect("resolve");
        fs::remove_dir_all(resolved.path()).unwrap();
        resolved.release();
    }

    #[test]
    fn drop_releases_the_workspace() {
        let tmp = tempdir().unwrap();
        let archive = packed_app(tmp.path());
        let workspaces = RootedWorkspaces::new(tmp.path());

        let workspace = {
            let resolved = resolve_with(archive.to_str().unwrap(), &workspaces).expect("resolve");
            resolved.path().to_path_buf()
        };
        assert!(!workspace.exists());
    }

    #[test]
    fn extraction_failure_cleans_up_the_workspace() {
        let tmp = tempdir().unwrap();
        // Not a tar stream at all.
        let bogus = tmp.path().join("broken.dockerapp");
        fs::write(&bogus, b"definitely not a tarball").unwrap();
        let workspaces = RootedWorkspaces::new(tmp.path());

        let err = resolve_with(bogus.to_str().unwrap(), &workspaces).unwrap_err();
        assert!(matches!(err, Error::ArchiveRead { .. }), "got {err:?}");
        assert_eq!(workspaces.created().len(), 1);
        assert!(!workspaces.created()[0].exists());
    }

    #[test]
    fn workspace_creation_failure_surfaces() {
        let tmp = tempdir().unwrap();
        let archive = packed_app(tmp.path());

        let err = resolve_with(archive.to_str().unwrap(), &BrokenWorkspaces).unwrap_err();
        assert!(matches!(err, Error::Workspace(_)), "got {err:?}");
    }
}
