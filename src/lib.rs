//! lunchbox - application package resolution
//!
//! Turns an application reference — either an already-expanded `.dockerapp`
//! directory or a packed tar archive — into a usable on-disk directory,
//! transparently unpacking the archive into a temporary workspace when
//! needed.
//!
//! # Overview
//!
//! [`resolve`] is the entry point. Directory references come back verbatim;
//! archive references are unpacked into a uniquely-named workspace owned by
//! the returned [`ResolvedApp`] guard, whose [`ResolvedApp::release`] (or
//! `Drop`) reclaims it. Resolution is synchronous and single-shot: every
//! error is terminal for the call and the caller decides whether to retry.
//!
//! # Example
//!
//! ```no_run
//! let mut app = lunchbox::resolve("myapp")?;
//! // ... read manifests under app.path() ...
//! app.release();
//! # Ok::<(), lunchbox::Error>(())
//! ```

pub mod error;
pub mod extract;
pub mod resolve;

// Re-exports for convenience
pub use error::{Error, Result};
pub use extract::unpack;
pub use resolve::{ResolvedApp, TempWorkspaces, WorkspaceProvider, resolve, resolve_with};

use std::path::PathBuf;

/// Extension carried by expanded application directories and, by
/// convention, by packed application archives.
pub const APP_EXTENSION: &str = ".dockerapp";

/// Derive the on-disk package name for a short application name.
///
/// # Example
///
/// ```
/// use lunchbox::dir_name_from_app_name;
///
/// assert_eq!(dir_name_from_app_name("myapp"), std::path::PathBuf::from("myapp.dockerapp"));
/// assert_eq!(dir_name_from_app_name("myapp.dockerapp"), std::path::PathBuf::from("myapp.dockerapp"));
/// ```
pub fn dir_name_from_app_name(app_name: &str) -> PathBuf {
    if app_name.ends_with(APP_EXTENSION) {
        PathBuf::from(app_name)
    } else {
        PathBuf::from(format!("{app_name}{APP_EXTENSION}"))
    }
}

/// Inverse of [`dir_name_from_app_name`]: strip the package extension from
/// a directory name, if present.
pub fn app_name_from_dir_name(dir_name: &str) -> String {
    dir_name
        .strip_suffix(APP_EXTENSION)
        .unwrap_or(dir_name)
        .to_string()
}
