//! Tar extraction for packed applications.
//!
//! Walks an archive's entries sequentially and mirrors its directory and
//! regular-file entries under a destination directory. Permissions are fixed
//! constants rather than preserved from the archive; anything that is not a
//! directory or a regular file is skipped.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Mode applied to every directory created during extraction.
const DIR_MODE: u32 = 0o755;

/// Mode applied to every regular file written during extraction.
const FILE_MODE: u32 = 0o644;

/// Unpack the archive at `archive` into `destination`.
///
/// Entries are processed in archive order; a later entry with the same name
/// overwrites an earlier one, matching plain filesystem semantics. Parent
/// directories of a file entry are created on demand, so archives whose file
/// entries are not preceded by their directory entries still extract.
///
/// Partially-written destination content is not rolled back on failure; the
/// caller owns the destination and decides what to do with it.
pub fn unpack(archive: &Path, destination: &Path) -> Result<()> {
    let file = File::open(archive).map_err(|source| Error::ArchiveRead {
        path: archive.to_path_buf(),
        source,
    })?;

    fs::create_dir_all(destination).map_err(|source| Error::ArchiveWrite {
        path: destination.to_path_buf(),
        source,
    })?;

    let mut reader = tar::Archive::new(BufReader::new(file));
    let entries = reader.entries().map_err(|source| Error::ArchiveRead {
        path: archive.to_path_buf(),
        source,
    })?;

    for entry in entries {
        let mut entry = entry.map_err(|source| Error::ArchiveRead {
            path: archive.to_path_buf(),
            source,
        })?;

        let name: PathBuf = entry
            .path()
            .map_err(|source| Error::ArchiveRead {
                path: archive.to_path_buf(),
                source,
            })?
            .into_owned();

        if !is_safe_relative(&name) {
            return Err(Error::UnsafeEntry { entry: name });
        }
        let target = destination.join(&name);

        match entry.header().entry_type() {
            tar::EntryType::Directory => {
                create_dir(&target)?;
            }
            tar::EntryType::Regular => {
                let declared = entry.size();
                let mut data = Vec::new();
                entry
                    .read_to_end(&mut data)
                    .map_err(|source| Error::ArchiveRead {
                        path: archive.to_path_buf(),
                        source,
                    })?;
                if data.len() as u64 != declared {
                    return Err(Error::ArchiveRead {
                        path: archive.to_path_buf(),
                        source: io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            format!(
                                "entry '{}' declares {} bytes but only {} are present",
                                name.display(),
                                declared,
                                data.len()
                            ),
                        ),
                    });
                }
                write_file(&target, &data)?;
            }
            other => {
                tracing::trace!("skipping entry '{}' of type {:?}", name.display(), other);
            }
        }
    }

    Ok(())
}

/// An entry name may only descend: no absolute paths, no prefixes, no `..`.
fn is_safe_relative(name: &Path) -> bool {
    name.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Create a directory entry. Already existing is not an error.
fn create_dir(target: &Path) -> Result<()> {
    fs::create_dir_all(target).map_err(|source| Error::ArchiveWrite {
        path: target.to_path_buf(),
        source,
    })?;
    set_mode(target, DIR_MODE)
}

/// Write a regular-file entry, creating its parent directories on demand.
fn write_file(target: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|source| Error::ArchiveWrite {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(target, data).map_err(|source| Error::ArchiveWrite {
        path: target.to_path_buf(),
        source,
    })?;
    set_mode(target, FILE_MODE)
}

#[cfg(unix)]
fn set_mode(target: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(target, fs::Permissions::from_mode(mode)).map_err(|source| {
        Error::ArchiveWrite {
            path: target.to_path_buf(),
            source,
        }
    })
}

#[cfg(not(unix))]
fn set_mode(_target: &Path, _mode: u32) -> Result<()> {
    Ok(())
}
