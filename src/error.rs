//! Errors surfaced by resolution and extraction.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while resolving an application reference or unpacking
/// its archive. All variants are terminal for the current call; nothing in
/// this crate retries.
#[derive(Error, Debug)]
pub enum Error {
    /// Neither the literal reference nor the derived `.dockerapp` candidate
    /// exists. Both tried paths are shown; the source is the stat failure
    /// for the literal reference.
    #[error("no application found at '{}' or '{}'", reference.display(), candidate.display())]
    NotFound {
        /// The reference exactly as the caller supplied it.
        reference: PathBuf,
        /// The candidate derived by appending the package extension.
        candidate: PathBuf,
        /// Stat failure for the literal reference.
        source: io::Error,
    },

    /// The temporary extraction workspace could not be created.
    #[error("failed to create extraction workspace: {0}")]
    Workspace(#[source] io::Error),

    /// The archive could not be opened or read, including truncated entries
    /// whose declared size exceeds the bytes actually present.
    #[error("failed to read archive '{}': {source}", path.display())]
    ArchiveRead {
        /// Path of the archive being read.
        path: PathBuf,
        /// Underlying I/O failure.
        source: io::Error,
    },

    /// A directory or file could not be created at the destination.
    #[error("failed to write '{}': {source}", path.display())]
    ArchiveWrite {
        /// Destination path that could not be written.
        path: PathBuf,
        /// Underlying I/O failure.
        source: io::Error,
    },

    /// An entry's name would escape the destination directory
    /// (absolute path or `..` traversal).
    #[error("archive entry '{}' escapes the destination directory", entry.display())]
    UnsafeEntry {
        /// The offending entry name as stored in the archive.
        entry: PathBuf,
    },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
