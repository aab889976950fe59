// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Repository representation.
//!
//! A __repository__ is a complete working copy that lives in its own
//! directory directly under the store root. The name of the directory is the
//! name of the repository. Everything inside of it, except for the VCS
//! metadata directory, is considered to be content that can be projected into
//! the home directory.
//!
//! # Tree Walks
//!
//! Linking, unlinking, and diffing all operate on the same view of a
//! repository: the list of entries produced by [`Repository::walk`]. The walk
//! is iterative rather than recursive, never follows symbolic links, skips
//! every entry named after the VCS metadata directory, and yields its entries
//! sorted by relative path. Sorting by path means that a directory always
//! comes before anything inside of it.

use crate::path::{normalize, same_file};

use std::{
    ffi::{OsStr, OsString},
    fs,
    io,
    path::{Path, PathBuf},
};
use tracing::{debug, instrument};

/// Handle to a repository in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    name: String,
    root: PathBuf,
    metadata_dir: OsString,
}

impl Repository {
    /// Open repository at target path.
    ///
    /// Root path gets canonicalized, so every link pointing into the
    /// repository uses an absolute path.
    ///
    /// # Errors
    ///
    /// - Return [`TreeError::NotADirectory`] if path is not a directory.
    /// - Return [`TreeError::Io`] or [`TreeError::PermissionDenied`] if path
    ///   cannot be resolved.
    pub fn open(path: impl AsRef<Path>, metadata_dir: impl AsRef<OsStr>) -> Result<Self> {
        let root = path
            .as_ref()
            .canonicalize()
            .map_err(|err| TreeError::from_io(path.as_ref(), err))?;
        if !root.is_dir() {
            return Err(TreeError::NotADirectory { path: root });
        }

        let name = root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self {
            name,
            root,
            metadata_dir: metadata_dir.as_ref().to_os_string(),
        })
    }

    /// Name of repository.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Absolute path to root of repository.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path to the store that contains this repository.
    pub fn store_root(&self) -> Option<&Path> {
        self.root.parent()
    }

    /// Absolute path a link at relative path should point to.
    pub fn target_of(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(relative)
    }

    /// Check if resolved link target points somewhere inside of repository.
    pub fn owns(&self, target: impl AsRef<Path>) -> bool {
        let target = target.as_ref();
        if normalize(target).starts_with(&self.root) {
            return true;
        }

        target
            .canonicalize()
            .map(|target| target.starts_with(&self.root))
            .unwrap_or(false)
    }

    /// Check if resolved link target points at the file with relative path.
    pub fn is_target_of(&self, target: impl AsRef<Path>, relative: impl AsRef<Path>) -> bool {
        same_file(target, self.target_of(relative))
    }

    /// Walk entire repository tree.
    ///
    /// # Errors
    ///
    /// - Return [`TreeError::Io`] or [`TreeError::PermissionDenied`] if any
    ///   directory in the tree cannot be read.
    #[instrument(skip(self), fields(repository = %self.name), level = "debug")]
    pub fn walk(&self) -> Result<Vec<TreeEntry>> {
        let mut entries = Vec::new();
        let mut pending = vec![PathBuf::new()];

        while let Some(relative) = pending.pop() {
            let dir = self.root.join(&relative);
            let listing = fs::read_dir(&dir).map_err(|err| TreeError::from_io(&dir, err))?;

            for dirent in listing {
                let dirent = dirent.map_err(|err| TreeError::from_io(&dir, err))?;
                let name = dirent.file_name();

                // INVARIANT: VCS metadata never leaves the store.
                if name == self.metadata_dir {
                    continue;
                }

                let path = relative.join(&name);
                let file_type = dirent
                    .file_type()
                    .map_err(|err| TreeError::from_io(dirent.path(), err))?;
                let kind = if file_type.is_dir() {
                    pending.push(path.clone());
                    EntryKind::Directory
                } else {
                    EntryKind::File
                };

                entries.push(TreeEntry { path, kind });
            }
        }

        entries.sort_by(|lhs, rhs| lhs.path.cmp(&rhs.path));
        debug!("walked {} entries", entries.len());

        Ok(entries)
    }
}

/// Single entry of a repository tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// Path relative to repository root.
    pub path: PathBuf,

    /// What kind of entry this is.
    pub kind: EntryKind,
}

impl TreeEntry {
    /// Check if entry is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Kind of repository tree entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Gets mirrored as a plain directory.
    Directory,

    /// Gets mirrored as a symbolic link. Includes symbolic links and special
    /// files inside of the repository.
    File,
}

/// Tree manipulation error types.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// Operating system refused access.
    #[error("permission denied at {:?}", path.display())]
    PermissionDenied {
        #[source]
        source: io::Error,
        path: PathBuf,
    },

    /// Expected a directory.
    #[error("{:?} is not a directory", path.display())]
    NotADirectory { path: PathBuf },

    /// Any other file system failure.
    #[error("file system operation failed at {:?}", path.display())]
    Io {
        #[source]
        source: io::Error,
        path: PathBuf,
    },
}

impl TreeError {
    pub(crate) fn from_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            io::ErrorKind::PermissionDenied => Self::PermissionDenied { source, path },
            _ => Self::Io { source, path },
        }
    }
}

/// Friendly result alias :3
pub type Result<T, E = TreeError> = std::result::Result<T, E>;
