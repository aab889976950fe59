// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Repository store management and manipulation.
//!
//! Deja groups repositories together into one place called the
//! __repository store__. The repository store houses all dotfile repositories
//! that the user can link into their home directory.
//!
//! # Repository Store Layout
//!
//! The repository store can generally be placed anywhere on the user's file
//! system. However, the default location is `$HOME/.deja`. Each repository is
//! a complete working copy, VCS metadata directory included, that lives in a
//! directory directly under the store root. The name of that directory is the
//! name of the repository. So, `$HOME/.deja/dotfiles_1` means that the store
//! contains a repository named "dotfiles_1".
//!
//! Deja only evaluates the top-level of the repository store. Thus, it is not
//! possible to nest repositories inside one another.
//!
//! # Invariants
//!
//! - No two repositories share a name. Clones get their names through
//!   [`naming::allocate`].
//! - Every directory under the store root is a complete working copy. Failed
//!   clones clean up after themselves.
//! - Removing a repository unlinks it first. Deleting the directory first
//!   would leave dangling links behind with no way to tell where they came
//!   from.

pub mod naming;

use crate::{
    diff::{self, DiffReport},
    link::{self, Conflict},
    repository::{Repository, TreeError},
    source::SourceLocation,
    vcs::{Git2Vcs, Vcs, VcsError},
};

use std::{
    ffi::OsString,
    fs::{self, DirBuilder},
    io,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

/// Repository store bound to a home directory.
///
/// Every operation works on an explicit store root and home root. Nothing is
/// read from the environment.
#[derive(Debug)]
pub struct Store<V = Git2Vcs>
where
    V: Vcs,
{
    root: PathBuf,
    home: PathBuf,
    metadata_dir: OsString,
    vcs: V,
}

impl<V> Store<V>
where
    V: Vcs,
{
    /// Construct new store handle without touching the file system.
    pub fn new(root: impl Into<PathBuf>, home: impl Into<PathBuf>, vcs: V) -> Self {
        Self {
            root: root.into(),
            home: home.into(),
            metadata_dir: ".git".into(),
            vcs,
        }
    }

    /// Open store, creating its root if needed.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::StoreUnavailable`] if store root cannot be
    ///   created or is not a directory.
    pub fn open(root: impl Into<PathBuf>, home: impl Into<PathBuf>, vcs: V) -> Result<Self> {
        let store = Self::new(root, home, vcs);
        store.ensure_root()?;

        Ok(store)
    }

    /// Use different VCS metadata directory name.
    pub fn with_metadata_dir(mut self, metadata_dir: impl Into<OsString>) -> Self {
        self.metadata_dir = metadata_dir.into();
        self
    }

    /// Path to store root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to home root.
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Create store root if it does not exist yet.
    ///
    /// Store root is only accessible by its owner. Parent directories are not
    /// created.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::StoreUnavailable`] if store root cannot be
    ///   created or is not a directory.
    pub fn ensure_root(&self) -> Result<()> {
        match fs::metadata(&self.root) {
            Ok(metadata) if metadata.is_dir() => return Ok(()),
            Ok(_) => {
                return Err(StoreError::StoreUnavailable {
                    source: io::Error::new(io::ErrorKind::NotADirectory, "not a directory"),
                    path: self.root.clone(),
                })
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(StoreError::StoreUnavailable {
                    source: err,
                    path: self.root.clone(),
                })
            }
        }

        info!("create repository store at {:?}", self.root.display());
        let mut builder = DirBuilder::new();
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }
        builder
            .create(&self.root)
            .map_err(|err| StoreError::StoreUnavailable {
                source: err,
                path: self.root.clone(),
            })
    }

    /// Listing of repositories in store.
    pub fn repositories(&self) -> RepositoryListing {
        RepositoryListing {
            root: self.root.clone(),
        }
    }

    /// Open repository by name.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::RepositoryNotFound`] if no repository has that
    ///   name.
    /// - Return [`StoreError::Tree`] if repository cannot be opened.
    pub fn repository(&self, name: impl AsRef<str>) -> Result<Repository> {
        let name = name.as_ref();
        let not_found = || StoreError::RepositoryNotFound {
            name: name.to_string(),
        };

        // INVARIANT: Names never escape the store root.
        if !is_valid_name(name) {
            return Err(not_found());
        }

        let path = self.root.join(name);
        match fs::symlink_metadata(&path) {
            Ok(metadata) if metadata.is_dir() => {}
            _ => return Err(not_found()),
        }

        Ok(Repository::open(path, &self.metadata_dir)?)
    }

    /// Clone repository into store.
    ///
    /// Allocates a unique name based on the source location's base name, and
    /// has the VCS client materialize a working copy under that name. Does
    /// not link anything. Returns the allocated name.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::StoreUnavailable`] if store root is unusable.
    /// - Return [`StoreError::CloneFailed`] if VCS client fails. Whatever it
    ///   left behind gets removed.
    #[instrument(skip(self, source), fields(source = %source), level = "debug")]
    pub fn clone_repository(&self, source: &SourceLocation) -> Result<String> {
        self.ensure_root()?;
        let name = naming::allocate(source.base_name(), self.entry_names()?);
        let destination = self.root.join(&name);
        info!("clone {source} as {name:?}");

        let outcome = self
            .vcs
            .clone_to(source.url(), &destination)
            .and_then(|()| {
                if destination.is_dir() {
                    Ok(())
                } else {
                    Err(VcsError::NotMaterialized(destination.clone()))
                }
            });

        if let Err(err) = outcome {
            discard(&destination);
            return Err(StoreError::CloneFailed {
                location: source.to_string(),
                source: err,
            });
        }

        Ok(name)
    }

    /// Bring repository up to date with its remote.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::RepositoryNotFound`] if no repository has that
    ///   name.
    /// - Return [`StoreError::PullFailed`] if VCS client fails.
    #[instrument(skip(self, name), fields(name = %name.as_ref()), level = "debug")]
    pub fn pull(&self, name: impl AsRef<str>) -> Result<()> {
        let repository = self.repository(name.as_ref())?;
        self.vcs
            .pull(repository.root())
            .map_err(|err| StoreError::PullFailed {
                name: repository.name().to_string(),
                source: err,
            })
    }

    /// Link repository into home directory.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::RepositoryNotFound`] if no repository has that
    ///   name.
    /// - Return [`StoreError::Tree`] if linking fails. Conflicts are not
    ///   errors.
    pub fn link(&self, name: impl AsRef<str>) -> Result<Vec<Conflict>> {
        let repository = self.repository(name)?;
        Ok(link::link(&repository, &self.home)?)
    }

    /// Unlink repository from home directory.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::RepositoryNotFound`] if no repository has that
    ///   name.
    /// - Return [`StoreError::Tree`] if unlinking fails.
    pub fn unlink(&self, name: impl AsRef<str>) -> Result<usize> {
        let repository = self.repository(name)?;
        Ok(link::unlink(&repository, &self.home)?)
    }

    /// Diff repository against home directory.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::RepositoryNotFound`] if no repository has that
    ///   name.
    /// - Return [`StoreError::Tree`] if either tree cannot be read.
    pub fn diff(&self, name: impl AsRef<str>) -> Result<DiffReport> {
        let repository = self.repository(name)?;
        Ok(diff::diff(&repository, &self.home)?)
    }

    /// Remove repository from store.
    ///
    /// Unlinks repository from home directory, then deletes it.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::RepositoryNotFound`] if no repository has that
    ///   name.
    /// - Return [`StoreError::Tree`] if unlinking or deletion fails.
    #[instrument(skip(self, name), fields(name = %name.as_ref()), level = "debug")]
    pub fn remove(&self, name: impl AsRef<str>) -> Result<()> {
        let repository = self.repository(name.as_ref())?;
        link::unlink(&repository, &self.home)?;

        info!("remove repository {:?}", repository.name());
        fs::remove_dir_all(repository.root())
            .map_err(|err| TreeError::from_io(repository.root(), err))?;

        Ok(())
    }

    /// List contents of repository by relative path.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::RepositoryNotFound`] if no repository has that
    ///   name.
    /// - Return [`StoreError::Tree`] if repository cannot be walked.
    pub fn list_files(&self, name: impl AsRef<str>) -> Result<Vec<PathBuf>> {
        let repository = self.repository(name)?;
        Ok(repository
            .walk()?
            .into_iter()
            .map(|entry| entry.path)
            .collect())
    }

    fn entry_names(&self) -> Result<Vec<String>> {
        let listing = fs::read_dir(&self.root).map_err(|err| StoreError::StoreUnavailable {
            source: err,
            path: self.root.clone(),
        })?;

        let mut names = Vec::new();
        for dirent in listing {
            let dirent = dirent.map_err(|err| TreeError::from_io(&self.root, err))?;
            names.push(dirent.file_name().to_string_lossy().into_owned());
        }

        Ok(names)
    }
}

/// Restartable listing of repository names in a store.
///
/// Nothing is read until [`RepositoryListing::iter`] is called. Each call
/// reads the store root anew.
#[derive(Debug, Clone)]
pub struct RepositoryListing {
    root: PathBuf,
}

impl RepositoryListing {
    /// Iterate repository names in lexicographic order.
    ///
    /// A missing store root is an empty store.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::StoreUnavailable`] if store root cannot be read.
    pub fn iter(&self) -> Result<std::vec::IntoIter<String>> {
        let listing = match fs::read_dir(&self.root) {
            Ok(listing) => listing,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new().into_iter()),
            Err(err) => {
                return Err(StoreError::StoreUnavailable {
                    source: err,
                    path: self.root.clone(),
                })
            }
        };

        let mut names = Vec::new();
        for dirent in listing {
            let dirent = dirent.map_err(|err| TreeError::from_io(&self.root, err))?;
            let is_dir = dirent
                .file_type()
                .map_err(|err| TreeError::from_io(dirent.path(), err))?
                .is_dir();
            if !is_dir {
                continue;
            }

            match dirent.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(name) => warn!("skip repository with non-unicode name {name:?}"),
            }
        }
        names.sort();

        Ok(names.into_iter())
    }
}

fn is_valid_name(name: &str) -> bool {
    !matches!(name, "" | "." | "..") && !name.contains(['/', '\\'])
}

fn discard(path: &Path) {
    let removal = match fs::symlink_metadata(path) {
        Ok(metadata) if metadata.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(_) => return,
    };

    match removal {
        Ok(()) => debug!("discarded partial clone at {:?}", path.display()),
        Err(err) => warn!("cannot discard partial clone at {:?}: {err}", path.display()),
    }
}

/// All possible error types for repository store interaction.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Store root cannot be created or accessed.
    #[error("repository store at {:?} is unavailable", path.display())]
    StoreUnavailable {
        #[source]
        source: io::Error,
        path: PathBuf,
    },

    /// Named repository is not in store.
    #[error("repository {name:?} not found")]
    RepositoryNotFound { name: String },

    /// VCS client failed to clone.
    #[error("failed to clone {location:?}")]
    CloneFailed {
        location: String,
        #[source]
        source: VcsError,
    },

    /// VCS client failed to pull.
    #[error("failed to pull repository {name:?}")]
    PullFailed {
        name: String,
        #[source]
        source: VcsError,
    },

    /// Walking, linking, or deleting failed.
    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// Friendly result alias :3
pub type Result<T, E = StoreError> = std::result::Result<T, E>;
