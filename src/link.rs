// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Link engine.
//!
//! Projects a repository into the home directory through symbolic links.
//! Every file of a repository gets a symbolic link at the same relative path
//! under the home root, while every directory of a repository gets mirrored
//! as a plain directory that acts as scaffolding for those links.
//!
//! # Ownership
//!
//! Anything in the home directory that is not a symbolic link into the
//! repository belongs to the user. Linking never replaces such entries, it
//! reports them as [`Conflict`]s and moves on. Unlinking only ever removes
//! symbolic links that resolve into the repository, and empty directories
//! that mirror repository directories.
//!
//! Both operations are idempotent, so an interrupted run can always be
//! resumed by running the same operation again.

use crate::{
    path::resolve_link_target,
    repository::{Repository, Result, TreeEntry, TreeError},
};

use std::{
    collections::{BTreeSet, HashSet},
    fmt::{Display, Formatter, Result as FmtResult},
    fs, io,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

/// Home path that cannot be linked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    /// Path relative to home root.
    pub path: PathBuf,

    /// Why the path cannot be linked.
    pub reason: ConflictReason,
}

impl Display for Conflict {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match &self.reason {
            ConflictReason::Occupied => {
                write!(fmt, "{} already exists", self.path.display())
            }
            ConflictReason::ForeignLink { target } => write!(
                fmt,
                "{} already links to {}",
                self.path.display(),
                target.display()
            ),
        }
    }
}

/// Reason for a conflict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictReason {
    /// Non-link entry is in the way.
    Occupied,

    /// Symbolic link pointing somewhere else is in the way.
    ForeignLink { target: PathBuf },
}

/// Link repository into home directory.
///
/// Creates a symbolic link for every file in the repository, and a plain
/// directory for every directory in the repository. Paths that are already
/// linked correctly are left alone. Paths that are occupied by anything else
/// are collected as conflicts, along with everything beneath them.
///
/// # Errors
///
/// - Return [`TreeError`] if the repository cannot be walked, or if any link
///   or directory cannot be created.
#[instrument(skip(repository, home), fields(repository = %repository.name()), level = "debug")]
pub fn link(repository: &Repository, home: impl AsRef<Path>) -> Result<Vec<Conflict>> {
    let home = canonical_home(home.as_ref())?;
    info!("link {:?} into {:?}", repository.name(), home.display());

    let mut conflicts = Vec::new();
    let mut blocked: Vec<PathBuf> = Vec::new();
    for entry in repository.walk()? {
        // INVARIANT: Nothing below a conflicting directory gets touched.
        if blocked.iter().any(|dir| entry.path.starts_with(dir)) {
            continue;
        }

        let home_path = home.join(&entry.path);
        let found = inspect(&home_path)?;
        let conflict = if entry.is_dir() {
            link_dir(repository, &home_path, &found)?
        } else {
            link_file(repository, &entry, &home_path, &found)?
        };

        if let Some(reason) = conflict {
            warn!("conflict at {:?}", home_path.display());
            if entry.is_dir() {
                blocked.push(entry.path.clone());
            }
            conflicts.push(Conflict {
                path: entry.path,
                reason,
            });
        }
    }

    Ok(conflicts)
}

fn link_dir(
    repository: &Repository,
    home_path: &Path,
    found: &HomeEntry,
) -> Result<Option<ConflictReason>> {
    match found {
        HomeEntry::Absent => {
            debug!("create directory {:?}", home_path.display());
            fs::create_dir_all(home_path).map_err(|err| TreeError::from_io(home_path, err))?;
            Ok(None)
        }
        HomeEntry::Directory => Ok(None),
        HomeEntry::Link { .. } if is_scaffolding_link(repository, home_path) => Ok(None),
        HomeEntry::Link { target } => Ok(Some(ConflictReason::ForeignLink {
            target: target.clone(),
        })),
        HomeEntry::Other => Ok(Some(ConflictReason::Occupied)),
    }
}

fn link_file(
    repository: &Repository,
    entry: &TreeEntry,
    home_path: &Path,
    found: &HomeEntry,
) -> Result<Option<ConflictReason>> {
    match found {
        HomeEntry::Absent => {
            let target = repository.target_of(&entry.path);
            if let Some(parent) = home_path.parent() {
                fs::create_dir_all(parent).map_err(|err| TreeError::from_io(parent, err))?;
            }
            debug!("link {:?} -> {:?}", home_path.display(), target.display());
            create_symlink(&target, home_path)
                .map_err(|err| TreeError::from_io(home_path, err))?;
            Ok(None)
        }
        HomeEntry::Link { target } if repository.is_target_of(target, &entry.path) => Ok(None),
        HomeEntry::Link { target } => Ok(Some(ConflictReason::ForeignLink {
            target: target.clone(),
        })),
        HomeEntry::Directory | HomeEntry::Other => Ok(Some(ConflictReason::Occupied)),
    }
}

/// Unlink repository from home directory.
///
/// Removes every symbolic link under the home root that resolves into the
/// repository, including links whose repository file no longer exists. Then
/// removes directories that held those links if they ended up empty, walking
/// up towards the home root until the first non-empty directory. Returns the
/// number of links removed.
///
/// # Errors
///
/// - Return [`TreeError`] if the repository cannot be walked, or if any link
///   or directory cannot be removed.
#[instrument(skip(repository, home), fields(repository = %repository.name()), level = "debug")]
pub fn unlink(repository: &Repository, home: impl AsRef<Path>) -> Result<usize> {
    let home = canonical_home(home.as_ref())?;
    info!("unlink {:?} from {:?}", repository.name(), home.display());

    let mut removed = 0;
    let mut seen = HashSet::new();
    let mut emptied = BTreeSet::new();

    for entry in repository.walk()?.into_iter().filter(|entry| !entry.is_dir()) {
        let home_path = home.join(&entry.path);
        if let HomeEntry::Link { target } = inspect(&home_path)? {
            if repository.owns(&target) {
                remove_link(&home_path)?;
                removed += 1;
                emptied.extend(entry.path.parent().map(Path::to_path_buf));
            }
        }
        seen.insert(entry.path);
    }

    // INVARIANT: Links left behind by files deleted from the repository
    // still belong to it.
    for found in home_links(&home, repository.store_root())? {
        if !seen.contains(&found.path) && repository.owns(&found.target) {
            remove_link(&home.join(&found.path))?;
            removed += 1;
            emptied.extend(found.path.parent().map(Path::to_path_buf));
        }
    }

    // INVARIANT: Only directories that held removed links get pruned, never
    // the home root itself.
    for dir in emptied.iter().rev() {
        prune_empty_dirs(&home, dir)?;
    }

    info!("removed {removed} links");
    Ok(removed)
}

fn prune_empty_dirs(home: &Path, relative: &Path) -> Result<()> {
    let mut current = Some(relative);
    while let Some(relative) = current.filter(|path| !path.as_os_str().is_empty()) {
        let dir = home.join(relative);
        if inspect(&dir)? != HomeEntry::Directory || !is_empty_dir(&dir)? {
            break;
        }

        // INVARIANT: Never prune through a directory link out of home.
        if dir.canonicalize().ok().as_deref() != Some(dir.as_path()) {
            break;
        }

        debug!("remove directory {:?}", dir.display());
        fs::remove_dir(&dir).map_err(|err| TreeError::from_io(&dir, err))?;
        current = relative.parent();
    }

    Ok(())
}

/// What currently occupies a home path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum HomeEntry {
    /// Nothing is there.
    Absent,

    /// Plain directory, not a link.
    Directory,

    /// Symbolic link with its resolved target.
    Link { target: PathBuf },

    /// Regular file, or anything else that is not a link or directory.
    Other,
}

/// Determine what occupies a home path without following symbolic links.
pub(crate) fn inspect(path: &Path) -> Result<HomeEntry> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        // INVARIANT: A non-directory parent means nothing can exist here.
        Err(err)
            if matches!(
                err.kind(),
                io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
            ) =>
        {
            return Ok(HomeEntry::Absent)
        }
        Err(err) => return Err(TreeError::from_io(path, err)),
    };

    let file_type = metadata.file_type();
    if file_type.is_symlink() {
        let raw = fs::read_link(path).map_err(|err| TreeError::from_io(path, err))?;
        return Ok(HomeEntry::Link {
            target: resolve_link_target(path, raw),
        });
    }

    if file_type.is_dir() {
        return Ok(HomeEntry::Directory);
    }

    Ok(HomeEntry::Other)
}

/// Symbolic link found while scanning the home directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HomeLink {
    /// Path relative to home root.
    pub(crate) path: PathBuf,

    /// Resolved target of link.
    pub(crate) target: PathBuf,
}

/// Collect every symbolic link under home root.
///
/// Never descends into symbolic links, or into the store itself when it
/// happens to live inside of the home directory. Directories that cannot be
/// read due to missing permissions are skipped.
pub(crate) fn home_links(home: &Path, store_root: Option<&Path>) -> Result<Vec<HomeLink>> {
    let mut links = Vec::new();
    let mut pending = vec![PathBuf::new()];

    while let Some(relative) = pending.pop() {
        let dir = home.join(&relative);
        let listing = match fs::read_dir(&dir) {
            Ok(listing) => listing,
            Err(err) if err.kind() == io::ErrorKind::PermissionDenied => {
                warn!("skip unreadable directory {:?}", dir.display());
                continue;
            }
            Err(err) => return Err(TreeError::from_io(&dir, err)),
        };

        for dirent in listing {
            let dirent = dirent.map_err(|err| TreeError::from_io(&dir, err))?;
            let path = relative.join(dirent.file_name());
            let file_type = dirent
                .file_type()
                .map_err(|err| TreeError::from_io(dirent.path(), err))?;

            if file_type.is_symlink() {
                let raw = fs::read_link(dirent.path())
                    .map_err(|err| TreeError::from_io(dirent.path(), err))?;
                links.push(HomeLink {
                    target: resolve_link_target(dirent.path(), raw),
                    path,
                });
            } else if file_type.is_dir() && Some(dirent.path().as_path()) != store_root {
                pending.push(path);
            }
        }
    }

    links.sort_by(|lhs, rhs| lhs.path.cmp(&rhs.path));
    Ok(links)
}

/// Check if a symbolic link in home can serve as directory scaffolding.
///
/// It must resolve to a directory outside of the repository store, so that
/// links created beneath it never land inside any repository.
pub(crate) fn is_scaffolding_link(repository: &Repository, home_path: &Path) -> bool {
    let Ok(resolved) = home_path.canonicalize() else {
        return false;
    };

    resolved.is_dir()
        && repository
            .store_root()
            .is_none_or(|store_root| !resolved.starts_with(store_root))
}

pub(crate) fn canonical_home(home: &Path) -> Result<PathBuf> {
    let home = home
        .canonicalize()
        .map_err(|err| TreeError::from_io(home, err))?;
    if !home.is_dir() {
        return Err(TreeError::NotADirectory { path: home });
    }

    Ok(home)
}

fn is_empty_dir(path: &Path) -> Result<bool> {
    let mut listing = fs::read_dir(path).map_err(|err| TreeError::from_io(path, err))?;
    Ok(listing.next().is_none())
}

fn remove_link(path: &Path) -> Result<()> {
    debug!("remove link {:?}", path.display());
    remove_symlink(path).map_err(|err| TreeError::from_io(path, err))
}

#[cfg(unix)]
fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    if target.is_dir() {
        std::os::windows::fs::symlink_dir(target, link)
    } else {
        std::os::windows::fs::symlink_file(target, link)
    }
}

#[cfg(unix)]
fn remove_symlink(path: &Path) -> io::Result<()> {
    fs::remove_file(path)
}

// Directory symlinks on Windows must be removed like directories.
#[cfg(windows)]
fn remove_symlink(path: &Path) -> io::Result<()> {
    fs::remove_file(path).or_else(|_| fs::remove_dir(path))
}
