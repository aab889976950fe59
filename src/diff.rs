// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Diff engine.
//!
//! Compares what a repository would link into the home directory against
//! what the home directory actually holds. Diffing is a pure read, nothing
//! in either tree gets touched.

use crate::{
    link::{canonical_home, home_links, inspect, is_scaffolding_link, HomeEntry},
    repository::{Repository, Result},
};

use std::{
    collections::HashSet,
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
};
use tracing::{debug, instrument};

/// Drift between a repository and the home directory.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DiffReport {
    /// Every path that is not linked correctly, in repository traversal
    /// order, followed by orphaned links.
    pub entries: Vec<DiffEntry>,

    /// Number of files that are linked correctly.
    pub linked: usize,
}

impl DiffReport {
    /// Check if home directory matches repository exactly.
    pub fn is_clean(&self) -> bool {
        self.entries.is_empty()
    }

    /// Count entries matching given predicate.
    pub fn count(&self, predicate: impl Fn(&DiffStatus) -> bool) -> usize {
        self.entries
            .iter()
            .filter(|entry| predicate(&entry.status))
            .count()
    }

    /// Number of paths missing from home directory.
    pub fn missing(&self) -> usize {
        self.count(|status| matches!(status, DiffStatus::Missing))
    }

    /// Number of paths occupied by non-link content.
    pub fn conflicts(&self) -> usize {
        self.count(|status| matches!(status, DiffStatus::Conflict))
    }

    /// Number of links pointing at the wrong file.
    pub fn modified(&self) -> usize {
        self.count(|status| matches!(status, DiffStatus::ModifiedTarget { .. }))
    }

    /// Number of links into repository without a repository file.
    pub fn orphaned(&self) -> usize {
        self.count(|status| matches!(status, DiffStatus::Orphaned { .. }))
    }
}

impl Display for DiffReport {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        for entry in &self.entries {
            writeln!(fmt, "{entry}")?;
        }

        write!(
            fmt,
            "{} linked, {} missing, {} modified, {} conflict, {} orphaned",
            self.linked,
            self.missing(),
            self.modified(),
            self.conflicts(),
            self.orphaned()
        )
    }
}

/// Single path that drifted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffEntry {
    /// Path relative to home root.
    pub path: PathBuf,

    /// How the path drifted.
    pub status: DiffStatus,
}

impl Display for DiffEntry {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let path = self.path.display();
        match &self.status {
            DiffStatus::Missing => write!(fmt, "missing   {path}"),
            DiffStatus::ModifiedTarget { target } => {
                write!(fmt, "modified  {path} -> {}", target.display())
            }
            DiffStatus::Conflict => write!(fmt, "conflict  {path}"),
            DiffStatus::Orphaned { target } => {
                write!(fmt, "orphaned  {path} -> {}", target.display())
            }
        }
    }
}

/// Classification of a drifted path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffStatus {
    /// Repository has path, home directory has nothing there.
    Missing,

    /// Symbolic link exists, but resolves to some other file.
    ModifiedTarget { target: PathBuf },

    /// Non-link entry exists at path.
    Conflict,

    /// Symbolic link resolves into repository, but repository has no such
    /// path.
    Orphaned { target: PathBuf },
}

/// Diff repository against home directory.
///
/// Directories that are missing or occupied get reported once, without
/// reporting anything beneath them.
///
/// # Errors
///
/// - Return [`TreeError`](crate::repository::TreeError) if either tree
///   cannot be read.
#[instrument(skip(repository, home), fields(repository = %repository.name()), level = "debug")]
pub fn diff(repository: &Repository, home: impl AsRef<Path>) -> Result<DiffReport> {
    let home = canonical_home(home.as_ref())?;
    let tree = repository.walk()?;
    let mut report = DiffReport::default();
    let mut blocked: Vec<PathBuf> = Vec::new();

    for entry in &tree {
        if blocked.iter().any(|dir| entry.path.starts_with(dir)) {
            continue;
        }

        let home_path = home.join(&entry.path);
        let status = match (inspect(&home_path)?, entry.is_dir()) {
            (HomeEntry::Absent, _) => Some(DiffStatus::Missing),
            (HomeEntry::Directory, true) => None,
            (HomeEntry::Link { .. }, true) if is_scaffolding_link(repository, &home_path) => None,
            (HomeEntry::Link { target }, false) if repository.is_target_of(&target, &entry.path) => {
                report.linked += 1;
                None
            }
            (HomeEntry::Link { target }, _) => Some(DiffStatus::ModifiedTarget { target }),
            (HomeEntry::Directory | HomeEntry::Other, _) => Some(DiffStatus::Conflict),
        };

        if let Some(status) = status {
            if entry.is_dir() {
                blocked.push(entry.path.clone());
            }
            report.entries.push(DiffEntry {
                path: entry.path.clone(),
                status,
            });
        }
    }

    let known = tree
        .iter()
        .map(|entry| entry.path.as_path())
        .collect::<HashSet<_>>();
    for found in home_links(&home, repository.store_root())? {
        if !known.contains(found.path.as_path()) && repository.owns(&found.target) {
            report.entries.push(DiffEntry {
                path: found.path,
                status: DiffStatus::Orphaned {
                    target: found.target,
                },
            });
        }
    }

    debug!("{} drifted, {} linked", report.entries.len(), report.linked);
    Ok(report)
}
