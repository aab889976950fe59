// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::RepoFixture;

use anyhow::Result;
use deja::{
    ConflictReason, DiffStatus, Git2Vcs, SourceLocation, Store, StoreError,
};
use pretty_assertions::assert_eq;
use sealed_test::prelude::*;
use std::{
    fs,
    path::{Path, PathBuf},
};

struct Workspace {
    cwd: PathBuf,
    store: Store,
}

impl Workspace {
    fn new() -> Result<Self> {
        let cwd = std::env::current_dir()?.canonicalize()?;
        fs::create_dir_all(cwd.join("home"))?;
        let store = Store::open(cwd.join("home/.deja"), cwd.join("home"), Git2Vcs::quiet())?;

        Ok(Self { cwd, store })
    }

    fn origin(&self, files: &[(&str, &str)]) -> Result<RepoFixture> {
        RepoFixture::with_files(self.cwd.join("origin/dotfiles"), files.iter().copied())
    }

    fn home(&self) -> &Path {
        self.store.home()
    }
}

fn source_of(fixture: &RepoFixture) -> Result<SourceLocation> {
    Ok(SourceLocation::parse(
        fixture.path().to_string_lossy(),
        "https://github.com",
    )?)
}

#[sealed_test]
fn clone_materializes_repository() -> Result<()> {
    let ws = Workspace::new()?;
    let origin = ws.origin(&[(".vimrc", "set nocompatible\n")])?;

    let name = ws.store.clone_repository(&source_of(&origin)?)?;
    assert_eq!(name, "dotfiles");
    assert!(ws.store.root().join("dotfiles/.git").is_dir());
    assert_eq!(
        fs::read_to_string(ws.store.root().join("dotfiles/.vimrc"))?,
        "set nocompatible\n"
    );

    Ok(())
}

#[sealed_test]
fn clone_same_source_twice_allocates_suffix() -> Result<()> {
    let ws = Workspace::new()?;
    let origin = ws.origin(&[(".vimrc", "")])?;
    let source = source_of(&origin)?;

    assert_eq!(ws.store.clone_repository(&source)?, "dotfiles");
    assert_eq!(ws.store.clone_repository(&source)?, "dotfiles_1");
    assert!(ws.store.root().join("dotfiles_1/.git").is_dir());

    let names = ws.store.repositories().iter()?.collect::<Vec<_>>();
    assert_eq!(names, vec!["dotfiles".to_string(), "dotfiles_1".to_string()]);

    Ok(())
}

#[sealed_test]
fn clone_from_missing_source_leaves_store_clean() -> Result<()> {
    let ws = Workspace::new()?;
    let source = SourceLocation::parse(
        ws.cwd.join("origin/nothing").to_string_lossy(),
        "https://github.com",
    )?;

    let result = ws.store.clone_repository(&source);
    assert!(matches!(result, Err(StoreError::CloneFailed { .. })));
    assert_eq!(ws.store.repositories().iter()?.count(), 0);

    Ok(())
}

#[sealed_test]
fn link_then_unlink_vimrc() -> Result<()> {
    let ws = Workspace::new()?;
    let origin = ws.origin(&[(".vimrc", "")])?;
    let name = ws.store.clone_repository(&source_of(&origin)?)?;

    assert_eq!(ws.store.link(&name)?, Vec::new());
    let link = ws.home().join(".vimrc");
    assert!(fs::symlink_metadata(&link)?.is_symlink());
    assert_eq!(fs::canonicalize(&link)?, ws.store.root().join("dotfiles/.vimrc"));

    ws.store.unlink(&name)?;
    assert!(fs::symlink_metadata(&link).is_err());

    Ok(())
}

#[sealed_test]
fn link_over_existing_vimrc_reports_one_conflict() -> Result<()> {
    let ws = Workspace::new()?;
    let origin = ws.origin(&[(".vimrc", ""), (".bashrc", "")])?;
    let name = ws.store.clone_repository(&source_of(&origin)?)?;
    fs::write(ws.home().join(".vimrc"), "my vimrc")?;

    let conflicts = ws.store.link(&name)?;
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].path, PathBuf::from(".vimrc"));
    assert_eq!(conflicts[0].reason, ConflictReason::Occupied);
    assert_eq!(fs::read_to_string(ws.home().join(".vimrc"))?, "my vimrc");
    assert!(fs::symlink_metadata(ws.home().join(".bashrc"))?.is_symlink());

    Ok(())
}

#[sealed_test]
fn pull_brings_new_files_to_link() -> Result<()> {
    let ws = Workspace::new()?;
    let origin = ws.origin(&[(".vimrc", "")])?;
    let name = ws.store.clone_repository(&source_of(&origin)?)?;
    ws.store.link(&name)?;

    origin.stage_and_commit(".config/nvim/init.lua", "-- nvim")?;
    ws.store.pull(&name)?;
    assert_eq!(
        fs::read_to_string(ws.store.root().join("dotfiles/.config/nvim/init.lua"))?,
        "-- nvim"
    );

    let report = ws.store.diff(&name)?;
    assert_eq!(report.linked, 1);
    assert_eq!(report.entries.len(), 1);
    assert_eq!(report.entries[0].path, PathBuf::from(".config"));
    assert_eq!(report.entries[0].status, DiffStatus::Missing);

    assert_eq!(ws.store.link(&name)?, Vec::new());
    assert!(ws.store.diff(&name)?.is_clean());

    // INVARIANT: Pulling again with nothing new is fine.
    ws.store.pull(&name)?;

    Ok(())
}

#[sealed_test]
fn remove_after_link_leaves_no_links_behind() -> Result<()> {
    let ws = Workspace::new()?;
    let origin = ws.origin(&[(".vimrc", ""), (".config/git/config", "")])?;
    let name = ws.store.clone_repository(&source_of(&origin)?)?;
    ws.store.link(&name)?;

    ws.store.remove(&name)?;
    assert!(!ws.store.root().join(&name).exists());
    assert!(fs::symlink_metadata(ws.home().join(".vimrc")).is_err());
    assert!(fs::symlink_metadata(ws.home().join(".config")).is_err());

    // INVARIANT: Only the store itself remains in home.
    let leftovers = fs::read_dir(ws.home())?
        .map(|entry| entry.map(|entry| entry.file_name()))
        .collect::<Result<Vec<_>, _>>()?;
    assert_eq!(leftovers, vec![std::ffi::OsString::from(".deja")]);

    Ok(())
}

#[sealed_test]
fn operations_on_unknown_repository_fail() -> Result<()> {
    let ws = Workspace::new()?;

    assert!(matches!(ws.store.link("dotfiles"), Err(StoreError::RepositoryNotFound { .. })));
    assert!(matches!(ws.store.unlink("dotfiles"), Err(StoreError::RepositoryNotFound { .. })));
    assert!(matches!(ws.store.diff("dotfiles"), Err(StoreError::RepositoryNotFound { .. })));
    assert!(matches!(ws.store.pull("dotfiles"), Err(StoreError::RepositoryNotFound { .. })));
    assert!(matches!(ws.store.remove("dotfiles"), Err(StoreError::RepositoryNotFound { .. })));

    Ok(())
}
