// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Dotfile repositories, kept in a private store, projected into a home
//! directory through symbolic links.
//!
//! Deja clones repositories into its __repository store__, and mirrors the
//! contents of any of them into the user's home directory. Every file of a
//! repository becomes a symbolic link at the same relative path in the home
//! directory, every directory becomes plain scaffolding for those links.
//!
//! # Layout
//!
//! - [`store`] owns repository directories, allocates names, and orchestrates
//!   clones through a [`Vcs`] collaborator.
//! - [`link`] creates and tears down symbolic links.
//! - [`diff`] reports drift between a repository and the home directory.
//!
//! Nothing in here reads ambient process state. The store root and home root
//! are always passed in explicitly.

pub mod config;
pub mod diff;
pub mod link;
pub mod path;
pub mod repository;
pub mod source;
pub mod store;
pub mod vcs;

pub use config::{Backend, Settings};
pub use diff::{DiffEntry, DiffReport, DiffStatus};
pub use link::{Conflict, ConflictReason};
pub use repository::{Repository, TreeError};
pub use source::SourceLocation;
pub use store::{Store, StoreError};
pub use vcs::{Git2Vcs, GitCommand, Vcs, VcsError};
