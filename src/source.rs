// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Source location handling.
//!
//! A __source location__ is whatever the user hands to `deja clone`: a full
//! URL, an scp-like address, a local path, or the `user/repo` shorthand that
//! gets expanded against a configured host. Each source location also yields
//! the base name its repository should get in the store, before collision
//! handling kicks in.

use std::fmt::{Display, Formatter, Result as FmtResult};

/// Parsed source location of a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    url: String,
    base_name: String,
}

impl SourceLocation {
    /// Parse raw source location.
    ///
    /// Expands `user/repo` shorthand into `{host}/user/repo.git`. Anything
    /// else is used as-is, except for a leading tilde on local paths.
    ///
    /// # Errors
    ///
    /// - Return [`SourceError::Empty`] if raw source location is blank.
    /// - Return [`SourceError::NoBaseName`] if no base name can be derived.
    pub fn parse(raw: impl AsRef<str>, host: impl AsRef<str>) -> Result<Self> {
        let raw = raw.as_ref().trim();
        if raw.is_empty() {
            return Err(SourceError::Empty);
        }

        let url = if is_shorthand(raw) {
            format!("{}/{raw}.git", host.as_ref().trim_end_matches('/'))
        } else if raw.starts_with('~') {
            shellexpand::tilde(raw).into_owned()
        } else {
            raw.to_string()
        };

        let base_name = base_name(&url).ok_or_else(|| SourceError::NoBaseName(raw.to_string()))?;

        Ok(Self { url, base_name })
    }

    /// Full location to hand over to the VCS client.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Desired repository name in the store.
    pub fn base_name(&self) -> &str {
        &self.base_name
    }
}

impl Display for SourceLocation {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(&self.url)
    }
}

fn is_shorthand(raw: &str) -> bool {
    !raw.contains(':')
        && !raw.starts_with(['.', '/', '~'])
        && raw.split('/').filter(|segment| !segment.is_empty()).count() == 2
        && raw.matches('/').count() == 1
}

fn base_name(url: &str) -> Option<String> {
    let name = url
        .trim_end_matches(['/', '\\'])
        .rsplit(['/', '\\', ':'])
        .next()?;
    let name = name.strip_suffix(".git").unwrap_or(name);

    match name {
        "" | "." | ".." => None,
        _ => Some(name.to_string()),
    }
}

/// Source location error types.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// Nothing to parse.
    #[error("source location is empty")]
    Empty,

    /// Repository name cannot be derived from source location.
    #[error("cannot derive repository name from {0:?}")]
    NoBaseName(String),
}

/// Friendly result alias :3
type Result<T, E = SourceError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use simple_test_case::test_case;

    #[test_case("mcantelon/dotfiles", "https://github.com/mcantelon/dotfiles.git", "dotfiles"; "shorthand")]
    #[test_case("git://github.com/mcantelon/dotfiles.git", "git://github.com/mcantelon/dotfiles.git", "dotfiles"; "git url")]
    #[test_case("https://blah.org/foo/vim-config/", "https://blah.org/foo/vim-config/", "vim-config"; "trailing slash")]
    #[test_case("git@github.com:blah/shell.git", "git@github.com:blah/shell.git", "shell"; "scp like")]
    #[test_case("git@github.com:shell.git", "git@github.com:shell.git", "shell"; "scp like no owner")]
    #[test_case("/srv/git/dotfiles", "/srv/git/dotfiles", "dotfiles"; "local path")]
    #[test_case("./dotfiles.git", "./dotfiles.git", "dotfiles"; "relative path")]
    #[test]
    fn parse_source_location(raw: &str, url: &str, name: &str) {
        let source = SourceLocation::parse(raw, "https://github.com/").unwrap();
        pretty_assertions::assert_eq!(source.url(), url);
        pretty_assertions::assert_eq!(source.base_name(), name);
    }

    #[test_case("", SourceError::Empty; "empty")]
    #[test_case("   ", SourceError::Empty; "blank")]
    #[test_case("https://blah.org/.git", SourceError::NoBaseName("https://blah.org/.git".into()); "only suffix")]
    #[test_case("/", SourceError::NoBaseName("/".into()); "root")]
    #[test]
    fn parse_bad_source_location(raw: &str, expect: SourceError) {
        pretty_assertions::assert_eq!(SourceLocation::parse(raw, "https://github.com"), Err(expect));
    }
}
