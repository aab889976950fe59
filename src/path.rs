// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine relevent path information for external files that need to be
//! interacted with, or managed in some way. Nothing in here touches the file
//! system except for [`same_file`], which falls back to canonicalization when
//! lexical comparison is not enough.

use std::path::{Component, Path, PathBuf};

/// Determine absolute path to user's home directory.
///
/// Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or(NoWayHome)
}

/// Determine default absolute path to repository store directory.
///
/// Uses `$HOME/.deja` as the default absolute path for the repository store.
/// Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn default_store_dir() -> Result<PathBuf> {
    home_dir().map(|path| path.join(".deja"))
}

/// Determine default absolute path to settings file.
///
/// Uses XDG Base Directory path `$XDG_CONFIG_HOME/deja/config.toml`. Does
/// not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_config_file() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("deja").join("config.toml"))
        .ok_or(NoWayHome)
}

/// Lexically normalize a path.
///
/// Drops `.` components and folds `..` into its parent. Symbolic links along
/// the way are not consulted.
pub fn normalize(path: impl AsRef<Path>) -> PathBuf {
    let mut normal = PathBuf::new();
    for component in path.as_ref().components() {
        match component {
            Component::CurDir => continue,
            // INVARIANT: Cannot climb above root, but can above relative start.
            Component::ParentDir => match normal.components().next_back() {
                Some(Component::Normal(_)) => {
                    normal.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                Some(Component::ParentDir | Component::CurDir) | None => normal.push(component),
            },
            _ => normal.push(component),
        }
    }

    normal
}

/// Resolve the raw target of a symbolic link into a normalized path.
///
/// Relative targets are resolved against the directory containing the link
/// itself, just like the operating system would.
pub fn resolve_link_target(link: impl AsRef<Path>, raw_target: impl AsRef<Path>) -> PathBuf {
    let raw_target = raw_target.as_ref();
    if raw_target.is_absolute() {
        return normalize(raw_target);
    }

    let parent = link.as_ref().parent().unwrap_or_else(|| Path::new(""));
    normalize(parent.join(raw_target))
}

/// Check if two paths refer to the same file.
///
/// Tries lexical comparison first, then canonicalization of both sides if
/// both exist.
pub fn same_file(lhs: impl AsRef<Path>, rhs: impl AsRef<Path>) -> bool {
    let (lhs, rhs) = (lhs.as_ref(), rhs.as_ref());
    if normalize(lhs) == normalize(rhs) {
        return true;
    }

    match (lhs.canonicalize(), rhs.canonicalize()) {
        (Ok(lhs), Ok(rhs)) => lhs == rhs,
        _ => false,
    }
}

/// No way to determine user's home directory.
///
/// # See Also
///
/// - [`dirs::home_dir`](https://docs.rs/dirs/latest/dirs/fn.home_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's home directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use simple_test_case::test_case;

    #[test_case("/home/blah/./.vimrc", "/home/blah/.vimrc"; "drop current dir")]
    #[test_case("/home/blah/.deja/../.vimrc", "/home/blah/.vimrc"; "fold parent dir")]
    #[test_case("/../etc", "/etc"; "stop at root")]
    #[test_case("../foo/bar", "../foo/bar"; "keep leading parent")]
    #[test_case("../../x", "../../x"; "keep repeated leading parent")]
    #[test_case("a/../../x", "../x"; "climb above relative start")]
    #[test]
    fn normalize_paths(input: &str, expect: &str) {
        pretty_assertions::assert_eq!(normalize(input), PathBuf::from(expect));
    }

    #[test_case("/home/blah/.vimrc", "/store/dotfiles/.vimrc", "/store/dotfiles/.vimrc"; "absolute")]
    #[test_case("/home/blah/.vimrc", ".deja/dotfiles/.vimrc", "/home/blah/.deja/dotfiles/.vimrc"; "relative")]
    #[test_case("/home/blah/.config/nvim", "../.deja/nvim", "/home/blah/.deja/nvim"; "relative parent")]
    #[test]
    fn resolve_relative_and_absolute_targets(link: &str, raw: &str, expect: &str) {
        pretty_assertions::assert_eq!(resolve_link_target(link, raw), PathBuf::from(expect));
    }

    #[test]
    fn same_file_lexically() {
        assert!(same_file("/no/such/dir/../file", "/no/such/file"));
        assert!(!same_file("/no/such/file", "/no/such/other"));
    }
}
