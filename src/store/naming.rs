// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Repository name allocation.
//!
//! Every repository in the store needs a unique name. Cloning the same
//! source twice, or two sources that share a base name, would otherwise
//! collide. Collisions get resolved by appending `_N`, using the smallest
//! positive `N` that is still free.

use std::collections::HashSet;

/// Allocate store-unique name for a repository.
///
/// Returns desired name unchanged if it is free. Otherwise, returns the
/// first of `desired_1`, `desired_2`, ... that is free. Existing names are
/// not assumed to be contiguous.
pub fn allocate(desired: &str, existing: impl IntoIterator<Item = impl AsRef<str>>) -> String {
    let existing = existing
        .into_iter()
        .map(|name| name.as_ref().to_string())
        .collect::<HashSet<_>>();

    if !existing.contains(desired) {
        return desired.to_string();
    }

    // INVARIANT: Desired name is one of len taken names, so some suffix in
    // 1..=len is always free.
    let mut suffix = 1;
    while suffix <= existing.len() {
        let candidate = format!("{desired}_{suffix}");
        if !existing.contains(&candidate) {
            return candidate;
        }
        suffix += 1;
    }

    format!("{desired}_{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;

    #[test_case("dotfiles", &[], "dotfiles"; "empty store")]
    #[test_case("dotfiles", &["vim", "shell"], "dotfiles"; "no collision")]
    #[test_case("dotfiles", &["dotfiles"], "dotfiles_1"; "first collision")]
    #[test_case("dotfiles", &["dotfiles", "dotfiles_1"], "dotfiles_2"; "second collision")]
    #[test_case("dotfiles", &["dotfiles", "dotfiles_2"], "dotfiles_1"; "fill gap")]
    #[test_case("dotfiles", &["dotfiles_1"], "dotfiles"; "suffixed only")]
    #[test_case("dotfiles_1", &["dotfiles_1"], "dotfiles_1_1"; "suffixed desire")]
    #[test_case("dotfiles", &["dotfiles", "dotfiles_1", "dotfiles_2"], "dotfiles_3"; "dense suffixes")]
    #[test_case("dotfiles", &["dotfiles", "vim", "shell"], "dotfiles_1"; "unrelated names")]
    #[test]
    fn allocate_names(desired: &str, existing: &[&str], expect: &str) {
        pretty_assertions::assert_eq!(allocate(desired, existing), expect);
    }

    #[test]
    fn allocate_never_returns_existing_name() {
        let mut existing = vec!["dotfiles".to_string()];
        for _ in 0..32 {
            let name = allocate("dotfiles", &existing);
            assert!(!existing.contains(&name));
            existing.push(name);
        }
        assert_eq!(allocate("dotfiles", &existing), "dotfiles_33");
    }
}
